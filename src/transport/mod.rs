//! HTTP plumbing shared by the remote adapters.

mod http;

pub use http::{api_key_from_env, HttpTransport};
