//! Core value types shared by the classifier, router and executor.

pub mod attempt;
pub mod request;
pub mod task;

pub use attempt::{AttemptOutcome, AttemptRecord};
pub use request::{OrchestrationRequest, OrchestrationResponse, ProviderRequest, ProviderResponse, TerminalState};
pub use task::{ProviderId, TaskCategory};
