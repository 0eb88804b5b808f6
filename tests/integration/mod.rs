//! Shared fixtures for HTTP-level integration tests

pub mod mock_server;
