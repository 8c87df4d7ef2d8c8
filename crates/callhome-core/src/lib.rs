//! callhome-core: Core abstractions and configuration for callhomed
//!
//! This crate provides the domain types describing call-home applications,
//! the configuration document and its validation rules, and the error
//! taxonomy shared by the daemon components.

pub mod config;
pub mod error;
pub mod types;

pub use error::CallHomeError;
pub use types::{Application, ServerEndpoint};
