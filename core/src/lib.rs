//! Request-to-process dispatch for the Rally gateway.
//!
//! The gateway crate owns the HTTP surface; everything here is transport
//! agnostic: a static route table, the argument builder that turns a route
//! plus payload into an argv, and the runtime that executes that argv.

pub mod command;
pub mod config;
pub mod error;
pub mod registry;
pub mod runtime;

pub use command::{build, ArgumentVector, Payload};
pub use config::GatewayConfig;
pub use error::{ExecError, FieldError};
pub use registry::{Registry, ResponseShape, RouteDefinition, RouteId};
pub use runtime::{ExecutionResult, Runtime};
