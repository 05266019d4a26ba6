//! Validation requests, validation services and the request pipeline.
//!
//! [`dispatcher::dispatch`] applies request policy around the trust engine
//! inside one open trust view; [`Validator`] wraps it in retried
//! transactions against a [`Model`](crate::view::Model).

pub mod dispatcher;
pub mod hosts;
pub mod oracle;
pub mod request;
pub mod validator;

pub use dispatcher::dispatch;
pub use oracle::{
    CachingOracle, FixedOracle, ListedOracle, QueryWorkers, TimeLimitedOracle, ValidationOracle,
};
pub use request::{
    PathValidity, ValidationInformation, ValidationRequest, ValidationRequestSpec,
    ValidationResult, ValidationResultSpec,
};
pub use validator::Validator;
