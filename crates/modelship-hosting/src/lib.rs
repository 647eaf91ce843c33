//! Hosting: register a model, roll out an endpoint, invoke it, tear it down.

pub mod api;
pub mod deployer;
pub mod error;
pub mod types;

pub use api::{HostingApi, RuntimeApi};
pub use deployer::Deployer;
pub use error::HostingError;
pub use types::*;
