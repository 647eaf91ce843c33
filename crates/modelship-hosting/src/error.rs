//! Hosting errors.

use std::time::Duration;

use thiserror::Error;

use crate::types::EndpointStatus;

#[derive(Error, Debug)]
pub enum HostingError {
    #[error("{operation} {resource} failed: {source}")]
    Remote {
        operation: &'static str,
        resource: String,
        #[source]
        source: modelship_core::Error,
    },

    #[error("Endpoint {endpoint} is {status}: {reason}")]
    EndpointFailed {
        endpoint: String,
        status: EndpointStatus,
        reason: String,
    },

    #[error("Endpoint {endpoint} not in service after {polls} polls ({waited:?})")]
    TimedOut {
        endpoint: String,
        polls: u32,
        waited: Duration,
    },
}

impl HostingError {
    pub(crate) fn remote(
        operation: &'static str,
        resource: &str,
    ) -> impl FnOnce(modelship_core::Error) -> HostingError {
        let resource = resource.to_string();
        move |source| HostingError::Remote {
            operation,
            resource,
            source,
        }
    }
}
