//! modelship core: configuration, errors, shared value types and the status poller.

pub mod config;
pub mod error;
pub mod names;
pub mod poll;
pub mod types;

pub use config::PlatformConfig;
pub use error::{Error, Result};
pub use names::unique_name;
pub use poll::{poll_until, PollError, PollPolicy, Polled, Probe};
pub use types::{Framework, InputShape, S3Uri, TargetDevice};
