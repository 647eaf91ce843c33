//! Ahead-of-time compilation jobs.
//!
//! A compilation job turns a packaged model into an artifact optimized for a
//! target device. The remote service runs it asynchronously; [`Compiler`]
//! submits the job once and polls it until it completes, fails, or the local
//! deadline passes.

pub mod api;
pub mod compiler;
pub mod error;
pub mod job;

pub use api::CompilationApi;
pub use compiler::{CompilationReport, Compiler};
pub use error::CompileError;
pub use job::*;
