//! reqwest-backed implementation of every remote seam.
//!
//! The control plane speaks JSON over HTTP: each call is a `POST` to the
//! regional endpoint with the operation named in `X-Amz-Target` and a
//! PascalCase body. Request signing is not done here; point the endpoints at
//! a signing proxy or a compatible emulator.

pub mod client;
mod storage;
mod wire;

pub use client::PlatformClient;
