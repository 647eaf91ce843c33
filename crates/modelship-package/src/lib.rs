//! Model artifact handling: download, unpack, repackage, upload.
//!
//! The hosting platform expects a gzipped tarball with the model files at
//! the archive root. [`ModelArchive`] builds one from local files,
//! [`check_layout`] verifies it holds what the framework needs, and
//! [`upload_model`] puts it in object storage.

pub mod archive;
pub mod fetch;
pub mod layout;
pub mod store;

pub use archive::{unpack, ModelArchive, PackagedModel};
pub use fetch::fetch;
pub use layout::check_layout;
pub use store::{upload_model, ObjectStore};
