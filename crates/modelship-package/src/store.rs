//! Object-storage seam and model upload.

use async_trait::async_trait;
use modelship_core::{Result, S3Uri};
use tracing::info;

use crate::archive::PackagedModel;

/// Minimal object storage: whole-object put and get.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(&self, uri: &S3Uri, body: Vec<u8>) -> Result<()>;

    async fn get_object(&self, uri: &S3Uri) -> Result<Vec<u8>>;
}

/// Upload a packaged archive. A `uri` ending in `/` is treated as a prefix and
/// the archive's file name is appended.
pub async fn upload_model(
    store: &dyn ObjectStore,
    packaged: &PackagedModel,
    uri: &S3Uri,
) -> Result<S3Uri> {
    let target = if uri.key.is_empty() || uri.key.ends_with('/') {
        let name = packaged
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("model.tar.gz");
        uri.join(name)
    } else {
        uri.clone()
    };

    let body = tokio::fs::read(&packaged.path).await?;
    let size = body.len();
    store.put_object(&target, body).await?;

    info!("Uploaded {} ({} bytes) to {}", packaged.path.display(), size, target);
    Ok(target)
}
