//! Path-style object storage over plain `PUT` and `GET`.

use async_trait::async_trait;
use modelship_core::{Error, Result, S3Uri};
use modelship_package::ObjectStore;
use reqwest::StatusCode;
use tracing::debug;

use crate::client::{check, PlatformClient};

#[async_trait]
impl ObjectStore for PlatformClient {
    async fn put_object(&self, uri: &S3Uri, body: Vec<u8>) -> Result<()> {
        let url = self.object_url(uri)?;
        debug!(%uri, %url, bytes = body.len(), "PUT object");

        let context = format!("PUT {}", uri);
        let response = self
            .http()
            .put(url)
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Http(format!("{}: {}", context, e)))?;
        check(response, &context).await?;
        Ok(())
    }

    async fn get_object(&self, uri: &S3Uri) -> Result<Vec<u8>> {
        let url = self.object_url(uri)?;
        debug!(%uri, %url, "GET object");

        let context = format!("GET {}", uri);
        let response = self
            .http()
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Http(format!("{}: {}", context, e)))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(uri.to_string()));
        }

        let response = check(response, &context).await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Http(format!("{}: {}", context, e)))?;
        Ok(body.to_vec())
    }
}
