//! `model.tar.gz` packing and unpacking.

use std::io::Cursor;
use std::path::{Component, Path, PathBuf};

use async_compression::tokio::bufread::GzipDecoder;
use async_compression::tokio::write::GzipEncoder;
use modelship_core::{Error, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info};

/// A written model archive.
#[derive(Debug, Clone, Serialize)]
pub struct PackagedModel {
    pub path: PathBuf,
    /// Hex SHA-256 of the compressed archive.
    pub sha256: String,
    pub size: u64,
    /// File members, in archive order.
    pub entries: Vec<String>,
}

impl PackagedModel {
    /// Describe an existing `.tar.gz` on disk.
    pub async fn open(path: &Path) -> Result<Self> {
        let compressed = tokio::fs::read(path).await?;
        let sha256 = hex::encode(Sha256::digest(&compressed));
        let tarball = gunzip(&compressed, path).await?;
        let entries = list_tar(&tarball)?;

        debug!("Opened {} ({} entries)", path.display(), entries.len());
        Ok(Self {
            path: path.to_path_buf(),
            sha256,
            size: compressed.len() as u64,
            entries,
        })
    }
}

/// Builder for a flat model archive.
#[derive(Debug, Default)]
pub struct ModelArchive {
    members: Vec<(PathBuf, String)>,
}

impl ModelArchive {
    pub fn builder() -> Self {
        Self::default()
    }

    /// Add a file (or a directory, recursively) under `name` in the archive.
    pub fn add(mut self, source: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        self.members.push((source.into(), name.into()));
        self
    }

    /// Add a file under its own file name.
    pub fn add_file(self, source: impl Into<PathBuf>) -> Result<Self> {
        let source = source.into();
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::InvalidArgument(format!("no file name: {}", source.display())))?
            .to_string();
        Ok(self.add(source, name))
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Write the gzipped tarball to `dest`.
    pub async fn write(self, dest: &Path) -> Result<PackagedModel> {
        if self.members.is_empty() {
            return Err(Error::Archive("nothing to package".into()));
        }
        for (source, name) in &self.members {
            if !source.exists() {
                return Err(Error::NotFound(source.display().to_string()));
            }
            check_member_name(name)?;
        }

        let members = self.members;
        let tarball = tokio::task::spawn_blocking(move || build_tar(&members))
            .await
            .map_err(|e| Error::Archive(format!("packaging task failed: {}", e)))??;
        let entries = list_tar(&tarball)?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = tokio::fs::File::create(dest).await?;
        let mut encoder = GzipEncoder::new(file);
        encoder.write_all(&tarball).await?;
        encoder.shutdown().await?;

        let written = tokio::fs::read(dest).await?;
        let sha256 = hex::encode(Sha256::digest(&written));

        info!(
            "Packaged {} entries into {} ({} bytes, sha256 {})",
            entries.len(),
            dest.display(),
            written.len(),
            &sha256[..12]
        );

        Ok(PackagedModel {
            path: dest.to_path_buf(),
            sha256,
            size: written.len() as u64,
            entries,
        })
    }
}

/// Extract a `.tar.gz` into `dest`. Returns the extracted file names.
///
/// Members with absolute paths or `..` components are rejected.
pub async fn unpack(archive: &Path, dest: &Path) -> Result<Vec<String>> {
    let compressed = tokio::fs::read(archive).await?;
    let tarball = gunzip(&compressed, archive).await?;

    tokio::fs::create_dir_all(dest).await?;
    let dest = dest.to_path_buf();
    let names = tokio::task::spawn_blocking(move || extract_tar(&tarball, &dest))
        .await
        .map_err(|e| Error::Archive(format!("unpack task failed: {}", e)))??;

    info!("Unpacked {} files from {}", names.len(), archive.display());
    Ok(names)
}

async fn gunzip(compressed: &[u8], path: &Path) -> Result<Vec<u8>> {
    let mut decoder = GzipDecoder::new(BufReader::new(compressed));
    let mut tarball = Vec::new();
    decoder
        .read_to_end(&mut tarball)
        .await
        .map_err(|e| Error::Archive(format!("{}: {}", path.display(), e)))?;
    Ok(tarball)
}

fn check_member_name(name: &str) -> Result<()> {
    let path = Path::new(name);
    let escapes = name.is_empty()
        || path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(Error::Archive(format!("invalid archive member name: {:?}", name)));
    }
    Ok(())
}

fn build_tar(members: &[(PathBuf, String)]) -> Result<Vec<u8>> {
    let mut builder = tar::Builder::new(Vec::new());
    builder.mode(tar::HeaderMode::Deterministic);

    for (source, name) in members {
        if source.is_dir() {
            debug!("Adding directory {} as {}/", source.display(), name);
            builder.append_dir_all(name, source)?;
        } else {
            debug!("Adding {} as {}", source.display(), name);
            builder.append_path_with_name(source, name)?;
        }
    }

    Ok(builder.into_inner()?)
}

fn list_tar(tarball: &[u8]) -> Result<Vec<String>> {
    let mut archive = tar::Archive::new(Cursor::new(tarball));
    let mut names = Vec::new();
    for entry in archive.entries()? {
        let entry = entry?;
        if entry.header().entry_type().is_dir() {
            continue;
        }
        names.push(entry.path()?.to_string_lossy().into_owned());
    }
    Ok(names)
}

fn extract_tar(tarball: &[u8], dest: &Path) -> Result<Vec<String>> {
    let mut archive = tar::Archive::new(Cursor::new(tarball));
    let mut names = Vec::new();
    for entry in archive.entries()? {
        let mut entry = entry?;
        let name = entry.path()?.to_string_lossy().into_owned();
        check_member_name(&name)?;
        let is_dir = entry.header().entry_type().is_dir();
        if !entry.unpack_in(dest)? {
            return Err(Error::Archive(format!("member escapes destination: {}", name)));
        }
        if !is_dir {
            names.push(name);
        }
    }
    Ok(names)
}
