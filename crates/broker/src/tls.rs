// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Trust material for secure broker connections.
//!
//! When secure mode is on and the CA file is missing, the bundle is fetched
//! from the config server: either a single PEM or a zip archive holding the
//! CA and client cert/key, unpacked next to the configured CA path.

use ji_core::BrokerConnectionConfig;
use serde::Serialize;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DOWNLOAD_PATH: &str = "/api/worker/config/tls/download";
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("secure mode requires ca_file")]
    MissingCaFile,

    #[error("CA file not found: {0}")]
    CaNotFound(PathBuf),

    #[error("trust material download failed: {0}")]
    Download(#[from] reqwest::Error),

    #[error("trust material download returned HTTP {0}")]
    Status(u16),

    #[error("invalid trust material archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("failed to write {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
}

impl TlsError {
    /// Missing trust material is a configuration error; download problems
    /// are connectivity errors and may be retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::MissingCaFile | Self::CaNotFound(_))
    }
}

/// Resolved, on-disk trust material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustMaterial {
    pub ca_file: PathBuf,
    pub cert_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
}

impl TrustMaterial {
    /// Client certificate and key, only when both are present on disk.
    pub fn client_identity(&self) -> Option<(&Path, &Path)> {
        match (&self.cert_file, &self.key_file) {
            (Some(cert), Some(key)) if cert.exists() && key.exists() => Some((cert, key)),
            _ => None,
        }
    }

    pub fn read_ca(&self) -> Result<Vec<u8>, TlsError> {
        std::fs::read(&self.ca_file)
            .map_err(|source| TlsError::Io { path: self.ca_file.clone(), source })
    }
}

#[derive(Serialize)]
struct DownloadRequest<'a> {
    app_id: &'a str,
    app_secret: &'a str,
}

/// Fetches missing trust material from the config server.
#[derive(Clone)]
pub struct TlsFetcher {
    base_dir: PathBuf,
    end_point: Option<String>,
    app_id: String,
    app_secret: String,
    http: reqwest::Client,
}

impl TlsFetcher {
    pub fn new(
        base_dir: impl Into<PathBuf>,
        end_point: Option<String>,
        app_id: impl Into<String>,
        app_secret: impl Into<String>,
    ) -> Self {
        Self {
            base_dir: base_dir.into(),
            end_point,
            app_id: app_id.into(),
            app_secret: app_secret.into(),
            http: reqwest::Client::new(),
        }
    }

    /// Ensure trust material exists for a secure connection.
    ///
    /// Returns `None` when the connection is not secure.
    pub async fn ensure(
        &self,
        config: &BrokerConnectionConfig,
    ) -> Result<Option<TrustMaterial>, TlsError> {
        if !config.secure {
            return Ok(None);
        }
        let ca_file = config.ca_file.as_deref().ok_or(TlsError::MissingCaFile)?;
        let material = TrustMaterial {
            ca_file: self.resolve(ca_file),
            cert_file: config.cert_file.as_deref().map(|p| self.resolve(p)),
            key_file: config.key_file.as_deref().map(|p| self.resolve(p)),
        };
        if material.ca_file.exists() {
            return Ok(Some(material));
        }
        let Some(end_point) = self.end_point.as_deref() else {
            return Err(TlsError::CaNotFound(material.ca_file));
        };
        tracing::info!(ca_file = %material.ca_file.display(), "fetching trust material");
        let bundle = self.download(end_point).await?;
        install_bundle(&bundle, &material.ca_file)?;
        if !material.ca_file.exists() {
            return Err(TlsError::CaNotFound(material.ca_file));
        }
        Ok(Some(material))
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    async fn download(&self, end_point: &str) -> Result<Vec<u8>, TlsError> {
        let url = format!("{}{DOWNLOAD_PATH}", end_point.trim_end_matches('/'));
        let response = self
            .http
            .post(url)
            .json(&DownloadRequest { app_id: &self.app_id, app_secret: &self.app_secret })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(TlsError::Status(response.status().as_u16()));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// Write a downloaded bundle: zip archives are unpacked into the CA file's
/// directory, anything else is written as the CA file itself.
pub fn install_bundle(bundle: &[u8], ca_file: &Path) -> Result<(), TlsError> {
    let dir = ca_file.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir).map_err(|source| TlsError::Io { path: dir.to_path_buf(), source })?;

    if !bundle.starts_with(ZIP_MAGIC) {
        return std::fs::write(ca_file, bundle)
            .map_err(|source| TlsError::Io { path: ca_file.to_path_buf(), source });
    }

    let mut archive = zip::ZipArchive::new(Cursor::new(bundle))?;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        // Entries escaping the target directory are skipped
        let Some(name) = entry.enclosed_name().map(Path::to_path_buf) else {
            continue;
        };
        let target = dir.join(name);
        if entry.is_dir() {
            std::fs::create_dir_all(&target)
                .map_err(|source| TlsError::Io { path: target.clone(), source })?;
            continue;
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|source| TlsError::Io { path: parent.to_path_buf(), source })?;
        }
        let mut out = std::fs::File::create(&target)
            .map_err(|source| TlsError::Io { path: target.clone(), source })?;
        std::io::copy(&mut entry, &mut out)
            .map_err(|source| TlsError::Io { path: target.clone(), source })?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "tls_tests.rs"]
mod tests;
