//! Asynchronous logo acquisition. The fetch is the only await point of a
//! render and completes before the first page is opened.

use crate::error::ReportError;
use crate::preprocess::LogoAsset;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

#[async_trait]
pub trait LogoSource: Send + Sync {
    async fn fetch(&self) -> Result<LogoAsset, ReportError>;

    /// Short description used in log lines.
    fn describe(&self) -> String;
}

pub struct HttpLogoSource {
    url: String,
    cached_ratio: Option<f32>,
    client: reqwest::Client,
}

impl HttpLogoSource {
    pub fn new(url: impl Into<String>) -> Result<Self, ReportError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("consultation-report/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            url: url.into(),
            cached_ratio: None,
            client,
        })
    }

    pub fn with_cached_ratio(mut self, ratio: Option<f32>) -> Self {
        self.cached_ratio = ratio;
        self
    }
}

#[async_trait]
impl LogoSource for HttpLogoSource {
    async fn fetch(&self) -> Result<LogoAsset, ReportError> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ReportError::Fetch(format!("{} returned {status}", self.url)));
        }
        let bytes = response.bytes().await?;
        Ok(LogoAsset {
            bytes: bytes.to_vec(),
            cached_ratio: self.cached_ratio,
        })
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

pub struct FileLogoSource {
    path: PathBuf,
    cached_ratio: Option<f32>,
}

impl FileLogoSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached_ratio: None,
        }
    }

    pub fn with_cached_ratio(mut self, ratio: Option<f32>) -> Self {
        self.cached_ratio = ratio;
        self
    }
}

#[async_trait]
impl LogoSource for FileLogoSource {
    async fn fetch(&self) -> Result<LogoAsset, ReportError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|err| ReportError::Fetch(format!("{}: {err}", self.path.display())))?;
        Ok(LogoAsset {
            bytes,
            cached_ratio: self.cached_ratio,
        })
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Logo already held in memory.
pub struct StaticLogoSource(pub LogoAsset);

#[async_trait]
impl LogoSource for StaticLogoSource {
    async fn fetch(&self) -> Result<LogoAsset, ReportError> {
        Ok(self.0.clone())
    }

    fn describe(&self) -> String {
        format!("in-memory logo ({} bytes)", self.0.bytes.len())
    }
}

/// Fetch failures degrade to rendering without a logo.
pub async fn fetch_logo(source: &dyn LogoSource) -> Option<LogoAsset> {
    match source.fetch().await {
        Ok(asset) if asset.bytes.is_empty() => {
            log::warn!("logo from {} is empty, rendering without logo", source.describe());
            None
        }
        Ok(asset) => {
            log::debug!("fetched logo from {} ({} bytes)", source.describe(), asset.bytes.len());
            Some(asset)
        }
        Err(err) => {
            log::warn!("logo fetch from {} failed, rendering without logo: {err}", source.describe());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Unreachable;

    #[async_trait]
    impl LogoSource for Unreachable {
        async fn fetch(&self) -> Result<LogoAsset, ReportError> {
            Err(ReportError::Fetch("connection refused".to_string()))
        }

        fn describe(&self) -> String {
            "unreachable".to_string()
        }
    }

    #[tokio::test]
    async fn failed_fetch_yields_no_logo() {
        assert!(fetch_logo(&Unreachable).await.is_none());
    }

    #[tokio::test]
    async fn missing_file_yields_no_logo() {
        let source = FileLogoSource::new("/nonexistent/consultation-report/logo.png");
        assert!(fetch_logo(&source).await.is_none());
    }

    #[tokio::test]
    async fn file_source_reads_bytes_and_keeps_ratio() {
        let dir = std::env::temp_dir().join(format!("consultation_report_fetch_{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("mkdir");
        let path = dir.join("logo.bin");
        std::fs::write(&path, b"logo-bytes").expect("write");
        let source = FileLogoSource::new(&path).with_cached_ratio(Some(2.5));
        let asset = fetch_logo(&source).await.expect("fetched");
        assert_eq!(asset.bytes, b"logo-bytes");
        assert_eq!(asset.cached_ratio, Some(2.5));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn invalid_url_yields_no_logo() {
        let source = HttpLogoSource::new("not a url").expect("client");
        assert!(fetch_logo(&source).await.is_none());
    }

    #[tokio::test]
    async fn empty_static_logo_is_treated_as_absent() {
        let source = StaticLogoSource(LogoAsset::new(Vec::new()));
        assert!(fetch_logo(&source).await.is_none());
    }
}
