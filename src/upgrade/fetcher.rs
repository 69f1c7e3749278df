//! Download target resolution and streaming artifact download.

use futures::StreamExt;
use reqwest::header::LOCATION;
use reqwest::{Client, redirect};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::{SourcesConfig, UpdateLayout};
use crate::constants::{DOWNLOAD_GZ_FILE, DOWNLOAD_ZIP_FILE};
use crate::core::UpdateError;
use crate::upgrade::models::{ArchiveKind, Channel, ReleaseMetadata};

/// Build the HTTP client for short requests: release metadata and branch
/// versions.
///
/// `request_timeout_secs` bounds each whole request. Archive downloads use
/// their own client built by [`ArtifactFetcher::new`].
///
/// # Errors
///
/// Returns [`UpdateError::Network`] if the TLS backend cannot be initialized.
pub fn build_http_client(sources: &SourcesConfig) -> Result<Client, UpdateError> {
    build(client_builder(sources))
}

fn client_builder(sources: &SourcesConfig) -> reqwest::ClientBuilder {
    Client::builder()
        .user_agent(sources.user_agent.clone())
        .timeout(Duration::from_secs(sources.request_timeout_secs))
}

/// Archives can take far longer than `request_timeout_secs` to arrive, so the
/// download client only bounds connecting and each read, never the total.
fn download_client_builder(sources: &SourcesConfig) -> reqwest::ClientBuilder {
    let timeout = Duration::from_secs(sources.request_timeout_secs);
    Client::builder()
        .user_agent(sources.user_agent.clone())
        .connect_timeout(timeout)
        .read_timeout(timeout)
}

fn build(builder: reqwest::ClientBuilder) -> Result<Client, UpdateError> {
    builder.build().map_err(|e| UpdateError::Network {
        operation: "client setup".to_string(),
        reason: e.to_string(),
    })
}

/// Resolves where an update archive lives and downloads it into staging.
#[derive(Debug, Clone)]
pub struct ArtifactFetcher {
    client: Client,
    no_redirect: Client,
    sources: SourcesConfig,
    staging_dir: PathBuf,
}

impl ArtifactFetcher {
    /// Create a fetcher downloading into the staging area of `layout`.
    ///
    /// The redirect probe is bounded by `request_timeout_secs` as a whole.
    /// Downloads are bounded per connect and per read only.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Network`] if an HTTP client cannot be built.
    pub fn new(sources: SourcesConfig, layout: &UpdateLayout) -> Result<Self, UpdateError> {
        let client = build(download_client_builder(&sources))?;
        let no_redirect = build(client_builder(&sources).redirect(redirect::Policy::none()))?;

        Ok(Self {
            client,
            no_redirect,
            sources,
            staging_dir: layout.staging_dir.clone(),
        })
    }

    /// Staging file path for an archive of `kind`.
    #[must_use]
    pub fn archive_path(&self, kind: ArchiveKind) -> PathBuf {
        let name = match kind {
            ArchiveKind::TarGz => DOWNLOAD_GZ_FILE,
            ArchiveKind::Zip => DOWNLOAD_ZIP_FILE,
        };
        self.staging_dir.join(name)
    }

    /// Resolve the URL and archive kind to download for `channel`.
    ///
    /// Release channel: the metadata `tarball_url` is requested once without
    /// following redirects and the `Location` header is the download URL.
    /// Branch channels use their configured archive URL.
    ///
    /// Returns `None` when no URL can be determined.
    pub async fn resolve_download_target(
        &self,
        channel: Channel,
        release: Option<&ReleaseMetadata>,
    ) -> Option<(String, ArchiveKind)> {
        let url = match channel {
            Channel::Release => {
                let tarball_url = release?.tarball_url.as_deref()?;
                self.follow_single_redirect(tarball_url).await?
            }
            Channel::Main => self.sources.main_archive_url.clone(),
            Channel::Dev => self.sources.dev_archive_url.clone(),
        };
        Some((url, channel.archive_kind()))
    }

    async fn follow_single_redirect(&self, url: &str) -> Option<String> {
        debug!("Resolving release tarball via {}", url);
        let response = match self.no_redirect.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Failed to resolve release tarball: {}", e);
                return None;
            }
        };

        let Some(location) = response.headers().get(LOCATION) else {
            warn!("Tarball endpoint returned HTTP {} without a Location header", response.status());
            return None;
        };

        match location.to_str() {
            Ok(location) => {
                // Relative redirects resolve against the request URL.
                let resolved = response
                    .url()
                    .join(location)
                    .map_or_else(|_| location.to_string(), |u| u.to_string());
                debug!("Release tarball redirects to {}", resolved);
                Some(resolved)
            }
            Err(e) => {
                warn!("Location header is not valid text: {}", e);
                None
            }
        }
    }

    /// Stream `url` into `destination`, creating parent directories.
    ///
    /// Returns the number of bytes written. On failure the partial file is
    /// removed and [`UpdateError::DownloadFailed`] is returned.
    ///
    /// # Errors
    ///
    /// Transport errors, non-success statuses and write errors all map to
    /// [`UpdateError::DownloadFailed`].
    pub async fn download(&self, url: &str, destination: &Path) -> Result<u64, UpdateError> {
        info!("Downloading {} to {}", url, destination.display());
        let result = self.download_inner(url, destination).await;
        if result.is_err()
            && let Err(e) = tokio::fs::remove_file(destination).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!("Failed to remove partial download {}: {}", destination.display(), e);
        }
        result
    }

    async fn download_inner(&self, url: &str, destination: &Path) -> Result<u64, UpdateError> {
        let failed = |reason: String| UpdateError::DownloadFailed {
            url: url.to_string(),
            reason,
        };

        let response = self.client.get(url).send().await.map_err(|e| failed(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("HTTP {status}")));
        }

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| failed(e.to_string()))?;
        }
        let mut file =
            tokio::fs::File::create(destination).await.map_err(|e| failed(e.to_string()))?;

        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| failed(e.to_string()))?;
            file.write_all(&chunk).await.map_err(|e| failed(e.to_string()))?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| failed(e.to_string()))?;

        info!("Downloaded {} bytes", written);
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GlobalConfig;
    use tempfile::TempDir;

    fn fetcher(temp: &TempDir, sources: SourcesConfig) -> ArtifactFetcher {
        let layout = UpdateLayout::resolve_in(&GlobalConfig::default(), temp.path());
        ArtifactFetcher::new(sources, &layout).unwrap()
    }

    /// Serve `body` one byte every `gap` after a complete response head.
    async fn trickle_server(body: &'static [u8], gap: Duration) -> String {
        use tokio::io::AsyncReadExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.set_nodelay(true).unwrap();
            let mut request = [0u8; 2048];
            let _ = socket.read(&mut request).await;

            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            for byte in body {
                tokio::time::sleep(gap).await;
                if socket.write_all(&[*byte]).await.is_err() {
                    return;
                }
            }
        });
        format!("http://{addr}/archive.zip")
    }

    #[tokio::test]
    async fn test_slow_download_outlasts_request_timeout() {
        let temp = TempDir::new().unwrap();
        let sources = SourcesConfig {
            request_timeout_secs: 1,
            ..SourcesConfig::default()
        };
        let fetcher = fetcher(&temp, sources);
        let url = trickle_server(b"slowbyte", Duration::from_millis(300)).await;
        let dest = temp.path().join("staging").join("archive.zip");

        // 8 bytes at 300ms each: well past the 1s budget in total, never idle for 1s.
        let written = fetcher.download(&url, &dest).await.unwrap();
        assert_eq!(written, 8);
        assert_eq!(std::fs::read(&dest).unwrap(), b"slowbyte");
    }

    #[tokio::test]
    async fn test_stalled_download_times_out() {
        let temp = TempDir::new().unwrap();
        let sources = SourcesConfig {
            request_timeout_secs: 1,
            ..SourcesConfig::default()
        };
        let fetcher = fetcher(&temp, sources);
        let url = trickle_server(b"xy", Duration::from_secs(3)).await;
        let dest = temp.path().join("staging").join("archive.zip");

        let err = fetcher.download(&url, &dest).await.unwrap_err();
        assert!(matches!(err, UpdateError::DownloadFailed { .. }), "got {err:?}");
        assert!(!dest.exists());
    }

    #[test]
    fn test_archive_path() {
        let temp = TempDir::new().unwrap();
        let fetcher = fetcher(&temp, SourcesConfig::default());
        assert!(fetcher.archive_path(ArchiveKind::TarGz).ends_with("download_latest_file.tar.gz"));
        assert!(fetcher.archive_path(ArchiveKind::Zip).ends_with("download_latest_file.zip"));
    }

    #[tokio::test]
    async fn test_branch_channels_use_configured_urls() {
        let temp = TempDir::new().unwrap();
        let sources = SourcesConfig {
            main_archive_url: "http://host/main.zip".to_string(),
            dev_archive_url: "http://host/dev.zip".to_string(),
            ..SourcesConfig::default()
        };
        let fetcher = fetcher(&temp, sources);

        assert_eq!(
            fetcher.resolve_download_target(Channel::Main, None).await,
            Some(("http://host/main.zip".to_string(), ArchiveKind::Zip))
        );
        assert_eq!(
            fetcher.resolve_download_target(Channel::Dev, None).await,
            Some(("http://host/dev.zip".to_string(), ArchiveKind::Zip))
        );
    }

    #[tokio::test]
    async fn test_release_without_metadata_or_tarball() {
        let temp = TempDir::new().unwrap();
        let fetcher = fetcher(&temp, SourcesConfig::default());
        assert_eq!(fetcher.resolve_download_target(Channel::Release, None).await, None);

        let meta = ReleaseMetadata {
            name: "v1.0.0".to_string(),
            created_at: None,
            body: None,
            tarball_url: None,
        };
        assert_eq!(fetcher.resolve_download_target(Channel::Release, Some(&meta)).await, None);
    }
}
