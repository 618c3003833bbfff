//! Source snapshots of a single commit.
//!
//! A [`WorkingCopy`] owns a temporary directory holding the source tree of
//! one commit. The directory is deleted by [`WorkingCopy::remove`], or on
//! drop if removal was never requested, so every exit path frees the disk.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use flate2::read::GzDecoder;
use tempfile::TempDir;
use thiserror::Error;
use tracing::debug;

use crate::config::GitHubConfig;
use crate::constants::USER_AGENT;

/// Errors fetching or unpacking a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("source archive unavailable at {url}: HTTP {status}")]
    Unavailable { url: String, status: u16 },

    #[error("failed to download {url}: {message}")]
    Download { url: String, message: String },

    #[error("failed to extract archive: {0}")]
    Extract(String),

    #[error("working directory error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A commit's source tree in a temporary directory.
#[derive(Debug)]
pub struct WorkingCopy {
    dir: TempDir,
    root: PathBuf,
}

impl WorkingCopy {
    /// Wrap `dir`, using it directly as the source root.
    pub fn new(dir: TempDir) -> Self {
        let root = dir.path().to_path_buf();
        Self { dir, root }
    }

    /// Wrap `dir` with the source root at a nested path inside it.
    pub fn with_root(dir: TempDir, root: PathBuf) -> Self {
        Self { dir, root }
    }

    /// Directory containing the commit's top-level files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Delete the working directory, reporting failures.
    pub fn remove(self) -> Result<(), SnapshotError> {
        let path = self.dir.path().to_path_buf();
        self.dir
            .close()
            .map_err(|source| SnapshotError::Io { path, source })
    }
}

/// Fetches the source tree of a commit.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch(&self, repo: &str, commit_sha: &str) -> Result<WorkingCopy, SnapshotError>;
}

/// Downloads `{web_url}/{owner}/{repo}/archive/{sha}.tar.gz` and unpacks it
/// under the work directory.
pub struct ArchiveSnapshotSource {
    http: reqwest::Client,
    web_url: String,
    owner: String,
    work_dir: PathBuf,
}

impl ArchiveSnapshotSource {
    pub fn new(config: &GitHubConfig, owner: &str, work_dir: impl Into<PathBuf>) -> Result<Self, SnapshotError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SnapshotError::Download {
                url: config.web_url.clone(),
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            http,
            web_url: config.web_url.trim_end_matches('/').to_string(),
            owner: owner.to_string(),
            work_dir: work_dir.into(),
        })
    }

    pub fn archive_url(&self, repo: &str, commit_sha: &str) -> String {
        format!("{}/{}/{repo}/archive/{commit_sha}.tar.gz", self.web_url, self.owner)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, SnapshotError> {
        let download_err = |e: reqwest::Error| SnapshotError::Download {
            url: url.to_string(),
            message: e.to_string(),
        };
        let resp = self.http.get(url).send().await.map_err(download_err)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SnapshotError::Unavailable {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        resp.bytes().await.map(|b| b.to_vec()).map_err(download_err)
    }
}

#[async_trait]
impl SnapshotSource for ArchiveSnapshotSource {
    async fn fetch(&self, repo: &str, commit_sha: &str) -> Result<WorkingCopy, SnapshotError> {
        let url = self.archive_url(repo, commit_sha);
        debug!(%url, "downloading source archive");
        let bytes = self.download(&url).await?;

        std::fs::create_dir_all(&self.work_dir).map_err(|source| SnapshotError::Io {
            path: self.work_dir.clone(),
            source,
        })?;
        let prefix = format!("{repo}-{commit_sha}-");
        let dir = tempfile::Builder::new()
            .prefix(&prefix)
            .tempdir_in(&self.work_dir)
            .map_err(|source| SnapshotError::Io {
                path: self.work_dir.clone(),
                source,
            })?;

        tokio::task::spawn_blocking(move || {
            let root = unpack(&bytes, dir.path())?;
            Ok(WorkingCopy::with_root(dir, root))
        })
        .await
        .map_err(|e| SnapshotError::Extract(format!("extraction task failed: {e}")))?
    }
}

/// Unpack a gzipped tarball into `dest` and return the source root.
///
/// Hosting services wrap the tree in a single `{repo}-{sha}/` directory;
/// when that is the only entry it becomes the root.
pub fn unpack(archive_bytes: &[u8], dest: &Path) -> Result<PathBuf, SnapshotError> {
    let decoder = GzDecoder::new(Cursor::new(archive_bytes));
    let mut archive = tar::Archive::new(decoder);
    archive
        .unpack(dest)
        .map_err(|e| SnapshotError::Extract(e.to_string()))?;

    let io_err = |source| SnapshotError::Io {
        path: dest.to_path_buf(),
        source,
    };
    let entries = std::fs::read_dir(dest)
        .map_err(io_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_err)?;

    match entries.as_slice() {
        [only] if only.path().is_dir() => Ok(only.path()),
        _ => Ok(dest.to_path_buf()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tarball(files: &[(&str, &str)]) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::fast());
        let mut builder = tar::Builder::new(encoder);
        for (name, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, content.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    fn source_for(server: &MockServer, work_dir: &Path) -> ArchiveSnapshotSource {
        let config = GitHubConfig {
            web_url: server.uri(),
            ..GitHubConfig::default()
        };
        ArchiveSnapshotSource::new(&config, "apache", work_dir).unwrap()
    }

    #[test]
    fn unpack_uses_single_top_level_directory() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = tarball(&[("lang-abc/pom.xml", "<project/>"), ("lang-abc/src/A.java", "class A {}")]);
        let root = unpack(&bytes, dir.path()).unwrap();
        assert_eq!(root, dir.path().join("lang-abc"));
        assert!(root.join("pom.xml").is_file());
    }

    #[test]
    fn unpack_flat_archive_uses_destination() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = tarball(&[("pom.xml", ""), ("README", "")]);
        assert_eq!(unpack(&bytes, dir.path()).unwrap(), dir.path());
    }

    #[test]
    fn unpack_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            unpack(b"definitely not gzip", dir.path()),
            Err(SnapshotError::Extract(_))
        ));
    }

    #[test]
    fn remove_deletes_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_path_buf();
        WorkingCopy::new(dir).remove().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn drop_deletes_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_path_buf();
        drop(WorkingCopy::new(dir));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn fetch_downloads_and_unpacks_under_work_dir() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/apache/lang/archive/abc123.tar.gz"))
            .respond_with(
                ResponseTemplate::new(200).set_body_bytes(tarball(&[("lang-abc123/pom.xml", "<project/>")])),
            )
            .mount(&server)
            .await;

        let work = tempfile::tempdir().unwrap();
        let source = source_for(&server, work.path());
        let copy = source.fetch("lang", "abc123").await.unwrap();

        assert!(copy.root().join("pom.xml").is_file());
        assert!(copy.root().starts_with(work.path()));
        let parent = copy.root().parent().unwrap().to_path_buf();
        copy.remove().unwrap();
        assert!(!parent.exists());
    }

    #[tokio::test]
    async fn missing_archive_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let work = tempfile::tempdir().unwrap();
        let err = source_for(&server, work.path()).fetch("lang", "nope").await.unwrap_err();
        assert!(matches!(err, SnapshotError::Unavailable { status: 404, .. }));
    }
}
