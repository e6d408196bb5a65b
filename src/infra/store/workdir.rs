//! Content store backed by a plain directory tree.

use std::io::{self, ErrorKind};
use std::path::{Component, Path, PathBuf};
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{info, warn};

use crate::application::store::{ContentStore, StoreError, StoreVersion};
use crate::cache::{rw_read, rw_write};
use crate::domain::path::SECTION_DELIMITER;

const SOURCE: &str = "infra::store::workdir";

/// Serves a working directory as the content store.
///
/// Directories are sections and regular files are articles. Entries whose
/// name starts with `.` are invisible.
///
/// The version combines a fingerprint of every visible file's path, size and
/// modification time with a counter of writes made through this store. The
/// fingerprint is reused for `rescan_interval`, so edits made outside the
/// server show up within that window while our own writes show up at once.
#[derive(Debug)]
pub struct WorkdirStore {
    root: PathBuf,
    rescan_interval: Duration,
    scan: RwLock<Option<Scan>>,
    writes: AtomicU64,
}

#[derive(Debug)]
struct Scan {
    at: Instant,
    digest: String,
}

impl WorkdirStore {
    /// A store that walks the tree on every version lookup.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            rescan_interval: Duration::ZERO,
            scan: RwLock::new(None),
            writes: AtomicU64::new(0),
        }
    }

    pub fn with_rescan_interval(mut self, interval: Duration) -> Self {
        self.rescan_interval = interval;
        self
    }

    fn recent_digest(&self) -> Option<String> {
        if self.rescan_interval.is_zero() {
            return None;
        }
        rw_read(&self.scan, SOURCE, "version.read")
            .as_ref()
            .filter(|scan| scan.at.elapsed() < self.rescan_interval)
            .map(|scan| scan.digest.clone())
    }

    async fn rescan(&self) -> Result<String, StoreError> {
        let root = self.root.clone();
        let digest = tokio::task::spawn_blocking(move || fingerprint(&root))
            .await
            .map_err(StoreError::unavailable)??;
        *rw_write(&self.scan, SOURCE, "version.write") = Some(Scan {
            at: Instant::now(),
            digest: digest.clone(),
        });
        Ok(digest)
    }

    /// Map a store path onto the filesystem. `None` for paths that would
    /// escape the root or touch hidden entries.
    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let relative = Path::new(path.trim_matches(SECTION_DELIMITER));
        let mut resolved = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(name) => {
                    if name.to_str().is_none_or(is_hidden) {
                        return None;
                    }
                    resolved.push(name);
                }
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
            }
        }
        Some(resolved)
    }

    async fn entries(&self, path: &str, directories: bool) -> Result<Vec<String>, StoreError> {
        let Some(dir) = self.resolve(path) else {
            return Ok(Vec::new());
        };

        let mut reader = match fs::read_dir(&dir).await {
            Ok(reader) => reader,
            Err(err) if is_missing(&err) => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if is_hidden(&name) {
                continue;
            }
            let file_type = entry.file_type().await?;
            if directories && file_type.is_dir() {
                names.push(format!("{name}{SECTION_DELIMITER}"));
            } else if !directories && file_type.is_file() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}

#[async_trait]
impl ContentStore for WorkdirStore {
    async fn version(&self) -> Result<StoreVersion, StoreError> {
        let digest = match self.recent_digest() {
            Some(digest) => digest,
            None => self.rescan().await?,
        };
        let writes = self.writes.load(Ordering::SeqCst);
        Ok(StoreVersion::new(format!("{digest}.{writes}")))
    }

    async fn sections(&self, path: &str) -> Result<Vec<String>, StoreError> {
        self.entries(path, true).await
    }

    async fn articles(&self, path: &str) -> Result<Vec<String>, StoreError> {
        self.entries(path, false).await
    }

    async fn get_article(&self, path: &str) -> Result<Option<Bytes>, StoreError> {
        let Some(file) = self.resolve(path) else {
            return Ok(None);
        };
        match fs::metadata(&file).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Ok(None),
            Err(err) if is_missing(&err) => return Ok(None),
            Err(err) => return Err(err.into()),
        }
        Ok(Some(Bytes::from(fs::read(&file).await?)))
    }

    async fn set_article(
        &self,
        path: &str,
        data: Bytes,
        message: &str,
    ) -> Result<bool, StoreError> {
        let Some(file) = self.resolve(path) else {
            warn!(target: SOURCE, path, "refusing write outside the content root");
            return Ok(false);
        };
        match fs::metadata(&file).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Ok(false),
            Err(err) if is_missing(&err) => return Ok(false),
            Err(err) => return Err(err.into()),
        }

        fs::write(&file, &data).await?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        info!(
            target: SOURCE,
            path,
            bytes = data.len(),
            message = message.lines().next().unwrap_or_default(),
            "article written"
        );
        Ok(true)
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

fn is_missing(err: &io::Error) -> bool {
    matches!(err.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory)
}

fn fingerprint(root: &Path) -> Result<String, StoreError> {
    let mut files = Vec::new();
    collect_files(root, root, &mut files)?;
    files.sort();

    let mut hasher = Sha256::new();
    for (relative, len, modified) in files {
        hasher.update(relative.as_bytes());
        hasher.update([0u8]);
        hasher.update(len.to_le_bytes());
        hasher.update(modified.to_le_bytes());
    }
    let digest = hasher.finalize();
    Ok(hex::encode(&digest[..12]))
}

fn collect_files(
    root: &Path,
    dir: &Path,
    files: &mut Vec<(String, u64, u128)>,
) -> Result<(), StoreError> {
    let reader = match std::fs::read_dir(dir) {
        Ok(reader) => reader,
        Err(err) if is_missing(&err) => return Ok(()),
        Err(err) => return Err(err.into()),
    };

    for entry in reader {
        let entry = entry?;
        let name = entry.file_name();
        if name.to_str().is_none_or(is_hidden) {
            continue;
        }
        let path = entry.path();
        let meta = entry.metadata()?;
        if meta.is_dir() {
            collect_files(root, &path, files)?;
        } else if meta.is_file() {
            let relative = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .into_owned();
            let modified = meta
                .modified()
                .ok()
                .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
                .map(|elapsed| elapsed.as_nanos())
                .unwrap_or_default();
            files.push((relative, meta.len(), modified));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_rejects_escapes_and_hidden_entries() {
        let store = WorkdirStore::new("/srv/content");

        assert_eq!(
            store.resolve("blog/a"),
            Some(PathBuf::from("/srv/content/blog/a"))
        );
        assert_eq!(store.resolve("blog/"), Some(PathBuf::from("/srv/content/blog")));
        assert_eq!(store.resolve(""), Some(PathBuf::from("/srv/content")));
        assert!(store.resolve("../etc/passwd").is_none());
        assert!(store.resolve("blog/../../x").is_none());
        assert!(store.resolve(".git/config").is_none());
    }
}
