use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info, warn};

use crate::archive;
use crate::domain::{ArchiveFormat, ResourceName};
use crate::error::DatasetError;
use crate::fetch::Fetcher;

pub const DEFAULT_CACHE_DIR: &str = ".cache";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub cache_root: Utf8PathBuf,
    pub cache_subdir: Utf8PathBuf,
    pub fallback_root: Utf8PathBuf,
}

impl CacheConfig {
    pub fn new(cache_root: impl Into<Utf8PathBuf>) -> Result<Self, DatasetError> {
        Ok(Self {
            cache_root: cache_root.into(),
            cache_subdir: Utf8PathBuf::new(),
            fallback_root: default_fallback_root()?,
        })
    }

    pub fn default_for_cwd() -> Result<Self, DatasetError> {
        let cwd =
            std::env::current_dir().map_err(|err| DatasetError::Filesystem(err.to_string()))?;
        let root = Utf8PathBuf::from_path_buf(cwd.join(DEFAULT_CACHE_DIR))
            .map_err(|_| DatasetError::Filesystem("invalid cache path".to_string()))?;
        Self::new(root)
    }

    pub fn with_subdir(mut self, subdir: impl Into<Utf8PathBuf>) -> Self {
        self.cache_subdir = subdir.into();
        self
    }

    pub fn with_fallback_root(mut self, fallback_root: impl Into<Utf8PathBuf>) -> Self {
        self.fallback_root = fallback_root.into();
        self
    }
}

fn default_fallback_root() -> Result<Utf8PathBuf, DatasetError> {
    Utf8PathBuf::from_path_buf(std::env::temp_dir().join(DEFAULT_CACHE_DIR))
        .map_err(|_| DatasetError::Filesystem("invalid temp dir".to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRequest {
    pub name: ResourceName,
    pub origin: String,
    pub extract: bool,
    pub archive_format: ArchiveFormat,
}

impl ResourceRequest {
    pub fn new(name: ResourceName, origin: impl Into<String>) -> Self {
        Self {
            name,
            origin: origin.into(),
            extract: false,
            archive_format: ArchiveFormat::Zip,
        }
    }

    pub fn extracted(mut self, archive_format: ArchiveFormat) -> Self {
        self.extract = true;
        self.archive_format = archive_format;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    dir: Utf8PathBuf,
    name: ResourceName,
    extract_format: Option<ArchiveFormat>,
}

impl CacheEntry {
    pub fn new(dir: &Utf8Path, request: &ResourceRequest) -> Self {
        Self {
            dir: dir.to_path_buf(),
            name: request.name.clone(),
            extract_format: request.extract.then_some(request.archive_format),
        }
    }

    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    pub fn archive_format(&self) -> Option<ArchiveFormat> {
        self.extract_format
    }

    pub fn download_path(&self) -> Utf8PathBuf {
        match self.extract_format {
            Some(format) => self
                .dir
                .join(format!("{}.{}", self.name, format.extension())),
            None => self.resolved_path(),
        }
    }

    pub fn resolved_path(&self) -> Utf8PathBuf {
        self.dir.join(self.name.as_str())
    }
}

/// Download-once cache for remote resources.
///
/// A resource counts as cached when its download file exists; nothing is
/// revalidated. The cache takes no locks, so two processes resolving the
/// same entry at once may both download it.
pub struct FileCache<F: Fetcher> {
    config: CacheConfig,
    fetcher: F,
}

impl<F: Fetcher> FileCache<F> {
    pub fn new(config: CacheConfig, fetcher: F) -> Self {
        Self { config, fetcher }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn cache_dir(&self) -> Result<Utf8PathBuf, DatasetError> {
        let root = select_root(&self.config, prepare_root)?;
        let dir = root.join(&self.config.cache_subdir);
        fs::create_dir_all(dir.as_std_path())
            .map_err(|err| DatasetError::Filesystem(format!("create {dir}: {err}")))?;
        Ok(dir)
    }

    pub fn entry(&self, request: &ResourceRequest) -> Result<CacheEntry, DatasetError> {
        Ok(CacheEntry::new(&self.cache_dir()?, request))
    }

    /// Extraction runs on every call, cached or not; it overwrites the same
    /// members each time.
    pub fn resolve(&self, request: &ResourceRequest) -> Result<Utf8PathBuf, DatasetError> {
        let entry = self.entry(request)?;
        let download_path = entry.download_path();

        if download_path.as_std_path().exists() {
            info!("file {} already exists in cache", request.name);
        } else {
            debug!(origin = %request.origin, path = %download_path, "downloading");
            self.download_atomic(&request.origin, &download_path)?;
        }

        if let Some(format) = entry.archive_format() {
            archive::extract_archive(
                download_path.as_std_path(),
                entry.dir().as_std_path(),
                Some(format),
            )?;
        }

        Ok(entry.resolved_path())
    }

    fn download_atomic(&self, origin: &str, destination: &Utf8Path) -> Result<(), DatasetError> {
        let parent = destination
            .parent()
            .ok_or_else(|| DatasetError::Filesystem("invalid destination path".to_string()))?;
        let temp = tempfile::Builder::new()
            .prefix(".download-")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| DatasetError::Filesystem(err.to_string()))?
            .into_temp_path();
        self.fetcher.download(origin, &temp)?;
        temp.persist(destination.as_std_path())
            .map_err(|err| DatasetError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

// The configured root when `prepare` accepts it, otherwise the fallback root
// for permission failures.
fn select_root(
    config: &CacheConfig,
    prepare: impl Fn(&Utf8Path) -> io::Result<()>,
) -> Result<Utf8PathBuf, DatasetError> {
    match prepare(&config.cache_root) {
        Ok(()) => Ok(config.cache_root.clone()),
        Err(err) if is_permission_error(&err) => {
            warn!(
                "do not have permission to write to {}, writing to {}",
                config.cache_root, config.fallback_root
            );
            prepare(&config.fallback_root).map_err(|err| DatasetError::CacheUnwritable {
                path: config.fallback_root.clone(),
                reason: err.to_string(),
            })?;
            Ok(config.fallback_root.clone())
        }
        Err(err) => Err(DatasetError::Filesystem(format!(
            "create {}: {err}",
            config.cache_root
        ))),
    }
}

fn prepare_root(root: &Utf8Path) -> io::Result<()> {
    fs::create_dir_all(root.as_std_path())?;
    // Existing but read-only roots only show up on write.
    tempfile::tempfile_in(root.as_std_path())?;
    Ok(())
}

fn is_permission_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::PermissionDenied | io::ErrorKind::ReadOnlyFilesystem
    )
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn request(name: &str) -> ResourceRequest {
        ResourceRequest::new(name.parse().unwrap(), "http://example.invalid/data")
    }

    #[test]
    fn extracted_entry_layout() {
        let dir = Utf8Path::new("/cache/graphs");
        let request = request("BlogCatalog-dataset").extracted(ArchiveFormat::Zip);
        let entry = CacheEntry::new(dir, &request);

        assert_eq!(
            entry.download_path(),
            Utf8PathBuf::from("/cache/graphs/BlogCatalog-dataset.zip")
        );
        assert_eq!(
            entry.resolved_path(),
            Utf8PathBuf::from("/cache/graphs/BlogCatalog-dataset")
        );
    }

    #[test]
    fn plain_entry_layout() {
        let dir = Utf8Path::new("/cache");
        let entry = CacheEntry::new(dir, &request("edges.csv"));

        assert_eq!(entry.archive_format(), None);
        assert_eq!(entry.download_path(), entry.resolved_path());
        assert_eq!(entry.resolved_path(), Utf8PathBuf::from("/cache/edges.csv"));
    }

    fn config() -> CacheConfig {
        CacheConfig::new("/cache")
            .unwrap()
            .with_fallback_root("/tmp/.cache")
    }

    fn denied() -> io::Error {
        io::Error::from(io::ErrorKind::PermissionDenied)
    }

    #[test]
    fn usable_root_is_kept() {
        let root = select_root(&config(), |_| Ok(())).unwrap();
        assert_eq!(root, Utf8PathBuf::from("/cache"));
    }

    #[test]
    fn permission_denied_falls_back() {
        let seen = std::cell::RefCell::new(Vec::new());
        let root = select_root(&config(), |path| {
            seen.borrow_mut().push(path.to_path_buf());
            if path == "/cache" {
                Err(denied())
            } else {
                Ok(())
            }
        })
        .unwrap();

        assert_eq!(root, Utf8PathBuf::from("/tmp/.cache"));
        assert_eq!(
            seen.into_inner(),
            vec![Utf8PathBuf::from("/cache"), Utf8PathBuf::from("/tmp/.cache")]
        );
    }

    #[test]
    fn read_only_filesystem_falls_back() {
        let root = select_root(&config(), |path| {
            if path == "/cache" {
                Err(io::Error::from(io::ErrorKind::ReadOnlyFilesystem))
            } else {
                Ok(())
            }
        })
        .unwrap();
        assert_eq!(root, Utf8PathBuf::from("/tmp/.cache"));
    }

    #[test]
    fn unusable_fallback_is_cache_unwritable() {
        let err = select_root(&config(), |_| Err(denied())).unwrap_err();
        assert_matches!(
            err,
            DatasetError::CacheUnwritable { ref path, .. } if path == "/tmp/.cache"
        );
    }

    #[test]
    fn other_errors_do_not_fall_back() {
        let err = select_root(&config(), |path| {
            assert_eq!(path, "/cache");
            Err(io::Error::from(io::ErrorKind::NotADirectory))
        })
        .unwrap_err();
        assert_matches!(err, DatasetError::Filesystem(_));
    }

    #[test]
    fn auto_format_uses_auto_extension() {
        let dir = Utf8Path::new("/cache");
        let entry = CacheEntry::new(dir, &request("data").extracted(ArchiveFormat::Auto));
        assert!(entry.download_path().ends_with("data.auto"));
    }
}
