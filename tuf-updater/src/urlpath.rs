//! Maps `file://` URLs to local paths for the filesystem transport.
use std::path::PathBuf;
use url::Url;

/// Converts a file URL into a file path.
/// `url.to_file_path()` decodes percent encoding, which would turn an encoded role or target name
/// such as `a%2F..%2Fb` back into a traversal; `url.path()` roots paths at '/' on Windows.
pub trait SafeUrlPath {
    /// Returns the path component of a URL as a filesystem path.
    fn safe_url_filepath(&self) -> PathBuf;
}

#[cfg(windows)]
impl SafeUrlPath for Url {
    fn safe_url_filepath(&self) -> PathBuf {
        let url_path = self.path();
        PathBuf::from(url_path.strip_prefix('/').unwrap_or(url_path))
    }
}

#[cfg(unix)]
impl SafeUrlPath for Url {
    fn safe_url_filepath(&self) -> PathBuf {
        PathBuf::from(self.path())
    }
}
