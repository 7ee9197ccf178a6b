//! Endpoint discovery.
//!
//! The connection lifecycle starts by asking a [`Discovery`] for candidate
//! endpoints and trying each one in turn until a handshake succeeds.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::Result;
use crate::traits::LinkStream;

/// A place where a control surface may be listening.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    path: PathBuf,
}

impl Endpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Enumerates and opens candidate endpoints.
pub trait Discovery: Send + Sync {
    /// Candidate endpoints, in the order they should be tried.
    fn candidates(&self) -> Vec<Endpoint>;

    /// Open a link to one candidate.
    fn open(&self, endpoint: &Endpoint) -> Result<LinkStream>;
}

/// Discovers control surfaces exposed as Unix domain sockets.
///
/// Explicit paths are tried first, followed by every socket file in the scan
/// directory whose name starts with the configured prefix (sorted by name).
#[derive(Debug, Clone, Default)]
pub struct SocketDiscovery {
    paths: Vec<PathBuf>,
    scan_dir: Option<PathBuf>,
    prefix: String,
}

impl SocketDiscovery {
    /// Default file-name prefix used when scanning a directory.
    pub const DEFAULT_PREFIX: &'static str = "volsync";

    pub fn new() -> Self {
        Self {
            prefix: Self::DEFAULT_PREFIX.to_string(),
            ..Self::default()
        }
    }

    /// Add an explicit endpoint path.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.push(path.into());
        self
    }

    /// Scan `dir` for sockets named `<prefix>*`.
    pub fn with_scan_dir(mut self, dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        self.scan_dir = Some(dir.into());
        self.prefix = prefix.into();
        self
    }

    fn scan(&self, dir: &Path) -> Vec<PathBuf> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                debug!(?dir, error = %err, "scan directory unreadable");
                return Vec::new();
            }
        };

        let mut found: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(&self.prefix))
            .map(|entry| entry.path())
            .filter(|path| is_socket(path))
            .collect();
        found.sort();
        found
    }
}

impl Discovery for SocketDiscovery {
    fn candidates(&self) -> Vec<Endpoint> {
        let mut paths: Vec<PathBuf> = self
            .paths
            .iter()
            .filter(|path| is_socket(path))
            .cloned()
            .collect();

        if let Some(dir) = &self.scan_dir {
            for path in self.scan(dir) {
                if !paths.contains(&path) {
                    paths.push(path);
                }
            }
        }

        trace!(count = paths.len(), "enumerated endpoint candidates");
        paths.into_iter().map(Endpoint::new).collect()
    }

    fn open(&self, endpoint: &Endpoint) -> Result<LinkStream> {
        #[cfg(unix)]
        {
            crate::uds::UnixDomainSocket::connect(endpoint.path())
        }

        #[cfg(not(unix))]
        {
            Err(crate::error::TransportError::Connect {
                path: endpoint.path().to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::Unsupported,
                    "volsync links require Unix domain sockets",
                ),
            })
        }
    }
}

#[cfg(unix)]
fn is_socket(path: &Path) -> bool {
    crate::uds::UnixDomainSocket::is_socket(path)
}

#[cfg(not(unix))]
fn is_socket(_path: &Path) -> bool {
    false
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::uds::UnixDomainSocket;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "volsync-disc-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        dir
    }

    #[test]
    fn no_candidates_when_nothing_listens() {
        let dir = temp_dir("empty");
        let discovery = SocketDiscovery::new()
            .with_path(dir.join("missing.sock"))
            .with_scan_dir(&dir, "volsync");
        assert!(discovery.candidates().is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn scan_matches_prefix_and_skips_regular_files() {
        let dir = temp_dir("scan");
        let _a = UnixDomainSocket::bind(dir.join("volsync-b.sock")).unwrap();
        let _b = UnixDomainSocket::bind(dir.join("volsync-a.sock")).unwrap();
        let _other = UnixDomainSocket::bind(dir.join("other.sock")).unwrap();
        std::fs::write(dir.join("volsync-file"), b"not a socket").unwrap();

        let discovery = SocketDiscovery::new().with_scan_dir(&dir, "volsync");
        let names: Vec<String> = discovery
            .candidates()
            .iter()
            .map(|endpoint| {
                endpoint
                    .path()
                    .file_name()
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        assert_eq!(names, vec!["volsync-a.sock", "volsync-b.sock"]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn explicit_paths_come_first_without_duplicates() {
        let dir = temp_dir("explicit");
        let explicit = dir.join("volsync-z.sock");
        let _z = UnixDomainSocket::bind(&explicit).unwrap();
        let _a = UnixDomainSocket::bind(dir.join("volsync-a.sock")).unwrap();

        let discovery = SocketDiscovery::new()
            .with_path(&explicit)
            .with_scan_dir(&dir, "volsync");
        let candidates = discovery.candidates();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].path(), explicit.as_path());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn open_connects_to_candidate() {
        let dir = temp_dir("open");
        let path = dir.join("volsync.sock");
        let listener = UnixDomainSocket::bind(&path).unwrap();

        let discovery = SocketDiscovery::new().with_path(&path);
        let endpoint = discovery.candidates().remove(0);
        let accept = std::thread::spawn(move || listener.accept().map(|_| ()));
        discovery.open(&endpoint).unwrap();
        accept.join().unwrap().unwrap();

        let _ = std::fs::remove_dir_all(&dir);
    }
}
