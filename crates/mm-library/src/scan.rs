//! Library directory enumeration.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use mm_core::LibraryConfig;
use mm_vectordb::FileFingerprint;
use tokio::fs;

/// A candidate image file found in the library directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryFile {
    pub identifier: String,
    pub path: PathBuf,
    pub fingerprint: FileFingerprint,
}

/// List regular files directly under `config.path` whose extension is allowed,
/// sorted by file name. A missing directory is an empty library.
pub async fn scan_library(config: &LibraryConfig) -> std::io::Result<Vec<LibraryFile>> {
    scan_dir(&config.path, config).await
}

pub async fn scan_dir(dir: &Path, config: &LibraryConfig) -> std::io::Result<Vec<LibraryFile>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(e) => e,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::warn!(dir = %dir.display(), "image library directory does not exist");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !config.accepts(&path) {
            continue;
        }
        let Some(identifier) = entry.file_name().to_str().map(str::to_owned) else {
            tracing::warn!(path = %path.display(), "skipping non-utf8 file name");
            continue;
        };
        // Follows symlinks, so linked images are indexed like regular ones.
        let meta = match fs::metadata(&path).await {
            Ok(m) if m.is_file() => m,
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!(file = %identifier, error = %e, "cannot stat library file");
                continue;
            }
        };
        files.push(LibraryFile {
            identifier,
            fingerprint: FileFingerprint::from_metadata(&meta),
            path,
        });
    }
    files.sort_by(|a, b| a.identifier.cmp(&b.identifier));
    Ok(files)
}

/// Whether `name` is a bare file name that stays inside the library directory.
/// Dot-prefixed names are allowed so every scanned file can be served.
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && Path::new(name).file_name().and_then(|n| n.to_str()) == Some(name)
}
