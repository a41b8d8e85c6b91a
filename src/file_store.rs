use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};

use log::{info, warn};
use tokio::fs::{self, File};
use tokio::io::AsyncSeekExt;

/// Raw video bytes on local disk, addressed by a generated storage key.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

/// What a `Range` header resolves to against a file of known size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    Full,
    Partial { start: u64, end: u64 },
    Unsatisfiable,
}

impl ByteRange {
    pub fn len(&self, size: u64) -> u64 {
        match *self {
            ByteRange::Full => size,
            ByteRange::Partial { start, end } => end - start + 1,
            ByteRange::Unsatisfiable => 0,
        }
    }
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_root(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root).await?;
        info!("Storing uploads under {}", self.root.display());
        Ok(())
    }

    /// `<random hex>_<sanitized name>`, so two uploads of `clip.mp4` never collide.
    pub fn storage_key(original_filename: &str) -> String {
        format!(
            "{}_{}",
            uuid::Uuid::new_v4().simple(),
            sanitize_filename(original_filename)
        )
    }

    /// Keys are single path components; anything else is reduced to its file name.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let name = Path::new(key)
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        self.root.join(name)
    }

    pub async fn create(&self, key: &str) -> io::Result<File> {
        File::create(self.path_for(key)).await
    }

    /// Opens the file with its size. `None` if the key has no backing file.
    pub async fn open(&self, key: &str) -> io::Result<Option<(File, u64)>> {
        match File::open(self.path_for(key)).await {
            Ok(file) => {
                let size = file.metadata().await?.len();
                Ok(Some((file, size)))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn seek_to(file: &mut File, range: ByteRange) -> io::Result<()> {
        if let ByteRange::Partial { start, .. } = range {
            file.seek(SeekFrom::Start(start)).await?;
        }
        Ok(())
    }

    /// Removing a file that is already gone is not an error.
    pub async fn remove(&self, key: &str) -> io::Result<()> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("Stored file {} was already missing", key);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn exists(&self, key: &str) -> bool {
        fs::metadata(self.path_for(key)).await.is_ok()
    }
}

pub fn sanitize_filename(original: &str) -> String {
    let name = original
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Resolves a single `bytes=` range. Malformed or multi-range headers fall back to the full body.
pub fn parse_range(header: Option<&str>, size: u64) -> ByteRange {
    let value = match header {
        Some(value) => value.trim(),
        None => return ByteRange::Full,
    };
    let ranges = match value.strip_prefix("bytes=") {
        Some(ranges) if !ranges.contains(',') => ranges.trim(),
        _ => return ByteRange::Full,
    };
    let (start_str, end_str) = match ranges.split_once('-') {
        Some(parts) => parts,
        None => return ByteRange::Full,
    };

    if start_str.is_empty() {
        // Suffix range: the last N bytes.
        let suffix_len: u64 = match end_str.parse() {
            Ok(n) => n,
            Err(_) => return ByteRange::Full,
        };
        if suffix_len == 0 || size == 0 {
            return ByteRange::Unsatisfiable;
        }
        let start = size.saturating_sub(suffix_len);
        return ByteRange::Partial { start, end: size - 1 };
    }

    let start: u64 = match start_str.parse() {
        Ok(n) => n,
        Err(_) => return ByteRange::Full,
    };
    if start >= size {
        return ByteRange::Unsatisfiable;
    }
    let end = if end_str.is_empty() {
        size - 1
    } else {
        match end_str.parse::<u64>() {
            Ok(end) if end >= start => end.min(size - 1),
            _ => return ByteRange::Full,
        }
    };
    ByteRange::Partial { start, end }
}
