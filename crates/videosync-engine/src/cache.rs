use std::{
    fs, io,
    path::{Component, Path, PathBuf},
};

use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::CacheIoError;

const DIGEST_PREFIX_LEN: usize = 12;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CacheEntry {
    pub source: PathBuf,
    pub digest: String,
    pub destination: PathBuf,
    pub hit: bool,
}

// Absolute path with `.` and `..` resolved lexically. Symlinks are not
// followed and the path need not exist.
pub fn normalize(path: &Path) -> io::Result<PathBuf> {
    let abs = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    let mut out = PathBuf::new();
    for c in abs.components() {
        match c {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    Ok(out)
}

pub fn path_digest(normalized: &Path) -> String {
    let mut h = Sha256::new();
    h.update(normalized.to_string_lossy().as_bytes());
    hex::encode(h.finalize())
}

#[derive(Debug, Clone)]
pub struct ContentCache {
    dir: PathBuf,
}

impl ContentCache {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn destination_for(&self, normalized: &Path) -> (String, PathBuf) {
        let digest = path_digest(normalized);
        let base = normalized
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input".to_string());
        let name = format!("{}_{base}", &digest[..DIGEST_PREFIX_LEN]);
        (digest, self.dir.join(name))
    }

    pub fn ensure_cached(&self, source: &Path) -> Result<CacheEntry, CacheIoError> {
        let err = |op: &'static str, path: &Path| {
            let path = path.to_path_buf();
            move |source: io::Error| CacheIoError { op, path, source }
        };
        let source = normalize(source).map_err(err("normalize", source))?;
        let cache_dir = normalize(&self.dir).map_err(err("normalize", &self.dir))?;

        if source.starts_with(&cache_dir) {
            return Ok(CacheEntry {
                digest: path_digest(&source),
                destination: source.clone(),
                source,
                hit: true,
            });
        }

        let (digest, destination) = self.destination_for(&source);
        if destination.exists() {
            return Ok(CacheEntry {
                source,
                digest,
                destination,
                hit: true,
            });
        }

        fs::create_dir_all(&self.dir).map_err(err("create_dir", &self.dir))?;
        let tmp = self.dir.join(format!(".{}.tmp", Uuid::new_v4()));
        if let Err(e) = fs::copy(&source, &tmp) {
            let _ = fs::remove_file(&tmp);
            return Err(err("copy", &source)(e));
        }
        if let Err(e) = fs::rename(&tmp, &destination) {
            let _ = fs::remove_file(&tmp);
            return Err(err("rename", &destination)(e));
        }
        Ok(CacheEntry {
            source,
            digest,
            destination,
            hit: false,
        })
    }
}
