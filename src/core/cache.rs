// src/core/cache.rs

use crate::core::paths;
use log::debug;
use md5::{Digest, Md5};
use std::{
    fs, io,
    path::PathBuf,
    time::{Duration, SystemTime},
};

/// Hex md5 digest of `data`.
pub fn md5_hex(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

/// Persistent store of captured `eval` output, shared across runs and processes.
///
/// Entries live at `{dir}/{md5(cmdline)[..2]}/{md5(cmdline)[2..]}` and expire by modification
/// time. Concurrent writers of the same entry simply overwrite each other.
#[derive(Debug, Clone)]
pub struct EvalCache {
    dir: PathBuf,
}

impl EvalCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn entry_path(&self, command_line: &str) -> PathBuf {
        paths::hashed_entry_path(&self.dir, &md5_hex(command_line.as_bytes()))
    }

    /// Returns the cached bytes if an entry exists and is younger than `ttl`.
    pub fn read_fresh(&self, command_line: &str, ttl: Duration) -> Option<Vec<u8>> {
        let path = self.entry_path(command_line);
        let modified = fs::metadata(&path).and_then(|m| m.modified()).ok()?;
        // An mtime in the future counts as brand new.
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);

        if age >= ttl {
            debug!(
                "Eval cache entry '{}' expired ({}s old, ttl {}s)",
                path.display(),
                age.as_secs(),
                ttl.as_secs()
            );
            return None;
        }
        debug!("Eval cache hit: {}", path.display());
        fs::read(&path).ok()
    }

    /// Writes `data` as the entry for `command_line`, creating its directory first.
    pub fn store(&self, command_line: &str, data: &[u8]) -> io::Result<()> {
        let path = self.entry_path(command_line);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        debug!("Writing eval cache entry: {}", path.display());
        fs::write(path, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::path::Path;
    use tempfile::tempdir;

    #[test]
    fn test_md5_hex_known_value() {
        assert_eq!(md5_hex(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(md5_hex(b"hello world"), "5eb63bbbe01eeed093cb22bb8f5acdc3");
    }

    #[test]
    fn test_entry_path_layout() {
        let cache = EvalCache::new("/tmp/eval");
        assert_eq!(
            cache.entry_path("hello world"),
            Path::new("/tmp/eval/5e/b63bbbe01eeed093cb22bb8f5acdc3")
        );
    }

    #[test]
    fn test_store_then_read_fresh() {
        let dir = tempdir().unwrap();
        let cache = EvalCache::new(dir.path().join("eval"));

        assert!(cache.read_fresh("cmd", Duration::from_secs(60)).is_none());
        cache.store("cmd", b"Main: []").unwrap();
        assert_eq!(
            cache.read_fresh("cmd", Duration::from_secs(60)).unwrap(),
            b"Main: []"
        );
    }

    #[test]
    fn test_zero_ttl_never_hits() {
        let dir = tempdir().unwrap();
        let cache = EvalCache::new(dir.path());
        cache.store("cmd", b"x").unwrap();
        assert!(cache.read_fresh("cmd", Duration::ZERO).is_none());
    }

    #[test]
    fn test_old_entry_expires() {
        let dir = tempdir().unwrap();
        let cache = EvalCache::new(dir.path());
        cache.store("cmd", b"x").unwrap();

        let old = SystemTime::now() - Duration::from_secs(120);
        File::options()
            .write(true)
            .open(cache.entry_path("cmd"))
            .unwrap()
            .set_modified(old)
            .unwrap();

        assert!(cache.read_fresh("cmd", Duration::from_secs(60)).is_none());
        assert!(cache.read_fresh("cmd", Duration::from_secs(600)).is_some());
    }
}
