//! Storage engines for journal files
//!
//! A journal lives in a flat namespace of small named files. The whole
//! concurrency story rests on [`Storage::put_if_not_exists`]: exactly one
//! of several racing writers creates a given name.

use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;
use zed_core::{Error, Result};

/// A flat namespace of immutable-once-visible files.
pub trait Storage: Send + Sync {
    /// Where the namespace lives, for error messages.
    fn location(&self) -> &Path;

    /// Read a whole file. A missing file is an I/O `NotFound` error.
    fn get(&self, name: &str) -> Result<Bytes>;

    /// Create or replace a file atomically.
    fn put(&self, name: &str, data: &[u8]) -> Result<()>;

    /// Create a file only if no file of that name exists. Returns false,
    /// writing nothing, if one does.
    fn put_if_not_exists(&self, name: &str, data: &[u8]) -> Result<bool>;

    /// Remove a file. Removing a missing file is not an error.
    fn delete(&self, name: &str) -> Result<()>;

    /// Whether a file exists.
    fn exists(&self, name: &str) -> Result<bool>;

    /// Size of a file in bytes.
    fn size(&self, name: &str) -> Result<u64>;

    /// Names of every file, in no particular order.
    fn list(&self) -> Result<Vec<String>>;
}

/// Files in one directory.
///
/// `put` goes through write-fsync-rename; `put_if_not_exists` writes a
/// private temporary file and hard-links it into place, so a visible file
/// is always complete.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

const TEMP_PREFIX: &str = ".tmp-";

impl FileStorage {
    /// Use `dir`, creating it if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(FileStorage { dir })
    }

    fn path(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(Error::BadValue(format!("invalid storage name {name:?}")));
        }
        Ok(self.dir.join(name))
    }

    /// Write `data` to a fresh temporary file and sync it.
    fn write_temp(&self, data: &[u8]) -> Result<PathBuf> {
        let temp = self.dir.join(format!("{TEMP_PREFIX}{}", Uuid::new_v4()));
        let mut file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp)?;
        let written = file.write_all(data).and_then(|_| file.sync_all());
        if let Err(e) = written {
            drop(file);
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }
        Ok(temp)
    }

    fn sync_dir(&self) -> Result<()> {
        #[cfg(unix)]
        File::open(&self.dir)?.sync_all()?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn location(&self) -> &Path {
        &self.dir
    }

    fn get(&self, name: &str) -> Result<Bytes> {
        Ok(Bytes::from(fs::read(self.path(name)?)?))
    }

    fn put(&self, name: &str, data: &[u8]) -> Result<()> {
        let path = self.path(name)?;
        let temp = self.write_temp(data)?;
        if let Err(e) = fs::rename(&temp, &path) {
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }
        self.sync_dir()
    }

    fn put_if_not_exists(&self, name: &str, data: &[u8]) -> Result<bool> {
        let path = self.path(name)?;
        let temp = self.write_temp(data)?;
        let linked = fs::hard_link(&temp, &path);
        if let Err(e) = fs::remove_file(&temp) {
            warn!(target: "zed::journal", path = %temp.display(), error = %e, "failed to remove temporary file");
        }
        match linked {
            Ok(()) => {
                self.sync_dir()?;
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, name: &str) -> Result<()> {
        match fs::remove_file(self.path(name)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.path(name)?.try_exists()?)
    }

    fn size(&self, name: &str) -> Result<u64> {
        Ok(fs::metadata(self.path(name)?)?.len())
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with(TEMP_PREFIX) {
                    names.push(name.to_string());
                }
            }
        }
        Ok(names)
    }
}

/// An in-memory namespace, for tests and ephemeral catalogs.
#[derive(Debug)]
pub struct MemStorage {
    location: PathBuf,
    files: DashMap<String, Bytes>,
}

impl MemStorage {
    /// Create an empty namespace.
    pub fn new() -> Self {
        MemStorage {
            location: PathBuf::from("memory"),
            files: DashMap::new(),
        }
    }
}

impl Default for MemStorage {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(name: &str) -> Error {
    io::Error::new(io::ErrorKind::NotFound, format!("{name} not found")).into()
}

impl Storage for MemStorage {
    fn location(&self) -> &Path {
        &self.location
    }

    fn get(&self, name: &str) -> Result<Bytes> {
        self.files
            .get(name)
            .map(|b| b.value().clone())
            .ok_or_else(|| not_found(name))
    }

    fn put(&self, name: &str, data: &[u8]) -> Result<()> {
        self.files
            .insert(name.to_string(), Bytes::copy_from_slice(data));
        Ok(())
    }

    fn put_if_not_exists(&self, name: &str, data: &[u8]) -> Result<bool> {
        match self.files.entry(name.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(v) => {
                v.insert(Bytes::copy_from_slice(data));
                Ok(true)
            }
        }
    }

    fn delete(&self, name: &str) -> Result<()> {
        self.files.remove(name);
        Ok(())
    }

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.files.contains_key(name))
    }

    fn size(&self, name: &str) -> Result<u64> {
        self.files
            .get(name)
            .map(|b| b.len() as u64)
            .ok_or_else(|| not_found(name))
    }

    fn list(&self) -> Result<Vec<String>> {
        Ok(self.files.iter().map(|e| e.key().clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn exercise(s: &dyn Storage) {
        assert!(!s.exists("a").unwrap());
        assert!(s.get("a").unwrap_err().is_not_found());

        s.put("a", b"one").unwrap();
        assert_eq!(&s.get("a").unwrap()[..], b"one");
        s.put("a", b"two!").unwrap();
        assert_eq!(&s.get("a").unwrap()[..], b"two!");
        assert_eq!(s.size("a").unwrap(), 4);

        assert!(s.put_if_not_exists("b", b"first").unwrap());
        assert!(!s.put_if_not_exists("b", b"second").unwrap());
        assert_eq!(&s.get("b").unwrap()[..], b"first");

        let mut names = s.list().unwrap();
        names.sort();
        assert_eq!(names, ["a", "b"]);

        s.delete("a").unwrap();
        s.delete("a").unwrap();
        assert!(!s.exists("a").unwrap());
    }

    #[test]
    fn test_file_storage() {
        let dir = tempfile::tempdir().unwrap();
        let s = FileStorage::open(dir.path().join("j")).unwrap();
        exercise(&s);
    }

    #[test]
    fn test_mem_storage() {
        exercise(&MemStorage::new());
    }

    #[test]
    fn test_file_storage_rejects_paths() {
        let dir = tempfile::tempdir().unwrap();
        let s = FileStorage::open(dir.path()).unwrap();
        assert!(matches!(s.put("../x", b""), Err(Error::BadValue(_))));
        assert!(matches!(s.get(""), Err(Error::BadValue(_))));
    }

    #[test]
    fn test_exclusive_create_race() {
        let dir = tempfile::tempdir().unwrap();
        let s = Arc::new(FileStorage::open(dir.path()).unwrap());
        let winners: usize = (0..16)
            .map(|i| {
                let s = s.clone();
                std::thread::spawn(move || s.put_if_not_exists("x", format!("{i}").as_bytes()).unwrap())
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| h.join().unwrap() as usize)
            .sum();
        assert_eq!(winners, 1);
        assert_eq!(s.list().unwrap(), ["x"]);
    }
}
