//! Small key/value blob storage kept on the student's machine.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, info};

use crate::error::{FinderError, FinderResult};

pub const AGENCY_SESSION_KEY: &str = "agency_authenticated";

pub trait Storage: Send + Sync {
    fn read(&self, key: &str) -> FinderResult<Option<String>>;
    fn write(&self, key: &str, value: &str) -> FinderResult<()>;
    fn remove(&self, key: &str) -> FinderResult<()>;
}

/// One file per key, named `<key>.json`, under a base directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> FinderResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(FinderError::Storage(format!("invalid storage key '{key}'")));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl Storage for FileStorage {
    fn read(&self, key: &str) -> FinderResult<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(FinderError::Storage(format!(
                "failed to read {}: {err}",
                path.display()
            ))),
        }
    }

    fn write(&self, key: &str, value: &str) -> FinderResult<()> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir).map_err(|err| {
            FinderError::Storage(format!("failed to create {}: {err}", self.dir.display()))
        })?;
        fs::write(&path, value).map_err(|err| {
            FinderError::Storage(format!("failed to write {}: {err}", path.display()))
        })?;
        debug!(key, bytes = value.len(), "stored blob");
        Ok(())
    }

    fn remove(&self, key: &str) -> FinderResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(FinderError::Storage(format!(
                "failed to remove {}: {err}",
                path.display()
            ))),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn read(&self, key: &str) -> FinderResult<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| FinderError::Storage("storage lock poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> FinderResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| FinderError::Storage("storage lock poisoned".to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> FinderResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| FinderError::Storage("storage lock poisoned".to_string()))?;
        entries.remove(key);
        Ok(())
    }
}

/// Gate in front of the agency review commands. It only keeps honest users on
/// the right screens; anyone with the storage directory can flip it.
pub struct AgencySession<'a, S: Storage + ?Sized> {
    storage: &'a S,
}

impl<'a, S: Storage + ?Sized> AgencySession<'a, S> {
    pub fn new(storage: &'a S) -> Self {
        Self { storage }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.storage.read(AGENCY_SESSION_KEY), Ok(Some(value)) if value.trim() == "true")
    }

    pub fn require(&self) -> FinderResult<()> {
        if self.is_authenticated() {
            Ok(())
        } else {
            Err(FinderError::PermissionDenied(
                "agency sign-in required (run `eduabroad agency login`)".to_string(),
            ))
        }
    }

    pub fn sign_in(&self, passcode: &str, expected: Option<&str>) -> FinderResult<()> {
        match expected {
            Some(expected) if !expected.is_empty() && passcode == expected => {
                self.storage.write(AGENCY_SESSION_KEY, "true")?;
                info!("agency session started");
                Ok(())
            }
            Some(_) => Err(FinderError::PermissionDenied("incorrect passcode".to_string())),
            None => Err(FinderError::PermissionDenied(
                "agency sign-in is not configured".to_string(),
            )),
        }
    }

    pub fn sign_out(&self) -> FinderResult<()> {
        self.storage.remove(AGENCY_SESSION_KEY)?;
        info!("agency session ended");
        Ok(())
    }
}
