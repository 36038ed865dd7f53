use crate::domain::models::ProgressDocument;
use crate::infrastructure::error::InfraError;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;

pub trait DocumentStorage: Send + Sync {
    /// `Ok(None)` when nothing has been written yet.
    fn read_document(&self) -> Result<Option<ProgressDocument>, InfraError>;
    fn write_document(&self, document: &ProgressDocument) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl DocumentStorage for JsonFileStorage {
    fn read_document(&self) -> Result<Option<ProgressDocument>, InfraError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };
        let document = serde_json::from_str::<ProgressDocument>(&raw)?;
        Ok(Some(document))
    }

    fn write_document(&self, document: &ProgressDocument) -> Result<(), InfraError> {
        let directory = self.path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(directory)?;

        let formatted = serde_json::to_string_pretty(document)?;
        let mut temp = NamedTempFile::new_in(directory)?;
        temp.write_all(formatted.as_bytes())?;
        temp.write_all(b"\n")?;
        temp.flush()?;
        temp.persist(&self.path).map_err(|error| error.error)?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStorage {
    document: Mutex<Option<ProgressDocument>>,
    fail_writes: Mutex<bool>,
}

impl InMemoryStorage {
    pub fn with_document(document: ProgressDocument) -> Self {
        Self {
            document: Mutex::new(Some(document)),
            fail_writes: Mutex::new(false),
        }
    }

    /// Makes every following write fail, to exercise the soft-fail paths.
    pub fn set_fail_writes(&self, fail: bool) {
        if let Ok(mut guard) = self.fail_writes.lock() {
            *guard = fail;
        }
    }

    pub fn stored(&self) -> Option<ProgressDocument> {
        self.document.lock().ok().and_then(|guard| guard.clone())
    }
}

impl DocumentStorage for InMemoryStorage {
    fn read_document(&self) -> Result<Option<ProgressDocument>, InfraError> {
        let guard = self
            .document
            .lock()
            .map_err(|error| InfraError::LockPoisoned(format!("in-memory storage: {error}")))?;
        Ok(guard.clone())
    }

    fn write_document(&self, document: &ProgressDocument) -> Result<(), InfraError> {
        let failing = self.fail_writes.lock().map(|guard| *guard).unwrap_or(false);
        if failing {
            let error = std::io::Error::other("simulated write failure");
            return Err(InfraError::Io(error));
        }
        let mut guard = self
            .document
            .lock()
            .map_err(|error| InfraError::LockPoisoned(format!("in-memory storage: {error}")))?;
        *guard = Some(document.clone());
        Ok(())
    }
}
