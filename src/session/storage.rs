use std::sync::Mutex;

use crate::errors::ChatError;

/// Durable slot holding the serialized session list.
///
/// Mirrors a single key in a key-value store: the whole list is written and read as one
/// JSON document.
pub trait SessionStorage {
    fn load(&self) -> Result<Option<String>, ChatError>;
    fn save(&self, payload: &str) -> Result<(), ChatError>;
    fn clear(&self) -> Result<(), ChatError>;
}

/// In-process storage, used by tests and as a fallback when nothing durable is available.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slot: Mutex<Option<String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(payload: impl Into<String>) -> Self {
        Self { slot: Mutex::new(Some(payload.into())) }
    }

    pub fn contents(&self) -> Option<String> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }
}

impl SessionStorage for MemoryStorage {
    fn load(&self) -> Result<Option<String>, ChatError> {
        let slot = self.slot.lock().map_err(ChatError::storage)?;
        Ok(slot.clone())
    }

    fn save(&self, payload: &str) -> Result<(), ChatError> {
        let mut slot = self.slot.lock().map_err(ChatError::storage)?;
        *slot = Some(payload.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), ChatError> {
        let mut slot = self.slot.lock().map_err(ChatError::storage)?;
        *slot = None;
        Ok(())
    }
}

#[cfg(feature = "native")]
pub use file::FileStorage;

#[cfg(feature = "native")]
mod file {
    use std::io::ErrorKind;
    use std::path::{Path, PathBuf};

    use super::SessionStorage;
    use crate::errors::ChatError;

    /// JSON file on disk. Writes go to a sibling temp file first and are renamed into place.
    #[derive(Debug, Clone)]
    pub struct FileStorage {
        path: PathBuf,
    }

    impl FileStorage {
        pub fn new(path: impl Into<PathBuf>) -> Self {
            Self { path: path.into() }
        }

        pub fn path(&self) -> &Path {
            &self.path
        }
    }

    impl SessionStorage for FileStorage {
        fn load(&self) -> Result<Option<String>, ChatError> {
            match std::fs::read_to_string(&self.path) {
                Ok(raw) => Ok(Some(raw)),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
                Err(e) => Err(ChatError::storage(format!("{}: {e}", self.path.display()))),
            }
        }

        fn save(&self, payload: &str) -> Result<(), ChatError> {
            let tmp = self.path.with_extension("json.tmp");
            std::fs::write(&tmp, payload)
                .and_then(|_| std::fs::rename(&tmp, &self.path))
                .map_err(|e| ChatError::storage(format!("{}: {e}", self.path.display())))
        }

        fn clear(&self) -> Result<(), ChatError> {
            match std::fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(ChatError::storage(format!("{}: {e}", self.path.display()))),
            }
        }
    }

}
