//! Directory-backed snapshot storage.

use std::io;
use std::path::{Path, PathBuf};

use crate::GameStorage;

/// Stores each save as `<dir>/<name>.json`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Use `dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, save_name: &str) -> io::Result<PathBuf> {
        let valid = !save_name.is_empty()
            && save_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !save_name.starts_with('.');
        if !valid {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid save name {save_name:?}"),
            ));
        }
        Ok(self.dir.join(format!("{save_name}.json")))
    }
}

impl GameStorage for FileStorage {
    type Error = io::Error;

    fn save_game(&self, save_name: &str, snapshot: &str) -> Result<(), Self::Error> {
        std::fs::write(self.path_for(save_name)?, snapshot)
    }

    fn load_game(&self, save_name: &str) -> Result<Option<String>, Self::Error> {
        match std::fs::read_to_string(self.path_for(save_name)?) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn delete_save(&self, save_name: &str) -> Result<(), Self::Error> {
        match std::fs::remove_file(self.path_for(save_name)?) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("crawler-storage-{name}-{}", std::process::id()))
    }

    #[test]
    fn saves_round_trip_through_the_filesystem() {
        let dir = scratch("roundtrip");
        let storage = FileStorage::new(&dir).unwrap();
        assert!(storage.load_game("slot-1").unwrap().is_none());
        storage.save_game("slot-1", "{\"a\":1}").unwrap();
        assert_eq!(storage.load_game("slot-1").unwrap().as_deref(), Some("{\"a\":1}"));
        storage.delete_save("slot-1").unwrap();
        storage.delete_save("slot-1").unwrap();
        assert!(storage.load_game("slot-1").unwrap().is_none());
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn path_escapes_are_rejected() {
        let dir = scratch("names");
        let storage = FileStorage::new(&dir).unwrap();
        for name in ["", "../up", ".hidden", "a/b"] {
            let err = storage.save_game(name, "{}").unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        }
        std::fs::remove_dir_all(dir).unwrap();
    }
}
