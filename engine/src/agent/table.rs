use std::{
    collections::{BTreeMap, HashMap},
    fs::{self, File},
    io::{self, Write},
    path::Path,
};

use tracing::{debug, info, warn};

use super::encoder::StateActionKey;

/// Sparse map from state-action keys to value estimates. Unseen keys read
/// as 0.0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QTable {
    values: HashMap<StateActionKey, f64>,
}

impl QTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &StateActionKey) -> f64 {
        self.values.get(key).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, key: StateActionKey, value: f64) {
        self.values.insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StateActionKey, &f64)> {
        self.values.iter()
    }

    /// Reads a table written by [`QTable::save`]. Entries whose key does
    /// not parse are skipped.
    pub fn load(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        let raw: BTreeMap<String, f64> = serde_json::from_str(&content)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;

        let mut table = Self::new();
        for (key, value) in raw {
            match key.parse::<StateActionKey>() {
                Ok(parsed) => table.set(parsed, value),
                Err(err) => warn!("Skipping Q-table entry {:?}: {}", key, err),
            }
        }

        Ok(table)
    }

    /// Loads `path`, or starts empty when it is missing or unreadable.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            info!("No Q-table at {}, starting empty", path.display());
            return Self::new();
        }

        match Self::load(path) {
            Ok(table) => {
                info!("Loaded {} Q entries from {}", table.len(), path.display());
                table
            }
            Err(err) => {
                warn!(
                    "Failed to load Q-table from {}: {}. Starting empty",
                    path.display(),
                    err
                );
                Self::new()
            }
        }
    }

    /// Overwrites `path` with the full table. The data goes to a temporary
    /// file next to it first and is renamed into place once synced.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let raw: BTreeMap<String, f64> = self
            .values
            .iter()
            .map(|(key, value)| (key.to_string(), *value))
            .collect();
        let content = serde_json::to_string_pretty(&raw)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;

        atomic_write(path, content.as_bytes())?;
        debug!("Wrote {} Q entries to {}", raw.len(), path.display());
        Ok(())
    }
}

fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("qtable.json");
    let tmp_path = parent.join(format!(".{}.tmp.{}", file_name, std::process::id()));

    let result = File::create(&tmp_path).and_then(|mut file| {
        file.write_all(data)?;
        file.sync_all()
    });
    if let Err(err) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }

    fs::rename(&tmp_path, path).inspect_err(|_| {
        let _ = fs::remove_file(&tmp_path);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::encoder::StateKey;
    use tempfile::tempdir;

    fn key(covered: u8, numbered: u8, action: usize) -> StateActionKey {
        StateActionKey {
            state: StateKey { covered, numbered },
            action,
        }
    }

    #[test]
    fn unseen_keys_default_to_zero() {
        let mut table = QTable::new();
        assert_eq!(table.get(&key(1, 1, 3)), 0.0);
        table.set(key(1, 1, 3), -0.5);
        assert_eq!(table.get(&key(1, 1, 3)), -0.5);
        assert_eq!(table.get(&key(1, 1, 4)), 0.0);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("models").join("qtable.json");

        let mut table = QTable::new();
        table.set(key(3, 0, 0), 0.118);
        table.set(key(2, 1, 17), -1.999_999_7);
        table.set(key(0, 3, 99), 4.368);
        table.save(&path).unwrap();

        let loaded = QTable::load(&path).unwrap();
        assert_eq!(loaded.len(), 3);
        for (key, value) in table.iter() {
            assert!((loaded.get(key) - value).abs() < 1e-12);
        }
    }

    #[test]
    fn saved_file_is_readable_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("qtable.json");

        let mut table = QTable::new();
        table.set(key(3, 1, 42), 0.5);
        table.save(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let raw: BTreeMap<String, f64> = serde_json::from_str(&content).unwrap();
        assert_eq!(raw.get("(3, 1)|42"), Some(&0.5));

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().contains(".tmp."))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn save_overwrites_previous_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("qtable.json");

        let mut first = QTable::new();
        first.set(key(1, 0, 1), 1.0);
        first.set(key(1, 0, 2), 2.0);
        first.save(&path).unwrap();

        let mut second = QTable::new();
        second.set(key(1, 0, 3), 3.0);
        second.save(&path).unwrap();

        assert_eq!(QTable::load(&path).unwrap(), second);
    }

    #[test]
    fn missing_file_starts_empty() {
        let dir = tempdir().unwrap();
        let table = QTable::load_or_default(&dir.path().join("absent.json"));
        assert!(table.is_empty());
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("qtable.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(QTable::load(&path).is_err());
        assert!(QTable::load_or_default(&path).is_empty());
    }

    #[test]
    fn bad_keys_are_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("qtable.json");
        fs::write(&path, r#"{"(1, 2)|5": 0.25, "garbage": 1.0}"#).unwrap();

        let table = QTable::load_or_default(&path);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(&key(1, 2, 5)), 0.25);
    }

    #[test]
    fn save_into_unwritable_location_fails() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, "").unwrap();

        let table = QTable::new();
        assert!(table.save(&blocker.join("qtable.json")).is_err());
    }
}
