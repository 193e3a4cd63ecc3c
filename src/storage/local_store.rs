//! Key/value persistence for offline mode
//!
//! Every value is stored as a JSON document under a fixed key. Reads never
//! fail: a missing key, corrupt JSON or a database error yields the caller's
//! default. Writes that fail are logged and dropped.

use crate::database;
use crate::error::AppError;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Keys of the local namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKey {
    User,
    Projects,
    Glazes,
    ReclaimBatches,
    StudioTips,
    Guilds,
    /// Persisted auth session of the remote backend
    AuthSession,
}

impl StoreKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKey::User => "user",
            StoreKey::Projects => "projects",
            StoreKey::Glazes => "glazes",
            StoreKey::ReclaimBatches => "reclaimBatches",
            StoreKey::StudioTips => "studioTips",
            StoreKey::Guilds => "guilds",
            StoreKey::AuthSession => "coastal-kiln-auth",
        }
    }
}

/// Handle to the local key/value store. Clones share one connection.
#[derive(Clone)]
pub struct LocalStore {
    conn: Arc<Mutex<Connection>>,
}

impl LocalStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Opens the store backed by the database file at `path`
    pub fn open(path: &Path) -> Result<Self, AppError> {
        Ok(Self::new(database::init_database(path)?))
    }

    pub fn in_memory() -> Result<Self, AppError> {
        Ok(Self::new(database::init_in_memory()?))
    }

    fn read_raw(&self, key: StoreKey) -> Result<Option<String>, AppError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| AppError::Config("local store lock poisoned".to_string()))?;

        let raw = conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key.as_str()],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(raw)
    }

    /// Value stored under `key`, or `default` when absent or unreadable
    pub fn get<T: DeserializeOwned>(&self, key: StoreKey, default: T) -> T {
        self.get_or_else(key, || default)
    }

    /// Like [`LocalStore::get`], building the default lazily
    pub fn get_or_else<T, F>(&self, key: StoreKey, default: F) -> T
    where
        T: DeserializeOwned,
        F: FnOnce() -> T,
    {
        match self.read_raw(key) {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => value,
                Err(e) => {
                    log::warn!("Discarding unreadable value for '{}': {}", key.as_str(), e);
                    default()
                }
            },
            Ok(None) => default(),
            Err(e) => {
                log::error!("Storage error reading '{}': {}", key.as_str(), e);
                default()
            }
        }
    }

    pub fn contains(&self, key: StoreKey) -> bool {
        matches!(self.read_raw(key), Ok(Some(_)))
    }

    fn write_raw<T: Serialize>(&self, key: StoreKey, value: &T) -> Result<(), AppError> {
        let json = serde_json::to_string(value)?;
        let conn = self
            .conn
            .lock()
            .map_err(|_| AppError::Config("local store lock poisoned".to_string()))?;

        conn.execute(
            "INSERT INTO kv_store (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key.as_str(), json],
        )?;
        Ok(())
    }

    /// Serializes and persists `value`; failures are logged, not returned
    pub fn set<T: Serialize>(&self, key: StoreKey, value: &T) {
        if let Err(e) = self.write_raw(key, value) {
            log::error!("Storage error writing '{}': {}", key.as_str(), e);
        }
    }

    /// Deletes `key`; absent keys are fine
    pub fn remove(&self, key: StoreKey) {
        let result = self
            .conn
            .lock()
            .map_err(|_| AppError::Config("local store lock poisoned".to_string()))
            .and_then(|conn| {
                conn.execute("DELETE FROM kv_store WHERE key = ?1", params![key.as_str()])
                    .map_err(AppError::from)
            });

        if let Err(e) = result {
            log::error!("Storage error removing '{}': {}", key.as_str(), e);
        }
    }

    /// Wipes the whole namespace
    pub fn clear(&self) {
        let result = self
            .conn
            .lock()
            .map_err(|_| AppError::Config("local store lock poisoned".to_string()))
            .and_then(|conn| conn.execute("DELETE FROM kv_store", []).map_err(AppError::from));

        if let Err(e) = result {
            log::error!("Storage error clearing store: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Item {
        id: String,
        weight: Option<f64>,
    }

    #[test]
    fn test_get_unwritten_key_returns_default() {
        let store = LocalStore::in_memory().unwrap();
        let value: Vec<Item> = store.get(StoreKey::Projects, Vec::new());
        assert!(value.is_empty());

        let fallback = store.get(StoreKey::User, "Potter".to_string());
        assert_eq!(fallback, "Potter");
    }

    #[test]
    fn test_get_returns_last_written_value() {
        let store = LocalStore::in_memory().unwrap();
        let first = vec![Item { id: "1".into(), weight: Some(5.5) }];
        let second = vec![
            Item { id: "2".into(), weight: None },
            Item { id: "1".into(), weight: Some(5.5) },
        ];

        store.set(StoreKey::ReclaimBatches, &first);
        store.set(StoreKey::ReclaimBatches, &second);

        let loaded: Vec<Item> = store.get(StoreKey::ReclaimBatches, Vec::new());
        assert_eq!(loaded, second);
    }

    #[test]
    fn test_corrupt_value_returns_default() {
        let store = LocalStore::in_memory().unwrap();
        store
            .conn
            .lock()
            .unwrap()
            .execute(
                "INSERT INTO kv_store (key, value) VALUES ('glazes', '{not json')",
                [],
            )
            .unwrap();

        let loaded: Vec<Item> = store.get(StoreKey::Glazes, vec![Item { id: "d".into(), weight: None }]);
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "d");
    }

    #[test]
    fn test_wrong_shape_returns_default() {
        let store = LocalStore::in_memory().unwrap();
        store.set(StoreKey::Guilds, &"a string, not a list");
        let loaded: Vec<Item> = store.get(StoreKey::Guilds, Vec::new());
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_remove_is_tolerant_of_absence() {
        let store = LocalStore::in_memory().unwrap();
        store.remove(StoreKey::User);

        store.set(StoreKey::User, &"Hannah");
        assert!(store.contains(StoreKey::User));
        store.remove(StoreKey::User);
        assert!(!store.contains(StoreKey::User));
    }

    #[test]
    fn test_clones_share_data() {
        let store = LocalStore::in_memory().unwrap();
        let other = store.clone();
        store.set(StoreKey::StudioTips, &vec!["tip"]);
        let tips: Vec<String> = other.get(StoreKey::StudioTips, Vec::new());
        assert_eq!(tips, vec!["tip".to_string()]);
    }

    #[test]
    fn test_clear_wipes_everything() {
        let store = LocalStore::in_memory().unwrap();
        store.set(StoreKey::User, &"Hannah");
        store.set(StoreKey::Projects, &Vec::<Item>::new());
        store.clear();
        assert!(!store.contains(StoreKey::User));
        assert!(!store.contains(StoreKey::Projects));
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kiln.db");

        {
            let store = LocalStore::open(&path).unwrap();
            store.set(StoreKey::User, &"Hannah");
        }

        let reopened = LocalStore::open(&path).unwrap();
        assert_eq!(reopened.get(StoreKey::User, String::new()), "Hannah");
    }
}
