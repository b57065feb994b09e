//! Persistence of the bank collection and the display settings.
//!
//! Everything lives in one JSON document under a single key:
//!
//! ```json
//! { "banks": [ { "name": "...", "voices": [ ... ] } ],
//!   "settings": { "showADSR": true, "showValueInputs": false } }
//! ```

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dx7::json::BankJson;
use crate::editor::bank::Bank;

/// Key of the stored document.
pub const STORAGE_KEY: &str = "dx7-editor";

/// A place to keep string values by key.
pub trait KeyValueStore {
    /// Gets the value for `key`, or `None` if nothing has been stored.
    fn get(&self, key: &str) -> io::Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> io::Result<()>;
}

/// Keeps values in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, String>,
    read_only: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Default::default()
    }

    /// Makes a store that refuses every write.
    pub fn read_only() -> Self {
        MemoryStore { read_only: true, ..Default::default() }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        if self.read_only {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "store is read-only"));
        }
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Keeps each value in a file named `<key>.json` inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        FileStore { dir: dir.as_ref().to_path_buf() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.path(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    // Write to a temporary file first so that a failed write
    // never leaves a truncated document behind.
    fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path(key);
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, value)?;
        fs::rename(&temp_path, &path)
    }
}

const SHOW_ADSR: &str = "showADSR";
const SHOW_VALUE_INPUTS: &str = "showValueInputs";

/// Display settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    #[serde(rename = "showADSR")]
    pub show_adsr: bool,

    #[serde(rename = "showValueInputs")]
    pub show_value_inputs: bool,

    /// Keys this version does not know about, kept as they are.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            show_adsr: true,
            show_value_inputs: false,
            extra: Map::new(),
        }
    }
}

impl Settings {
    fn to_map(&self) -> Map<String, Value> {
        let mut map = self.extra.clone();
        map.insert(SHOW_ADSR.to_string(), Value::Bool(self.show_adsr));
        map.insert(SHOW_VALUE_INPUTS.to_string(), Value::Bool(self.show_value_inputs));
        map
    }

    /// Merges `map` into these settings one key at a time.
    /// A known key with a value of the wrong type is skipped
    /// and keeps its current value.
    fn apply(&mut self, map: Map<String, Value>) {
        for (key, value) in map {
            let flag = match key.as_str() {
                SHOW_ADSR => &mut self.show_adsr,
                SHOW_VALUE_INPUTS => &mut self.show_value_inputs,
                _ => {
                    self.extra.insert(key, value);
                    continue;
                }
            };

            match value.as_bool() {
                Some(on) => *flag = on,
                None => warn!("Ignoring setting {} = {}, expected true or false", key, value),
            }
        }
    }
}

/// The stored document. Either part may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banks: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Map<String, Value>>,
}

/// Reads and writes the stored document through a key-value store.
/// Reading never fails and write failures are only logged,
/// so the editor keeps working with an unusable store.
#[derive(Debug)]
pub struct Storage<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> Storage<S> {
    pub fn new(store: S) -> Self {
        Storage { store }
    }

    pub fn load(&self) -> StoredDocument {
        let text = match self.store.get(STORAGE_KEY) {
            Ok(Some(text)) => text,
            Ok(None) => return StoredDocument::default(),
            Err(e) => {
                warn!("Unable to read stored data: {}", e);
                return StoredDocument::default();
            }
        };

        serde_json::from_str(&text).unwrap_or_else(|e| {
            warn!("Stored data is corrupt, starting from scratch: {}", e);
            StoredDocument::default()
        })
    }

    pub fn save(&mut self, document: &StoredDocument) {
        let text = match serde_json::to_string(document) {
            Ok(text) => text,
            Err(e) => {
                warn!("Unable to serialize stored data: {}", e);
                return;
            }
        };

        match self.store.set(STORAGE_KEY, &text) {
            Ok(()) => debug!("Saved {} bytes of stored data", text.len()),
            Err(e) => warn!("Unable to save stored data: {}", e),
        }
    }

    /// Gets the stored banks, or `None` if there are none.
    ///
    /// Voices are read leniently, with bad parameters clamped or reset
    /// to init values. A bank that cannot be read at all is skipped.
    pub fn load_banks(&self) -> Option<Vec<Bank>> {
        let items = match self.load().banks? {
            Value::Array(items) => items,
            other => {
                warn!("Stored banks are malformed, expected an array but got {}", other);
                return None;
            }
        };

        let mut result = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            match Bank::from_value(item, result.len()) {
                Ok(bank) => result.push(bank),
                Err(e) => warn!("Skipping stored bank #{}: {}", index + 1, e),
            }
        }

        if result.is_empty() {
            None
        }
        else {
            Some(result)
        }
    }

    /// Saves the banks, keeping the stored settings.
    pub fn save_banks(&mut self, banks: &[Bank]) {
        let json: Vec<BankJson> = banks.iter().map(Bank::to_json).collect();
        let value = match serde_json::to_value(json) {
            Ok(value) => value,
            Err(e) => {
                warn!("Unable to serialize banks: {}", e);
                return;
            }
        };

        let mut document = self.load();
        document.banks = Some(value);
        self.save(&document);
    }

    /// Gets the stored settings merged over the defaults.
    pub fn load_settings(&self) -> Settings {
        let mut settings = Settings::default();
        if let Some(stored) = self.load().settings {
            settings.apply(stored);
        }
        settings
    }

    /// Merges `partial` into the stored settings and returns the result.
    pub fn save_settings(&mut self, partial: Map<String, Value>) -> Settings {
        let mut settings = self.load_settings();
        settings.apply(partial);

        let mut document = self.load();
        document.settings = Some(settings.to_map());
        self.save(&document);
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use crate::Ranged;

    fn storage_with(text: &str) -> Storage<MemoryStore> {
        let mut store = MemoryStore::new();
        store.set(STORAGE_KEY, text).unwrap();
        Storage::new(store)
    }

    #[test]
    fn test_empty_store() {
        let storage = Storage::new(MemoryStore::new());
        assert_eq!(storage.load(), StoredDocument::default());
        assert!(storage.load_banks().is_none());
        assert_eq!(storage.load_settings(), Settings::default());
    }

    #[test]
    fn test_corrupt_document_loads_empty() {
        let storage = storage_with("{ not json");
        assert_eq!(storage.load(), StoredDocument::default());
        assert!(storage.load_banks().is_none());
    }

    #[test]
    fn test_malformed_banks_load_none() {
        let storage = storage_with(r#"{ "banks": [ { "name": "X", "voices": [] } ] }"#);
        assert!(storage.load_banks().is_none());

        let storage = storage_with(r#"{ "banks": [ 7, null ] }"#);
        assert!(storage.load_banks().is_none());

        let storage = storage_with(r#"{ "banks": "nope" }"#);
        assert!(storage.load_banks().is_none());

        let storage = storage_with(r#"{ "banks": [] }"#);
        assert!(storage.load_banks().is_none());
    }

    #[test]
    fn test_banks_round_trip() {
        let mut storage = Storage::new(MemoryStore::new());
        let banks = vec![Bank::default(), Bank::new("Second")];
        storage.save_banks(&banks);

        let loaded = storage.load_banks().unwrap();
        assert_eq!(loaded, banks);
    }

    #[test]
    fn test_save_banks_keeps_settings() {
        let mut storage = Storage::new(MemoryStore::new());
        let mut partial = Map::new();
        partial.insert("showValueInputs".to_string(), json!(true));
        storage.save_settings(partial);

        storage.save_banks(&[Bank::default()]);
        assert!(storage.load_settings().show_value_inputs);
        assert!(storage.load().settings.is_some());
    }

    #[test]
    fn test_settings_merge_keeps_unknown_keys() {
        let mut storage = storage_with(r#"{ "settings": { "theme": "dark" } }"#);
        let settings = storage.load_settings();
        assert!(settings.show_adsr);
        assert!(!settings.show_value_inputs);
        assert_eq!(settings.extra.get("theme"), Some(&json!("dark")));

        let mut partial = Map::new();
        partial.insert("showADSR".to_string(), json!(false));
        let settings = storage.save_settings(partial);
        assert!(!settings.show_adsr);
        assert_eq!(settings.extra.get("theme"), Some(&json!("dark")));
        assert_eq!(storage.load_settings(), settings);
    }

    #[test]
    fn test_unreadable_bank_is_skipped() {
        let good = serde_json::to_value(Bank::new("Good").to_json()).unwrap();
        let mut clamped = serde_json::to_value(Bank::new("").to_json()).unwrap();
        clamped["voices"][0]["global"]["algorithm"] = json!(33);
        let text = json!({ "banks": [ { "name": "Short", "voices": [] }, good, clamped ] }).to_string();

        let banks = storage_with(&text).load_banks().unwrap();
        assert_eq!(banks.len(), 2);
        assert_eq!(banks[0], Bank::new("Good"));
        assert_eq!(banks[1].name, "Bank 2");
        assert_eq!(banks[1].voice(0).unwrap().alg.value(), 32);
    }

    #[test]
    fn test_bad_setting_keeps_the_others() {
        let mut storage = storage_with(r#"{ "settings": { "theme": "dark", "showValueInputs": true } }"#);

        let mut partial = Map::new();
        partial.insert("showADSR".to_string(), json!("yes"));
        let settings = storage.save_settings(partial);

        assert!(settings.show_adsr);
        assert!(settings.show_value_inputs);
        assert_eq!(settings.extra.get("theme"), Some(&json!("dark")));
        assert_eq!(storage.load_settings(), settings);

        let stored = storage.load().settings.unwrap();
        assert_eq!(stored.get("theme"), Some(&json!("dark")));
        assert_eq!(stored.get("showValueInputs"), Some(&json!(true)));
    }

    #[test]
    fn test_bad_stored_setting_falls_back_alone() {
        let storage = storage_with(r#"{ "settings": { "showADSR": 3, "showValueInputs": true } }"#);
        let settings = storage.load_settings();
        assert!(settings.show_adsr);
        assert!(settings.show_value_inputs);
    }

    #[test]
    fn test_write_failure_is_swallowed() {
        let mut storage = Storage::new(MemoryStore::read_only());
        storage.save_banks(&[Bank::default()]);
        assert!(storage.load_banks().is_none());
    }

    #[test]
    fn test_file_store() {
        let dir = std::env::temp_dir().join(format!("dx7-editor-store-{}", std::process::id()));
        let mut store = FileStore::new(&dir);
        assert_eq!(store.get("missing").unwrap(), None);

        store.set("doc", "{}").unwrap();
        assert_eq!(store.get("doc").unwrap(), Some("{}".to_string()));
        assert!(dir.join("doc.json").exists());
        assert!(!dir.join("doc.json.tmp").exists());

        fs::remove_dir_all(&dir).unwrap();
    }
}
