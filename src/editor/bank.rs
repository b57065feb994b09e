//! Banks of 32 voices and the manager that edits them.

use std::fs;
use std::path::Path;

use log::{debug, info, warn};
use serde_json::{Map, Value};

use crate::ParseError;
use crate::dx7::{MidiChannel, VOICE_COUNT};
use crate::dx7::cartridge::Cartridge;
use crate::dx7::json::BankJson;
use crate::dx7::sysex::{self, Format, SystemExclusiveData};
use crate::dx7::voice::{Voice, default_voice_name, normalize_name};
use crate::editor::EditorError;
use crate::editor::model::{VoiceModel, VoiceSource};
use crate::editor::storage::{KeyValueStore, Settings, Storage};

/// Name of the bank in a fresh collection.
pub const INIT_BANK_NAME: &str = "Init Bank";

/// Gets the default name for a bank at `index`, like "Bank 1".
pub fn default_bank_name(index: usize) -> String {
    format!("Bank {}", index + 1)
}

/// A named cartridge.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Bank {
    pub name: String,
    cartridge: Cartridge,
}

impl Default for Bank {
    fn default() -> Self {
        Bank::new(INIT_BANK_NAME)
    }
}

impl Bank {
    /// Makes a bank of init voices.
    pub fn new(name: &str) -> Self {
        Bank::with_cartridge(name, Cartridge::default())
    }

    pub fn with_cartridge(name: &str, cartridge: Cartridge) -> Self {
        Bank { name: name.to_string(), cartridge }
    }

    pub fn cartridge(&self) -> &Cartridge {
        &self.cartridge
    }

    pub fn voices(&self) -> &[Voice] {
        self.cartridge.voices()
    }

    pub fn voice(&self, index: usize) -> Option<&Voice> {
        self.cartridge.voice(index)
    }

    pub fn to_json(&self) -> BankJson {
        BankJson {
            name: self.name.clone(),
            voices: self.cartridge.to_json(),
        }
    }

    /// Makes a bank from a JSON object with a `voices` array of 32 voices.
    /// A bank without a name gets the default name for its position `index`.
    ///
    /// Each voice is read like `VoiceModel::load_from_json` reads it, so
    /// missing or malformed parameters take init values and out-of-range
    /// numbers are clamped. A voice that is not an object becomes an init voice.
    pub fn from_value(value: &Value, index: usize) -> Result<Self, EditorError> {
        let object = value.as_object().ok_or(EditorError::NotAnObject)?;
        let name = match object.get("name").and_then(Value::as_str).map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => default_bank_name(index),
        };

        let items = match object.get("voices") {
            Some(Value::Array(items)) => items,
            _ => return Err(ParseError::InvalidLength(0, VOICE_COUNT as u32).into()),
        };
        if items.len() != VOICE_COUNT {
            return Err(ParseError::InvalidLength(items.len() as u32, VOICE_COUNT as u32).into());
        }

        let mut voices = Vec::with_capacity(VOICE_COUNT);
        for (slot, item) in items.iter().enumerate() {
            if !item.is_object() {
                warn!("Voice #{} of bank '{}' is not an object, using an init voice", slot + 1, name);
                voices.push(Voice::init(slot));
                continue;
            }
            let mut model = VoiceModel::default();
            model.load_from_json(item)?;
            voices.push(model.to_voice()?);
        }

        Ok(Bank::with_cartridge(&name, Cartridge::from_voices(voices)?))
    }
}

/// What to do with unsaved edits of the current voice
/// when switching to another voice or bank.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum OnPending {
    /// Fail with `EditorError::PendingChanges`.
    Refuse,
    /// Store the edits in the current slot first.
    Save,
    /// Drop the edits.
    Discard,
}

/// What a file or SysEx import produced.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FileImport {
    /// A new bank was added at this index and made current.
    Bank(usize),
    /// A single voice was loaded into the editor.
    Voice,
}

/// Kinds of files the editor reads and writes.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FileKind {
    Syx,
    Json,
}

impl FileKind {
    /// Identifies the file kind from the extension, ignoring case.
    pub fn from_path(path: &Path) -> Result<Self, EditorError> {
        let extension = path.extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match extension.as_str() {
            "syx" => Ok(FileKind::Syx),
            "json" => Ok(FileKind::Json),
            "" => Err(EditorError::UnsupportedFileType(String::new())),
            other => Err(EditorError::UnsupportedFileType(format!(".{}", other))),
        }
    }
}

/// Owns the bank collection, the current selection and the voice being edited.
/// Every change to the collection is saved to the store right away.
pub struct BankManager<S: KeyValueStore> {
    storage: Storage<S>,
    banks: Vec<Bank>,
    bank_index: usize,
    voice_index: usize,
    model: VoiceModel,
}

impl<S: KeyValueStore> BankManager<S> {
    /// Opens the collection kept in `store`, starting
    /// with a single init bank if there is none.
    pub fn open(store: S) -> Self {
        let mut storage = Storage::new(store);
        let banks = match storage.load_banks() {
            Some(banks) => {
                info!("Loaded {} bank(s)", banks.len());
                banks
            },
            // Nothing is written until the first change, so a store
            // that could not be read keeps its contents.
            None => {
                info!("No stored banks, starting with '{}'", INIT_BANK_NAME);
                vec![Bank::default()]
            }
        };

        let mut manager = BankManager {
            storage,
            banks,
            bank_index: 0,
            voice_index: 0,
            model: VoiceModel::default(),
        };
        manager.reload_model();
        manager
    }

    pub fn banks(&self) -> &[Bank] {
        &self.banks
    }

    pub fn bank(&self, index: usize) -> Option<&Bank> {
        self.banks.get(index)
    }

    pub fn bank_count(&self) -> usize {
        self.banks.len()
    }

    pub fn bank_index(&self) -> usize {
        self.bank_index
    }

    pub fn voice_index(&self) -> usize {
        self.voice_index
    }

    pub fn current_bank(&self) -> Option<&Bank> {
        self.banks.get(self.bank_index)
    }

    pub fn model(&self) -> &VoiceModel {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut VoiceModel {
        &mut self.model
    }

    pub fn storage(&self) -> &Storage<S> {
        &self.storage
    }

    pub fn settings(&self) -> Settings {
        self.storage.load_settings()
    }

    pub fn update_settings(&mut self, partial: Map<String, Value>) -> Settings {
        self.storage.save_settings(partial)
    }

    /// Tells if the voice being edited differs from the voice in its slot.
    pub fn has_pending_changes(&self) -> bool {
        match self.current_bank().and_then(|bank| bank.voice(self.voice_index)) {
            Some(voice) => voice.to_json() != self.model.to_json(),
            None => false,
        }
    }

    /// Makes bank `index` current and loads its first voice.
    pub fn switch_bank(&mut self, index: usize, on_pending: OnPending) -> Result<(), EditorError> {
        self.check_bank_index(index)?;
        self.resolve_pending(on_pending)?;
        self.select(index, 0);
        debug!("Switched to bank #{} '{}'", index + 1, self.banks[index].name);
        Ok(())
    }

    /// Loads voice `index` of the current bank for editing.
    pub fn load_from_voice_index(&mut self, index: usize, on_pending: OnPending) -> Result<(), EditorError> {
        check_voice_index(index)?;
        self.resolve_pending(on_pending)?;
        self.select(self.bank_index, index);
        Ok(())
    }

    pub fn delete_bank(&mut self, index: usize) -> Result<(), EditorError> {
        if self.banks.len() <= 1 {
            return Err(EditorError::LastBank);
        }
        self.check_bank_index(index)?;

        let bank = self.banks.remove(index);
        info!("Deleted bank '{}'", bank.name);

        let bank_index = self.bank_index.min(self.banks.len() - 1);
        self.select(bank_index, 0);
        self.persist();
        Ok(())
    }

    /// Renames bank `index`. An empty name gives the bank its default name.
    /// Does nothing if there is no such bank.
    pub fn rename_bank(&mut self, index: usize, name: &str) {
        let Some(bank) = self.banks.get_mut(index) else {
            debug!("No bank #{} to rename", index);
            return;
        };

        let name = name.trim();
        bank.name = if name.is_empty() { default_bank_name(index) } else { name.to_string() };
        self.persist();
    }

    /// Replaces the whole collection with a single init bank.
    pub fn reset_banks(&mut self) {
        self.banks = vec![Bank::default()];
        self.select(0, 0);
        info!("Banks reset");
        self.persist();
    }

    pub fn init_voice(&mut self, index: usize) -> Result<(), EditorError> {
        self.put_voice(index, Voice::init(index))
    }

    /// Copies a voice over another one in the current bank.
    pub fn copy_voice(&mut self, from: usize, to: usize) -> Result<(), EditorError> {
        check_voice_index(from)?;
        check_voice_index(to)?;
        let source = self.active_bank()?.voice(from)
            .ok_or(EditorError::IndexOutOfRange { what: "voice", index: from, count: VOICE_COUNT })?;
        let voice = source.clone();
        self.put_voice(to, voice)
    }

    /// Renames voice `index` in the current bank. An empty name
    /// gives the voice its default name.
    pub fn rename_voice(&mut self, index: usize, name: &str) -> Result<(), EditorError> {
        check_voice_index(index)?;
        let name = name.trim();
        let name = if name.is_empty() { default_voice_name(index) } else { normalize_name(name) };

        let bank_index = self.bank_index;
        let voice = self.banks.get_mut(bank_index)
            .ok_or(EditorError::NoBankLoaded)?
            .cartridge.voice_mut(index)
            .ok_or(EditorError::IndexOutOfRange { what: "voice", index, count: VOICE_COUNT })?;
        voice.name = name;

        if index == self.voice_index {
            self.model.name = voice.name.clone();
        }
        self.persist();
        Ok(())
    }

    /// Stores the voice being edited in slot `index` of the current bank.
    pub fn replace_voice_in_bank(&mut self, index: usize) -> Result<(), EditorError> {
        check_voice_index(index)?;
        self.active_bank()?;
        let voice = self.model.to_voice()?;

        if index == self.voice_index {
            self.model.name = voice.name.clone();
        }
        self.store_voice(index, voice)
    }

    /// Imports a `.syx` or `.json` file.
    ///
    /// A bank (SysEx bulk dump or JSON with a `voices` array) is added
    /// and made current. Any other JSON is loaded into the editor as a
    /// single voice, leaving the banks alone.
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<FileImport, EditorError> {
        let path = path.as_ref();
        let kind = FileKind::from_path(path)?;
        let data = fs::read(path)?;
        let stem = path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!("Importing {}", path.display());
        self.import(&stem, kind, &data)
    }

    /// Imports file contents. `name` is used for a bank that
    /// does not carry its own name.
    pub fn import(&mut self, name: &str, kind: FileKind, data: &[u8]) -> Result<FileImport, EditorError> {
        match kind {
            FileKind::Json => {
                let value: Value = serde_json::from_slice(data)?;
                if value.get("voices").is_some_and(Value::is_array) {
                    let bank = Bank::from_value(&value, self.banks.len())?;
                    Ok(self.add_bank(bank))
                }
                else {
                    self.model.load_from_json(&value)?;
                    Ok(FileImport::Voice)
                }
            },
            FileKind::Syx => {
                let cartridge = Cartridge::from_sysex_file(data)?;
                let name = if name.trim().is_empty() {
                    default_bank_name(self.banks.len())
                }
                else {
                    name.to_string()
                };
                Ok(self.add_bank(Bank::with_cartridge(&name, cartridge)))
            },
        }
    }

    /// Takes in a SysEx message received from a synthesizer.
    /// A voice dump goes into the editor, a cartridge dump becomes a new bank.
    pub fn receive_sysex(&mut self, data: &[u8]) -> Result<FileImport, EditorError> {
        let (header, payload) = sysex::parse_message(data)?;
        debug!("Received {:?} dump on channel {}", header.format, header.channel);
        match header.format {
            Format::Voice => {
                let voice = Voice::from_bytes(payload)?;
                self.model.load_from_voice(VoiceSource::Codec(&voice))?;
                Ok(FileImport::Voice)
            },
            Format::Cartridge => {
                let cartridge = Cartridge::from_bytes(payload)?;
                let name = default_bank_name(self.banks.len());
                Ok(self.add_bank(Bank::with_cartridge(&name, cartridge)))
            },
        }
    }

    /// Makes the cartridge bulk dump of bank `index`.
    pub fn bank_sysex(&self, index: usize, channel: MidiChannel) -> Result<Vec<u8>, EditorError> {
        self.check_bank_index(index)?;
        Ok(self.banks[index].cartridge.to_message(channel))
    }

    /// Writes bank `index` as a `.syx` bulk dump or as `.json`.
    pub fn export_bank<P: AsRef<Path>>(&self, index: usize, path: P) -> Result<(), EditorError> {
        let path = path.as_ref();
        let kind = FileKind::from_path(path)?;
        self.check_bank_index(index)?;
        let bank = &self.banks[index];

        let data = match kind {
            FileKind::Syx => bank.cartridge.to_message(MidiChannel::default()),
            FileKind::Json => serde_json::to_vec_pretty(&bank.to_json())?,
        };
        fs::write(path, data)?;
        info!("Exported bank '{}' to {}", bank.name, path.display());
        Ok(())
    }

    /// Writes the voice being edited as a `.syx` voice dump or as `.json`.
    pub fn export_voice<P: AsRef<Path>>(&self, path: P) -> Result<(), EditorError> {
        let path = path.as_ref();
        let data = match FileKind::from_path(path)? {
            FileKind::Syx => self.model.to_sysex(MidiChannel::default())?,
            FileKind::Json => serde_json::to_vec_pretty(&self.model.to_json())?,
        };
        fs::write(path, data)?;
        info!("Exported voice '{}' to {}", self.model.name, path.display());
        Ok(())
    }

    fn check_bank_index(&self, index: usize) -> Result<(), EditorError> {
        if index < self.banks.len() {
            Ok(())
        }
        else {
            Err(EditorError::IndexOutOfRange { what: "bank", index, count: self.banks.len() })
        }
    }

    fn active_bank(&self) -> Result<&Bank, EditorError> {
        self.current_bank().ok_or(EditorError::NoBankLoaded)
    }

    fn resolve_pending(&mut self, on_pending: OnPending) -> Result<(), EditorError> {
        if !self.has_pending_changes() {
            return Ok(());
        }

        match on_pending {
            OnPending::Refuse => Err(EditorError::PendingChanges),
            OnPending::Save => self.replace_voice_in_bank(self.voice_index),
            OnPending::Discard => {
                warn!("Discarding changes to '{}'", self.model.name);
                Ok(())
            },
        }
    }

    fn select(&mut self, bank_index: usize, voice_index: usize) {
        self.bank_index = bank_index;
        self.voice_index = voice_index;
        self.reload_model();
    }

    fn reload_model(&mut self) {
        self.model = match self.current_bank().and_then(|bank| bank.voice(self.voice_index)) {
            Some(voice) => VoiceModel::from(voice),
            None => VoiceModel::default(),
        };
    }

    // Puts a voice in a slot of the current bank and
    // reloads the editor if that is the slot being edited.
    fn put_voice(&mut self, index: usize, voice: Voice) -> Result<(), EditorError> {
        check_voice_index(index)?;
        self.store_voice(index, voice)?;
        if index == self.voice_index {
            self.reload_model();
        }
        Ok(())
    }

    fn store_voice(&mut self, index: usize, voice: Voice) -> Result<(), EditorError> {
        let bank = self.banks.get_mut(self.bank_index).ok_or(EditorError::NoBankLoaded)?;
        bank.cartridge.replace_voice(index, voice)
            .ok_or(EditorError::IndexOutOfRange { what: "voice", index, count: VOICE_COUNT })?;
        self.persist();
        Ok(())
    }

    fn add_bank(&mut self, bank: Bank) -> FileImport {
        info!("Added bank '{}'", bank.name);
        self.banks.push(bank);
        let index = self.banks.len() - 1;
        self.select(index, 0);
        self.persist();
        FileImport::Bank(index)
    }

    fn persist(&mut self) {
        self.storage.save_banks(&self.banks);
    }
}

fn check_voice_index(index: usize) -> Result<(), EditorError> {
    if index < VOICE_COUNT {
        Ok(())
    }
    else {
        Err(EditorError::IndexOutOfRange { what: "voice", index, count: VOICE_COUNT })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Ranged;
    use crate::dx7::voice::make_brass1;
    use crate::editor::storage::MemoryStore;

    fn manager() -> BankManager<MemoryStore> {
        BankManager::open(MemoryStore::new())
    }

    #[test]
    fn test_initial_state() {
        let mut manager = manager();
        assert_eq!(manager.bank_count(), 1);
        assert_eq!(manager.banks()[0].name, "Init Bank");
        assert_eq!(manager.bank_index(), 0);
        assert_eq!(manager.voice_index(), 0);
        assert_eq!(manager.model().name, "Voice 1");
        assert!(!manager.has_pending_changes());

        // The init bank is only stored once something changes.
        assert!(manager.storage().load_banks().is_none());
        manager.rename_bank(0, "Mine");
        assert_eq!(manager.storage().load_banks().unwrap()[0].name, "Mine");
    }

    fn bank_value(name: &str) -> Value {
        serde_json::to_value(Bank::new(name).to_json()).unwrap()
    }

    #[test]
    fn test_bank_from_value_default_name() {
        let mut value = bank_value("");
        assert_eq!(Bank::from_value(&value, 2).unwrap().name, "Bank 3");

        value.as_object_mut().unwrap().remove("name");
        assert_eq!(Bank::from_value(&value, 0).unwrap().name, "Bank 1");
    }

    #[test]
    fn test_bank_from_value_repairs_voices() {
        let mut value = bank_value("Rough");
        let voices = value["voices"].as_array_mut().unwrap();
        voices[1] = serde_json::to_value(make_brass1().to_json()).unwrap();
        voices[3]["global"]["algorithm"] = Value::from(33);
        voices[3]["global"].as_object_mut().unwrap().remove("egBiasSens");
        voices[3]["operators"][0]["key"]["breakPoint"] = Value::from("H9");
        voices[5] = Value::from("not a voice");

        let bank = Bank::from_value(&value, 0).unwrap();
        assert_eq!(bank.name, "Rough");
        assert_eq!(bank.voice(1), Some(&make_brass1()));
        assert_eq!(bank.voice(3).unwrap().alg.value(), 32);
        assert_eq!(bank.voice(3).unwrap().operators[0].kbd_level_scaling.breakpoint.value(), 0);
        assert_eq!(bank.voice(5), Some(&Voice::init(5)));
    }

    #[test]
    fn test_bank_from_value_needs_32_voices() {
        let mut value = bank_value("Short");
        value["voices"].as_array_mut().unwrap().truncate(31);
        assert!(matches!(
            Bank::from_value(&value, 0),
            Err(EditorError::Parse(ParseError::InvalidLength(31, 32)))));
        assert!(matches!(Bank::from_value(&Value::from(1), 0), Err(EditorError::NotAnObject)));
    }

    #[test]
    fn test_open_keeps_stored_document_with_a_bad_voice() {
        let mut first = bank_value("First");
        first["voices"][3]["global"]["algorithm"] = Value::from(33);
        let text = serde_json::json!({
            "banks": [first, bank_value("Second")],
            "settings": { "theme": "dark" }
        }).to_string();

        let mut store = MemoryStore::new();
        store.set(crate::editor::storage::STORAGE_KEY, &text).unwrap();
        let before = Storage::new(store.clone()).load();

        let manager = BankManager::open(store);
        assert_eq!(manager.bank_count(), 2);
        assert_eq!(manager.banks()[0].name, "First");
        assert_eq!(manager.banks()[0].voice(3).unwrap().alg.value(), 32);
        assert_eq!(manager.banks()[1].name, "Second");
        assert_eq!(manager.storage().load(), before);
    }

    #[test]
    fn test_open_unreadable_banks_leaves_store_alone() {
        let text = r#"{ "banks": [ { "name": "X", "voices": [] } ], "settings": { "showADSR": false } }"#;
        let mut store = MemoryStore::new();
        store.set(crate::editor::storage::STORAGE_KEY, text).unwrap();

        let manager = BankManager::open(store);
        assert_eq!(manager.bank_count(), 1);
        assert_eq!(manager.banks()[0].name, INIT_BANK_NAME);
        assert_eq!(
            manager.storage().load().banks,
            Some(serde_json::json!([ { "name": "X", "voices": [] } ])));
        assert!(!manager.settings().show_adsr);
    }

    #[test]
    fn test_import_json_bank_with_malformed_voice() {
        let mut manager = manager();
        let mut value = bank_value("Imported");
        value["voices"][7]["global"]["algorithm"] = Value::from(33);
        value["voices"][7]["global"].as_object_mut().unwrap().remove("egBiasSens");
        value["voices"][7]["operators"][2]["key"]["breakPoint"] = Value::from("H9");
        let data = serde_json::to_vec(&value).unwrap();

        assert_eq!(manager.import("file", FileKind::Json, &data).unwrap(), FileImport::Bank(1));
        let voice = manager.banks()[1].voice(7).unwrap();
        assert_eq!(voice.alg.value(), 32);
        assert_eq!(voice.operators[2].kbd_level_scaling.breakpoint.value(), 0);
        assert_eq!(manager.banks()[1].voice(0), Some(&Voice::init(0)));
    }

    #[test]
    fn test_switch_bank_out_of_range() {
        let mut manager = manager();
        assert!(matches!(
            manager.switch_bank(1, OnPending::Refuse),
            Err(EditorError::IndexOutOfRange { what: "bank", index: 1, count: 1 })));
        assert_eq!(manager.bank_index(), 0);
    }

    #[test]
    fn test_load_voice_out_of_range() {
        let mut manager = manager();
        manager.load_from_voice_index(4, OnPending::Refuse).unwrap();
        assert!(manager.load_from_voice_index(32, OnPending::Refuse).is_err());
        assert_eq!(manager.voice_index(), 4);
        assert_eq!(manager.model().name, "Voice 5");
    }

    #[test]
    fn test_pending_changes_policy() {
        let mut manager = manager();
        manager.model_mut().global.algorithm = 7;
        assert!(manager.has_pending_changes());

        assert!(matches!(manager.load_from_voice_index(1, OnPending::Refuse), Err(EditorError::PendingChanges)));
        assert_eq!(manager.voice_index(), 0);
        assert_eq!(manager.model().global.algorithm, 7);

        manager.load_from_voice_index(1, OnPending::Save).unwrap();
        assert_eq!(manager.voice_index(), 1);
        assert_eq!(manager.current_bank().unwrap().voice(0).unwrap().alg.value(), 7);

        manager.model_mut().global.algorithm = 9;
        manager.load_from_voice_index(2, OnPending::Discard).unwrap();
        assert_eq!(manager.current_bank().unwrap().voice(1).unwrap().alg.value(), 1);
    }

    #[test]
    fn test_delete_last_bank() {
        let mut manager = manager();
        let err = manager.delete_bank(0).unwrap_err();
        assert_eq!(err.to_string(), "Cannot delete the last bank");
        assert_eq!(manager.bank_count(), 1);
    }

    #[test]
    fn test_delete_active_bank_clamps() {
        let mut manager = manager();
        manager.import("Second", FileKind::Syx, &Cartridge::default().to_bytes()).unwrap();
        assert_eq!(manager.bank_index(), 1);
        manager.load_from_voice_index(3, OnPending::Discard).unwrap();

        manager.delete_bank(1).unwrap();
        assert_eq!(manager.bank_count(), 1);
        assert_eq!(manager.bank_index(), 0);
        assert_eq!(manager.voice_index(), 0);
        assert!(manager.delete_bank(5).is_err());
    }

    #[test]
    fn test_rename_bank() {
        let mut manager = manager();
        manager.rename_bank(0, "Brass");
        assert_eq!(manager.banks()[0].name, "Brass");

        manager.rename_bank(0, "  ");
        assert_eq!(manager.banks()[0].name, "Bank 1");

        manager.rename_bank(usize::MAX, "Y");
        assert_eq!(manager.banks()[0].name, "Bank 1");
    }

    #[test]
    fn test_rename_active_voice_updates_model() {
        let mut manager = manager();
        manager.rename_voice(0, "A VERY LONG NAME").unwrap();
        assert_eq!(manager.current_bank().unwrap().voice(0).unwrap().name, "A VERY LON");
        assert_eq!(manager.model().name, "A VERY LON");

        manager.rename_voice(3, "").unwrap();
        assert_eq!(manager.current_bank().unwrap().voice(3).unwrap().name, "Voice 4");
        assert!(manager.rename_voice(32, "X").is_err());
    }

    #[test]
    fn test_init_voice_reloads_active_slot() {
        let mut manager = manager();
        manager.model_mut().global.feedback = 6;
        manager.replace_voice_in_bank(0).unwrap();

        manager.init_voice(0).unwrap();
        assert_eq!(manager.model().global.feedback, 0);
        assert_eq!(manager.current_bank().unwrap().voice(0), Some(&Voice::init(0)));
    }

    #[test]
    fn test_copy_voice() {
        let mut manager = manager();
        manager.model_mut().load_from_voice(VoiceSource::Codec(&make_brass1())).unwrap();
        manager.replace_voice_in_bank(2).unwrap();

        manager.copy_voice(2, 0).unwrap();
        let bank = manager.current_bank().unwrap();
        assert_eq!(bank.voice(0).unwrap().to_json(), bank.voice(2).unwrap().to_json());
        assert_eq!(manager.model().name, "BRASS   1");
        assert!(manager.copy_voice(0, 40).is_err());
    }

    #[test]
    fn test_replace_rejects_out_of_range_edit() {
        let mut manager = manager();
        manager.model_mut().operators[0].output_level = 120;
        assert!(matches!(manager.replace_voice_in_bank(0), Err(EditorError::Parse(_))));
        assert_eq!(manager.current_bank().unwrap().voice(0), Some(&Voice::init(0)));
    }

    #[test]
    fn test_import_json_voice_leaves_banks() {
        let mut manager = manager();
        let data = serde_json::to_vec(&make_brass1().to_json()).unwrap();
        assert_eq!(manager.import("brass", FileKind::Json, &data).unwrap(), FileImport::Voice);
        assert_eq!(manager.bank_count(), 1);
        assert_eq!(manager.model().name, "BRASS   1");
        assert!(manager.has_pending_changes());
    }

    #[test]
    fn test_import_bad_json() {
        let mut manager = manager();
        assert!(matches!(manager.import("x", FileKind::Json, b"{ nope"), Err(EditorError::Json(_))));
        assert!(matches!(manager.import("x", FileKind::Json, b"[1, 2]"), Err(EditorError::NotAnObject)));
    }

    #[test]
    fn test_file_kind() {
        assert_eq!(FileKind::from_path(Path::new("a.SYX")).unwrap(), FileKind::Syx);
        assert_eq!(FileKind::from_path(Path::new("a.Json")).unwrap(), FileKind::Json);
        let err = FileKind::from_path(Path::new("a.txt")).unwrap_err();
        assert!(err.to_string().starts_with("Unsupported file type"));
    }

    #[test]
    fn test_receive_sysex() {
        let mut manager = manager();
        let msg = make_brass1().to_message(MidiChannel::new(3));
        assert_eq!(manager.receive_sysex(&msg).unwrap(), FileImport::Voice);
        assert_eq!(manager.model().name, "BRASS   1");
        assert_eq!(manager.bank_count(), 1);

        let msg = manager.bank_sysex(0, MidiChannel::new(1)).unwrap();
        assert_eq!(manager.receive_sysex(&msg).unwrap(), FileImport::Bank(1));
        assert_eq!(manager.banks()[1].name, "Bank 2");
        assert_eq!(manager.banks()[1].cartridge(), manager.banks()[0].cartridge());
        assert_eq!(manager.bank_index(), 1);
    }

    #[test]
    fn test_settings() {
        let mut manager = manager();
        assert!(manager.settings().show_adsr);

        let mut partial = Map::new();
        partial.insert("showValueInputs".to_string(), Value::Bool(true));
        manager.update_settings(partial);
        assert!(manager.settings().show_value_inputs);
        assert!(manager.settings().show_adsr);
    }
}
