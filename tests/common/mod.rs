use std::fs;
use std::path::PathBuf;

use dx7_editor::editor::{BankManager, MemoryStore};

/// Opens a manager on an empty in-memory store.
pub fn fresh_manager() -> BankManager<MemoryStore> {
    let _ = env_logger::try_init();
    BankManager::open(MemoryStore::new())
}

/// Makes an empty scratch directory unique to `name` and this process.
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("dx7-editor-{}-{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}
