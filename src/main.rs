use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::{Map, Value};

use dx7_editor::editor::{BankManager, EditorError, FileImport, FileStore, KeyValueStore, OnPending};

/// Environment variable naming the store directory.
const HOME_VARIABLE: &str = "DX7EDIT_HOME";

const DEFAULT_STORE_DIR: &str = ".dx7edit";

/// Edit banks of Yamaha DX7 voices
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory for the stored banks and settings
    #[arg(long)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the banks
    Banks,
    /// List the voices in a bank
    Voices {
        /// Bank number (0-indexed), the current bank if omitted
        bank: Option<usize>,
    },
    /// Show the parameters of a voice
    Show {
        /// Bank number (0-indexed)
        bank: usize,

        /// Voice number (0-indexed)
        voice: usize,

        /// Print the voice as JSON
        #[arg(long)]
        json: bool,
    },
    /// Import a bank or a voice from a .syx or .json file
    Import {
        file: PathBuf,

        /// Slot of the current bank that receives a single voice (0-indexed)
        #[arg(long, default_value_t = 0)]
        slot: usize,
    },
    /// Export a bank to a .syx or .json file
    ExportBank {
        bank: usize,
        file: PathBuf,
    },
    /// Export a voice to a .syx or .json file
    ExportVoice {
        bank: usize,
        voice: usize,
        file: PathBuf,
    },
    /// Rename a bank
    RenameBank {
        bank: usize,
        name: String,
    },
    /// Delete a bank
    DeleteBank {
        bank: usize,
    },
    /// Replace all banks with a single init bank
    Reset,
    /// Reset a voice to the init voice
    InitVoice {
        bank: usize,
        voice: usize,
    },
    /// Copy a voice over another voice in the same bank
    CopyVoice {
        bank: usize,
        from: usize,
        to: usize,
    },
    /// Rename a voice
    RenameVoice {
        bank: usize,
        voice: usize,
        name: String,
    },
    /// Show the display settings, or change them with KEY=VALUE pairs
    Settings {
        pairs: Vec<String>,
    },
}

fn store_dir(arg: Option<PathBuf>) -> PathBuf {
    arg.or_else(|| std::env::var_os(HOME_VARIABLE).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_DIR))
}

// Values that parse as JSON are taken as such, anything else as a string.
fn parse_setting(pair: &str) -> Result<(String, Value), String> {
    let (key, value) = pair.split_once('=')
        .ok_or_else(|| format!("Expected KEY=VALUE, got '{}'", pair))?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.trim().to_string(), value))
}

fn select(manager: &mut BankManager<FileStore>, bank: usize, voice: usize) -> Result<(), EditorError> {
    manager.switch_bank(bank, OnPending::Discard)?;
    manager.load_from_voice_index(voice, OnPending::Discard)
}

// Stores the voice loaded into the editor in `slot` of the current bank.
// Returns the name of the voice it replaced.
fn store_imported_voice<S: KeyValueStore>(manager: &mut BankManager<S>, slot: usize) -> Result<String, EditorError> {
    let replaced = manager.current_bank()
        .and_then(|b| b.voice(slot))
        .map(|v| v.name.clone())
        .unwrap_or_default();
    manager.replace_voice_in_bank(slot)?;
    Ok(replaced)
}

fn run(args: Args) -> Result<(), EditorError> {
    let dir = store_dir(args.store);
    log::debug!("Using store in {}", dir.display());
    let mut manager = BankManager::open(FileStore::new(&dir));

    match args.command {
        Commands::Banks => {
            for (i, bank) in manager.banks().iter().enumerate() {
                let marker = if i == manager.bank_index() { "*" } else { " " };
                println!("{}{}: {}", marker, i, bank.name);
            }
        }
        Commands::Voices { bank } => {
            let bank = bank.unwrap_or(manager.bank_index());
            manager.switch_bank(bank, OnPending::Discard)?;
            if let Some(bank) = manager.current_bank() {
                for (i, voice) in bank.voices().iter().enumerate() {
                    println!("{}: {}", i, voice.name);
                }
            }
        }
        Commands::Show { bank, voice, json } => {
            select(&mut manager, bank, voice)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&manager.model().to_json())?);
            }
            else if let Some(voice) = manager.current_bank().and_then(|b| b.voice(voice)) {
                println!("{}", voice);
            }
        }
        Commands::Import { file, slot } => {
            match manager.load_from_file(&file)? {
                FileImport::Bank(index) => {
                    println!("Added bank {}: {}", index, manager.banks()[index].name);
                }
                FileImport::Voice => {
                    let replaced = store_imported_voice(&mut manager, slot)?;
                    eprintln!("Warning: replacing voice '{}' in slot {}", replaced, slot);
                    println!("Imported voice '{}' into slot {} of bank {}",
                        manager.model().name, slot, manager.bank_index());
                }
            }
        }
        Commands::ExportBank { bank, file } => {
            manager.export_bank(bank, &file)?;
        }
        Commands::ExportVoice { bank, voice, file } => {
            select(&mut manager, bank, voice)?;
            manager.export_voice(&file)?;
        }
        Commands::RenameBank { bank, name } => {
            if bank >= manager.bank_count() {
                eprintln!("No bank {}", bank);
            }
            manager.rename_bank(bank, &name);
        }
        Commands::DeleteBank { bank } => {
            manager.delete_bank(bank)?;
        }
        Commands::Reset => {
            manager.reset_banks();
        }
        Commands::InitVoice { bank, voice } => {
            manager.switch_bank(bank, OnPending::Discard)?;
            manager.init_voice(voice)?;
        }
        Commands::CopyVoice { bank, from, to } => {
            manager.switch_bank(bank, OnPending::Discard)?;
            manager.copy_voice(from, to)?;
        }
        Commands::RenameVoice { bank, voice, name } => {
            manager.switch_bank(bank, OnPending::Discard)?;
            manager.rename_voice(voice, &name)?;
        }
        Commands::Settings { pairs } => {
            let settings = if pairs.is_empty() {
                manager.settings()
            }
            else {
                let mut partial = Map::new();
                for pair in &pairs {
                    match parse_setting(pair) {
                        Ok((key, value)) => {
                            partial.insert(key, value);
                        }
                        Err(message) => {
                            eprintln!("Error: {}", message);
                            std::process::exit(1);
                        }
                    }
                }
                manager.update_settings(partial)
            };
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
    }

    Ok(())
}

fn main() {
    env_logger::init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
