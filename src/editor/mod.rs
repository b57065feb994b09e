//! The editing state layer: the voice being edited, the bank collection
//! and the persisted document they live in.

use std::fmt;
use std::io;

use crate::ParseError;

pub mod model;
pub mod storage;
pub mod bank;

pub use model::{VoiceModel, VoiceSource};
pub use storage::{KeyValueStore, FileStore, MemoryStore, Storage, Settings};
pub use bank::{Bank, BankManager, FileImport, FileKind, OnPending};

/// Errors reported by the editor layer.
#[derive(Debug)]
pub enum EditorError {
    IndexOutOfRange { what: &'static str, index: usize, count: usize },
    LastBank,
    NoBankLoaded,
    PendingChanges,
    NotAnObject,
    UnsupportedFileType(String),
    Parse(ParseError),
    Json(serde_json::Error),
    Io(io::Error),
}

impl fmt::Display for EditorError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EditorError::IndexOutOfRange { what, index, count } =>
                write!(f, "Invalid {} index {}, expected 0...{}", what, index, count.saturating_sub(1)),
            EditorError::LastBank => write!(f, "Cannot delete the last bank"),
            EditorError::NoBankLoaded => write!(f, "No bank loaded"),
            EditorError::PendingChanges => write!(f, "The current voice has unsaved changes"),
            EditorError::NotAnObject => write!(f, "Voice data must be a JSON object"),
            EditorError::UnsupportedFileType(extension) =>
                write!(f, "Unsupported file type: '{}' (expected .syx or .json)", extension),
            EditorError::Parse(e) => write!(f, "{}", e),
            EditorError::Json(e) => write!(f, "Invalid JSON: {}", e),
            EditorError::Io(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for EditorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EditorError::Parse(e) => Some(e),
            EditorError::Json(e) => Some(e),
            EditorError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ParseError> for EditorError {
    fn from(e: ParseError) -> Self {
        EditorError::Parse(e)
    }
}

impl From<serde_json::Error> for EditorError {
    fn from(e: serde_json::Error) -> Self {
        EditorError::Json(e)
    }
}

impl From<io::Error> for EditorError {
    fn from(e: io::Error) -> Self {
        EditorError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(EditorError::LastBank.to_string(), "Cannot delete the last bank");
        assert_eq!(
            EditorError::UnsupportedFileType(".txt".to_string()).to_string(),
            "Unsupported file type: '.txt' (expected .syx or .json)");
        assert_eq!(
            EditorError::IndexOutOfRange { what: "voice", index: 32, count: 32 }.to_string(),
            "Invalid voice index 32, expected 0...31");
    }
}
