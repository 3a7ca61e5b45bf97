mod atomic_io;
mod format;
mod storage;
mod thumbnail;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::world::PoolKind;

pub use format::{
    list_sections, verify_digest, SaveHeader, SaveReader, SaveWriter, SectionInfo, Tag, MAGIC,
    SAVE_MAJOR_VERSION, SAVE_MINOR_VERSION,
};
pub use storage::{
    resolve_save_name, slot_file_name, SaveStorage, SaveTarget, DEFAULT_SAVE_NAME,
    DEVICE_RESET_SLOT,
};
pub use thumbnail::{read_thumbnail, Thumbnail, THUMBNAIL_HEIGHT, THUMBNAIL_WIDTH};

/// Minor version that introduced the movie setup name in the engine section.
pub const MINOR_MOVIE_SETUP: u16 = 5;
/// Minor version that introduced the movie subtitle identity.
pub const MINOR_MOVIE_SUBTITLE: u16 = 6;
/// Minor version that introduced the text speed.
pub const MINOR_TEXT_SPEED: u16 = 7;

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("failed to read/write save file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("save stream has invalid format: {0}")]
    InvalidFormat(String),
    #[error("save stream version {major}.{minor} is not compatible with this build")]
    IncompatibleVersion { major: u16, minor: u16 },
    #[error("expected save section {expected}, found {found}")]
    UnexpectedSection { expected: Tag, found: Tag },
    #[error("{owner} record references missing {kind} {id}")]
    DanglingReference {
        owner: PoolKind,
        kind: PoolKind,
        id: u32,
    },
    #[error("engine field {field} references missing {kind} {id}")]
    DanglingEngineReference {
        field: &'static str,
        kind: PoolKind,
        id: u32,
    },
    #[error("save stream digest does not match its contents")]
    DigestMismatch,
    #[error("in-memory save slot {0:?} is empty")]
    MissingSlot(String),
    #[error("failed to export thumbnail to {path}: {source}")]
    ThumbnailExport {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

impl SaveError {
    pub(crate) fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat(message.into())
    }

    /// Structural damage in a stream that passed the compatibility check.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::InvalidFormat(_)
                | Self::UnexpectedSection { .. }
                | Self::DanglingReference { .. }
                | Self::DanglingEngineReference { .. }
                | Self::DigestMismatch
        )
    }
}
