use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use lantern_engine::savegame::{
    list_sections, read_thumbnail, verify_digest, SaveHeader, SectionInfo, Tag,
    SAVE_MAJOR_VERSION, SAVE_MINOR_VERSION,
};

pub enum CommandKind {
    Info { path: PathBuf },
    Verify { path: PathBuf },
    Thumbnail { path: PathBuf, output: PathBuf },
}

pub fn run<W: Write>(kind: CommandKind, stdout: &mut W) -> Result<(), String> {
    match kind {
        CommandKind::Info { path } => {
            let bytes = read_save(&path)?;
            let (header, sections) = list_sections(&bytes)
                .map_err(|error| format!("'{}' is not a readable save: {error}", path.display()))?;
            emit(stdout, &describe_header(header))?;
            for line in describe_sections(&sections) {
                emit(stdout, &line)?;
            }
            Ok(())
        }
        CommandKind::Verify { path } => {
            let bytes = read_save(&path)?;
            let (header, sections) = list_sections(&bytes)
                .map_err(|error| format!("'{}' has broken framing: {error}", path.display()))?;
            if !header.is_compatible() {
                return Err(format!(
                    "'{}' was written as version {}.{}; this build reads {}.0 through {}.{}",
                    path.display(),
                    header.major,
                    header.minor,
                    SAVE_MAJOR_VERSION,
                    SAVE_MAJOR_VERSION,
                    SAVE_MINOR_VERSION
                ));
            }
            verify_digest(&bytes)
                .map_err(|error| format!("'{}' failed verification: {error}", path.display()))?;
            emit(
                stdout,
                &format!(
                    "ok: {} sections, version {}.{}",
                    sections.len(),
                    header.major,
                    header.minor
                ),
            )
        }
        CommandKind::Thumbnail { path, output } => {
            let bytes = read_save(&path)?;
            let thumbnail = read_thumbnail(&bytes)
                .map_err(|error| format!("'{}' has no usable thumbnail: {error}", path.display()))?;
            thumbnail.save_png(&output).map_err(|error| error.to_string())?;
            emit(
                stdout,
                &format!(
                    "wrote {}x{} thumbnail to {}",
                    thumbnail.width(),
                    thumbnail.height(),
                    output.display()
                ),
            )
        }
    }
}

fn read_save(path: &Path) -> Result<Vec<u8>, String> {
    fs::read(path).map_err(|error| format!("failed to read save file '{}': {error}", path.display()))
}

fn emit<W: Write>(stdout: &mut W, line: &str) -> Result<(), String> {
    writeln!(stdout, "{line}").map_err(|error| format!("failed to write output: {error}"))
}

pub fn describe_header(header: SaveHeader) -> String {
    let compatibility = if header.is_compatible() {
        "compatible"
    } else {
        "incompatible"
    };
    format!(
        "version {}.{} ({compatibility})",
        header.major, header.minor
    )
}

/// One line per section: tag, byte offset and payload size.
pub fn describe_sections(sections: &[SectionInfo]) -> Vec<String> {
    sections
        .iter()
        .map(|section| {
            let note = if section.tag == Tag::DIGEST {
                "  sha256"
            } else {
                ""
            };
            format!(
                "{:<4}  @{:<8}  {:>8} bytes{note}",
                section.tag.to_string(),
                section.offset,
                section.payload_len
            )
        })
        .collect()
}
