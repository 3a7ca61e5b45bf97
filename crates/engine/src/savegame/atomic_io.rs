use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Writes to a staging file beside `path`, then renames it into place.
pub(crate) fn write_save_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let staging = staging_path_for(path);
    if let Err(error) = fs::write(&staging, bytes) {
        let _ = fs::remove_file(&staging);
        return Err(error);
    }

    match fs::remove_file(path) {
        Ok(()) => {}
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(error) => {
            let _ = fs::remove_file(&staging);
            return Err(error);
        }
    }
    fs::rename(&staging, path).inspect_err(|_| {
        let _ = fs::remove_file(&staging);
    })
}

fn staging_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("savegame");
    path.with_file_name(format!("{file_name}.partial"))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn replaces_existing_save_and_leaves_no_staging_file() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("saves").join("grim01.gsv");
        write_save_atomic(&path, b"first").expect("first write");
        write_save_atomic(&path, b"second").expect("second write");

        assert_eq!(fs::read(&path).expect("read"), b"second");
        assert!(!staging_path_for(&path).exists());
    }
}
