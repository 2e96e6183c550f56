//! Local file access through capability-scoped directories.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use thiserror::Error;

/// Errors raised while touching local files.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum FileError {
    /// The path has no file name component.
    #[error("path has no file name: {path}")]
    MissingFileName {
        /// Offending path.
        path: Utf8PathBuf,
    },
    /// An I/O call failed.
    #[error("I/O error for {path}: {message}")]
    Io {
        /// Path involved.
        path: Utf8PathBuf,
        /// Operating system message.
        message: String,
    },
}

fn split(path: &Utf8Path) -> Result<(&Utf8Path, &str), FileError> {
    let file_name = path.file_name().ok_or_else(|| FileError::MissingFileName {
        path: path.to_path_buf(),
    })?;
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    Ok((parent, file_name))
}

fn io_error(path: &Utf8Path, err: &io::Error) -> FileError {
    FileError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

fn open_dir(path: &Utf8Path) -> Result<Dir, FileError> {
    Dir::open_ambient_dir(path, ambient_authority()).map_err(|err| io_error(path, &err))
}

/// Reads a whole file as bytes.
///
/// # Errors
///
/// Returns [`FileError`] when the file cannot be opened or read.
pub fn read_bytes(path: &Utf8Path) -> Result<Vec<u8>, FileError> {
    let (parent, file_name) = split(path)?;
    open_dir(parent)?
        .read(file_name)
        .map_err(|err| io_error(path, &err))
}

/// Reads a whole UTF-8 file.
///
/// # Errors
///
/// Returns [`FileError`] when the file cannot be opened or is not UTF-8.
pub fn read_to_string(path: &Utf8Path) -> Result<String, FileError> {
    let (parent, file_name) = split(path)?;
    open_dir(parent)?
        .read_to_string(file_name)
        .map_err(|err| io_error(path, &err))
}

/// Writes `contents` to `dir/file_name`, creating `dir` when missing.
///
/// # Errors
///
/// Returns [`FileError`] when the directory or file cannot be written.
pub fn write_into(dir: &Utf8Path, file_name: &str, contents: &[u8]) -> Result<Utf8PathBuf, FileError> {
    Dir::create_ambient_dir_all(dir, ambient_authority()).map_err(|err| io_error(dir, &err))?;
    let target = dir.join(file_name);
    open_dir(dir)?
        .write(file_name, contents)
        .map_err(|err| io_error(&target, &err))?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root() -> (tempfile::TempDir, Utf8PathBuf) {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8 path");
        (temp, root)
    }

    #[test]
    fn written_files_read_back() {
        let (_temp, root) = temp_root();
        let nested = root.join("out/nested");
        let written = write_into(&nested, "montage.jpg", b"jpeg").expect("write");
        assert_eq!(written, nested.join("montage.jpg"));
        assert_eq!(read_bytes(&written).expect("read"), b"jpeg");
        assert_eq!(read_to_string(&written).expect("read"), "jpeg");
    }

    #[test]
    fn missing_files_report_their_path() {
        let (_temp, root) = temp_root();
        let missing = root.join("absent.txt");
        let err = read_bytes(&missing).expect_err("missing file");
        assert!(matches!(err, FileError::Io { path, .. } if path == missing));
    }

    #[test]
    fn bare_directories_are_rejected() {
        let err = read_bytes(Utf8Path::new("/")).expect_err("no file name");
        assert!(matches!(err, FileError::MissingFileName { .. }));
    }
}
