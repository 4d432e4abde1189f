//! Local file access for the key material and the benchmark report.
//!
//! Paths arrive from the command line as plain strings. Each one is split into
//! a parent directory, opened with ambient authority, and a file name that is
//! then read or written relative to that directory handle.

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};
use thiserror::Error;

use crate::session::{expand_tilde, public_key_path};

/// Errors raised while reading or writing local files.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum FileError {
    /// Raised when a path is empty or only whitespace.
    #[error("{what} path must not be empty")]
    EmptyPath {
        /// Which file the path names.
        what: &'static str,
    },
    /// Raised when the public key file is empty.
    #[error("public key file `{path}` is empty")]
    EmptyKey {
        /// Expanded path of the key file.
        path: String,
    },
    /// Raised when reading a file fails.
    #[error("failed to read `{path}`: {message}")]
    Read {
        /// Expanded path that failed to read.
        path: String,
        /// Underlying error message.
        message: String,
    },
    /// Raised when writing a file fails.
    #[error("failed to write `{path}`: {message}")]
    Write {
        /// Expanded path that failed to write.
        path: String,
        /// Underlying error message.
        message: String,
    },
}

/// Reads the public half of `identity_file` (its `.pub` sibling) and returns
/// it trimmed.
///
/// # Errors
///
/// Returns [`FileError`] when the path is blank, the key cannot be read, or
/// the key file is empty.
pub fn read_public_key(identity_file: &str) -> Result<String, FileError> {
    if identity_file.trim().is_empty() {
        return Err(FileError::EmptyPath { what: "key file" });
    }

    let path = public_key_path(identity_file.trim());
    let content = read_to_string_ambient(&path).map_err(|message| FileError::Read {
        path: path.clone(),
        message,
    })?;
    let key = content.trim();
    if key.is_empty() {
        return Err(FileError::EmptyKey { path });
    }
    Ok(key.to_owned())
}

/// Writes `contents` to `path`, replacing any existing file.
///
/// # Errors
///
/// Returns [`FileError`] when the path is blank or the write fails.
pub fn write_report(path: &str, contents: &str) -> Result<(), FileError> {
    if path.trim().is_empty() {
        return Err(FileError::EmptyPath { what: "output" });
    }

    let expanded = expand_tilde(path.trim());
    let (dir, file_name) = split_ambient(&expanded).map_err(|message| FileError::Write {
        path: expanded.clone(),
        message,
    })?;
    dir.write(file_name, contents)
        .map_err(|err| FileError::Write {
            path: expanded.clone(),
            message: err.to_string(),
        })
}

fn read_to_string_ambient(path: &str) -> Result<String, String> {
    let (dir, file_name) = split_ambient(path)?;
    dir.read_to_string(file_name).map_err(|err| err.to_string())
}

fn split_ambient(path: &str) -> Result<(Dir, &Utf8Path), String> {
    let path_buf = Utf8Path::new(path);
    let file_name = path_buf
        .file_name()
        .map(Utf8Path::new)
        .ok_or_else(|| format!("path has no file name: {path_buf}"))?;
    let dir_path = match path_buf.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };

    let dir =
        Dir::open_ambient_dir(dir_path, ambient_authority()).map_err(|err| err.to_string())?;
    Ok((dir, file_name))
}
