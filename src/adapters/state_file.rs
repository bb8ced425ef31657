//! JSON record files with atomic replacement.
//!
//! Used for the soundcard state, the configuration file and the factory
//! results record.  Writes go to a randomly named temp file in the same
//! directory which is then renamed over the target, so a reader never sees
//! a half-written record.

use std::fs;
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;

use crate::error::{Error, Result};

pub struct JsonStateFile {
    path: PathBuf,
}

impl JsonStateFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` if the file does not exist; a file that exists but cannot
    /// be read or parsed is [`Error::PersistenceDegraded`].
    pub fn load<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::PersistenceDegraded(format!(
                    "{}: {}",
                    self.path.display(),
                    e
                )));
            }
        };
        serde_json::from_slice(&bytes).map(Some).map_err(|e| {
            Error::PersistenceDegraded(format!("{}: {}", self.path.display(), e))
        })
    }

    pub fn store<T: Serialize>(&self, value: &T) -> Result<()> {
        let json = serde_json::to_vec(value)
            .map_err(|e| Error::PersistenceDegraded(format!("encode: {e}")))?;
        write_atomic(&self.path, &json, 0o644)
    }
}

/// Replace `path` with `contents`, creating parent directories as needed.
///
/// The temp file gets a random name in the target directory and is created
/// with `O_EXCL`, so a planted file or symlink next to the target is never
/// opened.
pub fn write_atomic(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut temp = NamedTempFile::new_in(dir)?;
    temp.as_file().set_permissions(fs::Permissions::from_mode(mode))?;
    temp.write_all(contents)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}
