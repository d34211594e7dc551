//! Temporary script files handed to `--runscript`.
//!
//! The CODESYS script reader is byte-oriented, so script bodies are written
//! as Latin-1 (one byte per character) with `\n` line endings rather than as
//! UTF-8. Each file gets a collision-resistant name built from the current
//! timestamp and a short random token, and is created with `create_new` so
//! two concurrent invocations can never share a path.

use std::io;
use std::path::{Path, PathBuf};

use rand::Rng;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// File name prefix for materialized scripts.
pub const SCRIPT_FILE_PREFIX: &str = "codesys_script_";

/// File extension for materialized scripts.
pub const SCRIPT_FILE_EXTENSION: &str = "py";

/// Length of the random token appended to each file name.
const TOKEN_LENGTH: usize = 7;

/// How many fresh names to try before giving up on `AlreadyExists`.
const MAX_NAME_ATTEMPTS: usize = 8;

/// Byte written in place of characters outside the Latin-1 range.
const UNMAPPABLE_BYTE: u8 = b'?';

/// Writes script bodies to uniquely named files in a fixed directory.
#[derive(Debug, Clone)]
pub struct ScriptMaterializer {
    dir: PathBuf,
}

impl ScriptMaterializer {
    /// Materialize scripts under `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Materialize scripts under the OS temporary directory.
    pub fn in_temp_dir() -> Self {
        Self::new(std::env::temp_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Generate a candidate path: `codesys_script_<millis>_<token>.py`.
    pub fn unique_path(&self) -> PathBuf {
        let millis = chrono::Utc::now().timestamp_millis();
        let token: String = rand::rng()
            .sample_iter(&rand::distr::Alphanumeric)
            .take(TOKEN_LENGTH)
            .map(|b| char::from(b).to_ascii_lowercase())
            .collect();
        self.dir.join(format!(
            "{SCRIPT_FILE_PREFIX}{millis}_{token}.{SCRIPT_FILE_EXTENSION}"
        ))
    }

    /// Write `text` to a fresh file and return a guard owning that file.
    ///
    /// Line endings are normalized and the body is Latin-1 encoded before
    /// writing. A partially written file is removed before the error is
    /// returned.
    pub async fn materialize(&self, text: &str) -> io::Result<MaterializedScript> {
        let text = normalize_line_endings(text);
        let replaced = count_unmappable(&text);
        if replaced > 0 {
            tracing::warn!(replaced, "Script has characters outside Latin-1; written as '?'");
        }
        let bytes = encode_latin1(&text);

        let mut last_err = None;
        for _ in 0..MAX_NAME_ATTEMPTS {
            let path = self.unique_path();
            let file = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;

            let mut file = match file {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    last_err = Some(e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            // From here on the guard owns the path and removes it on drop.
            let script = MaterializedScript::new(path);
            let written = match file.write_all(&bytes).await {
                Ok(()) => file.flush().await,
                Err(e) => Err(e),
            };
            // Close the handle before the guard can try to delete the file.
            drop(file);
            written?;

            tracing::debug!(
                path = %script.path().display(),
                bytes = bytes.len(),
                "Temp script written",
            );
            return Ok(script);
        }

        Err(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::AlreadyExists, "no unique script name")
        }))
    }
}

/// A script file on disk, deleted when released or dropped.
#[derive(Debug)]
pub struct MaterializedScript {
    path: PathBuf,
    released: bool,
}

impl MaterializedScript {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            released: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file. See [`release_path`] for the error contract.
    pub async fn release(mut self) -> Result<(), String> {
        self.released = true;
        release_path(&self.path).await
    }
}

impl Drop for MaterializedScript {
    fn drop(&mut self) {
        if !self.released {
            // Only reached on early return or cancellation; release() is the
            // normal path.
            if let Err(e) = std::fs::remove_file(&self.path) {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(
                        path = %self.path.display(),
                        error = %e,
                        "Failed to delete temp script on drop",
                    );
                }
            }
        }
    }
}

/// Delete a materialized script.
///
/// Idempotent: a missing file counts as already released. Any other I/O
/// error is returned as a warning message for the caller to surface; it never
/// changes an invocation's verdict.
pub async fn release_path(path: &Path) -> Result<(), String> {
    match fs::remove_file(path).await {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "Temp script deleted");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to delete temp script");
            Err(e.to_string())
        }
    }
}

/// Convert every `\r\n` to `\n`. Lone `\r` characters are left alone.
pub fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n")
}

/// Encode `text` one byte per character.
///
/// Characters up to U+00FF map to their code point; anything wider becomes
/// `?` rather than a multi-byte sequence the script reader would misparse.
pub fn encode_latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(UNMAPPABLE_BYTE))
        .collect()
}

/// Number of characters [`encode_latin1`] would replace.
pub fn count_unmappable(text: &str) -> usize {
    text.chars().filter(|c| u32::from(*c) > 0xFF).count()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
