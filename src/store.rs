use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

const TOKEN_FILE: &str = "token";
const AVATAR_FILE: &str = "avatar";

/// Matches the upload cap of the profile screen.
pub const MAX_AVATAR_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not create {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("could not write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("could not remove {path}: {source}")]
    Remove { path: PathBuf, source: io::Error },
    #[error("image must be under 2MB")]
    AvatarTooLarge,
}

/// Persists the bearer token (and the local-only avatar blob) as single
/// files under the platform config directory. The token is opaque to the
/// client; the server is the sole authority on its validity.
pub struct TokenStore {
    dir: PathBuf,
}

impl TokenStore {
    pub fn open() -> Result<TokenStore, StoreError> {
        let dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("nexus-tui");
        let store = TokenStore::at(dir);
        store.ensure_dir()?;
        Ok(store)
    }

    pub fn at(dir: PathBuf) -> TokenStore {
        TokenStore { dir }
    }

    fn ensure_dir(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|e| StoreError::CreateDir {
            path: self.dir.clone(),
            source: e,
        })
    }

    fn token_path(&self) -> PathBuf {
        self.dir.join(TOKEN_FILE)
    }

    fn avatar_path(&self) -> PathBuf {
        self.dir.join(AVATAR_FILE)
    }

    pub fn save(&self, token: &str) -> Result<(), StoreError> {
        self.ensure_dir()?;
        write_file(&self.token_path(), token.as_bytes())
    }

    /// Returns the persisted token, or None if none has been saved.
    /// An unreadable file is treated as absent.
    pub fn read(&self) -> Option<String> {
        match fs::read_to_string(self.token_path()) {
            Ok(text) => {
                let token = text.trim().to_string();
                if token.is_empty() {
                    None
                } else {
                    Some(token)
                }
            }
            Err(err) => {
                if err.kind() != io::ErrorKind::NotFound {
                    warn!(%err, "token file unreadable");
                }
                None
            }
        }
    }

    /// Removing an absent token is not an error. The avatar is left in
    /// place; it is cosmetic local state, not part of the session.
    pub fn clear(&self) -> Result<(), StoreError> {
        remove_file(&self.token_path())
    }

    pub fn save_avatar(&self, bytes: &[u8]) -> Result<(), StoreError> {
        if bytes.len() > MAX_AVATAR_BYTES {
            return Err(StoreError::AvatarTooLarge);
        }
        self.ensure_dir()?;
        write_file(&self.avatar_path(), bytes)
    }

    pub fn read_avatar(&self) -> Option<Vec<u8>> {
        fs::read(self.avatar_path()).ok()
    }

    pub fn clear_avatar(&self) -> Result<(), StoreError> {
        remove_file(&self.avatar_path())
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    fs::write(path, bytes).map_err(|e| StoreError::Write {
        path: path.to_path_buf(),
        source: e,
    })
}

fn remove_file(path: &Path) -> Result<(), StoreError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(StoreError::Remove {
            path: path.to_path_buf(),
            source: err,
        }),
    }
}
