//! Persistence of the pass state between Apriori passes.
//!
//! The state is saved after every pass and loaded before the next one, so
//! each pass starts from what is on the store rather than from memory.
//!
//! # Format
//!
//! [`PostcardCodec`] writes a versioned envelope:
//!
//! - `magic`: the four bytes `IBPS`
//! - `version`: [`FORMAT_VERSION`]
//! - `checksum`: hex SHA-256 of `payload`
//! - `payload`: the postcard encoding of [`PassState`]
//!
//! Decoding checks all three header fields before touching the payload.
//!
//! ```no_run
//! use ironbasket::checkpoint::{FileStateStore, StateStore};
//! use ironbasket::state::PassState;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), ironbasket::MiningError> {
//! let store = FileStateStore::new();
//! let path = Path::new("out/_state/pass-state.bin");
//! store.save(path, &PassState::new(5, 2))?;
//! let back = store.load(path)?;
//! assert_eq!(back.current_pass, 1);
//! # Ok(())
//! # }
//! ```

use crate::error::{MiningError, MiningResult};
use crate::state::PassState;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::{File, create_dir_all, rename};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::trace;

/// Envelope magic.
pub const MAGIC: [u8; 4] = *b"IBPS";
/// Current envelope version.
pub const FORMAT_VERSION: u16 = 1;

/// Turns a [`PassState`] into bytes and back.
pub trait StateCodec: Send + Sync {
    /// # Errors
    ///
    /// Serialization failures.
    fn encode(&self, state: &PassState) -> Result<Vec<u8>>;

    /// # Errors
    ///
    /// Corrupt, truncated or foreign input.
    fn decode(&self, bytes: &[u8]) -> Result<PassState>;
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    magic: [u8; 4],
    version: u16,
    checksum: String,
    payload: Vec<u8>,
}

/// Postcard payload inside a checksummed envelope.
#[derive(Clone, Copy, Debug, Default)]
pub struct PostcardCodec;

impl StateCodec for PostcardCodec {
    fn encode(&self, state: &PassState) -> Result<Vec<u8>> {
        let payload = postcard::to_allocvec(state).context("Failed to serialize pass state")?;
        let envelope = Envelope {
            magic: MAGIC,
            version: FORMAT_VERSION,
            checksum: compute_checksum(&payload),
            payload,
        };
        postcard::to_allocvec(&envelope).context("Failed to serialize state envelope")
    }

    fn decode(&self, bytes: &[u8]) -> Result<PassState> {
        let envelope: Envelope =
            postcard::from_bytes(bytes).context("Failed to deserialize state envelope")?;
        if envelope.magic != MAGIC {
            bail!("not a pass state file (bad magic {:?})", envelope.magic);
        }
        if envelope.version != FORMAT_VERSION {
            bail!(
                "unsupported pass state version {} (expected {FORMAT_VERSION})",
                envelope.version
            );
        }
        if compute_checksum(&envelope.payload) != envelope.checksum {
            bail!("Pass state integrity check failed: checksum mismatch");
        }
        postcard::from_bytes(&envelope.payload).context("Failed to deserialize pass state")
    }
}

/// Compute SHA-256 checksum of data.
#[must_use]
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Where pass state lives between passes.
pub trait StateStore: Send + Sync {
    /// # Errors
    ///
    /// [`MiningError::StatePersistence`] when the state cannot be written.
    fn save(&self, path: &Path, state: &PassState) -> MiningResult<()>;

    /// # Errors
    ///
    /// [`MiningError::StatePersistence`] when the state is missing or invalid.
    fn load(&self, path: &Path) -> MiningResult<PassState>;
}

/// File-backed store. Writes go to a sibling temp file that is then renamed
/// over the target, so a crash never leaves a half-written state behind.
#[derive(Clone, Debug, Default)]
pub struct FileStateStore<C = PostcardCodec> {
    codec: C,
}

impl FileStateStore<PostcardCodec> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C: StateCodec> FileStateStore<C> {
    pub fn with_codec(codec: C) -> Self {
        Self { codec }
    }

    fn write(&self, path: &Path, state: &PassState) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            create_dir_all(parent).context("Failed to create state directory")?;
        }
        let encoded = self.codec.encode(state)?;
        let tmp = temp_path(path);
        let mut file = File::create(&tmp).context("Failed to create temporary state file")?;
        file.write_all(&encoded).context("Failed to write pass state")?;
        file.sync_all().context("Failed to sync pass state to disk")?;
        rename(&tmp, path).context("Failed to move pass state into place")?;
        Ok(())
    }

    fn read(&self, path: &Path) -> Result<PassState> {
        let mut file = File::open(path).context("Failed to open pass state file")?;
        let mut encoded = Vec::new();
        file.read_to_end(&mut encoded)
            .context("Failed to read pass state")?;
        self.codec.decode(&encoded)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

impl<C: StateCodec> StateStore for FileStateStore<C> {
    fn save(&self, path: &Path, state: &PassState) -> MiningResult<()> {
        self.write(path, state)
            .map_err(|e| MiningError::state(path, e))?;
        trace!(path = %path.display(), pass = state.current_pass, "saved pass state");
        Ok(())
    }

    fn load(&self, path: &Path) -> MiningResult<PassState> {
        self.read(path).map_err(|e| MiningError::state(path, e))
    }
}

/// In-process store keyed by path. Still goes through the codec, so it
/// exercises the same encoding as the file store.
#[derive(Debug, Default)]
pub struct MemoryStateStore<C = PostcardCodec> {
    codec: C,
    slots: Mutex<HashMap<PathBuf, Vec<u8>>>,
}

impl MemoryStateStore<PostcardCodec> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C: StateCodec> MemoryStateStore<C> {
    /// Raw encoded bytes at `path`, if any.
    #[must_use]
    pub fn raw(&self, path: &Path) -> Option<Vec<u8>> {
        self.slots.lock().ok()?.get(path).cloned()
    }

    /// Replace the raw bytes at `path`.
    pub fn put_raw(&self, path: &Path, bytes: Vec<u8>) {
        if let Ok(mut slots) = self.slots.lock() {
            slots.insert(path.to_path_buf(), bytes);
        }
    }
}

impl<C: StateCodec> StateStore for MemoryStateStore<C> {
    fn save(&self, path: &Path, state: &PassState) -> MiningResult<()> {
        let encoded = self
            .codec
            .encode(state)
            .map_err(|e| MiningError::state(path, e))?;
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| MiningError::state(path, anyhow::anyhow!("state store lock poisoned")))?;
        slots.insert(path.to_path_buf(), encoded);
        Ok(())
    }

    fn load(&self, path: &Path) -> MiningResult<PassState> {
        let bytes = self
            .raw(path)
            .ok_or_else(|| MiningError::state(path, anyhow::anyhow!("no pass state saved")))?;
        self.codec
            .decode(&bytes)
            .map_err(|e| MiningError::state(path, e))
    }
}
