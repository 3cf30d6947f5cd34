//! Entity storage: part bodies buffered in memory or spooled to temporary files.

use std::{
    fs::File,
    io::{self, BufReader, Cursor, Read},
    path::Path,
};

use bytes::Bytes;

use crate::StorageError;

/// In-memory body buffer.
pub(crate) mod memory;
/// Spool file naming and lifecycle.
pub mod spool;

use memory::MemoryBuffer;
use spool::SpoolFile;
pub use spool::SpoolPolicy;

#[derive(Debug)]
enum Backing {
    Memory(MemoryBuffer),
    Spooled(SpoolFile),
    Released,
}

/// Storage backing one part body, exclusively owned by its [`crate::Part`].
///
/// Bytes accumulate in memory until the spool threshold is crossed; from then on
/// the body lives in a uniquely named file. The switch happens once and is never
/// reversed. Spool files are only deleted by [`Entity::release`].
#[derive(Debug)]
pub struct Entity {
    backing: Backing,
    len: u64,
}

impl Default for Entity {
    fn default() -> Self {
        Self::new()
    }
}

impl Entity {
    /// Creates an empty in-memory entity.
    pub fn new() -> Self {
        Self {
            backing: Backing::Memory(MemoryBuffer::default()),
            len: 0,
        }
    }

    /// Creates an entity holding `data` in memory.
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            len: data.len() as u64,
            backing: Backing::Memory(MemoryBuffer::Sealed(data)),
        }
    }

    /// Appends body bytes, spooling to disk once `policy` says the body is too large.
    pub fn append(&mut self, data: &[u8], policy: &SpoolPolicy) -> Result<(), StorageError> {
        if data.is_empty() {
            return Ok(());
        }

        let next_len = self.len.saturating_add(data.len() as u64);
        match &mut self.backing {
            Backing::Memory(buffer) if policy.exceeds_threshold(next_len) => {
                let mut spool = SpoolFile::create(policy)?;
                let spilled = spool
                    .append(buffer.as_slice())
                    .and_then(|()| spool.append(data));
                if let Err(err) = spilled {
                    let _ = spool.remove();
                    return Err(err);
                }
                self.backing = Backing::Spooled(spool);
            }
            Backing::Memory(buffer) => buffer.append(data),
            Backing::Spooled(spool) => spool.append(data)?,
            Backing::Released => {
                return Err(StorageError::new("cannot write to a released entity"));
            }
        }

        self.len = next_len;
        Ok(())
    }

    /// Flushes pending writes; called once the owning part is complete.
    pub fn seal(&mut self) -> Result<(), StorageError> {
        match &mut self.backing {
            Backing::Memory(buffer) => {
                buffer.seal();
                Ok(())
            }
            Backing::Spooled(spool) => spool.seal(),
            Backing::Released => Ok(()),
        }
    }

    /// Returns the body size in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Returns `true` when the body is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns `true` when the body lives in a file.
    pub fn is_spooled(&self) -> bool {
        matches!(self.backing, Backing::Spooled(_))
    }

    /// Returns `true` after [`Entity::release`].
    pub fn is_released(&self) -> bool {
        matches!(self.backing, Backing::Released)
    }

    /// Returns the backing file path for spooled or moved entities.
    pub fn path(&self) -> Option<&Path> {
        match &self.backing {
            Backing::Spooled(spool) => Some(spool.path()),
            _ => None,
        }
    }

    /// Opens a fresh reader over the whole body. May be called repeatedly.
    pub fn read(&self) -> Result<EntityReader, StorageError> {
        match &self.backing {
            Backing::Memory(buffer) => Ok(EntityReader {
                inner: ReaderInner::Memory(Cursor::new(buffer.bytes())),
            }),
            Backing::Spooled(spool) => Ok(EntityReader {
                inner: ReaderInner::File(BufReader::new(spool.open()?)),
            }),
            Backing::Released => Err(StorageError::new("entity storage was already released")),
        }
    }

    /// Reads the whole body into memory.
    pub fn to_bytes(&self) -> Result<Bytes, StorageError> {
        if let Backing::Memory(buffer) = &self.backing {
            return Ok(buffer.bytes());
        }

        let mut out = Vec::with_capacity(usize::try_from(self.len).unwrap_or(0));
        self.read()?
            .read_to_end(&mut out)
            .map_err(|err| StorageError::new(format!("failed to read spooled entity: {err}")))?;
        Ok(Bytes::from(out))
    }

    /// Moves the body to `destination`.
    ///
    /// Spooled bodies are renamed; in-memory bodies are written out. Afterwards the
    /// entity reads from `destination` (or memory) and `release` leaves the file alone.
    pub fn move_to(&mut self, destination: impl AsRef<Path>) -> Result<(), StorageError> {
        let destination = destination.as_ref();
        match &mut self.backing {
            Backing::Memory(buffer) => buffer.write_to(destination),
            Backing::Spooled(spool) => spool.move_to(destination),
            Backing::Released => Err(StorageError::new("entity storage was already released")),
        }
    }

    /// Drops buffered bytes and deletes the spool file, if any.
    pub fn release(&mut self) -> Result<(), StorageError> {
        let backing = std::mem::replace(&mut self.backing, Backing::Released);
        match backing {
            Backing::Spooled(mut spool) => spool.remove(),
            Backing::Memory(_) | Backing::Released => Ok(()),
        }
    }
}

#[derive(Debug)]
enum ReaderInner {
    Memory(Cursor<Bytes>),
    File(BufReader<File>),
}

/// Reader over an [`Entity`] body.
#[derive(Debug)]
pub struct EntityReader {
    inner: ReaderInner,
}

impl Read for EntityReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.inner {
            ReaderInner::Memory(cursor) => cursor.read(buf),
            ReaderInner::File(file) => file.read(buf),
        }
    }
}
