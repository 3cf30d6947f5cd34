use std::path::Path;

use bytes::{Bytes, BytesMut};

use crate::StorageError;

/// In-memory body buffer that freezes into shared [`Bytes`] once the part is complete.
#[derive(Debug)]
pub(crate) enum MemoryBuffer {
    Open(BytesMut),
    Sealed(Bytes),
}

impl Default for MemoryBuffer {
    fn default() -> Self {
        Self::Open(BytesMut::new())
    }
}

impl MemoryBuffer {
    pub(crate) fn append(&mut self, data: &[u8]) {
        match self {
            Self::Open(buf) => buf.extend_from_slice(data),
            Self::Sealed(bytes) => {
                let mut buf = BytesMut::with_capacity(bytes.len() + data.len());
                buf.extend_from_slice(bytes);
                buf.extend_from_slice(data);
                *self = Self::Open(buf);
            }
        }
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        match self {
            Self::Open(buf) => buf,
            Self::Sealed(bytes) => bytes,
        }
    }

    pub(crate) fn seal(&mut self) {
        if let Self::Open(buf) = self {
            let frozen = std::mem::take(buf).freeze();
            *self = Self::Sealed(frozen);
        }
    }

    /// Returns a cheap handle to the buffered bytes.
    pub(crate) fn bytes(&self) -> Bytes {
        match self {
            Self::Sealed(bytes) => bytes.clone(),
            Self::Open(buf) => Bytes::copy_from_slice(buf),
        }
    }

    pub(crate) fn write_to(&self, destination: &Path) -> Result<(), StorageError> {
        std::fs::write(destination, self.as_slice()).map_err(|err| {
            StorageError::new(format!(
                "failed to write entity to {}: {err}",
                destination.display()
            ))
        })
    }
}
