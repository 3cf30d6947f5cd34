use std::{
    fs::{self, File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use uuid::Uuid;

use crate::StorageError;

/// Where and when part bodies move from memory to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpoolPolicy {
    /// Bytes kept in memory per part; `None` never spools.
    pub threshold: Option<u64>,
    /// Directory spool files are created in.
    pub dir: PathBuf,
    /// Spool file name prefix.
    pub prefix: String,
    /// Spool file name suffix.
    pub suffix: String,
}

impl SpoolPolicy {
    /// Policy that never spools.
    pub fn memory_only() -> Self {
        Self {
            threshold: None,
            dir: std::env::temp_dir(),
            prefix: String::new(),
            suffix: String::new(),
        }
    }

    /// Returns `true` once `len` accumulated bytes must live on disk.
    pub fn exceeds_threshold(&self, len: u64) -> bool {
        self.threshold.is_some_and(|threshold| len > threshold)
    }

    /// Creates and immediately deletes a spool file to check the directory is writable.
    pub fn probe(&self) -> Result<(), StorageError> {
        let (path, file) = self.create_file()?;
        drop(file);
        fs::remove_file(&path)
            .map_err(|err| StorageError::new(format!("failed to remove probe spool file: {err}")))
    }

    fn create_file(&self) -> Result<(PathBuf, File), StorageError> {
        let name = format!(
            "{}{}{}",
            self.prefix,
            Uuid::new_v4().simple(),
            self.suffix
        );
        let path = self.dir.join(name);
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|err| {
                StorageError::new(format!(
                    "failed to create spool file in {}: {err}",
                    self.dir.display()
                ))
            })?;
        Ok((path, file))
    }
}

/// File-backed body storage with a uniquely named path.
#[derive(Debug)]
pub(crate) struct SpoolFile {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    temporary: bool,
}

impl SpoolFile {
    pub(crate) fn create(policy: &SpoolPolicy) -> Result<Self, StorageError> {
        let (path, file) = policy.create_file()?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            path = %path.display(),
            threshold = ?policy.threshold,
            "spool: part body exceeded memory threshold, spooling to disk"
        );

        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
            temporary: true,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn append(&mut self, data: &[u8]) -> Result<(), StorageError> {
        let writer = match self.writer.as_mut() {
            Some(writer) => writer,
            None => {
                let file = OpenOptions::new()
                    .append(true)
                    .open(&self.path)
                    .map_err(|err| StorageError::new(format!("failed to reopen spool file: {err}")))?;
                self.writer.insert(BufWriter::new(file))
            }
        };

        writer
            .write_all(data)
            .map_err(|err| StorageError::new(format!("failed to write spool file: {err}")))
    }

    pub(crate) fn seal(&mut self) -> Result<(), StorageError> {
        if let Some(mut writer) = self.writer.take() {
            writer
                .flush()
                .map_err(|err| StorageError::new(format!("failed to flush spool file: {err}")))?;
        }
        Ok(())
    }

    pub(crate) fn open(&self) -> Result<File, StorageError> {
        File::open(&self.path)
            .map_err(|err| StorageError::new(format!("failed to open spool file: {err}")))
    }

    /// Renames the file to `destination`, copying across filesystems when needed.
    pub(crate) fn move_to(&mut self, destination: &Path) -> Result<(), StorageError> {
        self.seal()?;

        if fs::rename(&self.path, destination).is_err() {
            fs::copy(&self.path, destination)
                .map_err(|err| StorageError::new(format!("failed to move spool file: {err}")))?;
            fs::remove_file(&self.path).map_err(|err| {
                StorageError::new(format!("failed to remove moved spool file: {err}"))
            })?;
        }

        self.path = destination.to_path_buf();
        self.temporary = false;
        Ok(())
    }

    /// Deletes the file if it is still a temporary spool file.
    pub(crate) fn remove(&mut self) -> Result<(), StorageError> {
        self.writer = None;
        if !self.temporary {
            return Ok(());
        }

        self.temporary = false;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::new(format!(
                "failed to remove spool file {}: {err}",
                self.path.display()
            ))),
        }
    }
}
