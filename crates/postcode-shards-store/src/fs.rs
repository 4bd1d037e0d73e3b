//! Directory-backed release storage.
//!
//! Writes go to a hidden temporary file that is renamed into place, so a
//! reader never observes a partially written artifact.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::error::Result;
use crate::traits::{check_shard_name, ShardSink, ShardSource, MANIFEST_FILE, SIGNATURE_FILE};

/// A release directory on disk.
#[derive(Debug, Clone)]
pub struct FsShardStore {
    root: PathBuf,
}

impl FsShardStore {
    /// Open an existing release directory.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("release directory {} does not exist", root.display()),
            )
            .into());
        }
        Ok(Self { root })
    }

    /// Open a release directory, creating it if needed.
    pub fn create(root: impl AsRef<Path>) -> Result<Self> {
        fs::create_dir_all(root.as_ref())?;
        Self::open(root)
    }

    /// The directory this store reads from and writes to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read_optional(&self, name: &str) -> Result<Option<Bytes>> {
        match fs::read(self.root.join(name)) {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_atomic(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let tmp = self.root.join(format!(".{name}.tmp"));
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, self.root.join(name))?;
        tracing::debug!(file = name, len = bytes.len(), "wrote release artifact");
        Ok(())
    }
}

impl ShardSource for FsShardStore {
    fn read_manifest(&self) -> Result<Option<Bytes>> {
        self.read_optional(MANIFEST_FILE)
    }

    fn read_signature(&self) -> Result<Option<Bytes>> {
        self.read_optional(SIGNATURE_FILE)
    }

    fn read_shard(&self, shard_name: &str) -> Result<Option<Bytes>> {
        check_shard_name(shard_name)?;
        self.read_optional(shard_name)
    }

    fn list_shards(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if check_shard_name(name).is_ok() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

impl ShardSink for FsShardStore {
    fn write_shard(&self, shard_name: &str, bytes: &[u8]) -> Result<()> {
        check_shard_name(shard_name)?;
        self.write_atomic(shard_name, bytes)
    }

    fn write_manifest(&self, bytes: &[u8]) -> Result<()> {
        self.write_atomic(MANIFEST_FILE, bytes)
    }

    fn write_signature(&self, bytes: &[u8]) -> Result<()> {
        self.write_atomic(SIGNATURE_FILE, bytes)
    }
}
