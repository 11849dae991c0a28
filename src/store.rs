//! # Durable Store Abstraction
//!
//! A byte-addressable region with write-through staging and an explicit
//! commit. This mirrors how EEPROM emulation works on small boards: reads
//! and writes hit a RAM working copy, and only `commit` pushes that copy to
//! the non-volatile medium (the wear-inducing step).
//!
//! ## Semantics
//! - `write` is visible to the next `read` immediately, before any commit
//! - `commit` returns `false` on failure and never panics
//! - After a restart, only committed bytes survive
//!
//! ## Implementations
//! - [`MemoryStore`]: RAM-only, with commit-failure injection and
//!   [`MemoryStore::power_cycle`] to simulate losing power
//! - [`FileStore`]: the durable image is a file, used on hosts and by the CLI

use log::{debug, error, warn};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Errors raised by a [`DurableStore`] read or write.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Access past the end of the reserved region
    #[error("access of {len} bytes at offset {offset} exceeds region of {size} bytes")]
    OutOfBounds {
        offset: usize,
        len: usize,
        size: usize,
    },

    /// The backing file could not be read at attach time
    #[error("store IO: {0}")]
    Io(#[from] io::Error),
}

/// Byte-addressable durable region with staged writes.
pub trait DurableStore {
    /// Size of the reserved region in bytes.
    fn size(&self) -> usize;

    /// Copy `buf.len()` bytes starting at `offset` from the working copy.
    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), StoreError>;

    /// Stage `bytes` at `offset` in the working copy.
    fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), StoreError>;

    /// Flush the working copy to the durable medium.
    fn commit(&mut self) -> bool;
}

fn check_bounds(offset: usize, len: usize, size: usize) -> Result<(), StoreError> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(StoreError::OutOfBounds { offset, len, size }),
    }
}

/// RAM-backed store that keeps a separate "durable" image.
///
/// The durable image only changes on a successful [`commit`](DurableStore::commit),
/// which makes it possible to test exactly what survives a power loss.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    working: Vec<u8>,
    durable: Vec<u8>,
    fail_commits: bool,
    commits: usize,
}

impl MemoryStore {
    /// Reserve a zero-filled region of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self::filled(size, 0x00)
    }

    /// Reserve a region that reads back like factory-erased EEPROM (all `0xFF`).
    pub fn erased(size: usize) -> Self {
        Self::filled(size, 0xFF)
    }

    fn filled(size: usize, byte: u8) -> Self {
        Self {
            working: vec![byte; size],
            durable: vec![byte; size],
            fail_commits: false,
            commits: 0,
        }
    }

    /// Make every subsequent commit fail (or succeed again).
    pub fn set_fail_commits(&mut self, fail: bool) {
        self.fail_commits = fail;
    }

    /// Number of successful commits so far (a proxy for medium wear).
    pub fn commit_count(&self) -> usize {
        self.commits
    }

    /// Simulate a power loss and reboot: uncommitted writes are discarded.
    pub fn power_cycle(&mut self) {
        self.working.clone_from(&self.durable);
    }

    /// Bytes that would survive a restart.
    pub fn durable_bytes(&self) -> &[u8] {
        &self.durable
    }
}

impl DurableStore for MemoryStore {
    fn size(&self) -> usize {
        self.working.len()
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), StoreError> {
        check_bounds(offset, buf.len(), self.working.len())?;
        buf.copy_from_slice(&self.working[offset..offset + buf.len()]);
        Ok(())
    }

    fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), StoreError> {
        check_bounds(offset, bytes.len(), self.working.len())?;
        self.working[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn commit(&mut self) -> bool {
        if self.fail_commits {
            return false;
        }
        self.durable.clone_from(&self.working);
        self.commits += 1;
        true
    }
}

/// Store whose durable medium is a file on disk.
///
/// The whole region is held in RAM as the working copy. A commit writes the
/// full image to a sibling temporary file, syncs it, and renames it over the
/// image, so the file on disk is always either the previous or the new image.
/// A missing file, or one shorter than the region, is zero-extended, which
/// matches a never-initialised log. A longer file keeps its tail bytes.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    /// Full image, possibly longer than the addressable region
    working: Vec<u8>,
    size: usize,
}

impl FileStore {
    /// Attach to `path`, reserving `size` bytes.
    pub fn open<P: AsRef<Path>>(path: P, size: usize) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let mut working = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No store image at {}, starting blank", path.display());
                Vec::new()
            }
            Err(e) => return Err(StoreError::Io(e)),
        };
        if working.len() > size {
            warn!(
                "Store image {} is {} bytes, larger than the {} byte region; keeping the tail",
                path.display(),
                working.len(),
                size
            );
        } else {
            working.resize(size, 0x00);
        }

        Ok(Self {
            path,
            working,
            size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the working copy next to the image and rename it into place.
    fn replace_image(&self) -> io::Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut staged = NamedTempFile::new_in(dir)?;
        staged.write_all(&self.working)?;
        staged.as_file().sync_all()?;
        staged.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl DurableStore for FileStore {
    fn size(&self) -> usize {
        self.size
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), StoreError> {
        check_bounds(offset, buf.len(), self.size)?;
        buf.copy_from_slice(&self.working[offset..offset + buf.len()]);
        Ok(())
    }

    fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), StoreError> {
        check_bounds(offset, bytes.len(), self.size)?;
        self.working[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn commit(&mut self) -> bool {
        match self.replace_image() {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to commit store to {}: {}", self.path.display(), e);
                false
            }
        }
    }
}
