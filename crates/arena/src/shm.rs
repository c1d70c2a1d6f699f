//! File-backed shared memory segments.
//!
//! A segment is a regular file (by convention under /dev/shm) mapped
//! MAP_SHARED by every participant. The creator truncates the file to the
//! exact segment size; openers verify the size they find before trusting
//! the layout on the other side of the pointer cast.

use crate::errors::ArenaError;
use memmap2::{Mmap, MmapMut, MmapOptions};
use std::fs::OpenOptions;
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

pub struct SharedSegment {
    mmap: MmapMut,
    path: PathBuf,
}

impl SharedSegment {
    /// Create (or take over) the backing file, force it to exactly `size`
    /// bytes and map it read-write. A stale file from a previous run is
    /// truncated, not reused.
    pub fn create(path: impl AsRef<Path>, size: usize) -> Result<Self, ArenaError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o644)
            .open(&path)?;

        file.set_len(size as u64)?;

        let mmap = unsafe { MmapOptions::new().map_mut(&file)? };

        Ok(Self {
            mmap,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Map an existing segment read-write. Fails if the file is missing.
    pub fn open_rw(path: impl AsRef<Path>) -> Result<Self, ArenaError> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let mmap = unsafe { MmapOptions::new().map_mut(&file)? };

        Ok(Self {
            mmap,
            path: path.as_ref().to_path_buf(),
        })
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.mmap.as_ptr()
    }

    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.mmap.as_mut_ptr()
    }

    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub struct ReadOnlySegment {
    mmap: Mmap,
}

impl ReadOnlySegment {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ArenaError> {
        let file = OpenOptions::new().read(true).open(&path)?;
        let mmap = unsafe { MmapOptions::new().map(&file)? };
        Ok(Self { mmap })
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.mmap.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }
}

/// Remove a segment's backing file. A file that is already gone is not an
/// error so teardown paths can run more than once.
pub fn unlink(path: impl AsRef<Path>) -> io::Result<()> {
    match std::fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
