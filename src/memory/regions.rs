//! Shared memory region implementation
//!
//! A region file is laid out as `[8-byte file length][region bytes]`. Every
//! offset handed out or accepted by [`SharedRegion`] is relative to the first
//! region byte, so a blob written in one address space can be mapped at any
//! address in another.

use std::{
    fs::{self, File, OpenOptions},
    os::unix::fs::OpenOptionsExt,
    path::{Path, PathBuf},
};

use log::{debug, trace};
use memmap2::{Mmap, MmapMut, MmapOptions};
use nix::unistd::{sysconf, SysconfVar};
use serde::{Deserialize, Serialize};

use crate::{
    config::{DEFAULT_PAGE_SIZE, HEADER_SIZE},
    error::{Result, TopomapError},
};

use super::config::{AccessMode, RegionConfig};

/// System page size, falling back to [`DEFAULT_PAGE_SIZE`]
pub fn page_size() -> usize {
    match sysconf(SysconfVar::PAGE_SIZE) {
        Ok(Some(size)) if size > 0 => size as usize,
        _ => DEFAULT_PAGE_SIZE,
    }
}

/// Round `bytes` up to the next whole page
pub fn round_to_page(bytes: usize) -> usize {
    let page = page_size();
    bytes.div_ceil(page) * page
}

/// Descriptive information about a mapped region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionInfo {
    /// Path readers open (the published path)
    pub path: PathBuf,
    /// File length in bytes, header included
    pub file_size: usize,
    /// Access mode of this mapping
    pub mode: AccessMode,
}

impl RegionInfo {
    /// Number of usable region bytes after the header
    pub fn region_size(&self) -> usize {
        self.file_size.saturating_sub(HEADER_SIZE)
    }
}

#[derive(Debug)]
enum Mapping {
    Writable(MmapMut),
    ReadOnly(Mmap),
}

impl Mapping {
    fn bytes(&self) -> &[u8] {
        match self {
            Mapping::Writable(map) => map,
            Mapping::ReadOnly(map) => map,
        }
    }
}

/// A mapped topology region with a cursor over its bytes
#[derive(Debug)]
pub struct SharedRegion {
    info: RegionInfo,
    mapping: Mapping,
    /// Set while a writer's file still lives under its staging name
    staging_path: Option<PathBuf>,
    cursor: usize,
    _file: File,
}

impl SharedRegion {
    /// Create (or truncate) the backing file and map it read-write
    pub fn create(config: RegionConfig) -> Result<Self> {
        config.validate()?;

        let write_path = config.staging_path();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .mode(config.permissions)
            .open(&write_path)
            .map_err(|e| TopomapError::from_io(e, "Failed to create region file"))?;

        let staged = write_path != config.path;
        let mut mmap = match Self::size_and_map(&file, config.size) {
            Ok(mmap) => mmap,
            Err(e) => {
                // A staging file is never left behind, even before it is mapped
                if staged {
                    if let Err(rm) = fs::remove_file(&write_path) {
                        debug!("could not remove staging file {}: {}", write_path.display(), rm);
                    }
                }
                return Err(e);
            }
        };
        mmap[..HEADER_SIZE].copy_from_slice(&(config.size as u64).to_ne_bytes());

        debug!(
            "created region {} ({} bytes) at {}",
            config.path.display(),
            config.size,
            write_path.display()
        );

        let staging_path = staged.then_some(write_path);

        Ok(Self {
            info: RegionInfo {
                path: config.path,
                file_size: config.size,
                mode: AccessMode::Write,
            },
            mapping: Mapping::Writable(mmap),
            staging_path,
            cursor: 0,
            _file: file,
        })
    }

    fn size_and_map(file: &File, size: usize) -> Result<MmapMut> {
        file.set_len(size as u64)
            .map_err(|e| TopomapError::from_io(e, "Failed to set region file size"))?;

        unsafe {
            MmapOptions::new()
                .len(size)
                .map_mut(file)
                .map_err(|e| TopomapError::from_io(e, "Failed to create memory mapping"))
        }
    }

    /// Open an existing region file read-only
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| TopomapError::from_io(e, "Failed to open region file"))?;

        let file_len = file
            .metadata()
            .map_err(|e| TopomapError::from_io(e, "Failed to stat region file"))?
            .len();
        if file_len < HEADER_SIZE as u64 {
            return Err(TopomapError::format(
                0,
                format!("file holds {} bytes, smaller than the header", file_len),
            ));
        }

        // Map the header alone to learn the full size before mapping the rest
        let header = unsafe {
            MmapOptions::new()
                .len(HEADER_SIZE)
                .map(&file)
                .map_err(|e| TopomapError::from_io(e, "Failed to map region header"))?
        };
        let mut word = [0u8; HEADER_SIZE];
        word.copy_from_slice(&header[..HEADER_SIZE]);
        drop(header);

        let size = u64::from_ne_bytes(word);
        if size != file_len {
            return Err(TopomapError::format(
                0,
                format!("header records {} bytes but file holds {}", size, file_len),
            ));
        }
        let size = usize::try_from(size)
            .map_err(|_| TopomapError::memory("region size exceeds address space"))?;

        let mmap = unsafe {
            MmapOptions::new()
                .len(size)
                .map(&file)
                .map_err(|e| TopomapError::from_io(e, "Failed to create memory mapping"))?
        };

        debug!("opened region {} ({} bytes)", path.display(), size);

        Ok(Self {
            info: RegionInfo {
                path: path.to_path_buf(),
                file_size: size,
                mode: AccessMode::Read,
            },
            mapping: Mapping::ReadOnly(mmap),
            staging_path: None,
            cursor: 0,
            _file: file,
        })
    }

    /// Get the region information
    pub fn info(&self) -> &RegionInfo {
        &self.info
    }

    /// Path readers open
    pub fn path(&self) -> &Path {
        &self.info.path
    }

    /// Usable region bytes (file length minus header)
    pub fn size(&self) -> usize {
        self.info.region_size()
    }

    /// Whether this mapping accepts writes
    pub fn is_writable(&self) -> bool {
        matches!(self.mapping, Mapping::Writable(_))
    }

    /// Whether the backing file is visible at its final path
    pub fn is_published(&self) -> bool {
        self.staging_path.is_none()
    }

    /// Region bytes, header excluded
    pub fn as_slice(&self) -> &[u8] {
        &self.mapping.bytes()[HEADER_SIZE..]
    }

    fn region_mut(&mut self) -> Result<&mut [u8]> {
        match &mut self.mapping {
            Mapping::Writable(map) => Ok(&mut map[HEADER_SIZE..]),
            Mapping::ReadOnly(_) => Err(TopomapError::invalid_parameter(
                "mode",
                "region is mapped read-only",
            )),
        }
    }

    /// Current cursor offset
    pub fn position(&self) -> u64 {
        self.cursor as u64
    }

    /// Bytes between the cursor and the end of the region
    pub fn remaining(&self) -> usize {
        self.size() - self.cursor
    }

    /// Move the cursor to `offset`
    pub fn seek(&mut self, offset: u64) -> Result<()> {
        let target = self.checked_range(offset, 0)?;
        self.cursor = target.start;
        Ok(())
    }

    fn checked_range(&self, offset: u64, len: usize) -> Result<std::ops::Range<usize>> {
        let start = usize::try_from(offset)
            .map_err(|_| TopomapError::format(offset, "offset exceeds address space"))?;
        match start.checked_add(len) {
            Some(end) if end <= self.size() => Ok(start..end),
            _ => Err(TopomapError::format(
                offset,
                format!("{} bytes at this offset run past the {} byte region", len, self.size()),
            )),
        }
    }

    // ----- writes -----

    /// Write `bytes` at the cursor and return the offset they start at
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<u64> {
        let start = self.cursor;
        let available = self.remaining();
        if bytes.len() > available {
            return Err(TopomapError::insufficient_space(bytes.len(), available));
        }
        self.region_mut()?[start..start + bytes.len()].copy_from_slice(bytes);
        self.cursor += bytes.len();
        trace!("wrote {} bytes at offset {}", bytes.len(), start);
        Ok(start as u64)
    }

    /// Skip `len` zeroed bytes at the cursor and return their offset
    pub fn reserve(&mut self, len: usize) -> Result<u64> {
        let start = self.cursor;
        let available = self.remaining();
        if len > available {
            return Err(TopomapError::insufficient_space(len, available));
        }
        self.region_mut()?[start..start + len].fill(0);
        self.cursor += len;
        Ok(start as u64)
    }

    /// Overwrite bytes at an earlier offset without moving the cursor
    pub fn patch_bytes(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        let range = self
            .checked_range(offset, bytes.len())
            .map_err(|_| TopomapError::insufficient_space(bytes.len(), self.size()))?;
        self.region_mut()?[range].copy_from_slice(bytes);
        Ok(())
    }

    /// Overwrite an 8-byte word at an earlier offset
    pub fn patch_u64(&mut self, offset: u64, value: u64) -> Result<()> {
        self.patch_bytes(offset, &value.to_ne_bytes())
    }

    pub fn write_u64(&mut self, value: u64) -> Result<u64> {
        self.write_bytes(&value.to_ne_bytes())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<u64> {
        self.write_bytes(&value.to_ne_bytes())
    }

    pub fn write_i32(&mut self, value: i32) -> Result<u64> {
        self.write_bytes(&value.to_ne_bytes())
    }

    pub fn write_i64(&mut self, value: i64) -> Result<u64> {
        self.write_bytes(&value.to_ne_bytes())
    }

    pub fn write_f64(&mut self, value: f64) -> Result<u64> {
        self.write_bytes(&value.to_ne_bytes())
    }

    pub fn write_u8(&mut self, value: u8) -> Result<u64> {
        self.write_bytes(&[value])
    }

    /// Write a string followed by a NUL terminator
    pub fn write_cstr(&mut self, value: &str) -> Result<u64> {
        if value.as_bytes().contains(&0) {
            return Err(TopomapError::invalid_parameter(
                "string",
                format!("{:?} contains an interior NUL byte", value),
            ));
        }
        let start = self.write_bytes(value.as_bytes())?;
        self.write_u8(0)?;
        Ok(start)
    }

    // ----- reads -----

    /// Borrow `len` bytes at an arbitrary offset
    pub fn bytes_at(&self, offset: u64, len: usize) -> Result<&[u8]> {
        let range = self.checked_range(offset, len)?;
        Ok(&self.as_slice()[range])
    }

    /// Read an 8-byte word at an arbitrary offset
    pub fn u64_at(&self, offset: u64) -> Result<u64> {
        Ok(u64::from_ne_bytes(self.array_at(offset)?))
    }

    fn array_at<const N: usize>(&self, offset: u64) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes_at(offset, N)?);
        Ok(out)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let out = self.array_at::<N>(self.cursor as u64)?;
        self.cursor += N;
        Ok(out)
    }

    /// Read `len` bytes at the cursor
    pub fn read_bytes(&mut self, len: usize) -> Result<&[u8]> {
        let range = self.checked_range(self.cursor as u64, len)?;
        self.cursor = range.end;
        Ok(&self.as_slice()[range])
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.read_array().map(u64::from_ne_bytes)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_array().map(u32::from_ne_bytes)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.read_array().map(i32::from_ne_bytes)
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        self.read_array().map(i64::from_ne_bytes)
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        self.read_array().map(f64::from_ne_bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.read_array::<1>().map(|b| b[0])
    }

    /// Read a NUL-terminated UTF-8 string at the cursor
    pub fn read_cstr(&mut self) -> Result<String> {
        let start = self.cursor;
        let tail = &self.as_slice()[start..];
        let len = tail.iter().position(|&b| b == 0).ok_or_else(|| {
            TopomapError::format(start as u64, "string is missing its terminator")
        })?;
        let value = std::str::from_utf8(&tail[..len])
            .map_err(|e| TopomapError::format(start as u64, format!("string is not UTF-8: {}", e)))?
            .to_owned();
        self.cursor = start + len + 1;
        Ok(value)
    }

    // ----- lifecycle -----

    /// Flush written bytes to the backing file
    pub fn flush(&self) -> Result<()> {
        match &self.mapping {
            Mapping::Writable(map) => map
                .flush()
                .map_err(|e| TopomapError::from_io(e, "Failed to flush memory mapping")),
            Mapping::ReadOnly(_) => Ok(()),
        }
    }

    /// Flush and move the staging file onto its final path
    ///
    /// Readers only ever see a file at the final path once every byte has
    /// been written. The mapping stays valid across the rename.
    pub fn publish(&mut self) -> Result<()> {
        self.flush()?;
        if let Some(staging) = self.staging_path.take() {
            if let Err(e) = fs::rename(&staging, &self.info.path) {
                self.staging_path = Some(staging);
                return Err(TopomapError::from_io(e, "Failed to publish region file"));
            }
            debug!("published region at {}", self.info.path.display());
        }
        Ok(())
    }

    /// Remove an unpublished staging file
    pub(crate) fn discard(self) {
        if let Some(staging) = &self.staging_path {
            if let Err(e) = fs::remove_file(staging) {
                debug!("could not remove staging file {}: {}", staging.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_round_to_page() {
        let page = page_size();
        assert_eq!(round_to_page(1), page);
        assert_eq!(round_to_page(page), page);
        assert_eq!(round_to_page(page + 1), 2 * page);
    }

    #[test]
    fn test_cursor_write_then_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cursor");

        let mut region = SharedRegion::create(RegionConfig::new(&path, 4096)).unwrap();
        assert_eq!(region.size(), 4096 - HEADER_SIZE);
        assert_eq!(region.write_u64(7).unwrap(), 0);
        assert_eq!(region.write_cstr("L2").unwrap(), 8);
        let slot = region.reserve(8).unwrap();
        region.write_i32(-3).unwrap();
        region.patch_u64(slot, 42).unwrap();
        region.publish().unwrap();

        let mut reader = SharedRegion::open(&path).unwrap();
        assert!(!reader.is_writable());
        assert_eq!(reader.read_u64().unwrap(), 7);
        assert_eq!(reader.read_cstr().unwrap(), "L2");
        assert_eq!(reader.read_u64().unwrap(), 42);
        assert_eq!(reader.read_i32().unwrap(), -3);
    }

    #[test]
    fn test_write_past_end_fails() {
        let temp_dir = TempDir::new().unwrap();
        let mut region =
            SharedRegion::create(RegionConfig::new(temp_dir.path().join("small"), 24)).unwrap();
        region.write_u64(1).unwrap();
        region.write_u64(2).unwrap();
        let err = region.write_u8(3).unwrap_err();
        assert!(matches!(err, TopomapError::InsufficientSpace { .. }));
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ro");
        let mut writer = SharedRegion::create(RegionConfig::new(&path, 64)).unwrap();
        writer.publish().unwrap();

        let mut reader = SharedRegion::open(&path).unwrap();
        assert!(reader.write_u64(1).is_err());
        assert!(reader.seek(64).is_err());
        assert!(reader.bytes_at(50, 8).is_err());
    }
}
