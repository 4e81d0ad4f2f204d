//! Memory-mappable persisted artifact format
//!
//! A single-file container holding a model skeleton plus its out-of-band
//! buffers. Buffers come first so the file can be written in one pass while
//! serialization reports them; the skeleton and an index trailer follow.
//! Every buffer's payload starts on a 64-byte boundary so mapped views can
//! back typed slices directly.
//!
//! ```text
//! [0..16)   magic "MSHARE1\0" | format version u32 LE | reserved u32
//! buffers:  at the next 64-byte boundary each:
//!           [len u64 LE][pad to 64-byte boundary][payload]
//! skeleton: raw skeleton bytes
//! trailer:  [skeleton offset u64][skeleton len u64][buffer count u64][magic]
//! ```

use crate::error::{ShareError, ShareResult};
use crate::model::{BufferSink, Shareable, decode_skeleton};
use memmap2::{Mmap, MmapOptions};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Artifact file magic, at both ends of the file
const MAGIC: [u8; 8] = *b"MSHARE1\0";
/// Current artifact format version
const FORMAT_VERSION: u32 = 1;
/// Buffer payload alignment
const BUFFER_ALIGN: u64 = 64;
/// Fixed header length
const HEADER_LEN: u64 = 16;
/// Fixed trailer length
const TRAILER_LEN: u64 = 32;

fn align_up(offset: u64) -> u64 {
    offset.div_ceil(BUFFER_ALIGN) * BUFFER_ALIGN
}

/// One-pass artifact writer; doubles as the strategy's [`BufferSink`]
pub struct ArtifactWriter {
    file: File,
    path: PathBuf,
    offset: u64,
    count: u64,
}

impl ArtifactWriter {
    /// Create (or truncate) the artifact at `path` and write the header
    pub fn create(path: &Path) -> ShareResult<Self> {
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600); // Owner read/write only
        }
        let mut file = options.open(path)?;

        file.write_all(&MAGIC)?;
        file.write_all(&FORMAT_VERSION.to_le_bytes())?;
        file.write_all(&[0u8; 4])?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
            offset: HEADER_LEN,
            count: 0,
        })
    }

    /// Path the artifact is being written to
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn pad_to(&mut self, target: u64) -> ShareResult<()> {
        const ZEROS: [u8; BUFFER_ALIGN as usize] = [0u8; BUFFER_ALIGN as usize];
        let mut remaining = target - self.offset;
        while remaining > 0 {
            let chunk = remaining.min(BUFFER_ALIGN) as usize;
            self.file.write_all(&ZEROS[..chunk])?;
            remaining -= chunk as u64;
        }
        self.offset = target;
        Ok(())
    }

    /// Write the skeleton and index trailer, consuming the writer
    pub fn finish(mut self, skeleton: &[u8]) -> ShareResult<()> {
        let skeleton_offset = self.offset;
        self.file.write_all(skeleton)?;
        self.offset += skeleton.len() as u64;

        self.file.write_all(&skeleton_offset.to_le_bytes())?;
        self.file.write_all(&(skeleton.len() as u64).to_le_bytes())?;
        self.file.write_all(&self.count.to_le_bytes())?;
        self.file.write_all(&MAGIC)?;
        self.file.flush()?;

        tracing::debug!(
            path = %self.path.display(),
            skeleton_bytes = skeleton.len(),
            buffers = self.count,
            "wrote persisted artifact"
        );
        Ok(())
    }
}

impl BufferSink for ArtifactWriter {
    fn put(&mut self, bytes: &[u8]) -> ShareResult<()> {
        let record = align_up(self.offset);
        self.pad_to(record)?;
        self.file.write_all(&(bytes.len() as u64).to_le_bytes())?;
        self.offset += 8;
        self.pad_to(record + BUFFER_ALIGN)?;
        self.file.write_all(bytes)?;
        self.offset += bytes.len() as u64;
        self.count += 1;
        Ok(())
    }
}

enum Backing {
    /// Whole file read into memory (native deserialization path)
    Owned(Vec<u8>),
    /// Read-only mapping of the file (direct/mapped path, avoids the copy)
    Mapped(Mmap),
}

impl Backing {
    fn bytes(&self) -> &[u8] {
        match self {
            Backing::Owned(bytes) => bytes,
            Backing::Mapped(map) => map,
        }
    }
}

/// Parsed persisted artifact, backed by an owned copy or a read-only mapping
pub struct Artifact {
    path: PathBuf,
    backing: Backing,
    skeleton: Range<usize>,
    buffers: Vec<Range<usize>>,
}

impl Artifact {
    /// Open an artifact by reading the whole file into memory
    pub fn open(path: &Path) -> ShareResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| missing_or_io(path, e))?;
        Self::parse(path, Backing::Owned(bytes))
    }

    /// Open an artifact through a read-only memory mapping
    pub fn open_mapped(path: &Path) -> ShareResult<Self> {
        let file = File::open(path).map_err(|e| missing_or_io(path, e))?;
        let map = unsafe { MmapOptions::new().map(&file)? };
        Self::parse(path, Backing::Mapped(map))
    }

    fn parse(path: &Path, backing: Backing) -> ShareResult<Self> {
        let bytes = backing.bytes();
        let corrupt = |reason: &str| ShareError::CorruptArtifact {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        if bytes.len() < (HEADER_LEN + TRAILER_LEN) as usize {
            return Err(corrupt("file shorter than header and trailer"));
        }
        if bytes[0..8] != MAGIC {
            return Err(corrupt("bad header magic"));
        }
        let version = read_u32(&bytes[8..12]);
        if version != FORMAT_VERSION {
            return Err(corrupt(&format!("unsupported format version {version}")));
        }
        if bytes[bytes.len() - 8..] != MAGIC {
            return Err(corrupt("bad trailer magic"));
        }

        let trailer = bytes.len() - TRAILER_LEN as usize;
        let skeleton_offset = read_u64(&bytes[trailer..trailer + 8]) as usize;
        let skeleton_len = read_u64(&bytes[trailer + 8..trailer + 16]) as usize;
        let count = read_u64(&bytes[trailer + 16..trailer + 24]) as usize;

        let skeleton_end = skeleton_offset
            .checked_add(skeleton_len)
            .ok_or_else(|| corrupt("skeleton range overflow"))?;
        if skeleton_offset < HEADER_LEN as usize || skeleton_end != trailer {
            return Err(corrupt("skeleton out of bounds"));
        }

        // Every buffer record occupies at least one aligned block before the
        // skeleton, which bounds any count the trailer can honestly claim.
        if count > skeleton_offset / BUFFER_ALIGN as usize {
            return Err(corrupt(&format!("implausible buffer count {count}")));
        }

        let mut buffers = Vec::with_capacity(count);
        let mut offset = HEADER_LEN;
        for index in 0..count {
            let record = align_up(offset) as usize;
            if record + 8 > skeleton_offset {
                return Err(corrupt(&format!("buffer {index} record out of bounds")));
            }
            let len = read_u64(&bytes[record..record + 8]) as usize;
            let start = record + BUFFER_ALIGN as usize;
            let end = start
                .checked_add(len)
                .ok_or_else(|| corrupt("buffer length overflow"))?;
            if end > skeleton_offset {
                return Err(corrupt(&format!("buffer {index} payload out of bounds")));
            }
            buffers.push(start..end);
            offset = end as u64;
        }

        Ok(Self {
            path: path.to_path_buf(),
            backing,
            skeleton: skeleton_offset..skeleton_end,
            buffers,
        })
    }

    /// Artifact path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Skeleton bytes
    pub fn skeleton(&self) -> &[u8] {
        &self.backing.bytes()[self.skeleton.clone()]
    }

    /// Number of out-of-band buffers
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Buffer views in serialization order
    pub fn buffer_views(&self) -> Vec<&[u8]> {
        let bytes = self.backing.bytes();
        self.buffers
            .iter()
            .map(|range| &bytes[range.clone()])
            .collect()
    }

    /// Reconstruct the model held by this artifact
    pub fn decode<M: Shareable>(&self) -> ShareResult<M> {
        decode_skeleton(self.skeleton(), self.buffer_views())
    }
}

fn missing_or_io(path: &Path, err: std::io::Error) -> ShareError {
    if err.kind() == std::io::ErrorKind::NotFound {
        ShareError::ArtifactNotFound {
            path: path.to_path_buf(),
        }
    } else {
        ShareError::Io { source: err }
    }
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(bytes);
    u64::from_le_bytes(raw)
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(bytes);
    u32::from_le_bytes(raw)
}
