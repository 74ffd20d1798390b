//! Sequential append writer for artifact files.
//!
//! An artifact acquired from the placeholder pool is a zero-filled file:
//! its on-disk length is the reserved space, not the written content. The
//! writer therefore positions its first append one past the last non-zero
//! byte, so diagnostic sections land after any previously appended text and
//! overwrite only the zero tail.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use cw_common::{Error, Result};

/// Chunk size for the backwards content-end scan.
const SCAN_CHUNK: usize = 4096;

/// Appends text sections to one artifact file.
#[derive(Debug)]
pub struct ArtifactWriter {
    path: PathBuf,
    file: File,
}

impl ArtifactWriter {
    /// Open an artifact for appending, positioned after its last non-zero
    /// byte.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut file = File::options()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| Error::fs("open", path.clone(), e))?;

        let pos = content_end(&mut file).map_err(|e| Error::fs("scan", path.clone(), e))?;
        file.seek(SeekFrom::Start(pos))
            .map_err(|e| Error::fs("seek", path.clone(), e))?;

        Ok(ArtifactWriter { path, file })
    }

    /// Append one text section at the current position.
    pub fn append(&mut self, text: &str) -> Result<()> {
        self.file
            .write_all(text.as_bytes())
            .map_err(|e| Error::fs("write", self.path.clone(), e))
    }

    /// Flush buffered writes to the filesystem.
    pub fn flush(&mut self) -> Result<()> {
        self.file
            .flush()
            .map_err(|e| Error::fs("flush", self.path.clone(), e))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Offset one past the last non-zero byte, scanning backwards in chunks.
fn content_end(file: &mut File) -> std::io::Result<u64> {
    let len = file.seek(SeekFrom::End(0))?;
    let mut chunk = [0u8; SCAN_CHUNK];
    let mut end = len;

    while end > 0 {
        let start = end.saturating_sub(SCAN_CHUNK as u64);
        let size = (end - start) as usize;
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(&mut chunk[..size])?;

        if let Some(offset) = chunk[..size].iter().rposition(|b| *b != 0) {
            return Ok(start + offset as u64 + 1);
        }
        end = start;
    }

    Ok(0)
}
