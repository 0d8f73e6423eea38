//! Append-only destination files.
//!
//! A destination is opened for append and never truncated on open, so a
//! crash mid-transfer leaves a shorter file that the next run resumes. The
//! only truncation is an explicit `restart`.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// An open destination file positioned at its end.
#[derive(Debug)]
pub struct ResumeFile {
    file: File,
    path: PathBuf,
    offset: u64,
}

impl ResumeFile {
    /// Opens `path` for append, creating it if absent. `offset` is the
    /// existing length.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::options().create(true).append(true).open(path)?;
        let offset = file.metadata()?.len();
        Ok(Self {
            file,
            path: path.to_path_buf(),
            offset,
        })
    }

    /// Bytes currently in the file (where the next write lands).
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Discards existing content; the next write lands at offset 0.
    pub fn restart(&mut self) -> io::Result<()> {
        self.file.set_len(0)?;
        self.offset = 0;
        Ok(())
    }

    pub fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.file.write_all(data)?;
        self.offset += data.len() as u64;
        Ok(())
    }

    pub fn sync(&mut self) -> io::Result<()> {
        self.file.flush()?;
        self.file.sync_data()
    }

    /// Length as reported by the filesystem.
    pub fn len_on_disk(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }
}
