// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A `std::fs`-backed [`FileOpener`]/[`YmodemFile`] pair, standing in for
//! the content-addressed `BlobStore` named as an out-of-scope collaborator
//! in SPEC_FULL.md §6. Files land under a single destination directory
//! rooted at construction time.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use ymodem::{Error, FileOpener, Result, YmodemFile};

pub struct DirFileOpener {
    dir: PathBuf,
}

impl DirFileOpener {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DirFileOpener { dir: dir.into() }
    }

    fn path_for(&self, filename: &str) -> PathBuf {
        self.dir.join(Path::new(filename).file_name().unwrap_or_default())
    }
}

impl FileOpener for DirFileOpener {
    fn open_read(&self, filename: &str) -> Result<Box<dyn YmodemFile>> {
        let file = File::open(self.path_for(filename)).map_err(|_| Error::FileError)?;
        Ok(Box::new(StdYmodemFile(file)))
    }

    fn create(&self, filename: &str) -> Result<Box<dyn YmodemFile>> {
        let file = File::create(self.path_for(filename)).map_err(|_| Error::FileError)?;
        Ok(Box::new(StdYmodemFile(file)))
    }

    /// The receiver's "close and reopen every 32 writes" filesystem quirk
    /// (spec §4.3); a real embedded filesystem needs this, `std::fs` does
    /// not, but the behaviour is kept so this binary exercises the same
    /// code path a board build would.
    fn reopen_for_append(&self, filename: &str) -> Result<Box<dyn YmodemFile>> {
        let file = OpenOptions::new().write(true).open(self.path_for(filename)).map_err(|_| Error::FileError)?;
        Ok(Box::new(StdYmodemFile(file)))
    }
}

struct StdYmodemFile(File);

impl YmodemFile for StdYmodemFile {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.0.read(buf).map_err(|_| Error::FileError)
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.0.write_all(buf).map_err(|_| Error::FileError)
    }

    fn seek_from_start(&mut self, pos: u64) -> Result<()> {
        self.0.seek(SeekFrom::Start(pos)).map(|_| ()).map_err(|_| Error::FileError)
    }

    fn tell(&mut self) -> Result<u64> {
        self.0.stream_position().map_err(|_| Error::FileError)
    }

    fn flush(&mut self) -> Result<()> {
        self.0.flush().map_err(|_| Error::FileError)
    }
}
