//! Commit-or-discard output: files are written to hidden temporaries inside
//! the target directory and renamed into place only by [`StagedDir::commit`].
//! Dropping a [`StagedDir`] without committing removes every temporary and
//! leaves the directory's previous contents untouched.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

pub struct StagedDir {
    dir: PathBuf,
    pending: Vec<(NamedTempFile, PathBuf)>,
}

/// A file being written under a [`StagedDir`]; hand it back with
/// [`StagedDir::add`] once complete.
pub struct StagedFile {
    name: String,
    writer: BufWriter<NamedTempFile>,
}

impl Write for StagedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl StagedDir {
    /// Create the target directory if needed and start an empty stage.
    pub fn create(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            pending: Vec::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Open a new staged file that will become `dir/name` on commit.
    pub fn begin(&self, name: &str) -> io::Result<StagedFile> {
        let tmp = tempfile::Builder::new()
            .prefix(".staged-")
            .suffix(".tmp")
            .tempfile_in(&self.dir)?;
        Ok(StagedFile {
            name: name.to_string(),
            writer: BufWriter::new(tmp),
        })
    }

    /// Flush a finished file and queue it for commit.
    pub fn add(&mut self, file: StagedFile) -> io::Result<()> {
        let StagedFile { name, writer } = file;
        let tmp = writer.into_inner().map_err(io::IntoInnerError::into_error)?;
        tmp.as_file().sync_all()?;
        let target = self.dir.join(name);
        self.pending.push((tmp, target));
        Ok(())
    }

    /// Convenience for small files written in one go.
    pub fn write(&mut self, name: &str, bytes: &[u8]) -> io::Result<()> {
        let mut file = self.begin(name)?;
        file.write_all(bytes)?;
        self.add(file)
    }

    /// Rename every staged file into place, in staging order.
    pub fn commit(self) -> io::Result<Vec<PathBuf>> {
        let mut committed = Vec::with_capacity(self.pending.len());
        for (tmp, target) in self.pending {
            tmp.persist(&target).map_err(|e| e.error)?;
            debug!(path = %target.display(), "committed staged file");
            committed.push(target);
        }
        Ok(committed)
    }
}
