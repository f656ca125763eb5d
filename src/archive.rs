//! Bundle archive writing and reading
//!
//! A bundle is a gzip-compressed tar archive with one regular file per
//! collected resource, in the order the entries were given:
//!
//! ```text
//! debug.tar.gz
//! ├── block.pb
//! ├── goroutine.pb
//! ├── heap.pb
//! └── metrics.txt
//! ```
//!
//! The archive is built in a temporary file next to the destination, synced,
//! and then renamed into place. A failed write never leaves a file under the
//! final name.

use crate::error::{Error, Result};
use crate::types::check_unique_names;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tar::{Archive, EntryType, Header};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Permission bits for files inside the archive and for the archive itself
pub const ENTRY_MODE: u32 = 0o644;

/// One file to store in the bundle
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Name inside the archive
    pub file_name: String,
    /// Where the data came from (remote path); only used in error messages
    pub origin: String,
    /// File contents
    pub data: Vec<u8>,
}

/// A file read back from a bundle
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BundleFile {
    /// Name inside the archive
    pub name: String,
    /// Permission bits
    pub mode: u32,
    /// File contents
    pub data: Vec<u8>,
}

/// Writes a bundle to a fixed destination path
#[derive(Clone, Debug)]
pub struct BundleArchiver {
    path: PathBuf,
    mtime: u64,
}

impl BundleArchiver {
    /// Create an archiver for `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mtime: 0,
        }
    }

    /// Modification time (Unix seconds) stamped on every entry
    pub fn with_mtime(mut self, mtime: u64) -> Self {
        self.mtime = mtime;
        self
    }

    /// Destination path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write every entry, in order, and move the archive into place
    ///
    /// Fails with [`Error::DuplicateEntry`] before touching the filesystem if
    /// two entries share a name, and with [`Error::Archive`] on any I/O
    /// failure. In both cases nothing is left at the destination path.
    pub fn write(&self, entries: &[ArchiveEntry]) -> Result<()> {
        check_unique_names(
            entries
                .iter()
                .map(|e| (e.file_name.as_str(), e.origin.as_str())),
        )?;

        if self.path.file_name().is_none() {
            return Err(self.archive_error(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "archive path has no file name",
            )));
        }

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        // Dropping the temp file on an early return deletes it
        let temp = NamedTempFile::new_in(dir).map_err(|e| self.archive_error(e))?;
        debug!(temp = ?temp.path(), entries = entries.len(), "writing archive");

        self.write_entries(temp.as_file(), entries)
            .map_err(|e| self.archive_error(e))?;
        set_standard_permissions(temp.as_file()).map_err(|e| self.archive_error(e))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| self.archive_error(e))?;

        temp.persist(&self.path)
            .map_err(|e| self.archive_error(e.error))?;

        // The archive is complete at this point; a failed directory sync only
        // weakens durability of the rename
        if let Err(e) = sync_dir(dir) {
            warn!(dir = ?dir, error = %e, "failed to sync archive directory");
        }

        info!(archive = ?self.path, entries = entries.len(), "archive written");
        Ok(())
    }

    fn write_entries(&self, file: &File, entries: &[ArchiveEntry]) -> std::io::Result<()> {
        let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        let mut builder = tar::Builder::new(encoder);

        for entry in entries {
            let mut header = Header::new_gnu();
            header.set_entry_type(EntryType::Regular);
            header.set_size(entry.data.len() as u64);
            header.set_mode(ENTRY_MODE);
            header.set_mtime(self.mtime);
            header.set_uid(0);
            header.set_gid(0);
            builder.append_data(&mut header, &entry.file_name, entry.data.as_slice())?;
        }

        let encoder = builder.into_inner()?;
        let mut writer = encoder.finish()?;
        writer.flush()
    }

    fn archive_error(&self, source: std::io::Error) -> Error {
        Error::Archive {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(unix)]
fn set_standard_permissions(file: &File) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(std::fs::Permissions::from_mode(ENTRY_MODE))
}

#[cfg(not(unix))]
fn set_standard_permissions(_file: &File) -> std::io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Read every file of a bundle, in archive order
pub fn read_bundle(path: &Path) -> Result<Vec<BundleFile>> {
    let file = File::open(path)?;
    let mut archive = Archive::new(GzDecoder::new(BufReader::new(file)));
    let mut files = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let name = entry.path()?.to_string_lossy().to_string();
        let mode = entry.header().mode()?;
        let mut data = Vec::new();
        entry.read_to_end(&mut data)?;
        files.push(BundleFile { name, mode, data });
    }

    Ok(files)
}
