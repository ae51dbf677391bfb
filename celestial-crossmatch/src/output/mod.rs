//! Writing results to disk.
//!
//! Files are written next to their destination as `<name>.tmp` and renamed
//! into place once complete, so an interrupted or failed write never leaves
//! a partial file at the target path.

pub mod fits;

use crate::error::Result;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub use fits::write_fits;

/// `<path>.tmp`, keeping the original extension visible.
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Run `write` against a buffered temporary file, then rename it over
/// `path`. On error the temporary file is removed.
pub fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    let temp = temp_path(path);
    let result = (|| -> Result<()> {
        let mut writer = BufWriter::new(File::create(&temp)?);
        write(&mut writer)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        drop(writer);
        fs::rename(&temp, path)?;
        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp);
    }
    result
}
