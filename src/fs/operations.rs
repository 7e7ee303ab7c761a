use std::{
    fs::File,
    io::{self, Write},
    path::Path,
};

use fs4::fs_std::FileExt;
use tempfile::NamedTempFile;

/// Replaces the contents of `path` with `data` so that readers see either the old or the new
/// file, never a partial write. `lock_path` is held exclusively for the duration of the write so
/// that two processes writing the same file don't interleave.
pub fn write_atomically(path: &Path, lock_path: &Path, data: &[u8]) -> Result<(), io::Error> {
    let dir = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;

    let lock = File::options()
        .create(true)
        .truncate(false)
        .write(true)
        .open(lock_path)?;
    lock.lock_exclusive()?;

    let result: Result<(), io::Error> = (|| {
        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(data)?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| e.error)?;
        Ok(())
    })();

    FileExt::unlock(&lock)?;
    result
}

/// Reads the whole file, treating a missing file as absent data.
pub fn read_if_exists(path: &Path) -> Result<Option<Vec<u8>>, io::Error> {
    match std::fs::read(path) {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
