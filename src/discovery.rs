use std::{
    fs, io,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
}

/// List the immediate children of `path` that are of the given kind.
///
/// Entries come back in the order the filesystem yields them.
///
/// # Errors
///
/// Returns an I/O error if `path` does not exist, is not a directory, or an
/// entry cannot be inspected.
pub fn list_entries(path: impl AsRef<Path>, kind: FileKind) -> io::Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(path.as_ref())? {
        let entry = entry?;
        let is_dir = entry.file_type()?.is_dir();
        let wanted = match kind {
            FileKind::Directory => is_dir,
            FileKind::File => !is_dir,
        };
        if wanted {
            entries.push(entry.path());
        }
    }
    Ok(entries)
}
