//! Builds the tar archive a [`crate::ContainerUpdater`] unpacks at the
//! container root (spec.md §4.B).

use std::io;
use std::path::{Path, PathBuf};

/// One local file to add to the archive, keyed by the container-root-relative
/// path it should be unpacked at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub local_path: PathBuf,
    pub container_path: PathBuf,
}

fn archive_relative_path(container_path: &Path) -> PathBuf {
    container_path
        .strip_prefix("/")
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| container_path.to_path_buf())
}

/// Builds an in-memory tar stream of `entries`, preserving file modes.
///
/// Paths are stored relative to the container root (an `ArchiveEntry` of
/// `/app/src/main.go` becomes the tar entry `app/src/main.go`), matching how
/// the updater unpacks it with the container's `/` as the extraction root.
pub fn build_tar(entries: &[ArchiveEntry]) -> io::Result<Vec<u8>> {
    let mut builder = tar::Builder::new(Vec::new());
    for entry in entries {
        let mut file = std::fs::File::open(&entry.local_path)?;
        let metadata = file.metadata()?;
        let mut header = tar::Header::new_gnu();
        header.set_metadata(&metadata);
        header.set_size(metadata.len());
        header.set_cksum();
        builder.append_data(&mut header, archive_relative_path(&entry.container_path), &mut file)?;
    }
    builder.into_inner()
}
