/// Platform-specific functionality: size measurement, volume capacity,
/// and the trash.
pub mod trash;
pub mod volume;

pub use trash::{SystemTrash, TrashCan};
pub use volume::{volume_space, VolumeSpace};

use std::fs::Metadata;

/// Size of an entry as configured: logical length, or the space actually
/// allocated on disk (block-rounded, sparse-aware).
///
/// Platforms without an allocation count fall back to the logical length.
pub fn measured_size(meta: &Metadata, use_physical_size: bool) -> u64 {
    if use_physical_size {
        allocated_size(meta)
    } else {
        meta.len()
    }
}

#[cfg(unix)]
fn allocated_size(meta: &Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    // st_blocks is always in 512-byte units, whatever the filesystem block size.
    meta.blocks().saturating_mul(512)
}

#[cfg(not(unix))]
fn allocated_size(meta: &Metadata) -> u64 {
    meta.len()
}

/// Owner-executable permission bit. Always `false` where the platform has
/// no such bit.
#[cfg(unix)]
pub fn is_executable(meta: &Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.is_file() && meta.permissions().mode() & 0o100 != 0
}

#[cfg(not(unix))]
pub fn is_executable(_meta: &Metadata) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn logical_size_is_the_file_length() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[7u8; 300]).unwrap();
        file.flush().unwrap();
        let meta = std::fs::metadata(file.path()).unwrap();
        assert_eq!(measured_size(&meta, false), 300);
    }

    #[cfg(unix)]
    #[test]
    fn physical_size_is_block_rounded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[7u8; 300]).unwrap();
        file.as_file().sync_all().unwrap();
        let meta = std::fs::metadata(file.path()).unwrap();
        let physical = measured_size(&meta, true);
        assert_eq!(physical % 512, 0);
    }
}
