/// Volume capacity queries, used to size the synthetic free-space and
/// other-space nodes.
use std::path::Path;

/// Capacity and free space of the volume holding a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeSpace {
    /// Total capacity in bytes.
    pub total_bytes: u64,
    /// Bytes available to unprivileged users.
    pub free_bytes: u64,
}

impl VolumeSpace {
    /// Bytes in use on the volume.
    pub fn used_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.free_bytes)
    }
}

/// Query the volume that contains `path`.
///
/// Returns `None` if the query fails or the platform offers no way to ask.
#[cfg(unix)]
pub fn volume_space(path: &Path) -> Option<VolumeSpace> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes()).ok()?;
    // SAFETY: `statvfs` only writes into the zeroed struct we own and reads
    // the NUL-terminated path, which outlives the call.
    let stat = unsafe {
        let mut stat: libc::statvfs = std::mem::zeroed();
        if libc::statvfs(c_path.as_ptr(), &mut stat) != 0 {
            tracing::debug!("statvfs failed for {}", path.display());
            return None;
        }
        stat
    };

    #[allow(clippy::unnecessary_cast)]
    let fragment = if stat.f_frsize > 0 {
        stat.f_frsize as u64
    } else {
        stat.f_bsize as u64
    };
    #[allow(clippy::unnecessary_cast)]
    let space = VolumeSpace {
        total_bytes: (stat.f_blocks as u64).saturating_mul(fragment),
        free_bytes: (stat.f_bavail as u64).saturating_mul(fragment),
    };
    Some(space)
}

#[cfg(not(unix))]
pub fn volume_space(_path: &Path) -> Option<VolumeSpace> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn temp_dir_volume_reports_capacity() {
        let tmp = tempfile::TempDir::new().unwrap();
        let space = volume_space(tmp.path()).expect("statvfs on a temp dir");
        assert!(space.total_bytes > 0);
        assert!(space.free_bytes <= space.total_bytes);
        assert_eq!(space.used_bytes(), space.total_bytes - space.free_bytes);
    }

    #[test]
    fn missing_path_has_no_volume() {
        assert!(volume_space(Path::new("/definitely/not/here/at/all")).is_none());
    }
}
