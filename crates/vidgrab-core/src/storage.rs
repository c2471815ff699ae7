use serde::Serialize;
use std::io;
use std::path::Path;
use utoipa::ToSchema;

/// Point-in-time view of the storage directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct StorageStats {
    pub exists: bool,
    pub file_count: u64,
    pub disk_free_bytes: Option<u64>,
    pub disk_total_bytes: Option<u64>,
}

impl StorageStats {
    /// Counts the regular files directly under `dir` and reads disk usage.
    ///
    /// A missing directory is reported with `exists: false`; any other I/O
    /// failure is returned.
    pub async fn collect(dir: &Path) -> io::Result<Self> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(Self {
                    exists: false,
                    file_count: 0,
                    disk_free_bytes: None,
                    disk_total_bytes: None,
                });
            }
            Err(e) => return Err(e),
        };

        let mut file_count = 0;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                file_count += 1;
            }
        }

        let (disk_free_bytes, disk_total_bytes) = match disk_space(dir) {
            Some((free, total)) => (Some(free), Some(total)),
            None => (None, None),
        };

        Ok(Self {
            exists: true,
            file_count,
            disk_free_bytes,
            disk_total_bytes,
        })
    }
}

/// Returns `(free, total)` bytes for the filesystem holding `path`.
#[cfg(unix)]
pub fn disk_space(path: &Path) -> Option<(u64, u64)> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes()).ok()?;
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if rc != 0 {
        return None;
    }

    let fragment = stat.f_frsize as u64;
    Some((
        (stat.f_bavail as u64).saturating_mul(fragment),
        (stat.f_blocks as u64).saturating_mul(fragment),
    ))
}

#[cfg(not(unix))]
pub fn disk_space(_path: &Path) -> Option<(u64, u64)> {
    None
}
