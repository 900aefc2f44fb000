//! Descriptor table accounting for the subprocess backpressure gate.

/// Free descriptors: the soft `RLIMIT_NOFILE` minus the descriptors open now.
///
/// Returns `usize::MAX` where either number cannot be determined, which
/// disables the gate rather than blocking forever.
#[must_use]
pub fn available_file_descriptors() -> usize {
    match (descriptor_limit(), open_descriptors()) {
        (Some(limit), Some(open)) => limit.saturating_sub(open),
        _ => usize::MAX,
    }
}

#[cfg(unix)]
fn descriptor_limit() -> Option<usize> {
    let mut limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    let rc = unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &raw mut limit) };
    if rc != 0 {
        return None;
    }
    let effective = limit.rlim_cur.min(limit.rlim_max);
    Some(usize::try_from(effective).unwrap_or(usize::MAX))
}

#[cfg(not(unix))]
fn descriptor_limit() -> Option<usize> {
    None
}

#[cfg(target_os = "linux")]
const FD_DIR: &str = "/proc/self/fd";

#[cfg(all(unix, not(target_os = "linux")))]
const FD_DIR: &str = "/dev/fd";

#[cfg(unix)]
fn open_descriptors() -> Option<usize> {
    std::fs::read_dir(FD_DIR).ok().map(Iterator::count)
}

#[cfg(not(unix))]
fn open_descriptors() -> Option<usize> {
    None
}
