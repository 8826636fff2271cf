//! Process liveness probing.
//!
//! The event loop polls its launching interpreter between signals and
//! exits cleanly once that process is gone.

/// Whether a process with the given pid exists.
///
/// `kill(pid, 0)` delivers no signal; it only performs the existence
/// and permission checks. `EPERM` still means the process exists.
#[allow(unsafe_code)] // raw kill(2) probe; no std equivalent
pub fn alive(pid: u32) -> bool {
    let rc = unsafe { libc::kill(pid as libc::pid_t, 0) };
    rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}
