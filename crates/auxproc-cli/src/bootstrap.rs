//! Fork-into-background bootstrap.
//!
//! On startup the processor forks into the background, detaches from
//! its controlling terminal, and closes its standard output — the
//! launcher reads EOF there as the readiness signal. Diagnostics stay
//! on stderr, and all later communication happens over the signal
//! channel.

use std::io;

/// Fork into the background. The parent exits immediately; the child
/// becomes a session leader with stdin/stdout on `/dev/null`.
///
/// Must run before the async runtime is built — the child of a fork
/// inherits only the calling thread.
#[allow(unsafe_code)]
pub fn daemonize() -> io::Result<()> {
    let pid = unsafe { libc::fork() };
    match pid {
        -1 => Err(io::Error::last_os_error()),
        0 => {
            if unsafe { libc::setsid() } == -1 {
                return Err(io::Error::last_os_error());
            }
            detach_stdio()
        }
        _ => unsafe { libc::_exit(0) },
    }
}

/// Point stdin and stdout at `/dev/null`, releasing the launcher's
/// pipe. stderr is left alone — it is the diagnostic stream.
#[allow(unsafe_code)]
fn detach_stdio() -> io::Result<()> {
    let null = unsafe { libc::open(c"/dev/null".as_ptr(), libc::O_RDWR) };
    if null == -1 {
        return Err(io::Error::last_os_error());
    }
    for fd in [libc::STDIN_FILENO, libc::STDOUT_FILENO] {
        if unsafe { libc::dup2(null, fd) } == -1 {
            return Err(io::Error::last_os_error());
        }
    }
    if null > libc::STDERR_FILENO {
        unsafe { libc::close(null) };
    }
    Ok(())
}
