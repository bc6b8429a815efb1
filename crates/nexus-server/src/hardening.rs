//! Process hardening applied at startup.
//!
//! The deployment encryption key and session secret live in process memory
//! for the lifetime of the server. On Unix this module keeps them off disk:
//! [`disable_core_dumps`] sets `RLIMIT_CORE` to zero and [`lock_memory`]
//! pins all pages with `mlockall`. Both are no-ops elsewhere.

use std::io;

/// Errors from hardening syscalls.
#[derive(Debug, thiserror::Error)]
pub enum HardeningError {
    #[error("setrlimit(RLIMIT_CORE, 0) failed: {0}")]
    CoreDumps(io::Error),

    #[error("mlockall(MCL_CURRENT | MCL_FUTURE) failed: {0}")]
    MemoryLock(io::Error),
}

/// Disable core dumps for this process.
///
/// # Errors
///
/// Returns [`HardeningError::CoreDumps`] if `setrlimit` fails.
#[cfg(unix)]
pub fn disable_core_dumps() -> Result<(), HardeningError> {
    let limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: `limit` is a valid, initialized `rlimit` that outlives the call;
    // `setrlimit` only reads it.
    #[allow(unsafe_code)]
    let rc = unsafe { libc::setrlimit(libc::RLIMIT_CORE, &limit) };
    if rc == 0 {
        Ok(())
    } else {
        Err(HardeningError::CoreDumps(io::Error::last_os_error()))
    }
}

#[cfg(not(unix))]
pub fn disable_core_dumps() -> Result<(), HardeningError> {
    Ok(())
}

/// Lock all current and future pages into RAM.
///
/// Needs `CAP_IPC_LOCK` or root on Linux. Set `NEXUS_DISABLE_MLOCK=true` to
/// skip it in development.
///
/// # Errors
///
/// Returns [`HardeningError::MemoryLock`] if `mlockall` fails.
#[cfg(unix)]
pub fn lock_memory() -> Result<(), HardeningError> {
    // SAFETY: `mlockall` takes only flag bits and touches no caller memory.
    #[allow(unsafe_code)]
    let rc = unsafe { libc::mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE) };
    if rc == 0 {
        Ok(())
    } else {
        Err(HardeningError::MemoryLock(io::Error::last_os_error()))
    }
}

#[cfg(not(unix))]
pub fn lock_memory() -> Result<(), HardeningError> {
    Ok(())
}
