//! Process hardening for the classifier
//!
//! Decrypted content lives in this process's memory for the duration of a
//! model call. With the `hardening` feature on Linux, core dumps are
//! disabled at startup so a crash cannot write that memory to disk.

use crate::error::Result;

/// Whether hardening is compiled in for this target
pub fn is_enabled() -> bool {
    cfg!(all(feature = "hardening", target_os = "linux"))
}

/// Set `RLIMIT_CORE` to zero. No-op without the `hardening` feature.
#[cfg(all(feature = "hardening", target_os = "linux"))]
pub fn disable_core_dumps() -> Result<()> {
    let limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: setrlimit only reads the struct we pass by pointer.
    let rc = unsafe { libc::setrlimit(libc::RLIMIT_CORE, &limit) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    tracing::debug!("Core dumps disabled");
    Ok(())
}

/// Set `RLIMIT_CORE` to zero. No-op without the `hardening` feature.
#[cfg(not(all(feature = "hardening", target_os = "linux")))]
pub fn disable_core_dumps() -> Result<()> {
    tracing::debug!("Process hardening not compiled in");
    Ok(())
}
