//! Privilege checks
//!
//! Every workflow writes under /etc and /usr/local/bin and talks to the init
//! system and packet filter, so the installer refuses to start without root.

use nix::unistd::geteuid;

use crate::error::{InstallerError, Result};

pub fn is_root() -> bool {
    geteuid().is_root()
}

pub fn require_root() -> Result<()> {
    if is_root() {
        Ok(())
    } else {
        Err(InstallerError::PermissionDenied)
    }
}
