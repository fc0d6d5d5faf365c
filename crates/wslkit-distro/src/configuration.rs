//! Distro configuration and its flag codec.

use std::collections::BTreeMap;

use serde::Serialize;
use wslkit_native::{DistroFlags, RawConfiguration};

use crate::error::WslError;

/// Configuration of a distro as reported by the native layer.
///
/// Only `default_uid` and the three feature flags are pushed back by
/// [`Distro::configure`](crate::Distro::configure). `version`, `wsl_version`
/// and `default_environment` are read-only snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Configuration {
    /// Filesystem type tag (lxfs vs. wslfs, only relevant to WSL 1)
    pub version: u32,
    /// User ID of the default user
    pub default_uid: u32,
    /// Windows executables can be launched from the distro
    pub interop_enabled: bool,
    /// Windows paths are appended to `$PATH`
    pub path_appended: bool,
    /// Windows drives are mounted under `/mnt`
    pub drive_mounting_enabled: bool,
    /// WSL 1 vs. WSL 2; carried in an undocumented flag bit
    pub wsl_version: u8,
    /// Environment variables passed to the distro by default
    pub default_environment: BTreeMap<String, String>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            version: 0,
            default_uid: 0,
            interop_enabled: false,
            path_appended: false,
            drive_mounting_enabled: false,
            wsl_version: 1,
            default_environment: BTreeMap::new(),
        }
    }
}

impl Configuration {
    /// Pack the feature flags and WSL version into the native bitfield.
    ///
    /// Fails with [`WslError::InvalidConfiguration`] unless `wsl_version` is 1 or 2.
    pub fn pack_flags(&self) -> Result<DistroFlags, WslError> {
        let mut flags = DistroFlags::empty();
        flags.set(DistroFlags::ENABLE_INTEROP, self.interop_enabled);
        flags.set(DistroFlags::APPEND_NT_PATH, self.path_appended);
        flags.set(DistroFlags::ENABLE_DRIVE_MOUNTING, self.drive_mounting_enabled);

        match self.wsl_version {
            1 => {}
            2 => flags |= DistroFlags::WSL_VERSION_2,
            version => return Err(WslError::InvalidConfiguration { version }),
        }
        Ok(flags)
    }

    /// Overwrite the feature flags and WSL version from a native bitfield.
    ///
    /// Any bit pattern is accepted; bits this crate does not know are ignored.
    pub fn unpack_flags(&mut self, flags: DistroFlags) {
        self.interop_enabled = flags.contains(DistroFlags::ENABLE_INTEROP);
        self.path_appended = flags.contains(DistroFlags::APPEND_NT_PATH);
        self.drive_mounting_enabled = flags.contains(DistroFlags::ENABLE_DRIVE_MOUNTING);
        self.wsl_version = if flags.contains(DistroFlags::WSL_VERSION_2) { 2 } else { 1 };
    }
}

impl From<RawConfiguration> for Configuration {
    fn from(raw: RawConfiguration) -> Self {
        let mut config = Self {
            version: raw.version,
            default_uid: raw.default_uid,
            default_environment: raw.environment,
            ..Self::default()
        };
        config.unpack_flags(raw.flags);
        config
    }
}
