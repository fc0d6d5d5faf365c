//! Creating and destroying distros.

use std::path::{Path, PathBuf};

use tracing::info;
use wslkit_native::NativeCall;

use crate::distro::Distro;
use crate::error::WslError;

impl Distro {
    /// Whether a distro with this exact name is registered.
    pub fn is_registered(&self) -> Result<bool, WslError> {
        self.native(NativeCall::IsDistributionRegistered, |api, name| {
            api.is_distribution_registered(name)
        })
    }

    pub(crate) fn ensure_registered(&self) -> Result<(), WslError> {
        if self.is_registered()? {
            Ok(())
        } else {
            Err(WslError::NotRegistered {
                distro: self.name().to_string(),
            })
        }
    }

    /// Create the distro from a root filesystem tarball.
    ///
    /// The distro gets its own copy of the archive. Fails with
    /// [`WslError::ArchiveNotFound`] or [`WslError::AlreadyRegistered`]
    /// before anything is handed to the native layer.
    pub fn register(&self, archive: impl AsRef<Path>) -> Result<(), WslError> {
        let archive = resolve_archive(archive.as_ref())?;

        if self.is_registered()? {
            return Err(WslError::AlreadyRegistered {
                distro: self.name().to_string(),
            });
        }

        info!(distro = %self.name(), archive = %archive.display(), "registering distro");
        self.native(NativeCall::RegisterDistribution, |api, name| {
            api.register_distribution(name, &archive)
        })
    }

    /// Destroy the distro and its filesystem.
    pub fn unregister(&self) -> Result<(), WslError> {
        self.ensure_registered()?;

        info!(distro = %self.name(), "unregistering distro");
        self.native(NativeCall::UnregisterDistribution, |api, name| {
            api.unregister_distribution(name)
        })
    }
}

/// Turn `path` into the absolute, existing path the native registration expects.
pub(crate) fn resolve_archive(path: &Path) -> Result<PathBuf, WslError> {
    let absolute = std::path::absolute(path)?;
    if !absolute.exists() {
        return Err(WslError::ArchiveNotFound { path: absolute });
    }
    Ok(canonicalize(&absolute)?)
}

#[cfg(windows)]
fn canonicalize(path: &Path) -> std::io::Result<PathBuf> {
    // Strips the `\\?\` prefix, which WslRegisterDistribution rejects.
    dunce::canonicalize(path)
}

#[cfg(not(windows))]
fn canonicalize(path: &Path) -> std::io::Result<PathBuf> {
    std::fs::canonicalize(path)
}
