//! `WSL_DISTRIBUTION_FLAGS`
//!
//! <https://learn.microsoft.com/en-us/windows/win32/api/wslapi/ne-wslapi-wsl_distribution_flags>

use bitflags::bitflags;

bitflags! {
    /// Distribution feature flags as exchanged with the native layer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DistroFlags: u32 {
        /// Windows executables can be launched from inside the distro.
        const ENABLE_INTEROP = 0x1;
        /// Windows `%PATH%` entries are appended to `$PATH`.
        const APPEND_NT_PATH = 0x2;
        /// Windows drives are mounted under `/mnt`.
        const ENABLE_DRIVE_MOUNTING = 0x4;
        /// Undocumented: set for WSL 2 distros, clear for WSL 1.
        ///
        /// See <https://github.com/microsoft/WSL-DistroLauncher/issues/96>.
        const WSL_VERSION_2 = 0x8;

        // Unknown bits reported by newer platforms are kept as-is.
        const _ = !0;
    }
}

impl DistroFlags {
    /// The documented defaults for a freshly registered distro.
    pub const DEFAULT: DistroFlags = DistroFlags::ENABLE_INTEROP
        .union(DistroFlags::APPEND_NT_PATH)
        .union(DistroFlags::ENABLE_DRIVE_MOUNTING);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_values_match_wslapi() {
        assert_eq!(DistroFlags::empty().bits(), 0x0);
        assert_eq!(DistroFlags::ENABLE_INTEROP.bits(), 0x1);
        assert_eq!(DistroFlags::APPEND_NT_PATH.bits(), 0x2);
        assert_eq!(DistroFlags::ENABLE_DRIVE_MOUNTING.bits(), 0x4);
        assert_eq!(DistroFlags::WSL_VERSION_2.bits(), 0x8);
        assert_eq!(DistroFlags::DEFAULT.bits(), 0x7);
    }

    #[test]
    fn test_unknown_bits_are_retained() {
        let flags = DistroFlags::from_bits_retain(0x10 | 0x1);
        assert!(flags.contains(DistroFlags::ENABLE_INTEROP));
        assert_eq!(flags.bits(), 0x11);
    }
}
