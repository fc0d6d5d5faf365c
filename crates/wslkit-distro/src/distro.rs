//! A named distro and its configuration.
//!
//! This type holds no state besides its name: configuration is fetched
//! from and pushed to the native layer on every call. Changing the
//! configuration of the same distro from several threads at once is not
//! synchronized; the setters read, modify and write back.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info};
use wslkit_native::{NativeCall, NativeError, WideString, WslApi};

use crate::command::{Command, LaunchMode};
use crate::configuration::Configuration;
use crate::context::Wsl;
use crate::error::WslError;

#[derive(Clone)]
pub struct Distro {
    wsl: Wsl,
    name: String,
}

impl fmt::Debug for Distro {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Distro").field("name", &self.name).finish()
    }
}

impl PartialEq for Distro {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Distro {}

impl Distro {
    pub(crate) fn new(wsl: Wsl, name: String) -> Self {
        Self { wsl, name }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn context(&self) -> &Wsl {
        &self.wsl
    }

    /// Invoke one native call with this distro's name in wide form.
    pub(crate) fn native<T>(
        &self,
        call: NativeCall,
        f: impl FnOnce(&dyn WslApi, &WideString) -> Result<T, NativeError>,
    ) -> Result<T, WslError> {
        debug!(distro = %self.name, call = %call, "native call");
        let name = self.wide(call, &self.name, "distro name")?;
        f(self.wsl.api().as_ref(), &name).map_err(|e| WslError::native(&self.name, call, e))
    }

    pub(crate) fn wide(&self, call: NativeCall, text: &str, what: &str) -> Result<WideString, WslError> {
        WideString::new(text, what).map_err(|e| WslError::native(&self.name, call, e))
    }

    /// Current configuration, including the default environment.
    pub fn configuration(&self) -> Result<Configuration, WslError> {
        self.native(NativeCall::GetDistributionConfiguration, |api, name| {
            api.get_distribution_configuration(name)
        })
        .map(Configuration::from)
    }

    /// Push the mutable part of `config` (default UID and feature flags).
    pub fn configure(&self, config: &Configuration) -> Result<(), WslError> {
        let flags = config.pack_flags()?;
        self.native(NativeCall::ConfigureDistribution, |api, name| {
            api.configure_distribution(name, config.default_uid, flags)
        })
    }

    fn update(&self, change: impl FnOnce(&mut Configuration)) -> Result<(), WslError> {
        let mut config = self.configuration()?;
        change(&mut config);
        self.configure(&config)
    }

    /// Make `uid` the user commands run as.
    pub fn set_default_uid(&self, uid: u32) -> Result<(), WslError> {
        self.update(|c| c.default_uid = uid)
    }

    /// Allow or forbid launching Windows executables from the distro.
    pub fn set_interop_enabled(&self, enabled: bool) -> Result<(), WslError> {
        self.update(|c| c.interop_enabled = enabled)
    }

    /// Append (or stop appending) Windows paths to `$PATH`.
    pub fn set_path_appended(&self, appended: bool) -> Result<(), WslError> {
        self.update(|c| c.path_appended = appended)
    }

    /// Mount (or stop mounting) Windows drives inside the distro.
    pub fn set_drive_mounting_enabled(&self, enabled: bool) -> Result<(), WslError> {
        self.update(|c| c.drive_mounting_enabled = enabled)
    }

    /// Name and configuration as YAML.
    ///
    /// A configuration query failure is rendered in place of the
    /// configuration rather than returned.
    #[must_use]
    pub fn describe(&self) -> String {
        #[derive(Serialize)]
        #[serde(untagged)]
        enum Described {
            Configuration(Configuration),
            Error(String),
        }

        #[derive(Serialize)]
        struct Description<'a> {
            distro: &'a str,
            configuration: Described,
        }

        let configuration = match self.configuration() {
            Ok(config) => Described::Configuration(config),
            Err(e) => Described::Error(e.to_string()),
        };
        let description = Description {
            distro: &self.name,
            configuration,
        };
        serde_yaml::to_string(&description)
            .unwrap_or_else(|e| format!("distro: {}\nconfiguration: {e}\n", self.name))
    }

    /// A command to run `command_line` in this distro.
    ///
    /// Streams default to the host's standard handles and the command
    /// starts in the distro user's home directory.
    #[must_use]
    pub fn command(&self, command_line: impl Into<String>) -> Command {
        Command::new(self.clone(), command_line.into(), LaunchMode::Attached)
    }

    /// Power off this distro (`wsl --terminate`).
    pub fn terminate(&self) -> Result<(), WslError> {
        info!(distro = %self.name, "terminating distro");
        self.wsl.get_wsl_exe().terminate(&self.name)
    }

    /// Make this the default distro (`wsl --set-default`).
    pub fn set_as_default(&self) -> Result<(), WslError> {
        info!(distro = %self.name, "setting default distro");
        self.wsl.get_wsl_exe().set_default(&self.name)
    }
}

impl fmt::Display for Distro {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use wslkit_native::test_support::{FakeDistro, FakeWslApi};
    use wslkit_native::DistroFlags;

    fn setup() -> (Arc<FakeWslApi>, Distro) {
        let api = Arc::new(FakeWslApi::new().with_distro("Ubuntu"));
        let distro = Wsl::with_api(api.clone()).distro("Ubuntu");
        (api, distro)
    }

    #[test]
    fn test_configuration_is_fetched() {
        let (_api, distro) = setup();
        let config = distro.configuration().unwrap();

        assert_eq!(config.wsl_version, 2);
        assert!(config.interop_enabled);
        assert_eq!(config.default_environment["HOSTTYPE"], "x86_64");
    }

    #[test]
    fn test_setters_read_modify_write() {
        let (api, distro) = setup();

        distro.set_default_uid(1000).unwrap();
        distro.set_interop_enabled(false).unwrap();
        distro.set_drive_mounting_enabled(false).unwrap();

        let stored = api.distro("Ubuntu").unwrap();
        assert_eq!(stored.default_uid, 1000);
        assert_eq!(
            stored.flags,
            DistroFlags::APPEND_NT_PATH | DistroFlags::WSL_VERSION_2
        );
        assert_eq!(api.call_count(NativeCall::ConfigureDistribution), 3);
        assert_eq!(api.call_count(NativeCall::GetDistributionConfiguration), 3);

        distro.set_path_appended(false).unwrap();
        let config = distro.configuration().unwrap();
        assert!(!config.path_appended);
        assert_eq!(config.default_uid, 1000);
    }

    #[test]
    fn test_configure_rejects_bad_version_before_native_call() {
        let (api, distro) = setup();
        let mut config = distro.configuration().unwrap();
        config.wsl_version = 3;

        let err = distro.configure(&config).unwrap_err();
        assert!(matches!(err, WslError::InvalidConfiguration { version: 3 }));
        assert_eq!(api.call_count(NativeCall::ConfigureDistribution), 0);
    }

    #[test]
    fn test_unregistered_distro_configuration_fails_with_context() {
        let (_api, distro) = setup();
        let missing = distro.context().distro("Nope");

        let err = missing.configuration().unwrap_err();
        match err {
            WslError::Native { distro, call, .. } => {
                assert_eq!(distro, "Nope");
                assert_eq!(call, NativeCall::GetDistributionConfiguration);
            }
            other => panic!("Expected Native error, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_environment_surfaces() {
        let (api, distro) = setup();
        api.set_environment("Ubuntu", vec![b"GOOD=1".to_vec(), b"BROKEN".to_vec()]);

        let err = distro.configuration().unwrap_err();
        assert!(matches!(err, WslError::MalformedEnvironment { .. }));
        assert_eq!(api.allocator().live_allocations(), 0);
    }

    #[test]
    fn test_name_with_nul_is_invalid_argument() {
        let (api, distro) = setup();
        let bad = distro.context().distro("bad\0name");

        assert!(matches!(bad.configuration(), Err(WslError::InvalidArgument { .. })));
        assert_eq!(api.call_count(NativeCall::GetDistributionConfiguration), 0);
    }

    #[test]
    fn test_describe_renders_sorted_environment() {
        let (api, distro) = setup();
        api.add_distro(
            "Ubuntu",
            FakeDistro {
                default_uid: 1000,
                environment: vec![b"ZED=last".to_vec(), b"ALPHA=first".to_vec()],
                ..FakeDistro::default()
            },
        );

        let yaml = distro.describe();
        assert!(yaml.starts_with("distro: Ubuntu\n"), "{yaml}");
        assert!(yaml.contains("default_uid: 1000"), "{yaml}");
        assert!(yaml.contains("wsl_version: 2"), "{yaml}");
        let alpha = yaml.find("ALPHA: first").unwrap();
        let zed = yaml.find("ZED: last").unwrap();
        assert!(alpha < zed);
    }

    #[test]
    fn test_describe_renders_error_in_place() {
        let (_api, distro) = setup();
        let yaml = distro.context().distro("Nope").describe();

        assert!(yaml.starts_with("distro: Nope\n"), "{yaml}");
        assert!(yaml.contains("configuration:"), "{yaml}");
        assert!(yaml.contains("not registered"), "{yaml}");
    }

    #[test]
    fn test_command_factory_defaults() {
        let (_api, distro) = setup();
        let cmd = distro.command("echo hi");

        assert_eq!(cmd.command_line(), "echo hi");
        assert!(!cmd.use_cwd);
        assert_eq!(cmd.distro(), &distro);
    }
}
