//! Operations only exposed through `wsl.exe`
//!
//! Terminating a single distro, shutting down the whole subsystem, picking
//! the default distro and listing registered distros have no `wslapi.dll`
//! counterpart, so they shell out to `wsl.exe` with argv-style arguments.

use std::ffi::OsString;
use std::path::PathBuf;

use tracing::debug;

use crate::command_spec::CommandSpec;
use crate::error::WslError;

/// Locates and invokes `wsl.exe`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WslExe {
    program: OsString,
}

impl Default for WslExe {
    fn default() -> Self {
        Self::new("wsl.exe")
    }
}

impl WslExe {
    /// Use `program` as the `wsl.exe` binary.
    #[must_use]
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Resolve `wsl.exe` on `PATH`, falling back to the bare name.
    #[must_use]
    pub fn locate() -> Self {
        match which::which("wsl.exe") {
            Ok(path) => Self::new(path),
            Err(_) => Self::default(),
        }
    }

    #[must_use]
    pub fn program(&self) -> PathBuf {
        PathBuf::from(&self.program)
    }

    fn spec<I, S>(&self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        CommandSpec::new(&self.program).args(args)
    }

    /// Run `wsl.exe` with `args` and return its standard output.
    fn run<I, S>(&self, args: I) -> Result<Vec<u8>, WslError>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let spec = self.spec(args);
        debug!(command = %spec, "invoking wsl.exe");

        let output = spec.to_command().output().map_err(|e| WslError::WslExe {
            reason: format!("could not run {}: {e}", self.program.to_string_lossy()),
        })?;

        if !output.status.success() {
            let stderr = normalize_wsl_output(&output.stderr);
            let stdout = normalize_wsl_output(&output.stdout);
            let detail = [stderr.trim(), stdout.trim()]
                .into_iter()
                .find(|s| !s.is_empty())
                .unwrap_or("no output")
                .to_string();
            return Err(WslError::WslExe {
                reason: format!("`{spec}` exited with {}: {detail}", output.status),
            });
        }
        Ok(output.stdout)
    }

    /// `wsl --terminate <distro>`
    pub fn terminate(&self, distro: &str) -> Result<(), WslError> {
        self.run(["--terminate", distro]).map(drop)
    }

    /// `wsl --shutdown`
    pub fn shutdown(&self) -> Result<(), WslError> {
        self.run(["--shutdown"]).map(drop)
    }

    /// `wsl --set-default <distro>`
    pub fn set_default(&self, distro: &str) -> Result<(), WslError> {
        self.run(["--set-default", distro]).map(drop)
    }

    /// `wsl --list --quiet`, default distro first.
    pub fn list(&self) -> Result<Vec<String>, WslError> {
        let stdout = self.run(["--list", "--quiet"])?;
        Ok(parse_distro_list(&stdout))
    }
}

/// Parse the output of `wsl --list --quiet` into distro names.
///
/// The output is UTF-16LE on most Windows locales; UTF-8 is accepted too.
#[must_use]
pub fn parse_distro_list(raw: &[u8]) -> Vec<String> {
    normalize_wsl_output(raw)
        .lines()
        .map(|line| line.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}'))
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Decode `wsl.exe` output, detecting UTF-16LE by its interleaved zero bytes.
#[must_use]
pub fn normalize_wsl_output(raw: &[u8]) -> String {
    let looks_like_utf16le = raw.len() >= 4
        && raw.len().is_multiple_of(2)
        && raw
            .iter()
            .skip(1)
            .step_by(2)
            .take(10)
            .filter(|&&b| b == 0x00)
            .count()
            >= 2;

    if looks_like_utf16le {
        let units: Vec<u16> = raw
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }

    String::from_utf8_lossy(raw).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf16le(text: &str) -> Vec<u8> {
        text.encode_utf16().flat_map(u16::to_le_bytes).collect()
    }

    #[test]
    fn test_parse_distro_list_utf8() {
        let distros = parse_distro_list(b"Ubuntu-22.04\nDebian\n");
        assert_eq!(distros, vec!["Ubuntu-22.04", "Debian"]);
    }

    #[test]
    fn test_parse_distro_list_utf16le_with_crlf() {
        let distros = parse_distro_list(&utf16le("Ubuntu\r\nkali-linux\r\n"));
        assert_eq!(distros, vec!["Ubuntu", "kali-linux"]);
    }

    #[test]
    fn test_parse_distro_list_strips_bom_and_blank_lines() {
        let distros = parse_distro_list(&utf16le("\u{feff}Ubuntu\r\n\r\n  \r\nDebian"));
        assert_eq!(distros, vec!["Ubuntu", "Debian"]);
    }

    #[test]
    fn test_parse_distro_list_empty() {
        assert!(parse_distro_list(b"").is_empty());
        assert!(parse_distro_list(b"\n  \n").is_empty());
    }

    #[test]
    fn test_normalize_short_input_is_utf8() {
        assert_eq!(normalize_wsl_output(b"ab"), "ab");
        assert_eq!(normalize_wsl_output(b"abcde"), "abcde");
    }

    #[test]
    fn test_missing_program_is_wslexe_error() {
        let exe = WslExe::new("/nonexistent/wslkit-test/wsl.exe");
        let err = exe.shutdown().unwrap_err();
        match err {
            WslError::WslExe { reason } => assert!(reason.contains("could not run")),
            other => panic!("Expected WslExe error, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_list_through_stand_in_program() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("wsl.exe");
        std::fs::write(&script, "#!/bin/sh\nprintf 'Ubuntu\\nDebian\\n'\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let exe = WslExe::new(script.as_os_str());
        assert_eq!(exe.list().unwrap(), vec!["Ubuntu", "Debian"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_program_reports_output() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("wsl.exe");
        std::fs::write(&script, "#!/bin/sh\necho 'There is no distribution' >&2\nexit 1\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let err = WslExe::new(script.as_os_str()).terminate("Nope").unwrap_err();
        assert!(err.to_string().contains("There is no distribution"));
    }
}
