//! Command implementations for the wslkit CLI
//!
//! Each command writes its report to `out`; command output from inside
//! the distro goes straight to the inherited console handles.

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};
use wslkit_config::Settings;
use wslkit_distro::{
    Configuration, Distro, ShellOptions, Wsl, WslError, run_until, run_with_deadline,
};

use super::args::{Commands, SetArgs};

#[derive(Serialize)]
struct ShowOutput<'a> {
    distro: &'a str,
    configuration: Configuration,
}

/// Execute a parsed subcommand against `wsl`.
pub fn execute(
    command: Commands,
    wsl: &Wsl,
    settings: &Settings,
    out: &mut dyn Write,
) -> Result<()> {
    match command {
        Commands::Register { name, archive } => {
            wsl.distro(&name).register(&archive)?;
            writeln!(out, "Registered {name}")?;
        }
        Commands::Unregister { name } => {
            wsl.distro(&name).unregister()?;
            writeln!(out, "Unregistered {name}")?;
        }
        Commands::Show { json } => {
            let distro = resolve_distro(wsl, settings)?;
            show(&distro, json, out)?;
        }
        Commands::Set(args) => {
            let distro = resolve_distro(wsl, settings)?;
            set(&distro, &args, out)?;
        }
        Commands::Run {
            cwd,
            timeout,
            command,
        } => {
            let distro = resolve_distro(wsl, settings)?;
            let deadline = timeout.map(Duration::from_secs).or(settings.deadline);
            run(&distro, &command.join(" "), cwd || settings.use_cwd, deadline)?;
        }
        Commands::Shell { cwd, command } => {
            let distro = resolve_distro(wsl, settings)?;
            let mut options = ShellOptions::new();
            if cwd || settings.use_cwd {
                options = options.use_cwd();
            }
            if let Some(command) = command {
                options = options.with_command(command);
            }
            distro.shell(options)?;
        }
        Commands::List => {
            for distro in wsl.registered_distros()? {
                writeln!(out, "{}", distro.name())?;
            }
        }
        Commands::Terminate => {
            let distro = resolve_distro(wsl, settings)?;
            distro.terminate()?;
            writeln!(out, "Terminated {}", distro.name())?;
        }
        Commands::SetDefault => {
            let distro = resolve_distro(wsl, settings)?;
            distro.set_as_default()?;
            writeln!(out, "Default distro is now {}", distro.name())?;
        }
        Commands::Shutdown => {
            wsl.shutdown()?;
            writeln!(out, "All distros stopped")?;
        }
        Commands::Config => print_config(settings, out)?,
    }
    Ok(())
}

/// The configured distro, else the WSL default.
pub fn resolve_distro(wsl: &Wsl, settings: &Settings) -> Result<Distro, WslError> {
    if let Some(name) = &settings.distro {
        return Ok(wsl.distro(name));
    }
    debug!("no distro configured, asking wsl.exe for the default");
    wsl.default_distro()?.ok_or_else(|| WslError::InvalidArgument {
        distro: String::new(),
        reason: "no distro given and no default distro is registered; use --distro".to_string(),
    })
}

fn show(distro: &Distro, json: bool, out: &mut dyn Write) -> Result<()> {
    let output = ShowOutput {
        distro: distro.name(),
        configuration: distro.configuration()?,
    };
    if json {
        serde_json::to_writer_pretty(&mut *out, &output)
            .context("Failed to serialize configuration")?;
        writeln!(out)?;
    } else {
        let yaml = serde_yaml::to_string(&output).context("Failed to serialize configuration")?;
        write!(out, "{yaml}")?;
    }
    Ok(())
}

fn set(distro: &Distro, args: &SetArgs, out: &mut dyn Write) -> Result<()> {
    if args.is_empty() {
        return Err(WslError::InvalidArgument {
            distro: distro.name().to_string(),
            reason: "nothing to change; pass at least one of --default-uid, --interop, --append-path, --mount-drives"
                .to_string(),
        }
        .into());
    }

    // One read-modify-write for all requested changes.
    let mut config = distro.configuration()?;
    if let Some(uid) = args.default_uid {
        config.default_uid = uid;
    }
    if let Some(enabled) = args.interop {
        config.interop_enabled = enabled;
    }
    if let Some(appended) = args.append_path {
        config.path_appended = appended;
    }
    if let Some(enabled) = args.mount_drives {
        config.drive_mounting_enabled = enabled;
    }
    distro.configure(&config)?;

    info!(distro = %distro.name(), "configuration updated");
    writeln!(out, "Updated {}", distro.name())?;
    Ok(())
}

fn run(
    distro: &Distro,
    command_line: &str,
    use_cwd: bool,
    deadline: Option<Duration>,
) -> Result<()> {
    let mut cmd = distro.command(command_line);
    cmd.use_cwd = use_cwd;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let result = runtime.block_on(async {
        match deadline {
            Some(deadline) => run_with_deadline(&mut cmd, deadline).await,
            None => run_until(&mut cmd, ctrl_c()).await,
        }
    });
    Ok(result?)
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn ctrl_c() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

fn print_config(settings: &Settings, out: &mut dyn Write) -> Result<()> {
    writeln!(out, "Effective configuration:")?;
    match &settings.config_path {
        Some(path) => writeln!(out, "  config file: {}", path.display())?,
        None => writeln!(out, "  config file: (none)")?,
    }
    for (key, (value, source)) in settings.effective_config() {
        writeln!(out, "  {key} = {value}  [{source}]")?;
    }
    Ok(())
}
