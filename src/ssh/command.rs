// ABOUTME: Argument vectors for every ssh invocation sshmux makes.
// ABOUTME: ControlMaster open, multiplexed exec, `-O exit` teardown and the version probe.

use std::fmt;
use std::path::Path;

use crate::config::{Settings, Target};

/// Printed by the remote side once the master connection is up.
pub const HANDSHAKE_MARKER: &str = "__sshmux_session_opened__";

const PASSWORD_OPTIONS: [&str; 3] = [
    "BatchMode=no",
    "PubkeyAuthentication=no",
    "PreferredAuthentications=password,keyboard-interactive",
];

/// A program plus its arguments. Environment is applied separately at spawn time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshCommand {
    program: String,
    args: Vec<String>,
}

impl SshCommand {
    /// Start from the configured binary and base arguments.
    pub fn new(settings: &Settings) -> Self {
        Self {
            program: settings.command.clone(),
            args: settings.base_args.clone(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append `-o key=value`.
    pub fn option(self, key: &str, value: impl fmt::Display) -> Self {
        self.arg("-o").arg(format!("{key}={value}"))
    }

    fn port(self, port: Option<u16>) -> Self {
        match port {
            Some(port) => self.arg("-p").arg(port.to_string()),
            None => self,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn argv(&self) -> &[String] {
        &self.args
    }

    pub(crate) fn to_command(&self) -> tokio::process::Command {
        let mut command = tokio::process::Command::new(&self.program);
        command.args(&self.args);
        command
    }

    /// `ssh ... -o ControlMaster=yes ... <dest> -- echo <marker>`
    pub fn open_master(
        settings: &Settings,
        target: &Target,
        control_path: &Path,
        password: bool,
    ) -> Self {
        let mut command = Self::new(settings)
            .port(target.port)
            .option("ControlMaster", "yes")
            .option("ControlPath", control_path.display())
            .option("ControlPersist", settings.idle_timeout.as_secs().max(1));
        if password {
            for option in PASSWORD_OPTIONS {
                command = command.arg("-o").arg(option);
            }
        }
        command
            .arg(target.destination())
            .arg("--")
            .arg(format!("echo {HANDSHAKE_MARKER}"))
    }

    /// `ssh ... -o ControlMaster=no -o ControlPath=<path> <dest> -- <remote>`
    pub fn exec_remote(
        settings: &Settings,
        target: &Target,
        control_path: &Path,
        remote: &str,
    ) -> Self {
        Self::new(settings)
            .port(target.port)
            .option("ControlMaster", "no")
            .option("ControlPath", control_path.display())
            .arg(target.destination())
            .arg("--")
            .arg(remote)
    }

    /// `ssh ... -o ControlPath=<path> -O exit <dest>`
    pub fn exit_master(settings: &Settings, target: &Target, control_path: &Path) -> Self {
        Self::new(settings)
            .port(target.port)
            .option("ControlPath", control_path.display())
            .arg("-O")
            .arg("exit")
            .arg(target.destination())
    }

    pub fn version_probe(settings: &Settings) -> Self {
        Self::new(settings).args(settings.health_check_args.iter().cloned())
    }
}

impl fmt::Display for SshCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let words = std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str));
        match shlex::try_join(words) {
            Ok(joined) => f.write_str(&joined),
            Err(_) => write!(f, "{} {}", self.program, self.args.join(" ")),
        }
    }
}

/// Prefix `command` with `cd <dir> &&` when a directory is given.
pub fn compose_remote(command: &str, working_directory: Option<&str>) -> String {
    match working_directory {
        Some(dir) => {
            let quoted = shlex::try_quote(dir)
                .map(|q| q.into_owned())
                .unwrap_or_else(|_| format!("'{}'", dir.replace('\'', r"'\''")));
            format!("cd {quoted} && {command}")
        }
        None => command.to_string(),
    }
}
