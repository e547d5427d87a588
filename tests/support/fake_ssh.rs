// ABOUTME: Shell-script stand-in for OpenSSH used by integration tests.
// ABOUTME: Emulates ControlMaster/ControlPath/-O exit and runs "remote" commands locally.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use sshmux::config::Settings;
use tempfile::TempDir;

const SCRIPT: &str = r#"#!/bin/sh
state='@STATE@'
printf '%s\n' "$*" >> "$state/argv.log"
control=""
master=""
op=""
while [ $# -gt 0 ]; do
  case "$1" in
    -o)
      case "$2" in
        ControlPath=*) control="${2#ControlPath=}" ;;
        ControlMaster=*) master="${2#ControlMaster=}" ;;
      esac
      shift 2 ;;
    -O) op="$2"; shift 2 ;;
    -p|-F|-i|-l) shift 2 ;;
    -V) echo "OpenSSH_fake" >&2; exit 0 ;;
    --) shift; break ;;
    -*) shift ;;
    *) shift ;;
  esac
done

if [ "$op" = "exit" ]; then
  if [ -e "$control" ]; then
    rm -f "$control"
    echo "Exit request sent." >&2
    exit 0
  fi
  echo "Control socket connect($control): No such file or directory" >&2
  exit 255
fi

if [ "$master" = "yes" ]; then
  if [ -n "$SSH_ASKPASS" ]; then "$SSH_ASKPASS" > "$state/askpass.out"; fi
  if [ -e "$state/hang-open" ]; then sleep 30; fi
  if [ -e "$state/fail-open" ]; then echo "Permission denied (publickey)." >&2; exit 255; fi
  if [ -e "$state/mute-open" ]; then exit 0; fi
  : > "$control"
  if [ -e "$state/stall-open" ]; then sleep 30; fi
  exec sh -c "$*"
fi

if [ ! -e "$control" ]; then
  echo "Control socket connect($control): No such file or directory" >&2
  exit 255
fi
exec sh -c "$*"
"#;

/// A fake `ssh` in its own directory, plus a short session directory for sockets.
pub struct FakeSsh {
    dir: TempDir,
}

impl FakeSsh {
    pub fn new() -> Self {
        // Under /tmp so control paths stay within the socket length budget.
        let dir = tempfile::Builder::new()
            .prefix("fssh")
            .tempdir_in("/tmp")
            .unwrap();
        let script = SCRIPT.replace("@STATE@", dir.path().to_str().unwrap());
        let path = dir.path().join("ssh");
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        std::fs::create_dir(dir.path().join("socks")).unwrap();
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn binary(&self) -> PathBuf {
        self.dir.path().join("ssh")
    }

    pub fn session_dir(&self) -> PathBuf {
        self.dir.path().join("socks")
    }

    /// Settings pointing at this fake with short test timeouts.
    pub fn settings(&self) -> Settings {
        Settings {
            command: self.binary().display().to_string(),
            command_timeout: Duration::from_secs(10),
            teardown_timeout: Duration::from_secs(5),
            session_dir: Some(self.session_dir()),
            ..Settings::default()
        }
    }

    /// Every argv the fake was invoked with, one line per call.
    pub fn invocations(&self) -> Vec<String> {
        std::fs::read_to_string(self.dir.path().join("argv.log"))
            .map(|log| log.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Control sockets currently present.
    pub fn control_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.session_dir())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "sock"))
            .collect()
    }

    /// Files in the session directory other than control sockets.
    pub fn stray_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.session_dir())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|p| !p.extension().is_some_and(|ext| ext == "sock"))
            .collect()
    }

    /// Toggle a scripted behaviour: "hang-open", "stall-open", "fail-open" or "mute-open".
    /// "stall-open" hangs after the control socket exists; "hang-open" before.
    pub fn set(&self, flag: &str, on: bool) {
        let path = self.dir.path().join(flag);
        if on {
            std::fs::write(path, "").unwrap();
        } else {
            let _ = std::fs::remove_file(path);
        }
    }

    /// Whether `pid` is still running. Reaped and zombie processes count as gone.
    pub fn process_alive(pid: u32) -> bool {
        std::process::Command::new("ps")
            .args(["-o", "stat=", "-p", &pid.to_string()])
            .output()
            .map(|out| {
                let stat = String::from_utf8_lossy(&out.stdout);
                let stat = stat.trim();
                !stat.is_empty() && !stat.starts_with('Z')
            })
            .unwrap_or(false)
    }

    /// What the askpass helper printed during the last open, if it ran.
    pub fn askpass_output(&self) -> Option<String> {
        std::fs::read_to_string(self.dir.path().join("askpass.out")).ok()
    }
}
