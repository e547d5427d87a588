// ABOUTME: Integration tests for the session lifecycle against a fake ssh binary.
// ABOUTME: Covers open/exec/close, capacity, idle expiry, timeouts, truncation and askpass.

mod support;

use sshmux::config::Secret;
use sshmux::session::{ErrorKind, ExecRequest, OpenRequest, SessionError, SessionManager};
use sshmux::ssh::AuthMode;
use std::sync::Arc;
use std::time::{Duration, Instant};
use support::fake_ssh::FakeSsh;

fn manager(fake: &FakeSsh) -> SessionManager {
    support::init_tracing();
    SessionManager::new(fake.settings()).unwrap()
}

fn kind<T: std::fmt::Debug>(result: Result<T, SessionError>) -> ErrorKind {
    result.unwrap_err().kind()
}

mod lifecycle {
    use super::*;

    /// Test: open, run a command, run a failing command, close, then use the dead id.
    #[tokio::test]
    async fn open_exec_close_round() {
        let fake = FakeSsh::new();
        let manager = manager(&fake);

        let opened = manager.open_session(OpenRequest::host("h1")).await.unwrap();
        let id = opened.session_id.to_string();
        assert_eq!(id.len(), 8);
        assert!(id.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)));
        assert_eq!(opened.host.as_str(), "h1");
        assert_eq!(opened.auth_mode, AuthMode::Key);
        assert_eq!(fake.control_files().len(), 1);

        let out = manager
            .session_exec(ExecRequest::new(&id, "echo alice"))
            .await
            .unwrap();
        assert_eq!(out.exit_code, 0);
        assert_eq!(out.stdout, "alice\n");
        assert!(!out.truncated);

        // A failing remote command is data, not an error.
        let out = manager
            .session_exec(ExecRequest::new(&id, "false"))
            .await
            .unwrap();
        assert_eq!(out.exit_code, 1);

        let closed = manager.close_session(&id).await.unwrap();
        assert!(closed.closed);
        assert_eq!(closed.teardown_error, None);
        assert!(fake.control_files().is_empty());

        let err = manager
            .session_exec(ExecRequest::new(&id, "pwd"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Execution);
        assert!(err.to_string().contains("unknown or expired session"));
    }

    /// Test: master is started with ControlMaster=yes and the resolved destination.
    #[tokio::test]
    async fn open_passes_target_to_ssh() {
        let fake = FakeSsh::new();
        let manager = manager(&fake);

        let opened = manager
            .open_session(OpenRequest {
                host: Some("db1".into()),
                user: Some("alice".into()),
                port: Some(2222),
                working_directory: None,
            })
            .await
            .unwrap();
        assert_eq!(opened.port, Some(2222));

        let argv = fake.invocations().join("\n");
        assert!(argv.contains("-p 2222"));
        assert!(argv.contains("-o ControlMaster=yes"));
        assert!(argv.contains("-o ControlPersist=300"));
        assert!(argv.contains("alice@db1 -- echo __sshmux_session_opened__"));
    }

    /// Test: closing twice reports closed then not-closed, never an error.
    #[tokio::test]
    async fn close_is_idempotent() {
        let fake = FakeSsh::new();
        let manager = manager(&fake);
        let id = manager
            .open_session(OpenRequest::host("h1"))
            .await
            .unwrap()
            .session_id;

        assert!(manager.close_session(id.as_str()).await.unwrap().closed);
        let again = manager.close_session(id.as_str()).await.unwrap();
        assert!(!again.closed);
        assert_eq!(again.session_id, id);
    }

    /// Test: teardown failure is reported but the session is still removed.
    #[tokio::test]
    async fn close_reclaims_state_when_teardown_fails() {
        let fake = FakeSsh::new();
        let manager = manager(&fake);
        let id = manager
            .open_session(OpenRequest::host("h1"))
            .await
            .unwrap()
            .session_id;
        for path in fake.control_files() {
            std::fs::remove_file(path).unwrap();
        }

        let closed = manager.close_session(id.as_str()).await.unwrap();
        assert!(closed.closed);
        assert!(closed.teardown_error.unwrap().contains("255"));
        assert_eq!(manager.active_sessions(), 0);
    }

    /// Test: unknown ids fail with execution and leave the table alone.
    #[tokio::test]
    async fn unknown_session_is_execution_error() {
        let fake = FakeSsh::new();
        let manager = manager(&fake);
        manager.open_session(OpenRequest::host("h1")).await.unwrap();

        let result = manager
            .session_exec(ExecRequest::new("deadbeef", "ls"))
            .await;
        assert_eq!(kind(result), ErrorKind::Execution);
        assert_eq!(manager.active_sessions(), 1);
    }

    /// Test: the session's directory and per-call overrides prefix the command.
    #[tokio::test]
    async fn working_directory_prefixes_commands() {
        let fake = FakeSsh::new();
        let manager = manager(&fake);
        let home = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let home_path = home.path().canonicalize().unwrap();
        let other_path = other.path().canonicalize().unwrap();

        let opened = manager
            .open_session(OpenRequest {
                host: Some("h1".into()),
                working_directory: Some(home_path.display().to_string()),
                ..OpenRequest::default()
            })
            .await
            .unwrap();
        let id = opened.session_id.to_string();

        let out = manager
            .session_exec(ExecRequest::new(&id, "pwd -P"))
            .await
            .unwrap();
        assert_eq!(out.stdout.trim(), home_path.display().to_string());

        let out = manager
            .session_exec(ExecRequest::new(&id, "pwd -P").in_dir(other_path.display().to_string()))
            .await
            .unwrap();
        assert_eq!(out.stdout.trim(), other_path.display().to_string());
    }

    /// Test: list reports live sessions; shutdown closes them all.
    #[tokio::test]
    async fn list_and_shutdown() {
        let fake = FakeSsh::new();
        let manager = manager(&fake);
        manager.open_session(OpenRequest::host("h1")).await.unwrap();
        manager.open_session(OpenRequest::host("h2")).await.unwrap();

        let listed = manager.list_sessions();
        let hosts: Vec<&str> = listed.sessions.iter().map(|s| s.host.as_str()).collect();
        assert_eq!(hosts.len(), 2);
        assert!(hosts.contains(&"h1") && hosts.contains(&"h2"));

        assert_eq!(manager.shutdown().await, 2);
        assert_eq!(manager.active_sessions(), 0);
        assert!(fake.control_files().is_empty());
    }
}

mod capacity {
    use super::*;

    /// Test: at the limit, open fails with validation; closing frees the slot.
    #[tokio::test]
    async fn limit_blocks_until_close() {
        let fake = FakeSsh::new();
        let manager = SessionManager::new(sshmux::config::Settings {
            max_sessions: 1,
            ..fake.settings()
        })
        .unwrap();

        let first = manager.open_session(OpenRequest::host("h1")).await.unwrap();
        let err = manager
            .open_session(OpenRequest::host("h1"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(
            err.to_string(),
            "Session limit reached (1). Close a session before opening a new one."
        );
        assert_eq!(manager.active_sessions(), 1);

        manager
            .close_session(first.session_id.as_str())
            .await
            .unwrap();
        assert!(manager.open_session(OpenRequest::host("h1")).await.is_ok());
    }

    /// Test: a cancelled open releases its reserved slot.
    #[tokio::test]
    async fn cancelled_open_frees_its_slot() {
        let fake = FakeSsh::new();
        let manager = SessionManager::new(sshmux::config::Settings {
            max_sessions: 1,
            ..fake.settings()
        })
        .unwrap();

        fake.set("hang-open", true);
        let cancelled = tokio::time::timeout(
            Duration::from_millis(300),
            manager.open_session(OpenRequest::host("h1")),
        )
        .await;
        assert!(cancelled.is_err());
        assert_eq!(manager.active_sessions(), 0);

        fake.set("hang-open", false);
        assert!(manager.open_session(OpenRequest::host("h1")).await.is_ok());
    }

    /// Test: shutdown waits for the teardown of a master whose open was cancelled.
    #[tokio::test]
    async fn shutdown_tears_down_cancelled_open() {
        let fake = FakeSsh::new();
        let manager = manager(&fake);

        fake.set("stall-open", true);
        let cancelled = tokio::time::timeout(
            Duration::from_millis(500),
            manager.open_session(OpenRequest::host("h1")),
        )
        .await;
        assert!(cancelled.is_err());
        assert_eq!(manager.active_sessions(), 0);

        assert_eq!(manager.shutdown().await, 0);
        assert!(fake.control_files().is_empty());
        assert!(
            fake.invocations()
                .iter()
                .any(|line| line.contains("-O exit"))
        );
    }
}

mod expiry {
    use super::*;

    /// Test: an idle session disappears at the next open, without an explicit close.
    #[tokio::test]
    async fn idle_session_is_reaped_on_next_call() {
        let fake = FakeSsh::new();
        let manager = SessionManager::new(sshmux::config::Settings {
            idle_timeout: Duration::from_millis(300),
            ..fake.settings()
        })
        .unwrap();

        let stale = manager
            .open_session(OpenRequest::host("h1"))
            .await
            .unwrap()
            .session_id;
        tokio::time::sleep(Duration::from_millis(450)).await;

        let fresh = manager
            .open_session(OpenRequest::host("h2"))
            .await
            .unwrap()
            .session_id;
        assert_eq!(manager.active_sessions(), 1);
        assert_eq!(fake.control_files().len(), 1);

        let result = manager
            .session_exec(ExecRequest::new(stale.as_str(), "true"))
            .await;
        assert_eq!(kind(result), ErrorKind::Execution);
        assert!(
            manager
                .session_exec(ExecRequest::new(fresh.as_str(), "true"))
                .await
                .is_ok()
        );
    }

    /// Test: exec keeps a session alive past the threshold measured from open.
    #[tokio::test]
    async fn recently_used_session_survives() {
        let fake = FakeSsh::new();
        let manager = SessionManager::new(sshmux::config::Settings {
            idle_timeout: Duration::from_millis(600),
            ..fake.settings()
        })
        .unwrap();

        let id = manager
            .open_session(OpenRequest::host("h1"))
            .await
            .unwrap()
            .session_id;
        for _ in 0..3 {
            tokio::time::sleep(Duration::from_millis(250)).await;
            manager
                .session_exec(ExecRequest::new(id.as_str(), "true"))
                .await
                .unwrap();
        }
        assert!(manager.reap_idle().await.is_empty());
        assert_eq!(manager.active_sessions(), 1);
    }

    /// Test: a session running a long command is busy, not idle, and survives a sweep.
    #[tokio::test]
    async fn busy_session_is_not_reaped() {
        let fake = FakeSsh::new();
        let manager = Arc::new(
            SessionManager::new(sshmux::config::Settings {
                idle_timeout: Duration::from_millis(500),
                ..fake.settings()
            })
            .unwrap(),
        );

        let id = manager
            .open_session(OpenRequest::host("h1"))
            .await
            .unwrap()
            .session_id;
        tokio::time::sleep(Duration::from_millis(300)).await;

        let running = {
            let manager = Arc::clone(&manager);
            let request = ExecRequest::new(id.as_str(), "sleep 1; echo done");
            tokio::spawn(async move { manager.session_exec(request).await })
        };
        tokio::time::sleep(Duration::from_millis(400)).await;

        // Sweeps while h1 is past the threshold but mid-command.
        manager.open_session(OpenRequest::host("h2")).await.unwrap();
        assert_eq!(manager.active_sessions(), 2);

        let out = running.await.unwrap().unwrap();
        assert_eq!(out.stdout, "done\n");
        let again = manager
            .session_exec(ExecRequest::new(id.as_str(), "echo alive"))
            .await
            .unwrap();
        assert_eq!(again.stdout, "alive\n");
    }
}

mod timeouts {
    use super::*;

    /// Test: a slow command times out, is killed, and the session survives.
    #[tokio::test]
    async fn command_timeout_preserves_session() {
        let fake = FakeSsh::new();
        let manager = SessionManager::new(sshmux::config::Settings {
            command_timeout: Duration::from_millis(400),
            connect_timeout: Some(Duration::from_secs(10)),
            ..fake.settings()
        })
        .unwrap();
        let id = manager
            .open_session(OpenRequest::host("h1"))
            .await
            .unwrap()
            .session_id;

        let started = Instant::now();
        let result = manager
            .session_exec(ExecRequest::new(id.as_str(), "sleep 20"))
            .await;
        assert_eq!(kind(result), ErrorKind::Timeout);
        assert!(started.elapsed() < Duration::from_secs(5));

        let out = manager
            .session_exec(ExecRequest::new(id.as_str(), "echo still-here"))
            .await
            .unwrap();
        assert_eq!(out.stdout, "still-here\n");
    }

    /// Test: cancelling an exec kills the remote process and frees the session lock.
    #[tokio::test]
    async fn cancelled_exec_kills_process_and_releases_session() {
        let fake = FakeSsh::new();
        let manager = manager(&fake);
        let id = manager
            .open_session(OpenRequest::host("h1"))
            .await
            .unwrap()
            .session_id;
        let pid_file = fake.dir().join("exec.pid");
        let command = format!("echo $$ > {}; exec sleep 30", pid_file.display());

        let cancelled = tokio::time::timeout(
            Duration::from_millis(500),
            manager.session_exec(ExecRequest::new(id.as_str(), command)),
        )
        .await;
        assert!(cancelled.is_err());
        let pid: u32 = std::fs::read_to_string(&pid_file)
            .unwrap()
            .trim()
            .parse()
            .unwrap();

        let next = tokio::time::timeout(
            Duration::from_secs(3),
            manager.session_exec(ExecRequest::new(id.as_str(), "echo next")),
        )
        .await
        .expect("session lock still held")
        .unwrap();
        assert_eq!(next.stdout, "next\n");

        let deadline = Instant::now() + Duration::from_secs(5);
        while FakeSsh::process_alive(pid) && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(!FakeSsh::process_alive(pid));
    }

    /// Test: a hung handshake times out and leaves nothing behind.
    #[tokio::test]
    async fn launch_timeout_leaves_no_record() {
        let fake = FakeSsh::new();
        let manager = SessionManager::new(sshmux::config::Settings {
            connect_timeout: Some(Duration::from_millis(300)),
            ..fake.settings()
        })
        .unwrap();
        fake.set("hang-open", true);

        let result = manager.open_session(OpenRequest::host("h1")).await;
        assert_eq!(kind(result), ErrorKind::Timeout);
        assert_eq!(manager.active_sessions(), 0);
        assert!(fake.control_files().is_empty());
    }
}

mod failures {
    use super::*;

    /// Test: a rejected handshake is an execution error carrying ssh's stderr.
    #[tokio::test]
    async fn handshake_failure_is_execution() {
        let fake = FakeSsh::new();
        let manager = manager(&fake);
        fake.set("fail-open", true);

        let err = manager
            .open_session(OpenRequest::host("h1"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Execution);
        assert!(err.to_string().contains("Permission denied"));
        assert_eq!(manager.active_sessions(), 0);
    }

    /// Test: ssh exiting cleanly without the marker is not a session.
    #[tokio::test]
    async fn missing_marker_is_execution() {
        let fake = FakeSsh::new();
        let manager = manager(&fake);
        fake.set("mute-open", true);

        let result = manager.open_session(OpenRequest::host("h1")).await;
        assert_eq!(kind(result), ErrorKind::Execution);
        assert_eq!(manager.active_sessions(), 0);
    }

    /// Test: a missing ssh binary is a config error.
    #[tokio::test]
    async fn missing_binary_is_config() {
        let fake = FakeSsh::new();
        let manager = SessionManager::new(sshmux::config::Settings {
            command: "/nonexistent/ssh".into(),
            ..fake.settings()
        })
        .unwrap();

        let result = manager.open_session(OpenRequest::host("h1")).await;
        assert_eq!(kind(result), ErrorKind::Config);
        assert_eq!(kind(manager.health_check().await), ErrorKind::Config);
    }

    /// Test: a session directory too long for a socket fails fast with config.
    #[tokio::test]
    async fn overlong_session_dir_is_config() {
        let fake = FakeSsh::new();
        let deep = fake.dir().join("d".repeat(100));
        let manager = SessionManager::new(sshmux::config::Settings {
            session_dir: Some(deep),
            ..fake.settings()
        })
        .unwrap();

        let before = fake.invocations().len();
        let result = manager.open_session(OpenRequest::host("h1")).await;
        assert_eq!(kind(result), ErrorKind::Config);
        assert_eq!(fake.invocations().len(), before);
        assert_eq!(manager.active_sessions(), 0);
    }

    /// Test: the health probe reports the fake's version.
    #[tokio::test]
    async fn health_check_reports_version() {
        let fake = FakeSsh::new();
        let manager = manager(&fake);
        let report = manager.health_check().await.unwrap();
        assert_eq!(report.status, "ok");
        assert_eq!(report.version, "OpenSSH_fake");
        assert_eq!(report.active_sessions, 0);
    }
}

mod validation {
    use super::*;

    /// Test: bad commands are rejected before anything is spawned.
    #[tokio::test]
    async fn illegal_commands_never_spawn() {
        let fake = FakeSsh::new();
        let manager = SessionManager::new(sshmux::config::Settings {
            max_command_chars: 10,
            ..fake.settings()
        })
        .unwrap();
        let id = manager
            .open_session(OpenRequest::host("h1"))
            .await
            .unwrap()
            .session_id;
        let before = fake.invocations().len();

        for command in ["ls\nrm -rf /", "ls\rid", "   ", "echo 12345678"] {
            let result = manager
                .session_exec(ExecRequest::new(id.as_str(), command))
                .await;
            assert_eq!(kind(result), ErrorKind::Validation, "{command:?}");
        }
        assert_eq!(fake.invocations().len(), before);
    }

    /// Test: malformed ids are validation errors for exec and close.
    #[tokio::test]
    async fn malformed_session_id() {
        let fake = FakeSsh::new();
        let manager = manager(&fake);
        let result = manager.session_exec(ExecRequest::new("xyz", "ls")).await;
        assert_eq!(kind(result), ErrorKind::Validation);
        assert_eq!(kind(manager.close_session("").await), ErrorKind::Validation);
    }

    /// Test: disallowed hosts and bad ports are rejected before connecting.
    #[tokio::test]
    async fn target_checks() {
        let fake = FakeSsh::new();
        let manager = SessionManager::new(sshmux::config::Settings {
            allowed_hosts: vec![sshmux::types::Hostname::new("h1").unwrap()],
            ..fake.settings()
        })
        .unwrap();

        let result = manager.open_session(OpenRequest::host("h2")).await;
        assert_eq!(kind(result), ErrorKind::Validation);
        let result = manager
            .open_session(OpenRequest {
                host: Some("h1".into()),
                port: Some(0),
                ..OpenRequest::default()
            })
            .await;
        assert_eq!(kind(result), ErrorKind::Validation);
        let result = manager.open_session(OpenRequest::default()).await;
        assert_eq!(kind(result), ErrorKind::Validation);
        assert!(fake.invocations().is_empty());
    }
}

mod output {
    use super::*;

    /// Test: long output is cut with the marker and flagged.
    #[tokio::test]
    async fn output_is_truncated() {
        let fake = FakeSsh::new();
        let manager = SessionManager::new(sshmux::config::Settings {
            max_output_chars: 10,
            ..fake.settings()
        })
        .unwrap();
        let id = manager
            .open_session(OpenRequest::host("h1"))
            .await
            .unwrap()
            .session_id;

        let out = manager
            .session_exec(ExecRequest::new(id.as_str(), "printf abcdefghijklmnop"))
            .await
            .unwrap();
        assert!(out.truncated);
        assert_eq!(out.stdout, "abcdefghij\n...[truncated to 10 chars]");
        assert_eq!(out.stderr, "");
    }

    /// Test: execs on one session never interleave.
    #[tokio::test]
    async fn execs_on_one_session_are_serialised() {
        let fake = FakeSsh::new();
        let manager = Arc::new(manager(&fake));
        let id = manager
            .open_session(OpenRequest::host("h1"))
            .await
            .unwrap()
            .session_id;
        let log = fake.dir().join("order.log");
        let command = format!(
            "echo start >> {0}; sleep 0.2; echo end >> {0}",
            log.display()
        );

        let mut tasks = Vec::new();
        for _ in 0..3 {
            let manager = Arc::clone(&manager);
            let request = ExecRequest::new(id.as_str(), command.clone());
            tasks.push(tokio::spawn(async move { manager.session_exec(request).await }));
        }
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap().exit_code, 0);
        }

        let order = std::fs::read_to_string(&log).unwrap();
        assert_eq!(order, "start\nend\nstart\nend\nstart\nend\n");
    }
}

mod askpass {
    use super::*;

    /// Test: password mode hands the secret to ssh via askpass only, then removes the helper.
    #[tokio::test]
    async fn secret_reaches_askpass_but_not_argv() {
        let fake = FakeSsh::new();
        let manager = SessionManager::new(sshmux::config::Settings {
            password: Some(Secret::new("hunter2")),
            ..fake.settings()
        })
        .unwrap();

        let opened = manager.open_session(OpenRequest::host("h1")).await.unwrap();
        assert_eq!(opened.auth_mode, AuthMode::Password);
        assert_eq!(fake.askpass_output().as_deref(), Some("hunter2\n"));

        let argv = fake.invocations().join("\n");
        assert!(!argv.contains("hunter2"));
        assert!(argv.contains("-o PubkeyAuthentication=no"));
        assert!(fake.stray_files().is_empty(), "askpass helper left behind");

        manager
            .session_exec(ExecRequest::new(opened.session_id.as_str(), "true"))
            .await
            .unwrap();
        assert!(fake.stray_files().is_empty());
    }

    /// Test: an unreadable secret file is a config error and spawns nothing.
    #[tokio::test]
    async fn unreadable_secret_file_is_config() {
        let fake = FakeSsh::new();
        let manager = SessionManager::new(sshmux::config::Settings {
            password_file: Some(fake.dir().join("missing-secret")),
            ..fake.settings()
        })
        .unwrap();

        let result = manager.open_session(OpenRequest::host("h1")).await;
        assert_eq!(kind(result), ErrorKind::Config);
        assert!(fake.invocations().is_empty());
    }
}
