//! CLI integration tests
//!
//! Runs the pinprompt binary end-to-end against stand-in pinentry and stty
//! scripts.

#![cfg(unix)]

use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::sync::{Mutex, MutexGuard};
use tempfile::TempDir;

static SCRIPT_LOCK: Mutex<()> = Mutex::new(());

/// Serializes script creation and execution; see `lock_scripts` in the crate.
fn lock_scripts() -> MutexGuard<'static, ()> {
    SCRIPT_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Get path to the pinprompt binary
fn pinprompt_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_pinprompt"))
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}", body)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// A pinentry stand-in that logs every command it receives and answers
/// GETPIN with `getpin_reply`.
fn fake_pinentry(dir: &Path, getpin_reply: &str) -> (PathBuf, PathBuf) {
    let log = dir.join("pinentry.log");
    let script = write_script(
        dir,
        "pinentry",
        &format!(
            r#"echo "OK Pleased to meet you"
while IFS= read -r line; do
  echo "$line" >> "{log}"
  case "$line" in
    GETPIN) echo "{reply}" ;;
    *) echo OK ;;
  esac
done
"#,
            log = log.display(),
            reply = getpin_reply
        ),
    );
    (script, log)
}

fn fake_stty(dir: &Path) -> (PathBuf, PathBuf) {
    let log = dir.join("stty.log");
    let script = write_script(
        dir,
        "stty",
        &format!("echo \"$1\" >> \"{}\"\n", log.display()),
    );
    (script, log)
}

/// Run pinprompt with the given helpers, feeding `input` on stdin
fn run_pinprompt(pinentry: &Path, stty: &Path, args: &[&str], input: &str) -> Output {
    let mut child = Command::new(pinprompt_bin())
        .arg("--pinentry")
        .arg(pinentry)
        .arg("--stty")
        .arg(stty)
        .args(args)
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    {
        let stdin = child.stdin.as_mut().expect("failed to open stdin");
        // Ignore BrokenPipe errors - pinentry runs never read stdin
        let _ = stdin.write_all(input.as_bytes());
    }
    drop(child.stdin.take());

    child.wait_with_output().unwrap()
}

#[test]
fn test_secret_from_pinentry() {
    let _lock = lock_scripts();
    let temp_dir = TempDir::new().unwrap();
    let (pinentry, log) = fake_pinentry(temp_dir.path(), "D hunter2");
    let (stty, stty_log) = fake_stty(temp_dir.path());

    let result = run_pinprompt(
        &pinentry,
        &stty,
        &["--prompt", "PIN", "--description", "Unlock the card"],
        "",
    );

    assert!(
        result.status.success(),
        "pinprompt failed: {}",
        String::from_utf8_lossy(&result.stderr)
    );
    assert_eq!(String::from_utf8_lossy(&result.stdout), "hunter2\n");

    let sent = fs::read_to_string(&log).unwrap();
    let lines: Vec<&str> = sent.lines().collect();
    assert_eq!(lines[0], "SETPROMPT PIN");
    assert_eq!(lines[1], "SETDESC Unlock the card");
    assert!(lines[2].starts_with("OPTION ttytype="));
    assert_eq!(lines.last(), Some(&"GETPIN"));
    assert!(!stty_log.exists(), "terminal echo must not be touched");
}

#[test]
fn test_cancel_exit_status() {
    let _lock = lock_scripts();
    let temp_dir = TempDir::new().unwrap();
    let (pinentry, _) = fake_pinentry(temp_dir.path(), "ERR 83886179 Operation cancelled");
    let (stty, _) = fake_stty(temp_dir.path());

    let result = run_pinprompt(&pinentry, &stty, &[], "");

    assert_eq!(result.status.code(), Some(1));
    assert!(result.stdout.is_empty());
}

#[test]
fn test_protocol_error_reports_reply() {
    let _lock = lock_scripts();
    let temp_dir = TempDir::new().unwrap();
    let (pinentry, _) = fake_pinentry(temp_dir.path(), "ERR 99999999 boom");
    let (stty, _) = fake_stty(temp_dir.path());

    let result = run_pinprompt(&pinentry, &stty, &[], "");

    assert_eq!(result.status.code(), Some(2));
    assert!(result.stdout.is_empty());
    assert!(String::from_utf8_lossy(&result.stderr).contains("boom"));
}

#[test]
fn test_terminal_fallback_without_pinentry() {
    let _lock = lock_scripts();
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("no-such-pinentry");
    let (stty, stty_log) = fake_stty(temp_dir.path());

    let result = run_pinprompt(&missing, &stty, &[], "secretvalue\n");

    assert!(
        result.status.success(),
        "pinprompt failed: {}",
        String::from_utf8_lossy(&result.stderr)
    );
    assert_eq!(String::from_utf8_lossy(&result.stdout), "secretvalue\n");
    assert!(String::from_utf8_lossy(&result.stderr).contains("Password: "));
    assert_eq!(fs::read_to_string(&stty_log).unwrap(), "-echo\necho\n");
}

#[test]
fn test_terminal_fallback_restores_echo_on_closed_input() {
    let _lock = lock_scripts();
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("no-such-pinentry");
    let (stty, stty_log) = fake_stty(temp_dir.path());

    let result = run_pinprompt(&missing, &stty, &["--prompt", "PIN"], "");

    assert_eq!(result.status.code(), Some(2));
    assert!(result.stdout.is_empty());
    assert!(String::from_utf8_lossy(&result.stderr).contains("PIN: "));
    assert_eq!(fs::read_to_string(&stty_log).unwrap(), "-echo\necho\n");
}

#[test]
fn test_broken_greeting_falls_back_to_terminal() {
    let _lock = lock_scripts();
    let temp_dir = TempDir::new().unwrap();
    let pinentry = write_script(temp_dir.path(), "pinentry", "echo \"ERR 1 no display\"\n");
    let (stty, stty_log) = fake_stty(temp_dir.path());

    let result = run_pinprompt(
        &pinentry,
        &stty,
        &["--description", "Unlock the card"],
        "fromterminal\n",
    );

    assert!(
        result.status.success(),
        "pinprompt failed: {}",
        String::from_utf8_lossy(&result.stderr)
    );
    assert_eq!(String::from_utf8_lossy(&result.stdout), "fromterminal\n");
    assert!(String::from_utf8_lossy(&result.stderr).contains("Unlock the card\n\nPassword: "));
    assert_eq!(fs::read_to_string(&stty_log).unwrap(), "-echo\necho\n");
}

#[test]
fn test_nothing_available() {
    let _lock = lock_scripts();
    let temp_dir = TempDir::new().unwrap();
    let missing_pinentry = temp_dir.path().join("no-such-pinentry");
    let missing_stty = temp_dir.path().join("no-such-stty");

    let result = run_pinprompt(&missing_pinentry, &missing_stty, &[], "ignored\n");

    assert_eq!(result.status.code(), Some(2));
    assert!(result.stdout.is_empty());
    assert!(String::from_utf8_lossy(&result.stderr).contains("no pinentry or stty found"));
}

#[test]
fn test_pinentry_from_environment() {
    let _lock = lock_scripts();
    let temp_dir = TempDir::new().unwrap();
    let (pinentry, _) = fake_pinentry(temp_dir.path(), "D from-env");

    let result = Command::new(pinprompt_bin())
        .env("PINPROMPT_PINENTRY", &pinentry)
        .env_remove("RUST_LOG")
        .stdin(Stdio::null())
        .output()
        .unwrap();

    assert!(
        result.status.success(),
        "pinprompt failed: {}",
        String::from_utf8_lossy(&result.stderr)
    );
    assert_eq!(String::from_utf8_lossy(&result.stdout), "from-env\n");
}
