//! Scoped suspension of terminal echo

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, warn};

/// Terminal echo is process-wide state; only one guard may exist at a time.
static ECHO_LOCK: Mutex<()> = Mutex::new(());

/// Keeps terminal echo disabled for as long as it is alive.
///
/// Created by [`EchoGuard::disable`]; dropping it, including while
/// unwinding from a panic, runs the echo program again to turn echo back on.
#[must_use = "echo is restored as soon as the guard is dropped"]
pub struct EchoGuard {
    program: PathBuf,
    working_dir: PathBuf,
    _lock: MutexGuard<'static, ()>,
}

impl EchoGuard {
    /// Runs `<program> -echo` and returns a guard that runs `<program> echo`.
    ///
    /// Failing to disable echo is logged and otherwise ignored: asking with
    /// echo on beats not being able to ask at all. Blocks while another
    /// guard is alive.
    pub fn disable(program: &Path, working_dir: &Path) -> Self {
        let lock = lock_or_recover(&ECHO_LOCK);
        run_echo_program(program, working_dir, "-echo");
        Self {
            program: program.to_path_buf(),
            working_dir: working_dir.to_path_buf(),
            _lock: lock,
        }
    }
}

impl Drop for EchoGuard {
    fn drop(&mut self) {
        run_echo_program(&self.program, &self.working_dir, "echo");
    }
}

fn run_echo_program(program: &Path, working_dir: &Path, mode: &str) {
    match Command::new(program)
        .arg(mode)
        .current_dir(working_dir)
        .status()
    {
        Ok(status) if status.success() => debug!(mode, "toggled terminal echo"),
        Ok(status) => warn!(mode, %status, "echo program failed"),
        Err(e) => warn!(mode, error = %e, "failed to run echo program"),
    }
}

// A guard dropped during a panic poisons the lock; the terminal has been
// restored by then, so the lock is still usable.
fn lock_or_recover(lock: &'static Mutex<()>) -> MutexGuard<'static, ()> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            debug!("echo lock poisoned; recovering");
            poisoned.into_inner()
        }
    }
}
