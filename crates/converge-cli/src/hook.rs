//! External hook program as executor
//!
//! The hook is run once per operation. It receives the operation as JSON on
//! stdin and the phase (`execute` or `compensate`) as its last argument:
//!
//! ```text
//! <program> <args..> execute    < {"path":["pkg"],"kind":"replace",...}
//! ```
//!
//! The phase, kind and dotted path are also exported as `CONVERGE_PHASE`,
//! `CONVERGE_OP_KIND` and `CONVERGE_OP_PATH`. A non-zero exit fails the
//! operation.

use crate::settings::HookSettings;
use converge_core::{ChangeOp, ExecError, Executor};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Execute,
    Compensate,
}

impl Phase {
    fn as_str(self) -> &'static str {
        match self {
            Self::Execute => "execute",
            Self::Compensate => "compensate",
        }
    }
}

/// Runs a configured program for every operation.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    program: String,
    args: Vec<String>,
    work_dir: PathBuf,
}

impl CommandExecutor {
    pub fn new(hook: &HookSettings, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: hook.program.clone(),
            args: hook.args.clone(),
            work_dir: work_dir.into(),
        }
    }

    fn run(&self, op: &ChangeOp, phase: Phase) -> Result<(), ExecError> {
        let payload = serde_json::to_vec(&op.json())
            .map_err(|e| ExecError::with_source(format!("cannot encode {op}"), e))?;

        tracing::debug!(program = %self.program, phase = phase.as_str(), path = %op.path, "running hook");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(phase.as_str())
            .current_dir(&self.work_dir)
            .env("CONVERGE_PHASE", phase.as_str())
            .env("CONVERGE_OP_KIND", op.kind.to_string())
            .env("CONVERGE_OP_PATH", op.path.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ExecError::with_source(format!("cannot start hook {}", self.program), e))?;

        // Stdin is fed from its own thread; a hook may fill its output pipes
        // before it reads any input.
        let stdin = child.stdin.take();
        let (output, written) = thread::scope(|scope| {
            let writer = scope.spawn(move || match stdin {
                Some(mut stdin) => stdin.write_all(&payload),
                None => Ok(()),
            });
            (child.wait_with_output(), writer.join())
        });

        let output = output
            .map_err(|e| ExecError::with_source(format!("hook {} did not finish", self.program), e))?;
        match written {
            // A hook may exit without reading its input.
            Ok(Err(e)) if e.kind() != std::io::ErrorKind::BrokenPipe => {
                return Err(ExecError::with_source("cannot write to hook", e));
            }
            Err(_) => return Err(ExecError::new("hook input writer panicked")),
            Ok(_) => {}
        }

        if !output.status.success() {
            // Include stderr in the error message for actionable diagnostics
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr_snippet = stderr.trim();
            let message = if stderr_snippet.is_empty() {
                format!(
                    "Hook {} exited with non-zero status (exit code: {:?})",
                    self.program,
                    output.status.code()
                )
            } else {
                format!(
                    "Hook {} exited with non-zero status (exit code: {:?}): {}",
                    self.program,
                    output.status.code(),
                    stderr_snippet
                )
            };
            return Err(ExecError::new(message));
        }

        Ok(())
    }
}

impl Executor for CommandExecutor {
    fn execute(&mut self, op: &ChangeOp) -> Result<(), ExecError> {
        self.run(op, Phase::Execute)
    }

    fn compensate(&mut self, op: &ChangeOp) -> Result<(), ExecError> {
        self.run(op, Phase::Compensate)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use converge_core::Value;
    use std::fs;
    use tempfile::TempDir;

    fn sh(script: &str) -> HookSettings {
        HookSettings {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string(), "hook".to_string()],
        }
    }

    fn op() -> ChangeOp {
        ChangeOp::add("shell".parse().unwrap(), Value::str("zsh"))
    }

    #[test]
    fn hook_receives_op_on_stdin_and_phase_as_argument() {
        let dir = TempDir::new().unwrap();
        let mut executor = CommandExecutor::new(
            &sh("cat > op.json; echo \"$1 $CONVERGE_OP_KIND $CONVERGE_OP_PATH\" > phase.txt"),
            dir.path(),
        );

        executor.execute(&op()).unwrap();

        let payload: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("op.json")).unwrap()).unwrap();
        assert_eq!(payload["kind"], "add");
        assert_eq!(payload["new_value"], "zsh");
        assert_eq!(
            fs::read_to_string(dir.path().join("phase.txt")).unwrap(),
            "execute add shell\n"
        );

        executor.compensate(&op()).unwrap();
        assert!(
            fs::read_to_string(dir.path().join("phase.txt"))
                .unwrap()
                .starts_with("compensate")
        );
    }

    #[test]
    fn non_zero_exit_carries_stderr() {
        let dir = TempDir::new().unwrap();
        let mut executor = CommandExecutor::new(&sh("echo 'disk full' >&2; exit 3"), dir.path());

        let err = executor.execute(&op()).unwrap_err();

        assert!(err.message().contains("exit code: Some(3)"));
        assert!(err.message().ends_with("disk full"));
    }

    #[test]
    fn large_payload_with_chatty_hook_completes() {
        let dir = TempDir::new().unwrap();
        let mut executor = CommandExecutor::new(
            &sh("head -c 200000 /dev/zero; cat > op.json"),
            dir.path(),
        );
        let packages = (0..20_000).map(|i| Value::str(format!("package-{i}")));
        let op = ChangeOp::add("pkg".parse().unwrap(), Value::list(packages));
        let expected_len = serde_json::to_vec(&op.json()).unwrap().len();
        assert!(expected_len > 64 * 1024);

        let (done_tx, done_rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let result = executor.execute(&op).map_err(|e| e.to_string());
            let _ = done_tx.send(result);
        });
        let result = done_rx
            .recv_timeout(std::time::Duration::from_secs(60))
            .expect("hook run did not finish");

        assert_eq!(result, Ok(()));
        assert_eq!(
            fs::metadata(dir.path().join("op.json")).unwrap().len() as usize,
            expected_len
        );
    }

    #[test]
    fn missing_program_is_an_exec_error() {
        let dir = TempDir::new().unwrap();
        let hook = HookSettings {
            program: "converge-hook-that-does-not-exist".to_string(),
            args: vec![],
        };

        let err = CommandExecutor::new(&hook, dir.path()).execute(&op()).unwrap_err();

        assert!(err.message().starts_with("cannot start hook"));
    }
}
