use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::oracle::{OracleError, OracleRequest, OracleResponse, TranslationOracle};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Oracle backed by an external program.
///
/// The request is written to stdin as JSON. Stdout is read either as
/// `{"candidate": "..."}` or, failing that, as the candidate text itself.
/// The process is killed when it runs past `timeout`.
#[derive(Debug, Clone)]
pub struct CommandOracle {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandOracle {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, timeout: Duration) -> Self {
        Self { program: program.into(), args, timeout }
    }
}

impl TranslationOracle for CommandOracle {
    fn translate(&self, request: &OracleRequest) -> Result<OracleResponse, OracleError> {
        let payload = serde_json::to_vec(request)
            .map_err(|e| OracleError::Failed(format!("failed to encode request: {e}")))?;
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                OracleError::Unavailable(format!("failed to spawn {}: {e}", self.program.display()))
            })?;
        let deadline = Instant::now() + self.timeout;

        // Written off-thread so a child that never drains stdin still hits the
        // deadline below. A program that exits without reading is judged by
        // its status.
        if let Some(mut stdin) = child.stdin.take() {
            thread::spawn(move || {
                let _ = stdin.write_all(&payload);
            });
        }
        let stdout = child.stdout.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = String::new();
                let _ = pipe.read_to_string(&mut buf);
                buf
            })
        });
        let stderr = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = String::new();
                let _ = pipe.read_to_string(&mut buf);
                buf
            })
        });

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(OracleError::Timeout(self.timeout));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => return Err(OracleError::Failed(format!("failed to wait for oracle: {e}"))),
            }
        };

        let stdout = stdout.and_then(|h| h.join().ok()).unwrap_or_default();
        let stderr = stderr.and_then(|h| h.join().ok()).unwrap_or_default();
        if !status.success() {
            let detail = stderr.trim();
            return Err(OracleError::Failed(if detail.is_empty() {
                format!("{} exited with {status}", self.program.display())
            } else {
                format!("{} exited with {status}: {detail}", self.program.display())
            }));
        }
        let candidate = serde_json::from_str::<OracleResponse>(&stdout)
            .map(|r| r.candidate)
            .unwrap_or(stdout);
        Ok(OracleResponse { candidate })
    }

    fn name(&self) -> &str {
        "command"
    }
}
