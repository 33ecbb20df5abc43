//! Bounded scrape subprocess.
//!
//! The scraper is an opaque executable: it writes the artifact to a fixed
//! path as a side effect and exits zero on success. The orchestrator only
//! bounds it with a wall-clock deadline and records how it ended.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::{info, warn};

use veille_common::Secret;

/// How much captured subprocess output is kept for logs and the run log.
const OUTPUT_TAIL_CHARS: usize = 2000;

/// Tri-state outcome of one bounded scrape invocation.
#[derive(Debug)]
pub enum ScrapeOutcome {
    /// Subprocess ran to completion. The exit code may still be non-zero.
    Completed {
        exit_code: Option<i32>,
        stdout_tail: String,
        stderr_tail: String,
        duration: Duration,
    },
    /// The deadline expired; the subprocess was forcibly killed.
    TimedOut { after: Duration },
    /// The subprocess could not be started at all.
    LaunchFailed { error: String },
}

impl ScrapeOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(
            self,
            Self::Completed {
                exit_code: Some(0),
                ..
            }
        )
    }

    /// Short label for the run log.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::TimedOut { .. } => "timed_out",
            Self::LaunchFailed { .. } => "launch_failed",
        }
    }
}

pub struct ScrapeRunner {
    command: Vec<String>,
    deadline: Option<Duration>,
    workdir: PathBuf,
    env: Vec<(String, Secret)>,
}

impl ScrapeRunner {
    pub fn new(command: Vec<String>, deadline: Option<Duration>, workdir: PathBuf) -> Self {
        Self {
            command,
            deadline,
            workdir,
            env: Vec::new(),
        }
    }

    /// Pass a secret to the subprocess environment. The value never appears
    /// in logs; captured output is scrubbed of it before being recorded.
    pub fn env(mut self, key: &str, secret: Secret) -> Self {
        self.env.push((key.to_string(), secret));
        self
    }

    pub async fn run(&self) -> ScrapeOutcome {
        let Some((program, args)) = self.command.split_first() else {
            return ScrapeOutcome::LaunchFailed {
                error: "empty scrape command".to_string(),
            };
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(&self.workdir)
            .kill_on_drop(true);
        for (key, secret) in &self.env {
            cmd.env(key, secret.expose());
        }

        info!(command = %self.command.join(" "), "Running scraper");
        let started = Instant::now();
        let future = cmd.output();

        let result = match self.deadline {
            Some(bound) => match tokio::time::timeout(bound, future).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        timeout_secs = bound.as_secs(),
                        "Scraper exceeded deadline, killed"
                    );
                    return ScrapeOutcome::TimedOut { after: bound };
                }
            },
            None => future.await,
        };

        match result {
            Ok(output) => {
                let duration = started.elapsed();
                let outcome = ScrapeOutcome::Completed {
                    exit_code: output.status.code(),
                    stdout_tail: self.redacted_tail(&output.stdout),
                    stderr_tail: self.redacted_tail(&output.stderr),
                    duration,
                };
                if outcome.succeeded() {
                    info!(duration_ms = duration.as_millis() as u64, "Scraper finished");
                } else {
                    warn!(
                        exit_code = output.status.code(),
                        "Scraper exited with error"
                    );
                }
                outcome
            }
            Err(e) => {
                warn!(error = %e, "Failed to launch scraper");
                ScrapeOutcome::LaunchFailed {
                    error: e.to_string(),
                }
            }
        }
    }

    fn redacted_tail(&self, bytes: &[u8]) -> String {
        let text = String::from_utf8_lossy(bytes);
        let tail: String = if text.chars().count() > OUTPUT_TAIL_CHARS {
            text.chars()
                .skip(text.chars().count() - OUTPUT_TAIL_CHARS)
                .collect()
        } else {
            text.into_owned()
        };
        let mut tail = tail;
        for (_, secret) in &self.env {
            tail = secret.redact_in(&tail);
        }
        tail
    }
}
