//! The deploy pipeline: five ordered stages, every failure contained.
//!
//! `secrets → scrape → verify-artifact → stage-and-diff → commit-and-push`.
//! The policy throughout is "push whatever artifact exists": a degraded or
//! failed scrape never aborts the run, because a stale-but-present artifact
//! beats no artifact. The only condition that ends a run early is an
//! artifact that does not exist at all.

use std::fmt;
use std::path::PathBuf;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use veille_common::{CredentialSource, DeployConfig, NewsFile, Secret};

use crate::git::{render_commit_message, render_push_url, GitPublisher, StagedDiff};
use crate::run_log::{EventKind, RunLog};
use crate::scrape::{ScrapeOutcome, ScrapeRunner};

/// Outcome of one pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// The stage did what it set out to do (including the no-op diff result).
    Success,
    /// The stage never ran because an earlier stage ended the run.
    Skipped,
    /// The stage failed; the run carried on regardless.
    SoftFailure(String),
    /// The stage failure ended the run.
    HardFailure(String),
}

impl StageOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn summary(&self) -> String {
        match self {
            Self::Success => "success".to_string(),
            Self::Skipped => "skipped".to_string(),
            Self::SoftFailure(e) => format!("soft_failure: {e}"),
            Self::HardFailure(e) => format!("hard_failure: {e}"),
        }
    }
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}

/// Per-stage outcomes of one run.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: String,
    pub secrets: StageOutcome,
    pub scrape: StageOutcome,
    pub verify_artifact: StageOutcome,
    pub stage_and_diff: StageOutcome,
    pub commit_and_push: StageOutcome,
    /// `Some(false)` is the no-op run: nothing new to commit.
    pub artifact_changed: Option<bool>,
    pub commit_message: Option<String>,
    pub run_log_path: Option<PathBuf>,
}

impl RunReport {
    pub fn new(run_id: String) -> Self {
        Self {
            run_id,
            secrets: StageOutcome::Skipped,
            scrape: StageOutcome::Skipped,
            verify_artifact: StageOutcome::Skipped,
            stage_and_diff: StageOutcome::Skipped,
            commit_and_push: StageOutcome::Skipped,
            artifact_changed: None,
            commit_message: None,
            run_log_path: None,
        }
    }

    pub fn failed_hard(&self) -> bool {
        [
            &self.secrets,
            &self.scrape,
            &self.verify_artifact,
            &self.stage_and_diff,
            &self.commit_and_push,
        ]
        .iter()
        .any(|outcome| matches!(outcome, StageOutcome::HardFailure(_)))
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n=== Deploy Run Complete ===")?;
        writeln!(f, "secrets:         {}", self.secrets)?;
        writeln!(f, "scrape:          {}", self.scrape)?;
        writeln!(f, "verify-artifact: {}", self.verify_artifact)?;
        writeln!(f, "stage-and-diff:  {}", self.stage_and_diff)?;
        write!(f, "commit-and-push: {}", self.commit_and_push)?;
        if let Some(changed) = self.artifact_changed {
            write!(
                f,
                "\nartifact:        {}",
                if changed { "changed" } else { "unchanged" }
            )?;
        }
        Ok(())
    }
}

pub struct DeployPipeline {
    config: DeployConfig,
}

impl DeployPipeline {
    pub fn new(config: DeployConfig) -> Self {
        Self { config }
    }

    /// Run the five stages in order. Always returns a report, always saves
    /// the run log, and always emits the terminal marker; the caller
    /// decides what an exit code means.
    pub async fn run(&self) -> RunReport {
        let run_id = Uuid::new_v4().to_string();
        info!(run_id = %run_id, "Deploy run starting");

        let mut log = RunLog::new(run_id.clone(), self.config.run_log_dir.clone());
        let mut report = RunReport::new(run_id);

        self.run_inner(&mut report, &mut log).await;

        info!("{report}");
        match log.save(&report) {
            Ok(path) => report.run_log_path = Some(path),
            Err(e) => warn!(error = %e, "Failed to save run log"),
        }
        info!("Done");
        report
    }

    async fn run_inner(&self, report: &mut RunReport, log: &mut RunLog) {
        // --- secrets ---
        let mut problems = Vec::new();
        let push_token = resolve_secret(&self.config.push_token, "push_token", &mut problems);
        let anthropic_key = resolve_secret(
            &self.config.anthropic_api_key,
            "anthropic_api_key",
            &mut problems,
        );
        let mistral_key = resolve_secret(
            &self.config.mistral_api_key,
            "mistral_api_key",
            &mut problems,
        );
        report.secrets = if problems.is_empty() {
            StageOutcome::Success
        } else {
            StageOutcome::SoftFailure(problems.join("; "))
        };
        log.log(EventKind::SecretsResolved {
            push_token: push_token.is_some(),
            anthropic_api_key: anthropic_key.is_some(),
            mistral_api_key: mistral_key.is_some(),
        });

        // --- scrape ---
        let mut runner = ScrapeRunner::new(
            self.config.scraper_command.clone(),
            self.config.scrape_timeout,
            self.config.repo_dir.clone(),
        );
        if let Some(key) = &anthropic_key {
            runner = runner.env("ANTHROPIC_API_KEY", key.clone());
        }
        if let Some(key) = &mistral_key {
            runner = runner.env("MISTRAL_API_KEY", key.clone());
        }

        let outcome = runner.run().await;
        let (exit_code, duration_ms, stderr_tail) = match &outcome {
            ScrapeOutcome::Completed {
                exit_code,
                stderr_tail,
                duration,
                ..
            } => (*exit_code, duration.as_millis() as u64, stderr_tail.clone()),
            ScrapeOutcome::TimedOut { after } => (None, after.as_millis() as u64, String::new()),
            ScrapeOutcome::LaunchFailed { .. } => (None, 0, String::new()),
        };
        report.scrape = match &outcome {
            ScrapeOutcome::Completed {
                exit_code: Some(0), ..
            } => StageOutcome::Success,
            ScrapeOutcome::Completed { exit_code, .. } => StageOutcome::SoftFailure(format!(
                "scraper exited with {}",
                exit_code.map_or_else(|| "signal".to_string(), |code| code.to_string())
            )),
            ScrapeOutcome::TimedOut { after } => {
                StageOutcome::SoftFailure(format!("timed out after {}s", after.as_secs()))
            }
            ScrapeOutcome::LaunchFailed { error } => {
                StageOutcome::SoftFailure(format!("failed to launch: {error}"))
            }
        };
        log.log(EventKind::ScrapeFinished {
            outcome: outcome.label().to_string(),
            exit_code,
            duration_ms,
            stderr_tail,
        });
        // Continue regardless of the scrape outcome.

        // --- verify-artifact ---
        let artifact = self.config.artifact_abs();
        let meta = match std::fs::metadata(&artifact) {
            Ok(meta) => meta,
            Err(_) => {
                error!(path = %artifact.display(), "Artifact missing after scrape, nothing to push");
                report.verify_artifact =
                    StageOutcome::HardFailure(format!("artifact missing: {}", artifact.display()));
                log.log(EventKind::ArtifactMissing {
                    path: artifact.display().to_string(),
                });
                return;
            }
        };
        let parsed = match NewsFile::load(&artifact) {
            Ok(file) => {
                info!(articles = file.article_count(), "Artifact verified");
                true
            }
            Err(e) => {
                warn!(error = %e, "Artifact is not valid news JSON, pushing anyway");
                false
            }
        };
        report.verify_artifact = StageOutcome::Success;
        log.log(EventKind::ArtifactVerified {
            bytes: meta.len(),
            parsed,
        });

        // --- stage-and-diff ---
        let git = GitPublisher::new(&self.config.repo_dir);
        if let Err(e) = git.stage(&self.config.artifact_path).await {
            warn!(error = %e, "Staging failed, skipping commit and push");
            report.stage_and_diff = StageOutcome::SoftFailure(e.to_string());
            log.log(EventKind::StageSoftFailed {
                stage: "stage_and_diff".to_string(),
                error: e.to_string(),
            });
            return;
        }
        match git.staged_diff(&self.config.artifact_path).await {
            Ok(StagedDiff::Unchanged) => {
                info!("No changes to commit");
                report.stage_and_diff = StageOutcome::Success;
                report.artifact_changed = Some(false);
                log.log(EventKind::DiffChecked { changed: false });
                return;
            }
            Ok(StagedDiff::Changed) => {
                report.stage_and_diff = StageOutcome::Success;
                report.artifact_changed = Some(true);
                log.log(EventKind::DiffChecked { changed: true });
            }
            Err(e) => {
                warn!(error = %e, "Diff check failed, skipping commit and push");
                report.stage_and_diff = StageOutcome::SoftFailure(e.to_string());
                log.log(EventKind::StageSoftFailed {
                    stage: "stage_and_diff".to_string(),
                    error: e.to_string(),
                });
                return;
            }
        }

        // --- commit-and-push ---
        let message = render_commit_message(&self.config.commit_message_template, Utc::now());
        if let Err(e) = git.commit(&message).await {
            warn!(error = %e, "Commit failed");
            report.commit_and_push = StageOutcome::SoftFailure(format!("commit: {e}"));
            log.log(EventKind::StageSoftFailed {
                stage: "commit_and_push".to_string(),
                error: e.to_string(),
            });
            return;
        }
        report.commit_message = Some(message.clone());
        log.log(EventKind::Committed { message });

        let url = match render_push_url(&self.config.push_remote_template, push_token.as_ref()) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Push skipped");
                report.commit_and_push = StageOutcome::SoftFailure(format!("push skipped: {e}"));
                log.log(EventKind::StageSoftFailed {
                    stage: "commit_and_push".to_string(),
                    error: e.to_string(),
                });
                return;
            }
        };
        match git.push(&url, push_token.as_ref()).await {
            Ok(()) => {
                report.commit_and_push = StageOutcome::Success;
                log.log(EventKind::Pushed);
            }
            Err(e) => {
                // The publisher already scrubbed the token out of the error.
                warn!(error = %e, "Push rejected");
                report.commit_and_push = StageOutcome::SoftFailure(format!("push: {e}"));
                log.log(EventKind::PushFailed {
                    error: e.to_string(),
                });
            }
        }
    }
}

fn resolve_secret(
    source: &CredentialSource,
    name: &str,
    problems: &mut Vec<String>,
) -> Option<Secret> {
    match source.resolve() {
        Ok(secret) => secret,
        Err(e) => {
            warn!(credential = name, error = %e, "Credential unreadable");
            problems.push(format!("{name}: {e}"));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_report_has_no_hard_failure() {
        let report = RunReport::new("r".to_string());
        assert!(!report.failed_hard());
    }

    #[test]
    fn hard_failure_anywhere_marks_the_run() {
        let mut report = RunReport::new("r".to_string());
        report.verify_artifact = StageOutcome::HardFailure("artifact missing".to_string());
        assert!(report.failed_hard());
    }

    #[test]
    fn soft_failures_do_not_mark_the_run() {
        let mut report = RunReport::new("r".to_string());
        report.scrape = StageOutcome::SoftFailure("timed out after 300s".to_string());
        report.commit_and_push = StageOutcome::SoftFailure("push: rejected".to_string());
        assert!(!report.failed_hard());
    }

    #[test]
    fn outcome_summaries_carry_the_error() {
        assert_eq!(StageOutcome::Success.summary(), "success");
        assert_eq!(
            StageOutcome::SoftFailure("x".to_string()).summary(),
            "soft_failure: x"
        );
    }
}
