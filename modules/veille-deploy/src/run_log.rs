//! Deploy run log: persisted JSON timeline of one run.
//!
//! Each run writes a single `{run_log_dir}/{run_id}.json` containing an
//! ordered list of events with timestamps, written even when the run ends
//! early. Files are never rotated or pruned; unbounded growth of the
//! directory is an accepted property of this design.

use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::pipeline::RunReport;

pub struct RunLog {
    run_id: String,
    started_at: DateTime<Utc>,
    dir: PathBuf,
    events: Vec<RunEvent>,
    seq: u32,
}

#[derive(Serialize)]
struct RunEvent {
    seq: u32,
    ts: DateTime<Utc>,
    #[serde(flatten)]
    kind: EventKind,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    SecretsResolved {
        push_token: bool,
        anthropic_api_key: bool,
        mistral_api_key: bool,
    },
    ScrapeFinished {
        outcome: String,
        exit_code: Option<i32>,
        duration_ms: u64,
        stderr_tail: String,
    },
    ArtifactVerified {
        bytes: u64,
        parsed: bool,
    },
    ArtifactMissing {
        path: String,
    },
    DiffChecked {
        changed: bool,
    },
    Committed {
        message: String,
    },
    Pushed,
    PushFailed {
        error: String,
    },
    StageSoftFailed {
        stage: String,
        error: String,
    },
}

impl RunLog {
    pub fn new(run_id: String, dir: PathBuf) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            dir,
            events: Vec::new(),
            seq: 0,
        }
    }

    pub fn log(&mut self, kind: EventKind) {
        self.events.push(RunEvent {
            seq: self.seq,
            ts: Utc::now(),
            kind,
        });
        self.seq += 1;
    }

    /// Serialize the run log to JSON and write to disk.
    /// Returns the file path on success.
    pub fn save(&self, report: &RunReport) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;

        let path = self.dir.join(format!("{}.json", self.run_id));

        let output = SerializedRunLog {
            run_id: &self.run_id,
            started_at: self.started_at,
            finished_at: Utc::now(),
            stages: SerializedStages::from(report),
            artifact_changed: report.artifact_changed,
            events: &self.events,
        };

        std::fs::write(&path, serde_json::to_string_pretty(&output)?)?;
        info!(path = %path.display(), events = self.events.len(), "Run log saved");

        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// Serialization wrappers
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct SerializedRunLog<'a> {
    run_id: &'a str,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    stages: SerializedStages,
    artifact_changed: Option<bool>,
    events: &'a [RunEvent],
}

#[derive(Serialize)]
struct SerializedStages {
    secrets: String,
    scrape: String,
    verify_artifact: String,
    stage_and_diff: String,
    commit_and_push: String,
}

impl From<&RunReport> for SerializedStages {
    fn from(report: &RunReport) -> Self {
        Self {
            secrets: report.secrets.summary(),
            scrape: report.scrape.summary(),
            verify_artifact: report.verify_artifact.summary(),
            stage_and_diff: report.stage_and_diff.summary(),
            commit_and_push: report.commit_and_push.summary(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saves_one_file_per_run_with_ordered_events() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = RunLog::new("test-run".to_string(), dir.path().to_path_buf());
        log.log(EventKind::DiffChecked { changed: true });
        log.log(EventKind::Pushed);

        let report = RunReport::new("test-run".to_string());
        let path = log.save(&report).unwrap();
        assert_eq!(path, dir.path().join("test-run.json"));

        let raw = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["events"][0]["seq"], 0);
        assert_eq!(value["events"][0]["type"], "diff_checked");
        assert_eq!(value["events"][1]["type"], "pushed");
        assert_eq!(value["stages"]["scrape"], "skipped");
    }
}
