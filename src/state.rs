//! Processing-state tracking for episodes.
//!
//! The state file is the single source of truth for idempotency and
//! resumability: loaded fully at startup, flushed after every transition,
//! so a crash mid-run leaves a consistent record behind.

use crate::error::{PodwiseError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info};

/// Current schema version written to new state files.
const SCHEMA_VERSION: u32 = 1;

/// Processing status of an episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    FetchingTranscript,
    TranscriptNotFound,
    Summarizing,
    Summarized,
    Exported,
    Failed,
}

impl ProcessingStatus {
    /// Legal successor statuses. Terminal-but-retryable statuses only move
    /// back into `FetchingTranscript` (retry or forced re-run).
    fn successors(self) -> &'static [ProcessingStatus] {
        use ProcessingStatus::*;
        match self {
            Pending => &[FetchingTranscript, Failed],
            FetchingTranscript => &[TranscriptNotFound, Summarizing, Failed],
            TranscriptNotFound => &[FetchingTranscript],
            Summarizing => &[Summarized, Failed],
            Summarized => &[Exported, FetchingTranscript, Failed],
            Exported => &[FetchingTranscript],
            Failed => &[FetchingTranscript],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::FetchingTranscript => "fetching_transcript",
            ProcessingStatus::TranscriptNotFound => "transcript_not_found",
            ProcessingStatus::Summarizing => "summarizing",
            ProcessingStatus::Summarized => "summarized",
            ProcessingStatus::Exported => "exported",
            ProcessingStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Persistent record of one episode's processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateRecord {
    pub episode_id: i64,
    pub podcast_name: String,
    pub episode_title: String,
    pub status: ProcessingStatus,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub output_file: Option<String>,
    #[serde(default)]
    pub video_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    /// Whether this episode's row has been pushed to the spreadsheet.
    #[serde(default)]
    pub synced_to_sheets: bool,
}

/// Metadata attached to a transition.
#[derive(Debug, Clone, Default)]
pub struct TransitionMeta {
    pub podcast_name: Option<String>,
    pub episode_title: Option<String>,
    pub output_file: Option<String>,
    pub video_id: Option<String>,
    pub error: Option<String>,
}

impl TransitionMeta {
    pub fn for_episode(podcast_name: &str, episode_title: &str) -> Self {
        Self {
            podcast_name: Some(podcast_name.to_string()),
            episode_title: Some(episode_title.to_string()),
            ..Default::default()
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_output_file(mut self, path: impl Into<String>) -> Self {
        self.output_file = Some(path.into());
        self
    }

    pub fn with_video_id(mut self, video_id: impl Into<String>) -> Self {
        self.video_id = Some(video_id.into());
        self
    }
}

/// On-disk layout of the state file.
#[derive(Debug, Serialize, Deserialize)]
struct StateFile {
    schema_version: u32,
    records: BTreeMap<i64, StateRecord>,
}

/// Aggregate counts for the status command.
#[derive(Debug, Default, PartialEq)]
pub struct StateStats {
    pub total: usize,
    pub exported: usize,
    pub summarized: usize,
    pub no_transcript: usize,
    pub failed: usize,
}

/// Tracks per-episode processing status with flush-per-mutation persistence.
pub struct StateTracker {
    path: PathBuf,
    records: BTreeMap<i64, StateRecord>,
}

impl StateTracker {
    /// Load the state file, or start empty if it does not exist.
    /// A corrupt state file is a configuration error and aborts the run.
    pub fn load(path: PathBuf) -> Result<Self> {
        let records = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let file: StateFile = serde_json::from_str(&content).map_err(|e| {
                PodwiseError::Config(format!(
                    "Corrupt state file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            debug!(
                "Loaded {} state records (schema v{})",
                file.records.len(),
                file.schema_version
            );
            file.records
        } else {
            BTreeMap::new()
        };

        Ok(Self { path, records })
    }

    /// Get the record for an episode, if any.
    pub fn get(&self, episode_id: i64) -> Option<&StateRecord> {
        self.records.get(&episode_id)
    }

    /// Whether the pipeline should process this episode.
    ///
    /// Absent and `failed` episodes are always eligible (transient fetch
    /// errors land in `failed`, so they retry automatically next run).
    /// `transcript_not_found` needs the explicit retry flag. Completed
    /// episodes need `force`.
    pub fn should_process(&self, episode_id: i64, force: bool, retry_not_found: bool) -> bool {
        if force {
            return true;
        }
        match self.records.get(&episode_id).map(|r| r.status) {
            None | Some(ProcessingStatus::Pending) | Some(ProcessingStatus::Failed) => true,
            Some(ProcessingStatus::TranscriptNotFound) => retry_not_found,
            Some(ProcessingStatus::Summarized) | Some(ProcessingStatus::Exported) => false,
            // Mid-flight statuses from a crashed run resume.
            Some(ProcessingStatus::FetchingTranscript) | Some(ProcessingStatus::Summarizing) => {
                true
            }
        }
    }

    /// Transition an episode to a new status and persist before returning.
    ///
    /// An absent episode may enter at `pending` or `fetching_transcript`.
    /// Any other illegal move fails with `InvalidStateTransition`.
    pub fn transition(
        &mut self,
        episode_id: i64,
        new_status: ProcessingStatus,
        meta: TransitionMeta,
    ) -> Result<()> {
        match self.records.get(&episode_id) {
            Some(record) => {
                let current = record.status;
                // Crash recovery: a record stuck mid-flight may restart.
                let resumable = matches!(
                    current,
                    ProcessingStatus::FetchingTranscript | ProcessingStatus::Summarizing
                ) && new_status == ProcessingStatus::FetchingTranscript;
                if !current.successors().contains(&new_status) && !resumable {
                    return Err(PodwiseError::InvalidStateTransition {
                        from: current.to_string(),
                        to: new_status.to_string(),
                    });
                }
            }
            None => {
                if !matches!(
                    new_status,
                    ProcessingStatus::Pending | ProcessingStatus::FetchingTranscript
                ) {
                    return Err(PodwiseError::InvalidStateTransition {
                        from: "absent".to_string(),
                        to: new_status.to_string(),
                    });
                }
            }
        }

        let record = self
            .records
            .entry(episode_id)
            .or_insert_with(|| StateRecord {
                episode_id,
                podcast_name: String::new(),
                episode_title: String::new(),
                status: new_status,
                updated_at: Utc::now(),
                output_file: None,
                video_id: None,
                error: None,
                synced_to_sheets: false,
            });

        record.status = new_status;
        record.updated_at = Utc::now();
        if let Some(name) = meta.podcast_name {
            record.podcast_name = name;
        }
        if let Some(title) = meta.episode_title {
            record.episode_title = title;
        }
        if let Some(file) = meta.output_file {
            record.output_file = Some(file);
        }
        if let Some(video_id) = meta.video_id {
            record.video_id = Some(video_id);
        }
        record.error = meta.error;
        // Restarting processing invalidates a previous sheet sync marker.
        if new_status == ProcessingStatus::FetchingTranscript {
            record.synced_to_sheets = false;
        }

        self.flush()?;
        debug!(episode_id, status = %new_status, "state transition");
        Ok(())
    }

    /// Mark an episode's row as present in the spreadsheet.
    pub fn mark_synced(&mut self, episode_id: i64) -> Result<()> {
        if let Some(record) = self.records.get_mut(&episode_id) {
            record.synced_to_sheets = true;
            self.flush()?;
        }
        Ok(())
    }

    pub fn is_synced(&self, episode_id: i64) -> bool {
        self.records
            .get(&episode_id)
            .map(|r| r.synced_to_sheets)
            .unwrap_or(false)
    }

    /// All records, most recently updated first.
    pub fn list_records(&self) -> Vec<&StateRecord> {
        let mut records: Vec<&StateRecord> = self.records.values().collect();
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        records
    }

    /// Aggregate status counts.
    pub fn stats(&self) -> StateStats {
        let mut stats = StateStats {
            total: self.records.len(),
            ..Default::default()
        };
        for record in self.records.values() {
            match record.status {
                ProcessingStatus::Exported => stats.exported += 1,
                ProcessingStatus::Summarized => stats.summarized += 1,
                ProcessingStatus::TranscriptNotFound => stats.no_transcript += 1,
                ProcessingStatus::Failed => stats.failed += 1,
                _ => {}
            }
        }
        stats
    }

    /// Write the full record set atomically: temp file then rename, so a
    /// partial write never replaces the previous state.
    fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = StateFile {
            schema_version: SCHEMA_VERSION,
            records: self.records.clone(),
        };
        let content = serde_json::to_string_pretty(&file)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl Drop for StateTracker {
    fn drop(&mut self) {
        if !self.records.is_empty() {
            info!("State tracker closed with {} records", self.records.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn tracker(dir: &tempfile::TempDir) -> StateTracker {
        StateTracker::load(dir.path().join("state.json")).unwrap()
    }

    #[test]
    fn test_full_lifecycle_transitions() {
        let dir = tempdir().unwrap();
        let mut state = tracker(&dir);
        let meta = || TransitionMeta::for_episode("Odd Lots", "Metals");

        state
            .transition(1, ProcessingStatus::FetchingTranscript, meta())
            .unwrap();
        state
            .transition(1, ProcessingStatus::Summarizing, meta())
            .unwrap();
        state
            .transition(1, ProcessingStatus::Summarized, meta())
            .unwrap();
        state
            .transition(
                1,
                ProcessingStatus::Exported,
                meta().with_output_file("/tmp/x.md"),
            )
            .unwrap();

        let record = state.get(1).unwrap();
        assert_eq!(record.status, ProcessingStatus::Exported);
        assert_eq!(record.output_file.as_deref(), Some("/tmp/x.md"));
    }

    #[test]
    fn test_illegal_transition_rejected() {
        let dir = tempdir().unwrap();
        let mut state = tracker(&dir);
        let meta = || TransitionMeta::for_episode("Odd Lots", "Metals");

        state
            .transition(1, ProcessingStatus::FetchingTranscript, meta())
            .unwrap();
        // fetching -> exported skips summarization
        let err = state
            .transition(1, ProcessingStatus::Exported, meta())
            .unwrap_err();
        assert!(matches!(
            err,
            PodwiseError::InvalidStateTransition { .. }
        ));
        // prior state retained
        assert_eq!(
            state.get(1).unwrap().status,
            ProcessingStatus::FetchingTranscript
        );
    }

    #[test]
    fn test_absent_cannot_jump_to_summarized() {
        let dir = tempdir().unwrap();
        let mut state = tracker(&dir);
        let err = state
            .transition(1, ProcessingStatus::Summarized, TransitionMeta::default())
            .unwrap_err();
        assert!(matches!(err, PodwiseError::InvalidStateTransition { .. }));
    }

    #[test]
    fn test_should_process_policy() {
        let dir = tempdir().unwrap();
        let mut state = tracker(&dir);
        let meta = || TransitionMeta::for_episode("Odd Lots", "Metals");

        // absent: eligible
        assert!(state.should_process(1, false, false));

        state
            .transition(1, ProcessingStatus::FetchingTranscript, meta())
            .unwrap();
        state
            .transition(1, ProcessingStatus::Summarizing, meta())
            .unwrap();
        state
            .transition(1, ProcessingStatus::Summarized, meta())
            .unwrap();
        state
            .transition(1, ProcessingStatus::Exported, meta())
            .unwrap();

        // exported: only with force
        assert!(!state.should_process(1, false, false));
        assert!(!state.should_process(1, false, true));
        assert!(state.should_process(1, true, false));

        // not-found: only with retry (or force)
        state
            .transition(2, ProcessingStatus::FetchingTranscript, meta())
            .unwrap();
        state
            .transition(2, ProcessingStatus::TranscriptNotFound, meta())
            .unwrap();
        assert!(!state.should_process(2, false, false));
        assert!(state.should_process(2, false, true));
        assert!(state.should_process(2, true, false));

        // failed: always eligible
        state
            .transition(3, ProcessingStatus::FetchingTranscript, meta())
            .unwrap();
        state
            .transition(
                3,
                ProcessingStatus::Failed,
                meta().with_error("network timeout"),
            )
            .unwrap();
        assert!(state.should_process(3, false, false));
    }

    #[test]
    fn test_persistence_across_loads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        {
            let mut state = StateTracker::load(path.clone()).unwrap();
            state
                .transition(
                    7,
                    ProcessingStatus::FetchingTranscript,
                    TransitionMeta::for_episode("Acquired", "NVIDIA"),
                )
                .unwrap();
            state
                .transition(
                    7,
                    ProcessingStatus::TranscriptNotFound,
                    TransitionMeta::default(),
                )
                .unwrap();
        }
        let state = StateTracker::load(path).unwrap();
        let record = state.get(7).unwrap();
        assert_eq!(record.status, ProcessingStatus::TranscriptNotFound);
        assert_eq!(record.podcast_name, "Acquired");
    }

    #[test]
    fn test_corrupt_state_file_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = StateTracker::load(path)
            .err()
            .expect("corrupt state file should not load");
        assert!(matches!(err, PodwiseError::Config(_)));
    }

    #[test]
    fn test_crash_recovery_resumes_mid_flight_record() {
        let dir = tempdir().unwrap();
        let mut state = tracker(&dir);
        let meta = || TransitionMeta::for_episode("Odd Lots", "Metals");
        state
            .transition(1, ProcessingStatus::Summarizing, {
                let mut m = meta();
                m.podcast_name = Some("Odd Lots".into());
                m
            })
            .unwrap_err();
        // proper entry then simulated crash mid-summarize
        state
            .transition(1, ProcessingStatus::FetchingTranscript, meta())
            .unwrap();
        state
            .transition(1, ProcessingStatus::Summarizing, meta())
            .unwrap();
        assert!(state.should_process(1, false, false));
        state
            .transition(1, ProcessingStatus::FetchingTranscript, meta())
            .unwrap();
    }

    #[test]
    fn test_stats() {
        let dir = tempdir().unwrap();
        let mut state = tracker(&dir);
        let meta = || TransitionMeta::default();
        state
            .transition(1, ProcessingStatus::FetchingTranscript, meta())
            .unwrap();
        state
            .transition(1, ProcessingStatus::TranscriptNotFound, meta())
            .unwrap();
        state
            .transition(2, ProcessingStatus::FetchingTranscript, meta())
            .unwrap();
        state
            .transition(2, ProcessingStatus::Failed, meta())
            .unwrap();
        let stats = state.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.no_transcript, 1);
        assert_eq!(stats.failed, 1);
    }
}
