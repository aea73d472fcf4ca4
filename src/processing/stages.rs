//! Stage records and per-operation breakdown.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A stage that has started but not ended.
#[derive(Debug, Clone)]
pub(crate) struct ActiveStage {
    pub name: String,
    pub started: Instant,
    pub started_at: DateTime<Utc>,
}

impl ActiveStage {
    pub fn start(name: &str) -> Self {
        Self {
            name: name.to_string(),
            started: Instant::now(),
            started_at: Utc::now(),
        }
    }

    pub fn finish(self, ended: Instant) -> StageRecord {
        let duration = ended.saturating_duration_since(self.started);
        StageRecord::new(self.name, self.started_at, duration)
    }
}

/// A completed stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageRecord {
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: f64,
    #[serde(skip)]
    pub duration: Duration,
}

impl StageRecord {
    pub fn new(name: impl Into<String>, started_at: DateTime<Utc>, duration: Duration) -> Self {
        Self {
            name: name.into(),
            started_at,
            duration_ms: duration.as_secs_f64() * 1000.0,
            duration,
        }
    }
}

/// Stages of one operation in call order, with the slowest one.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StageBreakdown {
    pub stages: Vec<StageRecord>,
    /// Longest stage; the earliest wins ties
    pub longest_stage: Option<StageRecord>,
}

impl StageBreakdown {
    pub fn from_stages(stages: Vec<StageRecord>) -> Self {
        let mut longest: Option<&StageRecord> = None;
        for stage in &stages {
            if longest.map_or(true, |l| stage.duration > l.duration) {
                longest = Some(stage);
            }
        }
        let longest_stage = longest.cloned();
        Self {
            stages,
            longest_stage,
        }
    }
}
