//! Session record: per-user aggregate counters plus the append-only history of runs.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The outcome categories the classifier is asked to choose from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeRating {
    Excellent,
    Normal,
    Bad,
    Fake,
}

impl ResumeRating {
    /// Case- and whitespace-insensitive match. Anything else is unrecognized.
    pub fn from_outcome(outcome: &str) -> Option<Self> {
        match outcome.trim().to_lowercase().as_str() {
            "excellent" => Some(ResumeRating::Excellent),
            "normal" => Some(ResumeRating::Normal),
            "bad" => Some(ResumeRating::Bad),
            "fake" => Some(ResumeRating::Fake),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub total: u64,
    pub excellent: u64,
    pub normal: u64,
    pub bad: u64,
    pub fake: u64,
}

impl SessionStats {
    /// Unrecognized outcomes count towards `total` only.
    fn record(&mut self, outcome: &str) {
        self.total += 1;
        match ResumeRating::from_outcome(outcome) {
            Some(ResumeRating::Excellent) => self.excellent += 1,
            Some(ResumeRating::Normal) => self.normal += 1,
            Some(ResumeRating::Bad) => self.bad += 1,
            Some(ResumeRating::Fake) => self.fake += 1,
            None => {}
        }
    }
}

#[cfg(test)]
impl ResumeRating {
    pub const ALL: [ResumeRating; 4] = [
        ResumeRating::Excellent,
        ResumeRating::Normal,
        ResumeRating::Bad,
        ResumeRating::Fake,
    ];
}

#[cfg(test)]
impl SessionStats {
    pub fn count(&self, rating: ResumeRating) -> u64 {
        match rating {
            ResumeRating::Excellent => self.excellent,
            ResumeRating::Normal => self.normal,
            ResumeRating::Bad => self.bad,
            ResumeRating::Fake => self.fake,
        }
    }

    /// Runs that landed in one of the known categories.
    pub fn categorized(&self) -> u64 {
        ResumeRating::ALL.iter().map(|r| self.count(*r)).sum()
    }
}

/// One completed run, as handed to the session store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub outcome: String,
    pub outputs: BTreeMap<String, String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub stats: SessionStats,
    pub history: Vec<RunRecord>,
}

impl SessionRecord {
    /// The record after folding in one more run. `self` is left untouched so a failed
    /// write can simply discard the result.
    pub fn with_run(&self, run: &RunRecord) -> SessionRecord {
        let mut next = self.clone();
        next.stats.record(&run.outcome);
        next.history.push(run.clone());
        next
    }
}
