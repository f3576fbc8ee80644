use std::collections::VecDeque;

use chrono::{DateTime, Local};

/// How a recorded attempt (or controller event) turned out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Success,
    Failure,
}

/// One line of run activity
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub kind: OutcomeKind,
    pub message: String,
    pub timestamp: DateTime<Local>,
}

/// Append-ordered activity history with capped retention.
///
/// An unlimited run would otherwise grow the log without bound, so once the
/// capacity is reached the oldest entries are dropped. Consumers read the
/// newest entries through `latest`.
#[derive(Debug)]
pub struct ActivityLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, kind: OutcomeKind, message: impl Into<String>) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry {
            kind,
            message: message.into(),
            timestamp: Local::now(),
        });
    }

    /// Up to `n` most recent entries, newest first.
    pub fn latest(&self, n: usize) -> Vec<LogEntry> {
        self.entries.iter().rev().take(n).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
