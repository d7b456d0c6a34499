#![forbid(unsafe_code)]

use crate::status::Status;

/// Derives a status from a legacy completion flag.
pub trait MappingRule {
    fn status_for(&self, legacy: Option<bool>) -> Status;
}

impl<F> MappingRule for F
where
    F: Fn(Option<bool>) -> Status,
{
    fn status_for(&self, legacy: Option<bool>) -> Status {
        self(legacy)
    }
}

/// The two backfill rules observed in the R1D3 data. They only disagree on `false`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StatusPolicy {
    /// `true -> completed`, `false -> in_progress`, absent -> `not_started`.
    #[default]
    FalseInProgress,
    /// `true -> completed`, `false | absent -> not_started`.
    FalseNotStarted,
}

impl StatusPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FalseInProgress => "false-in-progress",
            Self::FalseNotStarted => "false-not-started",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "false-in-progress" | "false_in_progress" | "default" => Some(Self::FalseInProgress),
            "false-not-started" | "false_not_started" => Some(Self::FalseNotStarted),
            _ => None,
        }
    }
}

impl MappingRule for StatusPolicy {
    fn status_for(&self, legacy: Option<bool>) -> Status {
        match (self, legacy) {
            (_, Some(true)) => Status::Completed,
            (Self::FalseInProgress, Some(false)) => Status::InProgress,
            (Self::FalseNotStarted, Some(false)) => Status::NotStarted,
            (_, None) => Status::NotStarted,
        }
    }
}

impl std::fmt::Display for StatusPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
