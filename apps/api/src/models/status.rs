use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Invalid status: {0}")]
pub struct InvalidStatus(pub String);

/// Lifecycle of an uploaded document (lender policy or loan application).
/// Transitions forward only: uploaded → processing → completed|failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "document_status", rename_all = "lowercase")]
pub enum DocumentStatus {
    Uploaded,
    Processing,
    Completed,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Uploaded => "uploaded",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Failed => "failed",
        }
    }
}

impl FromStr for DocumentStatus {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "uploaded" => Ok(DocumentStatus::Uploaded),
            "processing" => Ok(DocumentStatus::Processing),
            "completed" => Ok(DocumentStatus::Completed),
            "failed" => Ok(DocumentStatus::Failed),
            other => Err(InvalidStatus(other.to_string())),
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of one (application, lender) match record. Created `pending` by
/// the orchestrator's prepare phase; driven to exactly one terminal state by
/// the dispatch phase (or the timeout sweep).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "match_status", rename_all = "lowercase")]
pub enum MatchStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Pending => "pending",
            MatchStatus::Processing => "processing",
            MatchStatus::Completed => "completed",
            MatchStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MatchStatus::Completed | MatchStatus::Failed)
    }
}

impl FromStr for MatchStatus {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(MatchStatus::Pending),
            "processing" => Ok(MatchStatus::Processing),
            "completed" => Ok(MatchStatus::Completed),
            "failed" => Ok(MatchStatus::Failed),
            other => Err(InvalidStatus(other.to_string())),
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_status_round_trips_exact_strings() {
        for (status, s) in [
            (DocumentStatus::Uploaded, "uploaded"),
            (DocumentStatus::Processing, "processing"),
            (DocumentStatus::Completed, "completed"),
            (DocumentStatus::Failed, "failed"),
        ] {
            assert_eq!(status.as_str(), s);
            assert_eq!(s.parse::<DocumentStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_status_parse_is_case_insensitive() {
        assert_eq!(
            "COMPLETED".parse::<DocumentStatus>().unwrap(),
            DocumentStatus::Completed
        );
        assert_eq!(
            "Pending".parse::<MatchStatus>().unwrap(),
            MatchStatus::Pending
        );
    }

    #[test]
    fn test_invalid_status_is_rejected() {
        assert!("done".parse::<DocumentStatus>().is_err());
        assert!("queued".parse::<MatchStatus>().is_err());
    }

    #[test]
    fn test_match_status_terminal_states() {
        assert!(MatchStatus::Completed.is_terminal());
        assert!(MatchStatus::Failed.is_terminal());
        assert!(!MatchStatus::Pending.is_terminal());
        assert!(!MatchStatus::Processing.is_terminal());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&DocumentStatus::Uploaded).unwrap(),
            "\"uploaded\""
        );
        assert_eq!(
            serde_json::to_string(&MatchStatus::Failed).unwrap(),
            "\"failed\""
        );
    }
}
