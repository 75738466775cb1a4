//! Conversion job model, row mapping and state transitions.

use chrono::Utc;
use packforge_core::error::CoreError;
use packforge_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use super::status::{ConversionStatus, StatusId};
use crate::error::DbError;

/// One requested conversion of an original pack to a target version.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionJob {
    pub id: DbId,
    pub source_pack_id: DbId,
    pub target_version: String,
    pub status: ConversionStatus,
    pub created_at: Timestamp,
    /// Set only when the job reaches a terminal status.
    pub completed_at: Option<Timestamp>,
    /// Set only on `Failed`.
    pub error_message: Option<String>,
    /// Captured converter output, kept whatever the outcome.
    pub console_log: Option<String>,
}

impl ConversionJob {
    /// Move to `next`, rejecting edges the state machine does not allow.
    pub fn transition_to(&mut self, next: ConversionStatus) -> Result<(), CoreError> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::Conflict(format!(
                "Conversion job {} cannot move from {} to {next}",
                self.id, self.status
            )));
        }
        self.status = next;
        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Mark the job completed.
    pub fn complete(&mut self) -> Result<(), CoreError> {
        self.transition_to(ConversionStatus::Completed)
    }

    /// Mark the job failed with a human-readable cause.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), CoreError> {
        self.transition_to(ConversionStatus::Failed)?;
        self.error_message = Some(message.into());
        Ok(())
    }
}

/// Raw `conversion_jobs` row as read by sqlx.
#[derive(Debug, Clone, FromRow)]
pub struct ConversionJobRow {
    pub id: DbId,
    pub source_pack_id: DbId,
    pub target_version: String,
    pub status_id: StatusId,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub error_message: Option<String>,
    pub console_log: Option<String>,
}

impl TryFrom<ConversionJobRow> for ConversionJob {
    type Error = DbError;

    fn try_from(row: ConversionJobRow) -> Result<Self, Self::Error> {
        let status = ConversionStatus::from_id(row.status_id).ok_or_else(|| {
            DbError::Corrupt(format!(
                "conversion job {} has unknown status_id {}",
                row.id, row.status_id
            ))
        })?;
        Ok(Self {
            id: row.id,
            source_pack_id: row.source_pack_id,
            target_version: row.target_version,
            status,
            created_at: row.created_at,
            completed_at: row.completed_at,
            error_message: row.error_message,
            console_log: row.console_log,
        })
    }
}

/// Input for creating a job. Jobs always start `Pending`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewConversionJob {
    pub source_pack_id: DbId,
    pub target_version: String,
}

impl NewConversionJob {
    /// Materialize the pending job a repository would store for this input.
    pub fn into_job(self, id: DbId, created_at: Timestamp) -> ConversionJob {
        ConversionJob {
            id,
            source_pack_id: self.source_pack_id,
            target_version: self.target_version,
            status: ConversionStatus::Pending,
            created_at,
            completed_at: None,
            error_message: None,
            console_log: None,
        }
    }
}
