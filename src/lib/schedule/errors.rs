//! Error types of the scheduling tool.
//!
//! [`StorageError`] is everything the store can fail with. [`ScheduleError`]
//! is what callers of the scheduler see: a conflict or a validation failure
//! is reported before anything is written, a storage failure is passed
//! through untouched.
use std::fmt;

use super::{
    models::{
        course_model::CourseId,
        person_model::{StudentId, TeacherId},
    },
    time::{TimeError, TimeInterval},
};

pub type ScheduleResult<T> = Result<T, ScheduleError>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("corrupt row {id} in `{table}`: {reason}")]
    CorruptRow {
        table: &'static str,
        id: i64,
        reason: String,
    },
}

/// The party that would be double-booked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictParty {
    Teacher(TeacherId),
    Student(StudentId),
}

impl fmt::Display for ConflictParty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictParty::Teacher(id) => write!(f, "teacher {id}"),
            ConflictParty::Student(id) => write!(f, "student {id}"),
        }
    }
}

/// The committed course a proposal collides with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub party: ConflictParty,
    pub course_id: CourseId,
    pub course_name: String,
    pub interval: TimeInterval,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} is already booked for course {} `{}` ({})",
            self.party, self.course_id, self.course_name, self.interval
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("scheduling conflict: {0}")]
    SchedulingConflict(Conflict),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<sqlx::Error> for ScheduleError {
    fn from(e: sqlx::Error) -> Self {
        ScheduleError::Storage(StorageError::Database(e))
    }
}

impl From<TimeError> for ScheduleError {
    fn from(e: TimeError) -> Self {
        ScheduleError::Validation(e.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InterchangeError {
    #[error("cannot access interchange file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed interchange file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed table: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

impl From<StorageError> for InterchangeError {
    fn from(e: StorageError) -> Self {
        InterchangeError::Schedule(ScheduleError::Storage(e))
    }
}
