use serde::{Deserialize, Serialize};

use super::person_model::{require_name, StudentId};
use crate::schedule::errors::{ScheduleError, ScheduleResult};

define_id_type!(TextbookId);

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TextbookInfo {
    pub name: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub description: String,
}

impl TextbookInfo {
    pub fn validate(&self) -> ScheduleResult<()> {
        require_name("textbook", &self.name)?;
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(ScheduleError::Validation(format!(
                "textbook price must be a non-negative number, got {}",
                self.price
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Textbook {
    pub id: TextbookId,
    #[serde(flatten)]
    pub info: TextbookInfo,
}

/// A textbook handed to one student, with its hand-out and payment state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct TextbookIssue {
    pub student_id: StudentId,
    pub textbook_id: TextbookId,
    pub is_issued: bool,
    pub is_paid: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TextbookHolder {
    pub student_id: StudentId,
    pub student_name: String,
    pub is_issued: bool,
    pub is_paid: bool,
}

/// Per-textbook totals; `total_cost` is `price * total_count`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TextbookStats {
    pub textbook_id: TextbookId,
    pub name: String,
    pub price: f64,
    pub total_count: i64,
    pub issued_count: i64,
    pub paid_count: i64,
    pub total_cost: f64,
}
