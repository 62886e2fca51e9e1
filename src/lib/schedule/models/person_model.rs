//! Teachers, students and their weekly availability.
use std::{collections::BTreeSet, fmt};

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::schedule::{
    errors::{ScheduleError, ScheduleResult},
    time::{TimeError, TimeOfDay},
};

define_id_type!(TeacherId);
define_id_type!(StudentId);

/// Editable part of a teacher record.
/// Consists of:
/// 1. Display name, required
/// 2. Free-form contact (phone, email)
/// 3. Subjects the teacher is able to teach
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct TeacherProfile {
    pub name: String,
    #[serde(default)]
    pub contact: String,
    #[serde(default)]
    pub subject_types: BTreeSet<String>,
}

impl TeacherProfile {
    pub fn validate(&self) -> ScheduleResult<()> {
        require_name("teacher", &self.name)?;
        require_plain_tags("subject", &self.subject_types)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Teacher {
    pub id: TeacherId,
    #[serde(flatten)]
    pub profile: TeacherProfile,
}

impl Teacher {
    pub fn can_teach(&self, subject_type: &str) -> bool {
        self.profile.subject_types.contains(subject_type.trim())
    }
}

/// Editable part of a student record.
/// Consists of:
/// 1. Display name, required
/// 2. Free-form contact
/// 3. Group tags the student belongs to
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct StudentProfile {
    pub name: String,
    #[serde(default)]
    pub contact: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl StudentProfile {
    pub fn validate(&self) -> ScheduleResult<()> {
        require_name("student", &self.name)?;
        require_plain_tags("group tag", &self.tags)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Student {
    pub id: StudentId,
    #[serde(flatten)]
    pub profile: StudentProfile,
}

/// Whose availability a window describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(tag = "role", content = "id", rename_all = "lowercase")]
pub enum Person {
    Teacher(TeacherId),
    Student(StudentId),
}

impl Person {
    pub fn id(&self) -> i64 {
        match self {
            Person::Teacher(id) => id.0,
            Person::Student(id) => id.0,
        }
    }

    /// Value of the `person_type` column.
    pub fn role(&self) -> &'static str {
        match self {
            Person::Teacher(_) => "teacher",
            Person::Student(_) => "student",
        }
    }

    pub fn from_parts(id: i64, role: &str) -> Option<Self> {
        match role {
            "teacher" => Some(Person::Teacher(TeacherId(id))),
            "student" => Some(Person::Student(StudentId(id))),
            _ => None,
        }
    }
}

impl fmt::Display for Person {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.role(), self.id())
    }
}

/// A recurring weekly slot in which a person is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct AvailabilityWindow {
    pub person: Person,
    pub day_of_week: Weekday,
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl AvailabilityWindow {
    pub fn new(
        person: Person,
        day_of_week: Weekday,
        start: TimeOfDay,
        end: TimeOfDay,
    ) -> Result<Self, TimeError> {
        if start >= end {
            return Err(TimeError::EmptyInterval {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self {
            person,
            day_of_week,
            start,
            end,
        })
    }
}

/// Maps 1 (Monday) ..= 7 (Sunday) onto a weekday.
pub fn weekday_from_number(day: u32) -> Option<Weekday> {
    match day {
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        7 => Some(Weekday::Sun),
        _ => None,
    }
}

pub(crate) fn require_name(kind: &str, name: &str) -> ScheduleResult<()> {
    if name.trim().is_empty() {
        return Err(ScheduleError::Validation(format!("{kind} name is required")));
    }
    Ok(())
}

/// Tags are stored comma-joined, so a comma inside one would split it on read.
fn require_plain_tags(kind: &str, tags: &BTreeSet<String>) -> ScheduleResult<()> {
    match tags.iter().find(|tag| tag.contains(',')) {
        Some(tag) => Err(ScheduleError::Validation(format!(
            "{kind} `{tag}` must not contain a comma"
        ))),
        None => Ok(()),
    }
}
