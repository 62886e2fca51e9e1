//! Courses, both as proposed by a caller and as committed to the store.
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::person_model::{StudentId, TeacherId};
use crate::schedule::time::TimeInterval;

define_id_type!(CourseId);

/// A course as a caller proposes it. Nothing in here has been checked yet;
/// timestamps are kept as the caller typed them so that a malformed value can
/// be reported back verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct CourseDraft {
    /// `None` creates a new course, `Some` rewrites an existing one.
    pub id: Option<CourseId>,
    pub name: String,
    pub teacher_id: Option<TeacherId>,
    #[serde(default)]
    pub class_name: String,
    #[serde(default)]
    pub course_type: String,
    pub start_time: String,
    pub end_time: String,
    /// Students to enroll together with the save.
    #[serde(default)]
    pub students: BTreeSet<StudentId>,
}

/// Validated, mutable fields of a course, exactly as they are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseFields {
    pub name: String,
    pub teacher_id: TeacherId,
    pub class_name: String,
    pub course_type: String,
    pub interval: TimeInterval,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Course {
    pub id: CourseId,
    pub name: String,
    pub teacher_id: TeacherId,
    pub class_name: String,
    pub course_type: String,
    pub interval: TimeInterval,
}

impl Course {
    pub fn duration_minutes(&self) -> i64 {
        self.interval.duration_minutes()
    }

    /// A draft that, saved unchanged, rewrites this course with its own values.
    pub fn to_draft(&self) -> CourseDraft {
        CourseDraft {
            id: Some(self.id),
            name: self.name.clone(),
            teacher_id: Some(self.teacher_id),
            class_name: self.class_name.clone(),
            course_type: self.course_type.clone(),
            start_time: self.interval.start().to_string(),
            end_time: self.interval.end().to_string(),
            students: BTreeSet::new(),
        }
    }
}

/// Narrows [`list_courses`](crate::schedule::scheduler::Scheduler::list_courses).
/// Every criterion that is set must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CourseFilter {
    pub teacher_id: Option<TeacherId>,
    pub student_id: Option<StudentId>,
    /// Keeps courses overlapping this interval.
    pub during: Option<TimeInterval>,
}
