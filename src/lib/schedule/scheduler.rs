//! Conflict-aware course scheduler.
//!
//! A course is committed only if neither its teacher nor any of its students
//! already has a course overlapping it. Intervals are half-open, so a course
//! ending at 10:00 and one starting at 10:00 do not collide.
//!
//! [`validate_and_save`] holds the rules and runs against any [`CourseStore`];
//! [`Scheduler`] wraps every call to it in a single SQLite transaction so the
//! scan and the write it guards either both happen or neither does.

use std::collections::BTreeSet;

use log::{info, warn};
use sqlx::SqlitePool;

use super::{
    db::list_courses_from_db,
    errors::{Conflict, ConflictParty, ScheduleError, ScheduleResult},
    models::{
        course_model::{Course, CourseDraft, CourseFields, CourseFilter, CourseId},
        person_model::StudentId,
    },
    store::CourseStore,
    time::{TimeInterval, Timestamp},
};

/// Checks a draft without touching any store: a name, a teacher and a
/// well-formed interval that ends after it starts.
pub fn validate_draft(draft: &CourseDraft) -> ScheduleResult<CourseFields> {
    let name = draft.name.trim();
    if name.is_empty() {
        return Err(ScheduleError::Validation("course name is required".to_owned()));
    }
    let Some(teacher_id) = draft.teacher_id else {
        return Err(ScheduleError::Validation("course teacher is required".to_owned()));
    };
    if draft.start_time.trim().is_empty() || draft.end_time.trim().is_empty() {
        return Err(ScheduleError::Validation(
            "course start and end time are required".to_owned(),
        ));
    }
    let interval = TimeInterval::parse(&draft.start_time, &draft.end_time)?;

    Ok(CourseFields {
        name: name.to_owned(),
        teacher_id,
        class_name: draft.class_name.trim().to_owned(),
        course_type: draft.course_type.trim().to_owned(),
        interval,
    })
}

/// Minutes between the draft's start and end; 0 if either is missing or malformed.
pub fn compute_duration(draft: &CourseDraft) -> i64 {
    match (
        Timestamp::parse(&draft.start_time),
        Timestamp::parse(&draft.end_time),
    ) {
        (Ok(start), Ok(end)) => start.minutes_until(&end),
        _ => 0,
    }
}

/// Validates `draft`, checks it against the commitments in `store`, and
/// writes it.
///
/// The teacher is checked on every save, against the teacher the draft names,
/// so reassigning a course is checked like creating it. Every student of the
/// resulting roster is checked as well: on update that is the current
/// enrollment plus `draft.students`, on creation just `draft.students`. The
/// course itself is never counted as its own conflict.
///
/// Nothing is written unless every check passes; students in `draft.students`
/// are enrolled together with the course write.
pub async fn validate_and_save<S: CourseStore>(
    store: &mut S,
    draft: &CourseDraft,
) -> ScheduleResult<CourseId> {
    let fields = validate_draft(draft)?;

    /* Teacher conflict check */
    let teacher_overlaps = store
        .find_overlapping_courses_for_teacher(fields.teacher_id, &fields.interval, draft.id)
        .await?;
    if let Some(&existing) = teacher_overlaps.first() {
        return Err(conflict(store, ConflictParty::Teacher(fields.teacher_id), existing).await);
    }

    /* Student conflict check */
    let mut roster: BTreeSet<StudentId> = draft.students.clone();
    if let Some(id) = draft.id {
        roster.extend(store.get_enrolled_student_ids(id).await?);
    }
    for &student_id in roster.iter() {
        let student_overlaps = store
            .find_overlapping_courses_for_student(student_id, &fields.interval, draft.id)
            .await?;
        if let Some(&existing) = student_overlaps.first() {
            return Err(conflict(store, ConflictParty::Student(student_id), existing).await);
        }
    }

    /* Commit */
    let id = match draft.id {
        Some(id) => {
            if !store.update_course(id, &fields).await? {
                return Err(ScheduleError::NotFound(format!("course {id}")));
            }
            id
        }
        None => store.insert_course(&fields).await?,
    };
    for &student_id in draft.students.iter() {
        store.enroll_student(id, student_id).await?;
    }

    Ok(id)
}

/// Builds the rejection for a collision with `existing`, naming the course
/// so it can be shown to a person.
async fn conflict<S: CourseStore>(
    store: &mut S,
    party: ConflictParty,
    existing: CourseId,
) -> ScheduleError {
    match store.get_course(existing).await {
        Ok(Some(course)) => ScheduleError::SchedulingConflict(Conflict {
            party,
            course_id: course.id,
            course_name: course.name,
            interval: course.interval,
        }),
        Ok(None) => ScheduleError::NotFound(format!("course {existing}")),
        Err(e) => ScheduleError::Storage(e),
    }
}

/// The scheduler as the outside world sees it: every call is one transaction
/// on the pool it was built with.
#[derive(Debug, Clone)]
pub struct Scheduler {
    pool: SqlitePool,
}

impl Scheduler {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Creates or rewrites a course; see [`validate_and_save`].
    pub async fn save_course(&self, draft: &CourseDraft) -> ScheduleResult<CourseId> {
        let mut tx = self.pool.begin().await?;
        match validate_and_save(&mut *tx, draft).await {
            Ok(id) => {
                tx.commit().await?;
                info!("Saved course {} `{}`", id, draft.name.trim());
                Ok(id)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!("Rollback after failed save failed: {}", rollback_err);
                }
                warn!("Rejected course `{}`: {}", draft.name.trim(), e);
                Err(e)
            }
        }
    }

    /// Deletes a course together with its enrollments.
    pub async fn delete_course(&self, id: CourseId) -> ScheduleResult<()> {
        let mut tx = self.pool.begin().await?;
        if !tx.delete_course(id).await? {
            return Err(ScheduleError::NotFound(format!("course {id}")));
        }
        tx.commit().await?;
        info!("Deleted course {}", id);

        Ok(())
    }

    pub async fn get_course(&self, id: CourseId) -> ScheduleResult<Course> {
        let mut conn = self.pool.acquire().await?;
        conn.get_course(id)
            .await?
            .ok_or_else(|| ScheduleError::NotFound(format!("course {id}")))
    }

    pub async fn list_courses(&self, filter: &CourseFilter) -> ScheduleResult<Vec<Course>> {
        Ok(list_courses_from_db(&self.pool, filter).await?)
    }

    pub async fn get_enrolled_student_ids(&self, id: CourseId) -> ScheduleResult<Vec<StudentId>> {
        let mut conn = self.pool.acquire().await?;
        Ok(conn.get_enrolled_student_ids(id).await?)
    }

    /// Adds a student to a course's roster unless the student is already
    /// booked elsewhere during the course. Enrolling twice is a no-op.
    pub async fn enroll_student(&self, id: CourseId, student_id: StudentId) -> ScheduleResult<()> {
        let mut tx = self.pool.begin().await?;
        let course = tx
            .get_course(id)
            .await?
            .ok_or_else(|| ScheduleError::NotFound(format!("course {id}")))?;

        let overlaps = tx
            .find_overlapping_courses_for_student(student_id, &course.interval, Some(id))
            .await?;
        if let Some(&existing) = overlaps.first() {
            let e = conflict(&mut *tx, ConflictParty::Student(student_id), existing).await;
            warn!("Rejected enrollment of student {} into course {}: {}", student_id, id, e);
            return Err(e);
        }

        tx.enroll_student(id, student_id).await?;
        tx.commit().await?;
        info!("Enrolled student {} into course {}", student_id, id);

        Ok(())
    }

    pub async fn unenroll_student(
        &self,
        id: CourseId,
        student_id: StudentId,
    ) -> ScheduleResult<()> {
        let mut tx = self.pool.begin().await?;
        if !tx.unenroll_student(id, student_id).await? {
            return Err(ScheduleError::NotFound(format!(
                "enrollment of student {student_id} in course {id}"
            )));
        }
        tx.commit().await?;
        info!("Removed student {} from course {}", student_id, id);

        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/tests.rs"]
mod tests;
