use log::debug;
use sqlx::SqliteConnection;

use super::{
    db::{CourseRow, COURSE_COLUMNS},
    errors::StorageError,
    models::{
        course_model::{Course, CourseFields, CourseId},
        person_model::{StudentId, TeacherId},
    },
    time::TimeInterval,
};

/// A trait, necessary for every store the scheduler commits courses into.
///
/// The scheduler runs a whole check-then-write sequence against one value of
/// this trait, so an implementation backed by a transaction makes that
/// sequence atomic.
#[allow(async_fn_in_trait)]
pub trait CourseStore {
    /// Courses of `teacher_id` overlapping `interval`, except `exclude`.
    async fn find_overlapping_courses_for_teacher(
        &mut self,
        teacher_id: TeacherId,
        interval: &TimeInterval,
        exclude: Option<CourseId>,
    ) -> Result<Vec<CourseId>, StorageError>;

    /// Courses `student_id` is enrolled in overlapping `interval`, except `exclude`.
    async fn find_overlapping_courses_for_student(
        &mut self,
        student_id: StudentId,
        interval: &TimeInterval,
        exclude: Option<CourseId>,
    ) -> Result<Vec<CourseId>, StorageError>;

    async fn insert_course(&mut self, fields: &CourseFields) -> Result<CourseId, StorageError>;

    /// Rewrites every mutable field. `false` if there is no such course.
    async fn update_course(
        &mut self,
        id: CourseId,
        fields: &CourseFields,
    ) -> Result<bool, StorageError>;

    /// Deletes the course and its enrollments. `false` if there is no such course.
    async fn delete_course(&mut self, id: CourseId) -> Result<bool, StorageError>;

    async fn get_course(&mut self, id: CourseId) -> Result<Option<Course>, StorageError>;

    async fn get_enrolled_student_ids(
        &mut self,
        id: CourseId,
    ) -> Result<Vec<StudentId>, StorageError>;

    /// Enrolling twice is a no-op.
    async fn enroll_student(
        &mut self,
        id: CourseId,
        student_id: StudentId,
    ) -> Result<(), StorageError>;

    async fn unenroll_student(
        &mut self,
        id: CourseId,
        student_id: StudentId,
    ) -> Result<bool, StorageError>;
}

/// Lets a plain connection, and through `DerefMut` an open transaction, serve
/// as the store. Timestamps are compared as text, which is chronological
/// because they are always written in the fixed-width form.
impl CourseStore for SqliteConnection {
    async fn find_overlapping_courses_for_teacher(
        &mut self,
        teacher_id: TeacherId,
        interval: &TimeInterval,
        exclude: Option<CourseId>,
    ) -> Result<Vec<CourseId>, StorageError> {
        debug!(
            "Looking for courses of teacher {} overlapping {}",
            teacher_id, interval
        );

        Ok(sqlx::query_scalar::<_, CourseId>(
            "SELECT id FROM courses \
             WHERE teacher_id = $1 AND start_time < $2 AND end_time > $3 \
               AND ($4 IS NULL OR id != $4) \
             ORDER BY start_time, id",
        )
        .bind(teacher_id)
        .bind(interval.end().to_string())
        .bind(interval.start().to_string())
        .bind(exclude)
        .fetch_all(&mut *self)
        .await?)
    }

    async fn find_overlapping_courses_for_student(
        &mut self,
        student_id: StudentId,
        interval: &TimeInterval,
        exclude: Option<CourseId>,
    ) -> Result<Vec<CourseId>, StorageError> {
        debug!(
            "Looking for courses of student {} overlapping {}",
            student_id, interval
        );

        Ok(sqlx::query_scalar::<_, CourseId>(
            "SELECT c.id FROM courses c \
             JOIN course_students cs ON c.id = cs.course_id \
             WHERE cs.student_id = $1 AND c.start_time < $2 AND c.end_time > $3 \
               AND ($4 IS NULL OR c.id != $4) \
             ORDER BY c.start_time, c.id",
        )
        .bind(student_id)
        .bind(interval.end().to_string())
        .bind(interval.start().to_string())
        .bind(exclude)
        .fetch_all(&mut *self)
        .await?)
    }

    async fn insert_course(&mut self, fields: &CourseFields) -> Result<CourseId, StorageError> {
        let id = sqlx::query(
            "INSERT INTO courses (name, teacher_id, class_name, course_type, start_time, end_time) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&fields.name)
        .bind(fields.teacher_id)
        .bind(&fields.class_name)
        .bind(&fields.course_type)
        .bind(fields.interval.start().to_string())
        .bind(fields.interval.end().to_string())
        .execute(&mut *self)
        .await?
        .last_insert_rowid();
        debug!("Inserted course {} as {}", fields.name, id);

        Ok(CourseId(id))
    }

    async fn update_course(
        &mut self,
        id: CourseId,
        fields: &CourseFields,
    ) -> Result<bool, StorageError> {
        debug!("Updating course {} in db", id);

        let result = sqlx::query(
            "UPDATE courses SET name = $2, teacher_id = $3, class_name = $4, course_type = $5, \
             start_time = $6, end_time = $7 WHERE id = $1",
        )
        .bind(id)
        .bind(&fields.name)
        .bind(fields.teacher_id)
        .bind(&fields.class_name)
        .bind(&fields.course_type)
        .bind(fields.interval.start().to_string())
        .bind(fields.interval.end().to_string())
        .execute(&mut *self)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_course(&mut self, id: CourseId) -> Result<bool, StorageError> {
        debug!("Remove course {} from db", id);

        sqlx::query("DELETE FROM course_students WHERE course_id = $1")
            .bind(id)
            .execute(&mut *self)
            .await?;
        let result = sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(id)
            .execute(&mut *self)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_course(&mut self, id: CourseId) -> Result<Option<Course>, StorageError> {
        let query = format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1");
        sqlx::query_as::<_, CourseRow>(&query)
            .bind(id)
            .fetch_optional(&mut *self)
            .await?
            .map(Course::try_from)
            .transpose()
    }

    async fn get_enrolled_student_ids(
        &mut self,
        id: CourseId,
    ) -> Result<Vec<StudentId>, StorageError> {
        Ok(sqlx::query_scalar::<_, StudentId>(
            "SELECT student_id FROM course_students WHERE course_id = $1 ORDER BY student_id",
        )
        .bind(id)
        .fetch_all(&mut *self)
        .await?)
    }

    async fn enroll_student(
        &mut self,
        id: CourseId,
        student_id: StudentId,
    ) -> Result<(), StorageError> {
        debug!("Enrolling student {} into course {}", student_id, id);

        sqlx::query("INSERT OR IGNORE INTO course_students (course_id, student_id) VALUES ($1, $2)")
            .bind(id)
            .bind(student_id)
            .execute(&mut *self)
            .await?;

        Ok(())
    }

    async fn unenroll_student(
        &mut self,
        id: CourseId,
        student_id: StudentId,
    ) -> Result<bool, StorageError> {
        debug!("Removing student {} from course {}", student_id, id);

        let result =
            sqlx::query("DELETE FROM course_students WHERE course_id = $1 AND student_id = $2")
                .bind(id)
                .bind(student_id)
                .execute(&mut *self)
                .await?;

        Ok(result.rows_affected() > 0)
    }
}
