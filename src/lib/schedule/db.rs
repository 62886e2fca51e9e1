use std::{collections::BTreeSet, str::FromStr, time::Duration};

use log::{debug, info};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    FromRow, SqlitePool,
};

use super::{
    errors::StorageError,
    helpers::{join_tags, split_tags},
    models::{
        course_model::{Course, CourseFilter, CourseId},
        person_model::{
            weekday_from_number, AvailabilityWindow, Person, Student, StudentId, StudentProfile,
            Teacher, TeacherId, TeacherProfile,
        },
        textbook_model::{
            Textbook, TextbookHolder, TextbookId, TextbookInfo, TextbookIssue, TextbookStats,
        },
        Config,
    },
    time::{TimeInterval, TimeOfDay},
};

const MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// Opens the store described by `config` and brings its schema up to date.
///
/// An in-memory store lives only as long as its single connection, so that
/// connection is pinned for the lifetime of the pool.
pub async fn init_connection(config: &Config) -> Result<SqlitePool, StorageError> {
    info!("Connecting to {}", config.database_url);
    let options = SqliteConnectOptions::from_str(&config.database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    let in_memory = config.database_url.contains(":memory:");
    let pool_options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(config.max_connections.max(1))
    };
    let pool = pool_options.connect_with(options).await?;

    MIGRATOR.run(&pool).await?;

    Ok(pool)
}

/* Rows as they come out of SQLite; converted to models right here */

#[derive(FromRow)]
struct TeacherRow {
    id: TeacherId,
    name: String,
    contact: String,
    subject_types: String,
}

impl From<TeacherRow> for Teacher {
    fn from(row: TeacherRow) -> Self {
        Teacher {
            id: row.id,
            profile: TeacherProfile {
                name: row.name,
                contact: row.contact,
                subject_types: split_tags(&row.subject_types),
            },
        }
    }
}

#[derive(FromRow)]
struct StudentRow {
    id: StudentId,
    name: String,
    contact: String,
    tags: String,
}

impl From<StudentRow> for Student {
    fn from(row: StudentRow) -> Self {
        Student {
            id: row.id,
            profile: StudentProfile {
                name: row.name,
                contact: row.contact,
                tags: split_tags(&row.tags),
            },
        }
    }
}

#[derive(FromRow)]
pub(crate) struct CourseRow {
    id: CourseId,
    name: String,
    teacher_id: TeacherId,
    class_name: String,
    course_type: String,
    start_time: String,
    end_time: String,
}

impl TryFrom<CourseRow> for Course {
    type Error = StorageError;

    fn try_from(row: CourseRow) -> Result<Self, Self::Error> {
        let interval = TimeInterval::parse(&row.start_time, &row.end_time).map_err(|e| {
            StorageError::CorruptRow {
                table: "courses",
                id: row.id.0,
                reason: e.to_string(),
            }
        })?;
        Ok(Course {
            id: row.id,
            name: row.name,
            teacher_id: row.teacher_id,
            class_name: row.class_name,
            course_type: row.course_type,
            interval,
        })
    }
}

pub(crate) const COURSE_COLUMNS: &str =
    "id, name, teacher_id, class_name, course_type, start_time, end_time";

#[derive(FromRow)]
struct AvailabilityRow {
    id: i64,
    person_id: i64,
    person_type: String,
    day_of_week: i64,
    start_time: String,
    end_time: String,
}

impl TryFrom<AvailabilityRow> for AvailabilityWindow {
    type Error = StorageError;

    fn try_from(row: AvailabilityRow) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| StorageError::CorruptRow {
            table: "available_times",
            id: row.id,
            reason,
        };
        let person = Person::from_parts(row.person_id, &row.person_type)
            .ok_or_else(|| corrupt(format!("unknown person type `{}`", row.person_type)))?;
        let day = u32::try_from(row.day_of_week)
            .ok()
            .and_then(weekday_from_number)
            .ok_or_else(|| corrupt(format!("day of week {} out of range", row.day_of_week)))?;
        let start = TimeOfDay::parse(&row.start_time).map_err(|e| corrupt(e.to_string()))?;
        let end = TimeOfDay::parse(&row.end_time).map_err(|e| corrupt(e.to_string()))?;
        AvailabilityWindow::new(person, day, start, end).map_err(|e| corrupt(e.to_string()))
    }
}

#[derive(FromRow)]
struct TextbookRow {
    id: TextbookId,
    name: String,
    price: f64,
    description: String,
}

impl From<TextbookRow> for Textbook {
    fn from(row: TextbookRow) -> Self {
        Textbook {
            id: row.id,
            info: TextbookInfo {
                name: row.name,
                price: row.price,
                description: row.description,
            },
        }
    }
}

/* Teachers */

pub async fn add_teacher_to_db(
    pool: &SqlitePool,
    profile: &TeacherProfile,
) -> Result<TeacherId, StorageError> {
    let id = sqlx::query("INSERT INTO teachers (name, contact, subject_types) VALUES ($1, $2, $3)")
        .bind(profile.name.trim())
        .bind(&profile.contact)
        .bind(join_tags(&profile.subject_types))
        .execute(pool)
        .await?
        .last_insert_rowid();
    debug!("Added teacher {} as {}", profile.name, id);

    Ok(TeacherId(id))
}

pub async fn update_teacher_in_db(
    pool: &SqlitePool,
    id: TeacherId,
    profile: &TeacherProfile,
) -> Result<bool, StorageError> {
    debug!("Updating teacher {} in db", id);

    let result =
        sqlx::query("UPDATE teachers SET name = $2, contact = $3, subject_types = $4 WHERE id = $1")
            .bind(id)
            .bind(profile.name.trim())
            .bind(&profile.contact)
            .bind(join_tags(&profile.subject_types))
            .execute(pool)
            .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn get_teacher_from_db(
    pool: &SqlitePool,
    id: TeacherId,
) -> Result<Option<Teacher>, StorageError> {
    Ok(sqlx::query_as::<_, TeacherRow>(
        "SELECT id, name, contact, subject_types FROM teachers WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .map(Teacher::from))
}

pub async fn get_teachers_from_db(pool: &SqlitePool) -> Result<Vec<Teacher>, StorageError> {
    Ok(sqlx::query_as::<_, TeacherRow>(
        "SELECT id, name, contact, subject_types FROM teachers ORDER BY name, id",
    )
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(Teacher::from)
    .collect())
}

pub async fn search_teachers_by_name_in_db(
    pool: &SqlitePool,
    name: &str,
) -> Result<Vec<Teacher>, StorageError> {
    Ok(sqlx::query_as::<_, TeacherRow>(
        "SELECT id, name, contact, subject_types FROM teachers \
         WHERE name LIKE '%' || $1 || '%' ORDER BY name, id",
    )
    .bind(name.trim())
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(Teacher::from)
    .collect())
}

/// Teachers whose subject list contains exactly `subject_type`.
pub async fn get_teachers_by_subject_from_db(
    pool: &SqlitePool,
    subject_type: &str,
) -> Result<Vec<Teacher>, StorageError> {
    Ok(get_teachers_from_db(pool)
        .await?
        .into_iter()
        .filter(|teacher| teacher.can_teach(subject_type))
        .collect())
}

/// Removes a teacher with their availability; their courses and those
/// courses' enrollments go with them through the foreign keys.
pub async fn remove_teacher_from_db(
    pool: &SqlitePool,
    id: TeacherId,
) -> Result<bool, StorageError> {
    debug!("Remove teacher {} from db", id);

    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM available_times WHERE person_id = $1 AND person_type = 'teacher'")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    let result = sqlx::query("DELETE FROM teachers WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(result.rows_affected() > 0)
}

/* Students */

pub async fn add_student_to_db(
    pool: &SqlitePool,
    profile: &StudentProfile,
) -> Result<StudentId, StorageError> {
    let id = sqlx::query("INSERT INTO students (name, contact, tags) VALUES ($1, $2, $3)")
        .bind(profile.name.trim())
        .bind(&profile.contact)
        .bind(join_tags(&profile.tags))
        .execute(pool)
        .await?
        .last_insert_rowid();
    debug!("Added student {} as {}", profile.name, id);

    Ok(StudentId(id))
}

pub async fn update_student_in_db(
    pool: &SqlitePool,
    id: StudentId,
    profile: &StudentProfile,
) -> Result<bool, StorageError> {
    debug!("Updating student {} in db", id);

    let result = sqlx::query("UPDATE students SET name = $2, contact = $3, tags = $4 WHERE id = $1")
        .bind(id)
        .bind(profile.name.trim())
        .bind(&profile.contact)
        .bind(join_tags(&profile.tags))
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn get_student_from_db(
    pool: &SqlitePool,
    id: StudentId,
) -> Result<Option<Student>, StorageError> {
    Ok(sqlx::query_as::<_, StudentRow>(
        "SELECT id, name, contact, tags FROM students WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .map(Student::from))
}

pub async fn get_students_from_db(pool: &SqlitePool) -> Result<Vec<Student>, StorageError> {
    Ok(sqlx::query_as::<_, StudentRow>(
        "SELECT id, name, contact, tags FROM students ORDER BY name, id",
    )
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(Student::from)
    .collect())
}

pub async fn search_students_by_name_in_db(
    pool: &SqlitePool,
    name: &str,
) -> Result<Vec<Student>, StorageError> {
    Ok(sqlx::query_as::<_, StudentRow>(
        "SELECT id, name, contact, tags FROM students \
         WHERE name LIKE '%' || $1 || '%' ORDER BY name, id",
    )
    .bind(name.trim())
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(Student::from)
    .collect())
}

/// Students carrying exactly `tag`.
pub async fn search_students_by_tag_in_db(
    pool: &SqlitePool,
    tag: &str,
) -> Result<Vec<Student>, StorageError> {
    let tag = tag.trim();
    Ok(get_students_from_db(pool)
        .await?
        .into_iter()
        .filter(|student| student.profile.tags.contains(tag))
        .collect())
}

/// Removes a student; enrollments, classes and textbook records follow
/// through the foreign keys, availability is removed here.
pub async fn remove_student_from_db(
    pool: &SqlitePool,
    id: StudentId,
) -> Result<bool, StorageError> {
    debug!("Remove student {} from db", id);

    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM available_times WHERE person_id = $1 AND person_type = 'student'")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    let result = sqlx::query("DELETE FROM students WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(result.rows_affected() > 0)
}

pub async fn add_class_to_student_in_db(
    pool: &SqlitePool,
    id: StudentId,
    class_name: &str,
) -> Result<(), StorageError> {
    debug!("Adding student {} to class {}", id, class_name);

    sqlx::query("INSERT OR IGNORE INTO student_classes (student_id, class_name) VALUES ($1, $2)")
        .bind(id)
        .bind(class_name.trim())
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn remove_class_from_student_in_db(
    pool: &SqlitePool,
    id: StudentId,
    class_name: &str,
) -> Result<bool, StorageError> {
    let result =
        sqlx::query("DELETE FROM student_classes WHERE student_id = $1 AND class_name = $2")
            .bind(id)
            .bind(class_name.trim())
            .execute(pool)
            .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn get_student_classes_from_db(
    pool: &SqlitePool,
    id: StudentId,
) -> Result<BTreeSet<String>, StorageError> {
    Ok(sqlx::query_scalar::<_, String>(
        "SELECT class_name FROM student_classes WHERE student_id = $1",
    )
    .bind(id)
    .fetch_all(pool)
    .await?
    .into_iter()
    .collect())
}

/* Availability */

/// Stores a window, replacing any window the person already has that day.
pub async fn set_available_time_in_db(
    pool: &SqlitePool,
    window: &AvailabilityWindow,
) -> Result<(), StorageError> {
    debug!(
        "Setting availability of {} on {} to {}-{}",
        window.person, window.day_of_week, window.start, window.end
    );

    sqlx::query(
        "INSERT INTO available_times (person_id, person_type, day_of_week, start_time, end_time) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (person_id, person_type, day_of_week) \
         DO UPDATE SET start_time = excluded.start_time, end_time = excluded.end_time",
    )
    .bind(window.person.id())
    .bind(window.person.role())
    .bind(i64::from(window.day_of_week.number_from_monday()))
    .bind(window.start.to_string())
    .bind(window.end.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_available_times_from_db(
    pool: &SqlitePool,
    person: Person,
) -> Result<Vec<AvailabilityWindow>, StorageError> {
    sqlx::query_as::<_, AvailabilityRow>(
        "SELECT id, person_id, person_type, day_of_week, start_time, end_time \
         FROM available_times WHERE person_id = $1 AND person_type = $2 ORDER BY day_of_week",
    )
    .bind(person.id())
    .bind(person.role())
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(AvailabilityWindow::try_from)
    .collect()
}

/* Courses */

pub async fn list_courses_from_db(
    pool: &SqlitePool,
    filter: &CourseFilter,
) -> Result<Vec<Course>, StorageError> {
    let query = format!(
        "SELECT {COURSE_COLUMNS} FROM courses \
         WHERE ($1 IS NULL OR teacher_id = $1) \
           AND ($2 IS NULL OR id IN (SELECT course_id FROM course_students WHERE student_id = $2)) \
           AND ($3 IS NULL OR start_time < $3) \
           AND ($4 IS NULL OR end_time > $4) \
         ORDER BY start_time, id"
    );
    sqlx::query_as::<_, CourseRow>(&query)
        .bind(filter.teacher_id)
        .bind(filter.student_id)
        .bind(filter.during.map(|during| during.end().to_string()))
        .bind(filter.during.map(|during| during.start().to_string()))
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(Course::try_from)
        .collect()
}

/* Textbooks */

pub async fn add_textbook_to_db(
    pool: &SqlitePool,
    info: &TextbookInfo,
) -> Result<TextbookId, StorageError> {
    let id = sqlx::query("INSERT INTO textbooks (name, price, description) VALUES ($1, $2, $3)")
        .bind(info.name.trim())
        .bind(info.price)
        .bind(&info.description)
        .execute(pool)
        .await?
        .last_insert_rowid();
    debug!("Added textbook {} as {}", info.name, id);

    Ok(TextbookId(id))
}

pub async fn update_textbook_in_db(
    pool: &SqlitePool,
    id: TextbookId,
    info: &TextbookInfo,
) -> Result<bool, StorageError> {
    let result =
        sqlx::query("UPDATE textbooks SET name = $2, price = $3, description = $4 WHERE id = $1")
            .bind(id)
            .bind(info.name.trim())
            .bind(info.price)
            .bind(&info.description)
            .execute(pool)
            .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn get_textbook_from_db(
    pool: &SqlitePool,
    id: TextbookId,
) -> Result<Option<Textbook>, StorageError> {
    Ok(sqlx::query_as::<_, TextbookRow>(
        "SELECT id, name, price, description FROM textbooks WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .map(Textbook::from))
}

pub async fn get_textbooks_from_db(pool: &SqlitePool) -> Result<Vec<Textbook>, StorageError> {
    Ok(sqlx::query_as::<_, TextbookRow>(
        "SELECT id, name, price, description FROM textbooks ORDER BY name, id",
    )
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(Textbook::from)
    .collect())
}

pub async fn search_textbooks_by_name_in_db(
    pool: &SqlitePool,
    name: &str,
) -> Result<Vec<Textbook>, StorageError> {
    Ok(sqlx::query_as::<_, TextbookRow>(
        "SELECT id, name, price, description FROM textbooks \
         WHERE name LIKE '%' || $1 || '%' ORDER BY name, id",
    )
    .bind(name.trim())
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(Textbook::from)
    .collect())
}

pub async fn remove_textbook_from_db(
    pool: &SqlitePool,
    id: TextbookId,
) -> Result<bool, StorageError> {
    debug!("Remove textbook {} from db", id);

    let result = sqlx::query("DELETE FROM textbooks WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Records a textbook for a student; issuing again overwrites both flags.
pub async fn issue_textbook_in_db(
    pool: &SqlitePool,
    issue: &TextbookIssue,
) -> Result<(), StorageError> {
    debug!(
        "Textbook {} for student {}: issued={} paid={}",
        issue.textbook_id, issue.student_id, issue.is_issued, issue.is_paid
    );

    sqlx::query(
        "INSERT OR REPLACE INTO student_textbooks (student_id, textbook_id, is_issued, is_paid) \
         VALUES ($1, $2, $3, $4)",
    )
    .bind(issue.student_id)
    .bind(issue.textbook_id)
    .bind(issue.is_issued)
    .bind(issue.is_paid)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_student_textbooks_from_db(
    pool: &SqlitePool,
    id: StudentId,
) -> Result<Vec<TextbookIssue>, StorageError> {
    Ok(sqlx::query_as::<_, (StudentId, TextbookId, bool, bool)>(
        "SELECT student_id, textbook_id, is_issued, is_paid FROM student_textbooks \
         WHERE student_id = $1 ORDER BY textbook_id",
    )
    .bind(id)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|(student_id, textbook_id, is_issued, is_paid)| TextbookIssue {
        student_id,
        textbook_id,
        is_issued,
        is_paid,
    })
    .collect())
}

pub async fn get_textbook_holders_from_db(
    pool: &SqlitePool,
    id: TextbookId,
) -> Result<Vec<TextbookHolder>, StorageError> {
    Ok(sqlx::query_as::<_, (StudentId, String, bool, bool)>(
        "SELECT s.id, s.name, st.is_issued, st.is_paid FROM students s \
         JOIN student_textbooks st ON s.id = st.student_id \
         WHERE st.textbook_id = $1 ORDER BY s.name, s.id",
    )
    .bind(id)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|(student_id, student_name, is_issued, is_paid)| TextbookHolder {
        student_id,
        student_name,
        is_issued,
        is_paid,
    })
    .collect())
}

pub async fn get_textbook_stats_from_db(
    pool: &SqlitePool,
) -> Result<Vec<TextbookStats>, StorageError> {
    Ok(sqlx::query_as::<_, (TextbookId, String, f64, i64, i64, i64)>(
        "SELECT t.id, t.name, t.price, \
                COUNT(st.student_id), \
                COALESCE(SUM(st.is_issued), 0), \
                COALESCE(SUM(st.is_paid), 0) \
         FROM textbooks t \
         LEFT JOIN student_textbooks st ON t.id = st.textbook_id \
         GROUP BY t.id, t.name, t.price \
         ORDER BY t.name, t.id",
    )
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(
        |(textbook_id, name, price, total_count, issued_count, paid_count)| TextbookStats {
            textbook_id,
            name,
            price,
            total_count,
            issued_count,
            paid_count,
            total_cost: price * total_count as f64,
        },
    )
    .collect())
}
