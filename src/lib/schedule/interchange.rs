//! JSON export and import of the whole store.
//!
//! Identities in a file only link records within that file. Importing gives
//! every record a fresh identity and saves courses through the scheduler, so
//! an imported course that would double-book someone is reported, not stored.
use std::{
    collections::{BTreeSet, HashMap},
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::{
    db::{
        add_class_to_student_in_db, add_student_to_db, add_teacher_to_db, add_textbook_to_db,
        get_student_classes_from_db, get_student_textbooks_from_db, get_students_from_db,
        get_teachers_from_db, get_textbooks_from_db, issue_textbook_in_db,
    },
    errors::{InterchangeError, ScheduleError},
    models::{
        course_model::{Course, CourseDraft, CourseFilter},
        person_model::{Student, StudentId, Teacher, TeacherId},
        textbook_model::{Textbook, TextbookId, TextbookIssue},
    },
    scheduler::Scheduler,
};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StudentRecord {
    #[serde(flatten)]
    pub student: Student,
    #[serde(default)]
    pub classes: BTreeSet<String>,
    #[serde(default)]
    pub textbooks: Vec<TextbookIssue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CourseRecord {
    #[serde(flatten)]
    pub course: Course,
    #[serde(default)]
    pub students: BTreeSet<StudentId>,
}

/// Everything the store holds, as written to and read from a file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Bundle {
    #[serde(default)]
    pub teachers: Vec<Teacher>,
    #[serde(default)]
    pub students: Vec<StudentRecord>,
    #[serde(default)]
    pub textbooks: Vec<Textbook>,
    #[serde(default)]
    pub courses: Vec<CourseRecord>,
}

/// What an import did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub teachers: usize,
    pub students: usize,
    pub textbooks: usize,
    pub courses: usize,
    /// Course name and why it was not imported.
    pub rejected_courses: Vec<(String, String)>,
}

pub async fn collect_bundle(scheduler: &Scheduler) -> Result<Bundle, InterchangeError> {
    let pool = scheduler.pool();

    let mut students = Vec::new();
    for student in get_students_from_db(pool).await? {
        let classes = get_student_classes_from_db(pool, student.id).await?;
        let textbooks = get_student_textbooks_from_db(pool, student.id).await?;
        students.push(StudentRecord {
            student,
            classes,
            textbooks,
        });
    }

    let mut courses = Vec::new();
    for course in scheduler.list_courses(&CourseFilter::default()).await? {
        let students = scheduler
            .get_enrolled_student_ids(course.id)
            .await?
            .into_iter()
            .collect();
        courses.push(CourseRecord { course, students });
    }

    Ok(Bundle {
        teachers: get_teachers_from_db(pool).await?,
        students,
        textbooks: get_textbooks_from_db(pool).await?,
        courses,
    })
}

pub async fn export_to_json(
    scheduler: &Scheduler,
    path: &Path,
) -> Result<Bundle, InterchangeError> {
    let bundle = collect_bundle(scheduler).await?;
    info!(
        "Writing {} teachers, {} students, {} textbooks and {} courses to {}",
        bundle.teachers.len(),
        bundle.students.len(),
        bundle.textbooks.len(),
        bundle.courses.len(),
        path.display()
    );

    let mut file = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut file, &bundle)?;
    file.flush()?;

    Ok(bundle)
}

pub fn read_bundle(path: &Path) -> Result<Bundle, InterchangeError> {
    info!("Reading records from {}", path.display());
    let file = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(file)?)
}

/// Stores the records of `bundle` under fresh identities.
///
/// Every person and textbook is validated before the first write; one
/// nameless record rejects the whole bundle. Courses are then saved one by
/// one and a rejected course does not stop the others.
pub async fn import_bundle(
    scheduler: &Scheduler,
    bundle: &Bundle,
) -> Result<ImportReport, InterchangeError> {
    for teacher in &bundle.teachers {
        teacher.profile.validate()?;
    }
    for record in &bundle.students {
        record.student.profile.validate()?;
    }
    for textbook in &bundle.textbooks {
        textbook.info.validate()?;
    }

    let pool = scheduler.pool();
    let mut report = ImportReport::default();

    let mut teacher_ids: HashMap<TeacherId, TeacherId> = HashMap::new();
    for teacher in &bundle.teachers {
        teacher_ids.insert(teacher.id, add_teacher_to_db(pool, &teacher.profile).await?);
        report.teachers += 1;
    }

    let mut textbook_ids: HashMap<TextbookId, TextbookId> = HashMap::new();
    for textbook in &bundle.textbooks {
        textbook_ids.insert(textbook.id, add_textbook_to_db(pool, &textbook.info).await?);
        report.textbooks += 1;
    }

    let mut student_ids: HashMap<StudentId, StudentId> = HashMap::new();
    for record in &bundle.students {
        let id = add_student_to_db(pool, &record.student.profile).await?;
        student_ids.insert(record.student.id, id);
        for class_name in &record.classes {
            add_class_to_student_in_db(pool, id, class_name).await?;
        }
        for issue in &record.textbooks {
            let Some(&textbook_id) = textbook_ids.get(&issue.textbook_id) else {
                warn!(
                    "Skipping unknown textbook {} of student {}",
                    issue.textbook_id, record.student.id
                );
                continue;
            };
            let issue = TextbookIssue {
                student_id: id,
                textbook_id,
                ..*issue
            };
            issue_textbook_in_db(pool, &issue).await?;
        }
        report.students += 1;
    }

    for record in &bundle.courses {
        let course = &record.course;
        let Some(&teacher_id) = teacher_ids.get(&course.teacher_id) else {
            report.rejected_courses.push((
                course.name.clone(),
                format!("unknown teacher {}", course.teacher_id),
            ));
            continue;
        };
        let unknown_students: Vec<String> = record
            .students
            .iter()
            .filter(|id| !student_ids.contains_key(*id))
            .map(|id| id.to_string())
            .collect();
        if !unknown_students.is_empty() {
            report.rejected_courses.push((
                course.name.clone(),
                format!("unknown students {}", unknown_students.join(", ")),
            ));
            continue;
        }

        let draft = CourseDraft {
            id: None,
            teacher_id: Some(teacher_id),
            students: record.students.iter().map(|id| student_ids[id]).collect(),
            ..course.to_draft()
        };
        match scheduler.save_course(&draft).await {
            Ok(_) => report.courses += 1,
            Err(e @ ScheduleError::Storage(_)) => return Err(e.into()),
            Err(e) => report.rejected_courses.push((course.name.clone(), e.to_string())),
        }
    }

    info!(
        "Imported {} teachers, {} students, {} textbooks and {} courses; {} courses rejected",
        report.teachers,
        report.students,
        report.textbooks,
        report.courses,
        report.rejected_courses.len()
    );

    Ok(report)
}

pub async fn import_from_json(
    scheduler: &Scheduler,
    path: &Path,
) -> Result<ImportReport, InterchangeError> {
    let bundle = read_bundle(path)?;
    import_bundle(scheduler, &bundle).await
}
