//! CSV interchange, one file per kind of record.
//!
//! Rows carry no identities. A course row names its teacher, and importing it
//! resolves that name against the teachers already stored, then saves the
//! course through the scheduler so a double-booking is reported, not stored.
use std::{
    collections::{BTreeSet, HashMap},
    io,
    path::Path,
};

use clap::ValueEnum;
use log::info;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sqlx::SqlitePool;

use super::{
    db::{
        add_student_to_db, add_teacher_to_db, add_textbook_to_db, get_students_from_db,
        get_teachers_from_db, get_textbooks_from_db, search_teachers_by_name_in_db,
    },
    errors::{InterchangeError, ScheduleError},
    helpers::{join_tags, split_tags},
    interchange::ImportReport,
    models::{
        course_model::{CourseDraft, CourseFilter},
        person_model::{StudentProfile, TeacherId, TeacherProfile},
        textbook_model::TextbookInfo,
    },
    scheduler::Scheduler,
};

/// Which records a CSV file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Table {
    Teachers,
    Students,
    Courses,
    Textbooks,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TeacherLine {
    pub name: String,
    #[serde(default)]
    pub contact: String,
    /// Comma-separated, quoted by the CSV writer.
    #[serde(default)]
    pub subject_types: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StudentLine {
    pub name: String,
    #[serde(default)]
    pub contact: String,
    #[serde(default)]
    pub tags: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CourseLine {
    pub name: String,
    pub teacher_name: String,
    #[serde(default)]
    pub class_name: String,
    #[serde(default)]
    pub course_type: String,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TextbookLine {
    pub name: String,
    /// An empty cell means free.
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub description: String,
}

impl From<TeacherLine> for TeacherProfile {
    fn from(line: TeacherLine) -> Self {
        TeacherProfile {
            name: line.name,
            contact: line.contact,
            subject_types: split_tags(&line.subject_types),
        }
    }
}

impl From<StudentLine> for StudentProfile {
    fn from(line: StudentLine) -> Self {
        StudentProfile {
            name: line.name,
            contact: line.contact,
            tags: split_tags(&line.tags),
        }
    }
}

impl From<TextbookLine> for TextbookInfo {
    fn from(line: TextbookLine) -> Self {
        TextbookInfo {
            name: line.name,
            price: line.price.unwrap_or(0.0),
            description: line.description,
        }
    }
}

impl CourseLine {
    /// The columns a course cannot be saved without. `row` is the 1-based
    /// line in the file, header included.
    fn require_fields(&self, row: usize) -> Result<(), ScheduleError> {
        let required = [
            ("name", &self.name),
            ("teacher_name", &self.teacher_name),
            ("start_time", &self.start_time),
            ("end_time", &self.end_time),
        ];
        match required.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((column, _)) => Err(ScheduleError::Validation(format!(
                "row {row}: `{column}` is required"
            ))),
            None => Ok(()),
        }
    }
}

fn write_rows<W: io::Write, T: Serialize>(
    writer: &mut csv::Writer<W>,
    rows: impl IntoIterator<Item = T>,
) -> Result<usize, csv::Error> {
    let mut count = 0;
    for row in rows {
        writer.serialize(row)?;
        count += 1;
    }
    Ok(count)
}

fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, InterchangeError> {
    let mut reader = csv::Reader::from_path(path)?;
    Ok(reader.deserialize().collect::<Result<Vec<T>, _>>()?)
}

/// Writes every record of `table` to `path` and returns how many rows were
/// written.
pub async fn export_table_to_csv(
    scheduler: &Scheduler,
    table: Table,
    path: &Path,
) -> Result<usize, InterchangeError> {
    let pool = scheduler.pool();
    let mut writer = csv::Writer::from_path(path)?;

    let count = match table {
        Table::Teachers => {
            let lines = get_teachers_from_db(pool).await?.into_iter().map(|t| TeacherLine {
                subject_types: join_tags(&t.profile.subject_types),
                name: t.profile.name,
                contact: t.profile.contact,
            });
            write_rows(&mut writer, lines)?
        }
        Table::Students => {
            let lines = get_students_from_db(pool).await?.into_iter().map(|s| StudentLine {
                tags: join_tags(&s.profile.tags),
                name: s.profile.name,
                contact: s.profile.contact,
            });
            write_rows(&mut writer, lines)?
        }
        Table::Courses => {
            let teacher_names: HashMap<TeacherId, String> = get_teachers_from_db(pool)
                .await?
                .into_iter()
                .map(|t| (t.id, t.profile.name))
                .collect();
            let courses = scheduler.list_courses(&CourseFilter::default()).await?;
            let lines = courses.into_iter().map(|c| CourseLine {
                teacher_name: teacher_names.get(&c.teacher_id).cloned().unwrap_or_default(),
                start_time: c.interval.start().to_string(),
                end_time: c.interval.end().to_string(),
                name: c.name,
                class_name: c.class_name,
                course_type: c.course_type,
            });
            write_rows(&mut writer, lines)?
        }
        Table::Textbooks => {
            let lines = get_textbooks_from_db(pool).await?.into_iter().map(|t| TextbookLine {
                name: t.info.name,
                price: Some(t.info.price),
                description: t.info.description,
            });
            write_rows(&mut writer, lines)?
        }
    };
    writer.flush()?;
    info!("Wrote {} {:?} rows to {}", count, table, path.display());

    Ok(count)
}

/// Reads `table` rows from `path` and stores them under fresh identities.
///
/// Every row is checked for its required columns before the first write, so
/// one incomplete row rejects the whole file. Course rows are then saved one
/// by one; a row naming an unknown teacher or colliding with a stored course
/// is reported and the rest go on.
pub async fn import_table_from_csv(
    scheduler: &Scheduler,
    table: Table,
    path: &Path,
) -> Result<ImportReport, InterchangeError> {
    info!("Reading {:?} rows from {}", table, path.display());
    let pool = scheduler.pool();
    let mut report = ImportReport::default();

    match table {
        Table::Teachers => {
            let profiles: Vec<TeacherProfile> = read_rows::<TeacherLine>(path)?
                .into_iter()
                .map(TeacherProfile::from)
                .collect();
            for profile in &profiles {
                profile.validate()?;
            }
            for profile in &profiles {
                add_teacher_to_db(pool, profile).await?;
                report.teachers += 1;
            }
        }
        Table::Students => {
            let profiles: Vec<StudentProfile> = read_rows::<StudentLine>(path)?
                .into_iter()
                .map(StudentProfile::from)
                .collect();
            for profile in &profiles {
                profile.validate()?;
            }
            for profile in &profiles {
                add_student_to_db(pool, profile).await?;
                report.students += 1;
            }
        }
        Table::Textbooks => {
            let textbooks: Vec<TextbookInfo> = read_rows::<TextbookLine>(path)?
                .into_iter()
                .map(TextbookInfo::from)
                .collect();
            for info in &textbooks {
                info.validate()?;
            }
            for info in &textbooks {
                add_textbook_to_db(pool, info).await?;
                report.textbooks += 1;
            }
        }
        Table::Courses => {
            let lines: Vec<CourseLine> = read_rows(path)?;
            for (i, line) in lines.iter().enumerate() {
                line.require_fields(i + 2)?;
            }
            for line in &lines {
                let Some(teacher_id) = find_teacher_by_name(pool, &line.teacher_name).await?
                else {
                    report.rejected_courses.push((
                        line.name.trim().to_owned(),
                        format!("unknown teacher `{}`", line.teacher_name.trim()),
                    ));
                    continue;
                };
                let draft = CourseDraft {
                    id: None,
                    name: line.name.clone(),
                    teacher_id: Some(teacher_id),
                    class_name: line.class_name.clone(),
                    course_type: line.course_type.clone(),
                    start_time: line.start_time.clone(),
                    end_time: line.end_time.clone(),
                    students: BTreeSet::new(),
                };
                match scheduler.save_course(&draft).await {
                    Ok(_) => report.courses += 1,
                    Err(e @ ScheduleError::Storage(_)) => return Err(e.into()),
                    Err(e) => report
                        .rejected_courses
                        .push((line.name.trim().to_owned(), e.to_string())),
                }
            }
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

/// The teacher whose name equals `name` ignoring case, otherwise the first
/// teacher whose name contains it.
async fn find_teacher_by_name(
    pool: &SqlitePool,
    name: &str,
) -> Result<Option<TeacherId>, InterchangeError> {
    let name = name.trim();
    let candidates = search_teachers_by_name_in_db(pool, name).await?;
    let exact = candidates
        .iter()
        .find(|t| t.profile.name.trim().eq_ignore_ascii_case(name));

    Ok(exact.or(candidates.first()).map(|t| t.id))
}
