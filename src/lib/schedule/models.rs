use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use super::tabular::Table;
use course_model::CourseId;
use person_model::{StudentId, TeacherId};
use textbook_model::TextbookId;

pub mod course_model;
pub mod person_model;
pub mod textbook_model;

/// A model for describing ARGS of the tool.
/// Consists of:
/// 1. Path to config.json, that points the tool at its SQLite store. Missing file means defaults.
/// 2. The action to perform.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[arg(long, value_name = "FILE", default_value = "config.json")]
    pub config_json_path: PathBuf,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage teachers
    #[command(subcommand)]
    Teacher(TeacherCommand),
    /// Manage students
    #[command(subcommand)]
    Student(StudentCommand),
    /// Manage courses; saves are checked for double-booking
    #[command(subcommand)]
    Course(CourseCommand),
    /// Manage textbooks and their hand-out to students
    #[command(subcommand)]
    Textbook(TextbookCommand),
    /// Enroll a student into a course
    Enroll {
        course_id: CourseId,
        student_id: StudentId,
    },
    /// Remove a student from a course
    Unenroll {
        course_id: CourseId,
        student_id: StudentId,
    },
    /// Write every record into a JSON file
    Export {
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },
    /// Read records from a JSON file written by `export`
    Import {
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },
    /// Write one kind of record into a CSV file
    ExportCsv {
        #[arg(value_enum)]
        table: Table,
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },
    /// Read one kind of record from a CSV file; course rows name their teacher
    ImportCsv {
        #[arg(value_enum)]
        table: Table,
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum TeacherCommand {
    Add {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        contact: String,
        /// Comma-separated subjects
        #[arg(long, value_delimiter = ',')]
        subjects: Vec<String>,
    },
    List {
        /// Only teachers whose name contains this
        #[arg(long)]
        name: Option<String>,
        /// Only teachers able to teach this subject
        #[arg(long)]
        subject: Option<String>,
    },
    /// Delete a teacher together with their courses
    Delete { id: TeacherId },
    /// Set the weekly window a teacher is available in
    Available {
        id: TeacherId,
        /// 1 (Monday) ..= 7 (Sunday)
        day: u32,
        start: String,
        end: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum StudentCommand {
    Add {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        contact: String,
        /// Comma-separated group tags
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        /// Comma-separated classes
        #[arg(long, value_delimiter = ',')]
        classes: Vec<String>,
    },
    List {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        tag: Option<String>,
    },
    /// Delete a student together with their enrollments and textbooks
    Delete { id: StudentId },
    /// Set the weekly window a student is available in
    Available {
        id: StudentId,
        /// 1 (Monday) ..= 7 (Sunday)
        day: u32,
        start: String,
        end: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum CourseCommand {
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        teacher: TeacherId,
        #[arg(long, default_value = "")]
        class_name: String,
        #[arg(long, default_value = "")]
        course_type: String,
        /// `YYYY-MM-DD HH:MM`
        #[arg(long)]
        start: String,
        /// `YYYY-MM-DD HH:MM`
        #[arg(long)]
        end: String,
        /// Comma-separated student ids to enroll right away
        #[arg(long, value_delimiter = ',')]
        students: Vec<StudentId>,
    },
    /// Change fields of a course; omitted fields keep their value
    Update {
        id: CourseId,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        teacher: Option<TeacherId>,
        #[arg(long)]
        class_name: Option<String>,
        #[arg(long)]
        course_type: Option<String>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
    },
    Delete {
        id: CourseId,
    },
    List {
        #[arg(long)]
        teacher: Option<TeacherId>,
        #[arg(long)]
        student: Option<StudentId>,
        /// Together with `--to`, keeps courses overlapping the range
        #[arg(long, requires = "to")]
        from: Option<String>,
        #[arg(long, requires = "from")]
        to: Option<String>,
    },
    /// Print one course with its roster and duration
    Show {
        id: CourseId,
    },
}

#[derive(Subcommand, Debug)]
pub enum TextbookCommand {
    Add {
        #[arg(long)]
        name: String,
        #[arg(long, default_value_t = 0.0)]
        price: f64,
        #[arg(long, default_value = "")]
        description: String,
    },
    List {
        #[arg(long)]
        name: Option<String>,
    },
    /// Record a textbook for a student
    Issue {
        textbook_id: TextbookId,
        student_id: StudentId,
        /// The book was physically handed out
        #[arg(long)]
        issued: bool,
        /// The book was paid for
        #[arg(long)]
        paid: bool,
    },
    /// Print holders, hand-outs and cost per textbook
    Stats,
    Delete {
        id: TextbookId,
    },
}

/// A model for describing configuration of the tool.
/// Consists of:
/// 1. sqlx connection string of the SQLite store
/// 2. Upper bound of pooled connections; the tool is a single writer, so 1 is enough
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite:schedule.sqlite3".to_owned(),
            max_connections: 1,
        }
    }
}
