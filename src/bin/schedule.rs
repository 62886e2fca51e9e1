use std::error::Error;

use lib::schedule::{
    db::{
        add_class_to_student_in_db, add_student_to_db, add_teacher_to_db, add_textbook_to_db,
        get_students_from_db, get_teachers_by_subject_from_db, get_teachers_from_db,
        get_textbook_holders_from_db, get_textbook_stats_from_db, get_textbooks_from_db,
        init_connection, issue_textbook_in_db, remove_student_from_db, remove_teacher_from_db,
        remove_textbook_from_db, search_students_by_name_in_db, search_students_by_tag_in_db,
        search_teachers_by_name_in_db, search_textbooks_by_name_in_db, set_available_time_in_db,
    },
    errors::ScheduleError,
    helpers::{format_course_as_string, join_tags, load_config, log_all_courses},
    interchange::{export_to_json, import_from_json, ImportReport},
    models::{
        course_model::{CourseDraft, CourseFilter},
        person_model::{
            weekday_from_number, AvailabilityWindow, Person, StudentProfile, TeacherProfile,
        },
        textbook_model::{TextbookInfo, TextbookIssue},
        Args, Command, CourseCommand, StudentCommand, TeacherCommand, TextbookCommand,
    },
    scheduler::{compute_duration, Scheduler},
    tabular::{export_table_to_csv, import_table_from_csv},
    time::{TimeInterval, TimeOfDay},
};

use clap::Parser;
use log::{error, info};

#[tokio::main]
async fn main() {
    /* Setup logging */
    env_logger::builder()
        .target(env_logger::Target::Stdout)
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    /* Get all the required resources */
    let config = load_config(&args.config_json_path)?;
    let pool = init_connection(&config).await?;
    let scheduler = Scheduler::new(pool.clone());

    match args.command {
        Command::Teacher(TeacherCommand::Add {
            name,
            contact,
            subjects,
        }) => {
            let profile = TeacherProfile {
                name,
                contact,
                subject_types: subjects.into_iter().collect(),
            };
            profile.validate()?;
            let id = add_teacher_to_db(&pool, &profile).await?;
            println!("{id}");
        }
        Command::Teacher(TeacherCommand::List { name, subject }) => {
            let teachers = match (name, subject) {
                (Some(name), _) => search_teachers_by_name_in_db(&pool, &name).await?,
                (None, Some(subject)) => get_teachers_by_subject_from_db(&pool, &subject).await?,
                (None, None) => get_teachers_from_db(&pool).await?,
            };
            for teacher in teachers {
                println!(
                    "{:>4}  {:<24} {:<16} {}",
                    teacher.id,
                    teacher.profile.name,
                    teacher.profile.contact,
                    join_tags(&teacher.profile.subject_types)
                );
            }
        }
        Command::Teacher(TeacherCommand::Delete { id }) => {
            if !remove_teacher_from_db(&pool, id).await? {
                return Err(ScheduleError::NotFound(format!("teacher {id}")).into());
            }
            info!("Deleted teacher {} with their courses", id);
        }
        Command::Teacher(TeacherCommand::Available {
            id,
            day,
            start,
            end,
        }) => {
            let window = availability(Person::Teacher(id), day, &start, &end)?;
            set_available_time_in_db(&pool, &window).await?;
        }
        Command::Student(StudentCommand::Add {
            name,
            contact,
            tags,
            classes,
        }) => {
            let profile = StudentProfile {
                name,
                contact,
                tags: tags.into_iter().collect(),
            };
            profile.validate()?;
            let id = add_student_to_db(&pool, &profile).await?;
            for class_name in classes.iter().filter(|c| !c.trim().is_empty()) {
                add_class_to_student_in_db(&pool, id, class_name).await?;
            }
            println!("{id}");
        }
        Command::Student(StudentCommand::List { name, tag }) => {
            let students = match (name, tag) {
                (Some(name), _) => search_students_by_name_in_db(&pool, &name).await?,
                (None, Some(tag)) => search_students_by_tag_in_db(&pool, &tag).await?,
                (None, None) => get_students_from_db(&pool).await?,
            };
            for student in students {
                println!(
                    "{:>4}  {:<24} {:<16} {}",
                    student.id,
                    student.profile.name,
                    student.profile.contact,
                    join_tags(&student.profile.tags)
                );
            }
        }
        Command::Student(StudentCommand::Delete { id }) => {
            if !remove_student_from_db(&pool, id).await? {
                return Err(ScheduleError::NotFound(format!("student {id}")).into());
            }
            info!("Deleted student {}", id);
        }
        Command::Student(StudentCommand::Available {
            id,
            day,
            start,
            end,
        }) => {
            let window = availability(Person::Student(id), day, &start, &end)?;
            set_available_time_in_db(&pool, &window).await?;
        }
        Command::Course(CourseCommand::Add {
            name,
            teacher,
            class_name,
            course_type,
            start,
            end,
            students,
        }) => {
            let draft = CourseDraft {
                id: None,
                name,
                teacher_id: Some(teacher),
                class_name,
                course_type,
                start_time: start,
                end_time: end,
                students: students.into_iter().collect(),
            };
            let id = scheduler.save_course(&draft).await?;
            println!("{id}");
        }
        Command::Course(CourseCommand::Update {
            id,
            name,
            teacher,
            class_name,
            course_type,
            start,
            end,
        }) => {
            let current = scheduler.get_course(id).await?.to_draft();
            let draft = CourseDraft {
                name: name.unwrap_or(current.name),
                teacher_id: teacher.or(current.teacher_id),
                class_name: class_name.unwrap_or(current.class_name),
                course_type: course_type.unwrap_or(current.course_type),
                start_time: start.unwrap_or(current.start_time),
                end_time: end.unwrap_or(current.end_time),
                ..current
            };
            scheduler.save_course(&draft).await?;
            println!("{id} ({} min)", compute_duration(&draft));
        }
        Command::Course(CourseCommand::Delete { id }) => {
            scheduler.delete_course(id).await?;
        }
        Command::Course(CourseCommand::List {
            teacher,
            student,
            from,
            to,
        }) => {
            let during = match (from, to) {
                (Some(from), Some(to)) => Some(TimeInterval::parse(&from, &to)?),
                _ => None,
            };
            let filter = CourseFilter {
                teacher_id: teacher,
                student_id: student,
                during,
            };
            let courses = scheduler.list_courses(&filter).await?;
            log_all_courses(&courses);
            for course in courses.iter() {
                println!("{}", format_course_as_string(course));
            }
        }
        Command::Course(CourseCommand::Show { id }) => {
            let course = scheduler.get_course(id).await?;
            let students = scheduler.get_enrolled_student_ids(id).await?;
            println!("{}", format_course_as_string(&course));
            println!(
                "      students: {}",
                students
                    .iter()
                    .map(|s| s.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        Command::Textbook(TextbookCommand::Add {
            name,
            price,
            description,
        }) => {
            let info = TextbookInfo {
                name,
                price,
                description,
            };
            info.validate()?;
            let id = add_textbook_to_db(&pool, &info).await?;
            println!("{id}");
        }
        Command::Textbook(TextbookCommand::List { name }) => {
            let textbooks = match name {
                Some(name) => search_textbooks_by_name_in_db(&pool, &name).await?,
                None => get_textbooks_from_db(&pool).await?,
            };
            for textbook in textbooks {
                println!(
                    "{:>4}  {:<24} {:>8.2}  {}",
                    textbook.id, textbook.info.name, textbook.info.price, textbook.info.description
                );
                for holder in get_textbook_holders_from_db(&pool, textbook.id).await? {
                    println!(
                        "        {:>4} {:<24} issued={} paid={}",
                        holder.student_id, holder.student_name, holder.is_issued, holder.is_paid
                    );
                }
            }
        }
        Command::Textbook(TextbookCommand::Issue {
            textbook_id,
            student_id,
            issued,
            paid,
        }) => {
            let issue = TextbookIssue {
                student_id,
                textbook_id,
                is_issued: issued,
                is_paid: paid,
            };
            issue_textbook_in_db(&pool, &issue).await?;
        }
        Command::Textbook(TextbookCommand::Stats) => {
            for stats in get_textbook_stats_from_db(&pool).await? {
                println!(
                    "{:>4}  {:<24} {:>8.2}  holders {:>3} issued {:>3} paid {:>3}  total {:>10.2}",
                    stats.textbook_id,
                    stats.name,
                    stats.price,
                    stats.total_count,
                    stats.issued_count,
                    stats.paid_count,
                    stats.total_cost
                );
            }
        }
        Command::Textbook(TextbookCommand::Delete { id }) => {
            if !remove_textbook_from_db(&pool, id).await? {
                return Err(ScheduleError::NotFound(format!("textbook {id}")).into());
            }
        }
        Command::Enroll {
            course_id,
            student_id,
        } => {
            scheduler.enroll_student(course_id, student_id).await?;
        }
        Command::Unenroll {
            course_id,
            student_id,
        } => {
            scheduler.unenroll_student(course_id, student_id).await?;
        }
        Command::Export { path } => {
            export_to_json(&scheduler, &path).await?;
        }
        Command::Import { path } => {
            let report = import_from_json(&scheduler, &path).await?;
            print_rejected(&report);
        }
        Command::ExportCsv { table, path } => {
            let count = export_table_to_csv(&scheduler, table, &path).await?;
            println!("{count}");
        }
        Command::ImportCsv { table, path } => {
            let report = import_table_from_csv(&scheduler, table, &path).await?;
            print_rejected(&report);
        }
    }

    Ok(())
}

fn print_rejected(report: &ImportReport) {
    for (name, reason) in report.rejected_courses.iter() {
        println!("skipped course `{name}`: {reason}");
    }
}

fn availability(
    person: Person,
    day: u32,
    start: &str,
    end: &str,
) -> Result<AvailabilityWindow, ScheduleError> {
    let day_of_week = weekday_from_number(day).ok_or_else(|| {
        ScheduleError::Validation(format!("day of week must be 1..=7, got {day}"))
    })?;
    let start = TimeOfDay::parse(start)?;
    let end = TimeOfDay::parse(end)?;
    Ok(AvailabilityWindow::new(person, day_of_week, start, end)?)
}
