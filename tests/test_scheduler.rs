use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;

use chrono::Weekday;
use lib::schedule::db::{
    add_class_to_student_in_db, add_student_to_db, add_teacher_to_db, add_textbook_to_db,
    get_available_times_from_db, get_student_classes_from_db, get_student_from_db,
    get_student_textbooks_from_db, get_teacher_from_db, get_teachers_by_subject_from_db,
    get_students_from_db, get_teachers_from_db, get_textbook_from_db,
    get_textbook_holders_from_db, get_textbook_stats_from_db, get_textbooks_from_db,
    init_connection, issue_textbook_in_db, remove_class_from_student_in_db,
    remove_student_from_db, remove_teacher_from_db, remove_textbook_from_db,
    search_students_by_tag_in_db, search_teachers_by_name_in_db, set_available_time_in_db,
    update_student_in_db, update_teacher_in_db, update_textbook_in_db,
};
use lib::schedule::errors::{ConflictParty, InterchangeError, ScheduleError};
use lib::schedule::helpers::load_config;
use lib::schedule::interchange::{export_to_json, import_bundle, import_from_json, Bundle};
use lib::schedule::models::course_model::{CourseDraft, CourseFilter, CourseId};
use lib::schedule::models::person_model::{
    AvailabilityWindow, Person, StudentId, StudentProfile, TeacherId, TeacherProfile,
};
use lib::schedule::models::textbook_model::{TextbookInfo, TextbookIssue};
use lib::schedule::models::Config;
use lib::schedule::scheduler::Scheduler;
use lib::schedule::tabular::{export_table_to_csv, import_table_from_csv, Table};
use lib::schedule::time::{TimeInterval, TimeOfDay};
use sqlx::SqlitePool;

async fn memory_scheduler() -> Scheduler {
    let config = Config {
        database_url: "sqlite::memory:".to_owned(),
        max_connections: 1,
    };
    Scheduler::new(init_connection(&config).await.unwrap())
}

async fn teacher(pool: &SqlitePool, name: &str, subjects: &[&str]) -> TeacherId {
    let profile = TeacherProfile {
        name: name.to_owned(),
        contact: format!("{}@school.example", name.to_lowercase()),
        subject_types: subjects.iter().map(|s| s.to_string()).collect(),
    };
    add_teacher_to_db(pool, &profile).await.unwrap()
}

async fn student(pool: &SqlitePool, name: &str, tags: &[&str]) -> StudentId {
    let profile = StudentProfile {
        name: name.to_owned(),
        contact: String::new(),
        tags: tags.iter().map(|s| s.to_string()).collect(),
    };
    add_student_to_db(pool, &profile).await.unwrap()
}

fn draft(name: &str, teacher_id: TeacherId, start: &str, end: &str) -> CourseDraft {
    CourseDraft {
        name: name.to_owned(),
        teacher_id: Some(teacher_id),
        class_name: "5A".to_owned(),
        course_type: "lecture".to_owned(),
        start_time: start.to_owned(),
        end_time: end.to_owned(),
        ..Default::default()
    }
}

#[tokio::test]
async fn saved_course_reads_back_unchanged() {
    let scheduler = memory_scheduler().await;
    let smith = teacher(scheduler.pool(), "Smith", &["math"]).await;

    let id = scheduler
        .save_course(&draft(" Algebra ", smith, "2024-01-15 09:00", "2024-01-15 10:30"))
        .await
        .unwrap();
    let course = scheduler.get_course(id).await.unwrap();

    assert_eq!(course.id, id);
    assert_eq!(course.name, "Algebra");
    assert_eq!(course.teacher_id, smith);
    assert_eq!(course.class_name, "5A");
    assert_eq!(course.course_type, "lecture");
    assert_eq!(course.interval.start().to_string(), "2024-01-15 09:00");
    assert_eq!(course.interval.end().to_string(), "2024-01-15 10:30");
    assert_eq!(course.duration_minutes(), 90);
}

#[tokio::test]
async fn teacher_double_booking_is_rejected_and_nothing_is_written() {
    let scheduler = memory_scheduler().await;
    let smith = teacher(scheduler.pool(), "Smith", &["math"]).await;
    let first = scheduler
        .save_course(&draft("Algebra", smith, "2024-01-15 09:00", "2024-01-15 10:30"))
        .await
        .unwrap();

    let result = scheduler
        .save_course(&draft("Geometry", smith, "2024-01-15 10:00", "2024-01-15 11:30"))
        .await;

    match result {
        Err(ScheduleError::SchedulingConflict(conflict)) => {
            assert_eq!(conflict.party, ConflictParty::Teacher(smith));
            assert_eq!(conflict.course_id, first);
            assert_eq!(conflict.course_name, "Algebra");
        }
        other => panic!("expected a conflict, got {other:?}"),
    }
    let courses = scheduler.list_courses(&CourseFilter::default()).await.unwrap();
    assert_eq!(courses.len(), 1);

    scheduler
        .save_course(&draft("Geometry", smith, "2024-01-15 10:30", "2024-01-15 11:30"))
        .await
        .unwrap();
}

#[tokio::test]
async fn student_double_booking_is_rejected() {
    let scheduler = memory_scheduler().await;
    let pool = scheduler.pool();
    let smith = teacher(pool, "Smith", &["math"]).await;
    let jones = teacher(pool, "Jones", &["physics"]).await;
    let ann = student(pool, "Ann", &["grade5"]).await;

    let algebra = scheduler
        .save_course(&CourseDraft {
            students: BTreeSet::from([ann]),
            ..draft("Algebra", smith, "2024-01-15 09:00", "2024-01-15 10:30")
        })
        .await
        .unwrap();
    assert_eq!(scheduler.get_enrolled_student_ids(algebra).await.unwrap(), vec![ann]);

    let mechanics = scheduler
        .save_course(&draft("Mechanics", jones, "2024-01-15 10:00", "2024-01-15 11:00"))
        .await
        .unwrap();
    let result = scheduler.enroll_student(mechanics, ann).await;
    assert!(matches!(
        result,
        Err(ScheduleError::SchedulingConflict(ref conflict))
            if conflict.party == ConflictParty::Student(ann) && conflict.course_id == algebra
    ));
    assert!(scheduler.get_enrolled_student_ids(mechanics).await.unwrap().is_empty());

    let brown = teacher(pool, "Brown", &["physics"]).await;
    let result = scheduler
        .save_course(&CourseDraft {
            students: BTreeSet::from([ann]),
            ..draft("Optics", brown, "2024-01-15 10:15", "2024-01-15 10:45")
        })
        .await;
    assert!(matches!(
        result,
        Err(ScheduleError::SchedulingConflict(ref conflict))
            if conflict.party == ConflictParty::Student(ann)
    ));
    assert_eq!(
        scheduler.list_courses(&CourseFilter::default()).await.unwrap().len(),
        2
    );
}

#[tokio::test]
async fn moving_a_course_checks_its_students() {
    let scheduler = memory_scheduler().await;
    let pool = scheduler.pool();
    let smith = teacher(pool, "Smith", &["math"]).await;
    let jones = teacher(pool, "Jones", &["physics"]).await;
    let ann = student(pool, "Ann", &[]).await;

    scheduler
        .save_course(&CourseDraft {
            students: BTreeSet::from([ann]),
            ..draft("Algebra", smith, "2024-01-15 09:00", "2024-01-15 10:00")
        })
        .await
        .unwrap();
    let mechanics = scheduler
        .save_course(&CourseDraft {
            students: BTreeSet::from([ann]),
            ..draft("Mechanics", jones, "2024-01-15 11:00", "2024-01-15 12:00")
        })
        .await
        .unwrap();

    let mut moved = scheduler.get_course(mechanics).await.unwrap().to_draft();
    moved.start_time = "2024-01-15 09:30".to_owned();
    moved.end_time = "2024-01-15 10:30".to_owned();
    assert!(matches!(
        scheduler.save_course(&moved).await,
        Err(ScheduleError::SchedulingConflict(_))
    ));

    let unchanged = scheduler.get_course(mechanics).await.unwrap();
    assert_eq!(unchanged.interval.start().to_string(), "2024-01-15 11:00");

    scheduler.unenroll_student(mechanics, ann).await.unwrap();
    scheduler.save_course(&moved).await.unwrap();
    assert!(matches!(
        scheduler.unenroll_student(mechanics, ann).await,
        Err(ScheduleError::NotFound(_))
    ));
}

#[tokio::test]
async fn courses_are_filtered_by_teacher_student_and_range() {
    let scheduler = memory_scheduler().await;
    let pool = scheduler.pool();
    let smith = teacher(pool, "Smith", &["math"]).await;
    let jones = teacher(pool, "Jones", &["physics"]).await;
    let ann = student(pool, "Ann", &[]).await;

    let algebra = scheduler
        .save_course(&draft("Algebra", smith, "2024-01-15 09:00", "2024-01-15 10:00"))
        .await
        .unwrap();
    let mechanics = scheduler
        .save_course(&CourseDraft {
            students: BTreeSet::from([ann]),
            ..draft("Mechanics", jones, "2024-01-16 09:00", "2024-01-16 10:00")
        })
        .await
        .unwrap();
    let geometry = scheduler
        .save_course(&draft("Geometry", smith, "2024-01-17 09:00", "2024-01-17 10:00"))
        .await
        .unwrap();

    let ids = |courses: Vec<lib::schedule::models::course_model::Course>| {
        courses.into_iter().map(|c| c.id).collect::<Vec<CourseId>>()
    };

    let all = scheduler.list_courses(&CourseFilter::default()).await.unwrap();
    assert_eq!(ids(all), vec![algebra, mechanics, geometry]);

    let by_teacher = CourseFilter {
        teacher_id: Some(smith),
        ..Default::default()
    };
    assert_eq!(
        ids(scheduler.list_courses(&by_teacher).await.unwrap()),
        vec![algebra, geometry]
    );

    let by_student = CourseFilter {
        student_id: Some(ann),
        ..Default::default()
    };
    assert_eq!(
        ids(scheduler.list_courses(&by_student).await.unwrap()),
        vec![mechanics]
    );

    let in_range = CourseFilter {
        during: Some(TimeInterval::parse("2024-01-15 10:00", "2024-01-17 09:00").unwrap()),
        ..Default::default()
    };
    assert_eq!(
        ids(scheduler.list_courses(&in_range).await.unwrap()),
        vec![mechanics]
    );
}

#[tokio::test]
async fn deleting_a_course_drops_its_enrollments() {
    let scheduler = memory_scheduler().await;
    let pool = scheduler.pool();
    let smith = teacher(pool, "Smith", &[]).await;
    let ann = student(pool, "Ann", &[]).await;

    let algebra = scheduler
        .save_course(&CourseDraft {
            students: BTreeSet::from([ann]),
            ..draft("Algebra", smith, "2024-01-15 09:00", "2024-01-15 10:00")
        })
        .await
        .unwrap();
    scheduler.delete_course(algebra).await.unwrap();

    assert!(matches!(
        scheduler.get_course(algebra).await,
        Err(ScheduleError::NotFound(_))
    ));
    assert!(scheduler.get_enrolled_student_ids(algebra).await.unwrap().is_empty());
    assert!(matches!(
        scheduler.delete_course(algebra).await,
        Err(ScheduleError::NotFound(_))
    ));

    let again = scheduler
        .save_course(&CourseDraft {
            students: BTreeSet::from([ann]),
            ..draft("Algebra", smith, "2024-01-15 09:00", "2024-01-15 10:00")
        })
        .await;
    assert!(again.is_ok());
}

#[tokio::test]
async fn deleting_a_teacher_removes_their_courses() {
    let scheduler = memory_scheduler().await;
    let pool = scheduler.pool();
    let smith = teacher(pool, "Smith", &["math"]).await;
    let jones = teacher(pool, "Jones", &["math"]).await;
    let ann = student(pool, "Ann", &[]).await;

    let algebra = scheduler
        .save_course(&CourseDraft {
            students: BTreeSet::from([ann]),
            ..draft("Algebra", smith, "2024-01-15 09:00", "2024-01-15 10:00")
        })
        .await
        .unwrap();
    let window = AvailabilityWindow::new(
        Person::Teacher(smith),
        Weekday::Mon,
        TimeOfDay::parse("08:00").unwrap(),
        TimeOfDay::parse("12:00").unwrap(),
    )
    .unwrap();
    set_available_time_in_db(pool, &window).await.unwrap();

    assert!(remove_teacher_from_db(pool, smith).await.unwrap());
    assert!(!remove_teacher_from_db(pool, smith).await.unwrap());

    assert!(get_teacher_from_db(pool, smith).await.unwrap().is_none());
    assert!(scheduler.get_course(algebra).await.is_err());
    assert!(scheduler.get_enrolled_student_ids(algebra).await.unwrap().is_empty());
    assert!(get_available_times_from_db(pool, Person::Teacher(smith))
        .await
        .unwrap()
        .is_empty());

    // Ann is free again in that slot.
    scheduler
        .save_course(&CourseDraft {
            students: BTreeSet::from([ann]),
            ..draft("Algebra", jones, "2024-01-15 09:00", "2024-01-15 10:00")
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn deleting_a_student_removes_their_records() {
    let scheduler = memory_scheduler().await;
    let pool = scheduler.pool();
    let smith = teacher(pool, "Smith", &[]).await;
    let ann = student(pool, "Ann", &[]).await;
    let bob = student(pool, "Bob", &[]).await;
    let book = add_textbook_to_db(
        pool,
        &TextbookInfo {
            name: "Algebra I".to_owned(),
            price: 12.5,
            description: String::new(),
        },
    )
    .await
    .unwrap();

    let algebra = scheduler
        .save_course(&CourseDraft {
            students: BTreeSet::from([ann, bob]),
            ..draft("Algebra", smith, "2024-01-15 09:00", "2024-01-15 10:00")
        })
        .await
        .unwrap();
    add_class_to_student_in_db(pool, ann, "5A").await.unwrap();
    issue_textbook_in_db(
        pool,
        &TextbookIssue {
            student_id: ann,
            textbook_id: book,
            is_issued: true,
            is_paid: false,
        },
    )
    .await
    .unwrap();

    assert!(remove_student_from_db(pool, ann).await.unwrap());

    assert!(get_student_from_db(pool, ann).await.unwrap().is_none());
    assert_eq!(scheduler.get_enrolled_student_ids(algebra).await.unwrap(), vec![bob]);
    assert!(get_student_classes_from_db(pool, ann).await.unwrap().is_empty());
    assert!(get_textbook_holders_from_db(pool, book).await.unwrap().is_empty());
}

#[tokio::test]
async fn people_are_updated_and_searched() {
    let scheduler = memory_scheduler().await;
    let pool = scheduler.pool();
    let smith = teacher(pool, "Anna Smith", &["math", "physics"]).await;
    teacher(pool, "Jones", &["history"]).await;
    let ann = student(pool, "Ann", &["grade5", "chess"]).await;
    student(pool, "Bob", &["grade6"]).await;

    let found = search_teachers_by_name_in_db(pool, "smith").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, smith);

    let physicists = get_teachers_by_subject_from_db(pool, "physics").await.unwrap();
    assert_eq!(physicists.len(), 1);
    assert!(physicists[0].can_teach("math"));

    let chess = search_students_by_tag_in_db(pool, "chess").await.unwrap();
    assert_eq!(chess.len(), 1);
    assert_eq!(chess[0].id, ann);

    let mut profile = get_teacher_from_db(pool, smith).await.unwrap().unwrap().profile;
    profile.subject_types.insert("astronomy".to_owned());
    assert!(update_teacher_in_db(pool, smith, &profile).await.unwrap());
    let updated = get_teacher_from_db(pool, smith).await.unwrap().unwrap();
    assert!(updated.can_teach("astronomy"));
    assert!(!update_teacher_in_db(pool, TeacherId(999), &profile).await.unwrap());

    let renamed = StudentProfile {
        name: "Annie".to_owned(),
        contact: "555-0100".to_owned(),
        tags: BTreeSet::new(),
    };
    assert!(update_student_in_db(pool, ann, &renamed).await.unwrap());
    let updated = get_student_from_db(pool, ann).await.unwrap().unwrap();
    assert_eq!(updated.profile, renamed);

    add_class_to_student_in_db(pool, ann, "5A").await.unwrap();
    add_class_to_student_in_db(pool, ann, "5A").await.unwrap();
    add_class_to_student_in_db(pool, ann, "chess club").await.unwrap();
    assert!(remove_class_from_student_in_db(pool, ann, "chess club").await.unwrap());
    assert_eq!(
        get_student_classes_from_db(pool, ann).await.unwrap(),
        BTreeSet::from(["5A".to_owned()])
    );
}

#[tokio::test]
async fn availability_is_replaced_per_day() {
    let scheduler = memory_scheduler().await;
    let pool = scheduler.pool();
    let ann = student(pool, "Ann", &[]).await;

    let window = |day, start, end| {
        AvailabilityWindow::new(
            Person::Student(ann),
            day,
            TimeOfDay::parse(start).unwrap(),
            TimeOfDay::parse(end).unwrap(),
        )
        .unwrap()
    };
    set_available_time_in_db(pool, &window(Weekday::Mon, "09:00", "12:00"))
        .await
        .unwrap();
    set_available_time_in_db(pool, &window(Weekday::Wed, "14:00", "16:00"))
        .await
        .unwrap();
    set_available_time_in_db(pool, &window(Weekday::Mon, "10:00", "11:00"))
        .await
        .unwrap();

    let windows = get_available_times_from_db(pool, Person::Student(ann))
        .await
        .unwrap();
    assert_eq!(
        windows,
        vec![
            window(Weekday::Mon, "10:00", "11:00"),
            window(Weekday::Wed, "14:00", "16:00"),
        ]
    );
    assert!(AvailabilityWindow::new(
        Person::Student(ann),
        Weekday::Fri,
        TimeOfDay::parse("12:00").unwrap(),
        TimeOfDay::parse("11:00").unwrap(),
    )
    .is_err());
}

#[tokio::test]
async fn textbook_stats_count_holders_and_cost() {
    let scheduler = memory_scheduler().await;
    let pool = scheduler.pool();
    let ann = student(pool, "Ann", &[]).await;
    let bob = student(pool, "Bob", &[]).await;
    let algebra = add_textbook_to_db(
        pool,
        &TextbookInfo {
            name: "Algebra I".to_owned(),
            price: 12.5,
            description: "Blue cover".to_owned(),
        },
    )
    .await
    .unwrap();
    let atlas = add_textbook_to_db(
        pool,
        &TextbookInfo {
            name: "World atlas".to_owned(),
            price: 30.0,
            description: String::new(),
        },
    )
    .await
    .unwrap();

    let issue = |student_id, is_issued, is_paid| TextbookIssue {
        student_id,
        textbook_id: algebra,
        is_issued,
        is_paid,
    };
    issue_textbook_in_db(pool, &issue(ann, false, false)).await.unwrap();
    issue_textbook_in_db(pool, &issue(ann, true, true)).await.unwrap();
    issue_textbook_in_db(pool, &issue(bob, true, false)).await.unwrap();

    let stats = get_textbook_stats_from_db(pool).await.unwrap();
    assert_eq!(stats.len(), 2);
    assert_eq!(stats[0].textbook_id, algebra);
    assert_eq!(stats[0].total_count, 2);
    assert_eq!(stats[0].issued_count, 2);
    assert_eq!(stats[0].paid_count, 1);
    assert_eq!(stats[0].total_cost, 25.0);
    assert_eq!(stats[1].textbook_id, atlas);
    assert_eq!(stats[1].total_count, 0);
    assert_eq!(stats[1].total_cost, 0.0);

    assert_eq!(
        get_student_textbooks_from_db(pool, ann).await.unwrap(),
        vec![issue(ann, true, true)]
    );

    let mut info = get_textbook_from_db(pool, atlas).await.unwrap().unwrap().info;
    info.price = 35.0;
    assert!(update_textbook_in_db(pool, atlas, &info).await.unwrap());
    assert_eq!(
        get_textbook_from_db(pool, atlas).await.unwrap().unwrap().info.price,
        35.0
    );

    assert!(remove_textbook_from_db(pool, algebra).await.unwrap());
    assert!(get_student_textbooks_from_db(pool, ann).await.unwrap().is_empty());
    assert!(TextbookInfo {
        name: "Cheap".to_owned(),
        price: -1.0,
        description: String::new(),
    }
    .validate()
    .is_err());
}

#[tokio::test]
async fn export_then_import_into_empty_store() {
    let source = memory_scheduler().await;
    let pool = source.pool();
    let smith = teacher(pool, "Smith", &["math"]).await;
    let ann = student(pool, "Ann", &["grade5"]).await;
    add_class_to_student_in_db(pool, ann, "5A").await.unwrap();
    let book = add_textbook_to_db(
        pool,
        &TextbookInfo {
            name: "Algebra I".to_owned(),
            price: 12.5,
            description: String::new(),
        },
    )
    .await
    .unwrap();
    issue_textbook_in_db(
        pool,
        &TextbookIssue {
            student_id: ann,
            textbook_id: book,
            is_issued: true,
            is_paid: true,
        },
    )
    .await
    .unwrap();
    source
        .save_course(&CourseDraft {
            students: BTreeSet::from([ann]),
            ..draft("Algebra", smith, "2024-01-15 09:00", "2024-01-15 10:30")
        })
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("export.json");
    let exported = export_to_json(&source, &path).await.unwrap();
    assert_eq!(exported.courses.len(), 1);

    let target = memory_scheduler().await;
    let report = import_from_json(&target, &path).await.unwrap();
    assert_eq!(report.teachers, 1);
    assert_eq!(report.students, 1);
    assert_eq!(report.textbooks, 1);
    assert_eq!(report.courses, 1);
    assert!(report.rejected_courses.is_empty());

    let courses = target.list_courses(&CourseFilter::default()).await.unwrap();
    assert_eq!(courses.len(), 1);
    assert_eq!(courses[0].name, "Algebra");
    assert_eq!(courses[0].duration_minutes(), 90);
    let roster = target.get_enrolled_student_ids(courses[0].id).await.unwrap();
    assert_eq!(roster.len(), 1);
    let imported = get_student_from_db(target.pool(), roster[0])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(imported.profile.name, "Ann");
    assert_eq!(
        get_student_classes_from_db(target.pool(), roster[0]).await.unwrap(),
        BTreeSet::from(["5A".to_owned()])
    );
    assert_eq!(
        get_student_textbooks_from_db(target.pool(), roster[0])
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn import_reports_conflicting_courses() {
    let target = memory_scheduler().await;
    let bundle: Bundle = serde_json::from_str(
        r#"{
            "teachers": [{"id": 7, "name": "Smith", "contact": "", "subject_types": ["math"]}],
            "students": [],
            "textbooks": [],
            "courses": [
                {"id": 1, "name": "Algebra", "teacher_id": 7, "class_name": "", "course_type": "",
                 "interval": {"start": "2024-01-15 09:00", "end": "2024-01-15 10:30"}},
                {"id": 2, "name": "Geometry", "teacher_id": 7, "class_name": "", "course_type": "",
                 "interval": {"start": "2024-01-15 10:00", "end": "2024-01-15 11:00"}},
                {"id": 3, "name": "Orphan", "teacher_id": 8, "class_name": "", "course_type": "",
                 "interval": {"start": "2024-01-16 10:00", "end": "2024-01-16 11:00"}}
            ]
        }"#,
    )
    .unwrap();

    let report = import_bundle(&target, &bundle).await.unwrap();
    assert_eq!(report.teachers, 1);
    assert_eq!(report.courses, 1);
    let rejected: Vec<&str> = report
        .rejected_courses
        .iter()
        .map(|(name, _)| name.as_str())
        .collect();
    assert_eq!(rejected, vec!["Geometry", "Orphan"]);
}

#[tokio::test]
async fn import_with_nameless_record_writes_nothing() {
    let target = memory_scheduler().await;
    let bundle: Bundle = serde_json::from_str(
        r#"{
            "teachers": [{"id": 1, "name": "Smith"}, {"id": 2, "name": "  "}]
        }"#,
    )
    .unwrap();

    let result = import_bundle(&target, &bundle).await;
    assert!(matches!(
        result,
        Err(InterchangeError::Schedule(ScheduleError::Validation(_)))
    ));
    assert!(search_teachers_by_name_in_db(target.pool(), "")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn file_store_keeps_courses_between_connections() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        database_url: format!("sqlite:{}", dir.path().join("schedule.sqlite3").display()),
        max_connections: 2,
    };

    let scheduler = Scheduler::new(init_connection(&config).await.unwrap());
    let smith = teacher(scheduler.pool(), "Smith", &[]).await;
    let id = scheduler
        .save_course(&draft("Algebra", smith, "2024-01-15 09:00", "2024-01-15 10:00"))
        .await
        .unwrap();
    scheduler.pool().close().await;

    let reopened = Scheduler::new(init_connection(&config).await.unwrap());
    assert_eq!(reopened.get_course(id).await.unwrap().name, "Algebra");
    assert!(matches!(
        reopened
            .save_course(&draft("Geometry", smith, "2024-01-15 09:30", "2024-01-15 10:30"))
            .await,
        Err(ScheduleError::SchedulingConflict(_))
    ));
}

#[test]
fn config_is_read_from_json_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"database_url": "sqlite:/tmp/other.sqlite3", "max_connections": 4}}"#
    )
    .unwrap();

    let config = load_config(file.path()).unwrap();
    assert_eq!(config.database_url, "sqlite:/tmp/other.sqlite3");
    assert_eq!(config.max_connections, 4);
}

#[test]
fn missing_config_file_means_defaults() {
    let config = load_config(Path::new("/nonexistent/config.json")).unwrap();
    assert_eq!(config, Config::default());
}

#[tokio::test]
async fn failed_write_rolls_back_the_whole_save() {
    let scheduler = memory_scheduler().await;
    let smith = teacher(scheduler.pool(), "Smith", &[]).await;

    let result = scheduler
        .save_course(&CourseDraft {
            students: BTreeSet::from([StudentId(999)]),
            ..draft("Algebra", smith, "2024-01-15 09:00", "2024-01-15 10:00")
        })
        .await;

    assert!(matches!(result, Err(ScheduleError::Storage(_))));
    assert!(scheduler
        .list_courses(&CourseFilter::default())
        .await
        .unwrap()
        .is_empty());

    scheduler
        .save_course(&draft("Algebra", smith, "2024-01-15 09:00", "2024-01-15 10:00"))
        .await
        .unwrap();
}

#[tokio::test]
async fn import_rejects_tags_containing_commas() {
    let target = memory_scheduler().await;
    let bundle: Bundle = serde_json::from_str(
        r#"{
            "teachers": [{"id": 1, "name": "Smith", "subject_types": ["math"]}],
            "students": [{"id": 1, "name": "Ann", "tags": ["grade5", "chess, go"]}]
        }"#,
    )
    .unwrap();

    let result = import_bundle(&target, &bundle).await;
    assert!(matches!(
        result,
        Err(InterchangeError::Schedule(ScheduleError::Validation(_)))
    ));
    assert!(get_teachers_from_db(target.pool()).await.unwrap().is_empty());
    assert!(get_students_from_db(target.pool()).await.unwrap().is_empty());
}

#[tokio::test]
async fn csv_tables_move_records_between_stores() {
    let source = memory_scheduler().await;
    let pool = source.pool();
    let smith = teacher(pool, "Anna Smith", &["math", "physics"]).await;
    teacher(pool, "Jones", &["history"]).await;
    student(pool, "Ann", &["grade5", "chess"]).await;
    add_textbook_to_db(
        pool,
        &TextbookInfo {
            name: "Algebra I".to_owned(),
            price: 12.5,
            description: "Blue, hardcover".to_owned(),
        },
    )
    .await
    .unwrap();
    source
        .save_course(&draft("Algebra", smith, "2024-01-15 09:00", "2024-01-15 10:30"))
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let target = memory_scheduler().await;
    for table in [Table::Teachers, Table::Students, Table::Textbooks, Table::Courses] {
        let path = dir.path().join(format!("{table:?}.csv"));
        export_table_to_csv(&source, table, &path).await.unwrap();
        import_table_from_csv(&target, table, &path).await.unwrap();
    }

    let teachers = get_teachers_from_db(target.pool()).await.unwrap();
    assert_eq!(teachers.len(), 2);
    assert_eq!(teachers[0].profile.name, "Anna Smith");
    assert!(teachers[0].can_teach("physics"));

    let students = get_students_from_db(target.pool()).await.unwrap();
    assert_eq!(students.len(), 1);
    assert!(students[0].profile.tags.contains("chess"));

    let textbooks = get_textbooks_from_db(target.pool()).await.unwrap();
    assert_eq!(textbooks.len(), 1);
    assert_eq!(textbooks[0].info.price, 12.5);
    assert_eq!(textbooks[0].info.description, "Blue, hardcover");

    let courses = target.list_courses(&CourseFilter::default()).await.unwrap();
    assert_eq!(courses.len(), 1);
    assert_eq!(courses[0].name, "Algebra");
    assert_eq!(courses[0].teacher_id, teachers[0].id);
    assert_eq!(courses[0].class_name, "5A");
    assert_eq!(courses[0].duration_minutes(), 90);
}

#[tokio::test]
async fn csv_courses_are_matched_to_teachers_by_name() {
    let scheduler = memory_scheduler().await;
    let smith = teacher(scheduler.pool(), "Anna Smith", &["math"]).await;
    let smithson = teacher(scheduler.pool(), "Smith", &["physics"]).await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("courses.csv");
    std::fs::write(
        &path,
        "name,teacher_name,class_name,course_type,start_time,end_time\n\
         Algebra,anna smith,5A,lecture,2024-01-15 09:00,2024-01-15 10:30\n\
         Mechanics,Smith,5A,lecture,2024-01-15 09:00,2024-01-15 10:30\n\
         Geometry,Anna Smith,5B,lecture,2024-01-15 10:00,2024-01-15 11:00\n\
         History,Brown,5A,lecture,2024-01-16 09:00,2024-01-16 10:00\n",
    )
    .unwrap();

    let report = import_table_from_csv(&scheduler, Table::Courses, &path)
        .await
        .unwrap();

    assert_eq!(report.courses, 2);
    let rejected: Vec<&str> = report
        .rejected_courses
        .iter()
        .map(|(name, _)| name.as_str())
        .collect();
    assert_eq!(rejected, vec!["Geometry", "History"]);

    let by_smith = CourseFilter {
        teacher_id: Some(smith),
        ..Default::default()
    };
    let courses = scheduler.list_courses(&by_smith).await.unwrap();
    assert_eq!(courses.len(), 1);
    assert_eq!(courses[0].name, "Algebra");

    let by_smithson = CourseFilter {
        teacher_id: Some(smithson),
        ..Default::default()
    };
    let courses = scheduler.list_courses(&by_smithson).await.unwrap();
    assert_eq!(courses.len(), 1);
    assert_eq!(courses[0].name, "Mechanics");
}

#[tokio::test]
async fn csv_row_missing_a_required_column_writes_nothing() {
    let scheduler = memory_scheduler().await;
    teacher(scheduler.pool(), "Smith", &[]).await;

    let dir = tempfile::tempdir().unwrap();
    let courses = dir.path().join("courses.csv");
    std::fs::write(
        &courses,
        "name,teacher_name,start_time,end_time\n\
         Algebra,Smith,2024-01-15 09:00,2024-01-15 10:00\n\
         Geometry,,2024-01-15 11:00,2024-01-15 12:00\n",
    )
    .unwrap();
    let result = import_table_from_csv(&scheduler, Table::Courses, &courses).await;
    assert!(matches!(
        result,
        Err(InterchangeError::Schedule(ScheduleError::Validation(_)))
    ));
    assert!(scheduler
        .list_courses(&CourseFilter::default())
        .await
        .unwrap()
        .is_empty());

    let students = dir.path().join("students.csv");
    std::fs::write(&students, "name,contact,tags\nAnn,,grade5\n ,,grade6\n").unwrap();
    let result = import_table_from_csv(&scheduler, Table::Students, &students).await;
    assert!(matches!(
        result,
        Err(InterchangeError::Schedule(ScheduleError::Validation(_)))
    ));
    assert!(get_students_from_db(scheduler.pool()).await.unwrap().is_empty());
}
