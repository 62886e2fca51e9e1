use std::{collections::BTreeSet, path::Path};

use figment::{
    providers::{Env, Format, Json, Serialized},
    Figment,
};
use log::{debug, info};

use super::models::{course_model::Course, Config};

/// Reads the configuration: defaults, then config.json if it exists, then
/// `EDU_`-prefixed environment variables.
pub fn load_config(config_json_path: &Path) -> Result<Config, figment::Error> {
    info!("Reading config from {}", config_json_path.display());
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Json::file(config_json_path))
        .merge(Env::prefixed("EDU_"))
        .extract()
}

/// Splits a comma-separated tag list, dropping blanks and surrounding spaces.
pub fn split_tags(tags: &str) -> BTreeSet<String> {
    tags.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_owned)
        .collect()
}

pub fn join_tags(tags: &BTreeSet<String>) -> String {
    tags.iter()
        .map(|tag| tag.trim())
        .filter(|tag| !tag.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

pub fn log_all_courses(courses: &[Course]) -> () {
    for course in courses.iter() {
        debug!(
            "Course {} `{}` by teacher {} at {}",
            course.id, course.name, course.teacher_id, course.interval
        );
    }
}

/* one line per course for terminal output */
pub fn format_course_as_string(course: &Course) -> String {
    format!(
        "{:>4}  {}  {:<24} teacher {:<4} {} / {} ({} min)",
        course.id,
        course.interval,
        course.name,
        course.teacher_id,
        if course.class_name.is_empty() { "-" } else { &course.class_name },
        if course.course_type.is_empty() { "-" } else { &course.course_type },
        course.duration_minutes()
    )
}
