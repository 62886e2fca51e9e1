//! Course scheduling for small educational institutions.
//!
//! The `schedule` tool keeps teachers, students, courses and textbooks in a
//! local SQLite store and refuses to commit a course that would double-book
//! its teacher or any enrolled student.

pub mod schedule {
    #[macro_use]
    pub mod macros;

    pub mod db;
    pub mod errors;
    pub mod helpers;
    pub mod interchange;
    pub mod models;
    pub mod scheduler;
    pub mod store;
    pub mod tabular;
    pub mod time;
}
