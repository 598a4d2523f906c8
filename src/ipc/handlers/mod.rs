pub mod attendance;
pub mod auth;
pub mod backup;
pub mod classes;
pub mod core;
pub mod students;
pub mod summaries;
pub mod watch;
