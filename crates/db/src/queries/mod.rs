// crates/db/src/queries/mod.rs
// Job CRUD operations for the clipper SQLite database.

pub mod jobs;
