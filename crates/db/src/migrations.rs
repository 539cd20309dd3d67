// crates/db/src/migrations.rs
/// Inline SQL migrations for the clipper job database.
///
/// One statement per entry; entries are applied in order and never edited
/// once released.

pub const MIGRATIONS: &[&str] = &[
    // Migration 1: jobs table
    r#"
CREATE TABLE IF NOT EXISTS jobs (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    url TEXT NOT NULL,
    start_secs INTEGER,
    end_secs INTEGER,
    status TEXT NOT NULL DEFAULT 'pending',
    message TEXT,
    output_location TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    CHECK (status IN ('pending', 'processing', 'completed', 'failed')),
    CHECK (kind IN ('full_retrieval', 'range_retrieval'))
)
"#,
    // Migration 2: status lookups at startup
    "CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status)",
];
