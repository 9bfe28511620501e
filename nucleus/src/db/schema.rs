pub(super) const SCHEMA_VERSION: i32 = 1;

const SCHEMA_VERSION_TABLE: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL,
    updated_at TEXT NOT NULL
);
";

const SERVERS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS servers (
    name TEXT PRIMARY KEY NOT NULL,
    config TEXT NOT NULL,
    state TEXT NOT NULL,
    status TEXT NOT NULL,
    ctid INTEGER,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_servers_status ON servers(status);
";

pub(super) fn all_schemas() -> [&'static str; 2] {
    [SCHEMA_VERSION_TABLE, SERVERS_TABLE]
}
