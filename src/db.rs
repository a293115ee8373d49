use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE: &str = "screener.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schools(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            school_id TEXT NOT NULL,
            last_name TEXT NOT NULL,
            first_name TEXT NOT NULL,
            student_no TEXT,
            grade TEXT NOT NULL,
            enrollment_status TEXT NOT NULL DEFAULT 'returning',
            gender TEXT NOT NULL DEFAULT 'other',
            birth_date TEXT,
            active INTEGER NOT NULL,
            sort_order INTEGER NOT NULL,
            updated_at TEXT,
            FOREIGN KEY(school_id) REFERENCES schools(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_school ON students(school_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_school_sort ON students(school_id, sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS screening_records(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            cycle TEXT NOT NULL,
            was_absent INTEGER NOT NULL DEFAULT 0,
            initial_date TEXT,
            vision_initial_right TEXT,
            vision_initial_left TEXT,
            vision_initial_overall TEXT,
            vision_initial_screener TEXT,
            vision_rescreen_right TEXT,
            vision_rescreen_left TEXT,
            vision_rescreen_overall TEXT,
            vision_rescreen_screener TEXT,
            hearing_initial_right_1000 TEXT,
            hearing_initial_right_2000 TEXT,
            hearing_initial_right_4000 TEXT,
            hearing_initial_left_1000 TEXT,
            hearing_initial_left_2000 TEXT,
            hearing_initial_left_4000 TEXT,
            hearing_initial_overall TEXT,
            hearing_rescreen_right_1000 TEXT,
            hearing_rescreen_right_2000 TEXT,
            hearing_rescreen_right_4000 TEXT,
            hearing_rescreen_left_1000 TEXT,
            hearing_rescreen_left_2000 TEXT,
            hearing_rescreen_left_4000 TEXT,
            hearing_rescreen_overall TEXT,
            acanthosis_initial TEXT,
            acanthosis_rescreen TEXT,
            scoliosis_initial TEXT,
            scoliosis_rescreen TEXT,
            vision_required INTEGER,
            hearing_required INTEGER,
            acanthosis_required INTEGER,
            scoliosis_required INTEGER,
            status_override TEXT,
            updated_at TEXT,
            UNIQUE(student_id, cycle),
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_screening_records_student ON screening_records(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_screening_records_cycle ON screening_records(cycle)",
        [],
    )?;

    // Early workspaces predate the administrator status override.
    ensure_records_status_override(&conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

fn ensure_records_status_override(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "screening_records", "status_override")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE screening_records ADD COLUMN status_override TEXT",
        [],
    )?;
    Ok(())
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row("SELECT value FROM settings WHERE key = ?", [key], |r| {
            r.get(0)
        })
        .optional()?;
    match raw {
        Some(text) => Ok(Some(serde_json::from_str(&text)?)),
        None => Ok(None),
    }
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
