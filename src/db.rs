use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use std::path::{Path, PathBuf};

pub const DB_FILE_NAME: &str = "gradebook.sqlite3";

pub fn db_path(workspace: &Path) -> PathBuf {
    workspace.join(DB_FILE_NAME)
}

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace).with_context(|| {
        format!("failed to create workspace {}", workspace.to_string_lossy())
    })?;
    let conn = Connection::open(db_path(workspace))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            student_id INTEGER PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            grade_level INTEGER NOT NULL CHECK(grade_level BETWEEN 9 AND 12),
            graduation_year INTEGER NOT NULL,
            gpa REAL NOT NULL DEFAULT -1,
            class_rank INTEGER NOT NULL DEFAULT -1
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_grade_level ON students(grade_level)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teachers(
            teacher_id INTEGER PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            department_id INTEGER NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_teachers_department ON teachers(department_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            course_id INTEGER PRIMARY KEY,
            course_no TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            department_id INTEGER NOT NULL,
            credit_hours INTEGER NOT NULL CHECK(credit_hours > 0),
            teacher_id INTEGER,
            FOREIGN KEY(teacher_id) REFERENCES teachers(teacher_id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS course_grades(
            course_id INTEGER NOT NULL,
            student_id INTEGER NOT NULL,
            mp1 REAL,
            mp2 REAL,
            mp3 REAL,
            mp4 REAL,
            midterm_exam REAL,
            final_exam REAL,
            grade REAL NOT NULL DEFAULT -1,
            PRIMARY KEY(course_id, student_id),
            FOREIGN KEY(course_id) REFERENCES courses(course_id),
            FOREIGN KEY(student_id) REFERENCES students(student_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_course_grades_student ON course_grades(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS assignments(
            assignment_id INTEGER PRIMARY KEY,
            course_id INTEGER NOT NULL,
            marking_period INTEGER NOT NULL CHECK(marking_period BETWEEN 1 AND 6),
            title TEXT NOT NULL,
            point_value INTEGER NOT NULL CHECK(point_value BETWEEN 1 AND 100),
            FOREIGN KEY(course_id) REFERENCES courses(course_id),
            UNIQUE(course_id, marking_period, title)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS assignment_grades(
            assignment_id INTEGER NOT NULL,
            student_id INTEGER NOT NULL,
            course_id INTEGER NOT NULL,
            points_earned REAL NOT NULL,
            points_possible INTEGER NOT NULL,
            PRIMARY KEY(assignment_id, student_id),
            FOREIGN KEY(assignment_id) REFERENCES assignments(assignment_id),
            FOREIGN KEY(student_id) REFERENCES students(student_id),
            FOREIGN KEY(course_id) REFERENCES courses(course_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assignment_grades_student_course
         ON assignment_grades(student_id, course_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    let Some(raw) = raw else {
        return Ok(None);
    };
    let value = serde_json::from_str(&raw)
        .with_context(|| format!("settings value for {} is not valid JSON", key))?;
    Ok(Some(value))
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

/// Clears every table, leaving the schema in place.
pub fn clear_all(conn: &Connection) -> rusqlite::Result<()> {
    let tx = conn.unchecked_transaction()?;
    // Children before parents; foreign keys are enforced.
    for table in [
        "assignment_grades",
        "assignments",
        "course_grades",
        "courses",
        "teachers",
        "students",
        "settings",
    ] {
        tx.execute(&format!("DELETE FROM {}", table), [])?;
    }
    tx.commit()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_roundtrip_and_overwrite() {
        let conn = Connection::open_in_memory().expect("open");
        init_schema(&conn).expect("schema");

        assert!(settings_get_json(&conn, "setup.engine").expect("get").is_none());
        settings_set_json(&conn, "setup.engine", &serde_json::json!({ "gpaDecimals": 3 }))
            .expect("set");
        settings_set_json(&conn, "setup.engine", &serde_json::json!({ "gpaDecimals": 1 }))
            .expect("overwrite");
        let got = settings_get_json(&conn, "setup.engine").expect("get").expect("some");
        assert_eq!(got["gpaDecimals"], 1);
    }

    #[test]
    fn schema_rejects_out_of_range_grade_level() {
        let conn = Connection::open_in_memory().expect("open");
        init_schema(&conn).expect("schema");
        let res = conn.execute(
            "INSERT INTO students(first_name, last_name, grade_level, graduation_year)
             VALUES('A', 'B', 8, 2030)",
            [],
        );
        assert!(res.is_err());
    }

    #[test]
    fn clear_all_empties_tables() {
        let conn = Connection::open_in_memory().expect("open");
        init_schema(&conn).expect("schema");
        conn.execute(
            "INSERT INTO students(first_name, last_name, grade_level, graduation_year)
             VALUES('Ada', 'Lovelace', 10, 2028)",
            [],
        )
        .expect("insert");
        clear_all(&conn).expect("clear");
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM students", [], |r| r.get(0))
            .expect("count");
        assert_eq!(n, 0);
    }
}
