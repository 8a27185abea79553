use crate::calc::{EngineError, EngineSettings};
use crate::ipc::error::{err, ok};
use crate::ipc::types::AppState;
use crate::recompute;
use crate::store::{self, Course};
use rusqlite::Connection;
use serde_json::json;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<EngineError> for HandlerErr {
    fn from(e: EngineError) -> Self {
        Self::new(e.code(), e.to_string())
    }
}

impl From<rusqlite::Error> for HandlerErr {
    fn from(e: rusqlite::Error) -> Self {
        Self::new("db_query_failed", e.to_string())
    }
}

pub type HandlerResult = Result<serde_json::Value, HandlerErr>;

pub fn respond(id: &str, res: HandlerResult) -> serde_json::Value {
    match res {
        Ok(v) => ok(id, v),
        Err(e) => e.response(id),
    }
}

pub fn db(state: &AppState) -> Result<&Connection, HandlerErr> {
    state
        .db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn engine_settings(conn: &Connection) -> Result<EngineSettings, HandlerErr> {
    recompute::load_settings(conn)
        .map_err(|e| HandlerErr::new("settings_load_failed", format!("{e:#}")))
}

/// A teacher session bound to a teacher may only work in that teacher's courses.
pub fn check_course_scope(state: &AppState, course: &Course) -> Result<(), HandlerErr> {
    match state.session.and_then(|s| s.teacher_id) {
        Some(teacher_id) if course.teacher_id != Some(teacher_id) => Err(HandlerErr::new(
            "forbidden",
            "course is not taught by this teacher",
        )
        .with_details(json!({ "courseId": course.course_id, "teacherId": teacher_id }))),
        _ => Ok(()),
    }
}

/// Loads a course and applies `check_course_scope`.
pub fn scoped_course(
    state: &AppState,
    conn: &Connection,
    course_id: i64,
) -> Result<Course, HandlerErr> {
    let course = store::require_course(conn, course_id)?;
    check_course_scope(state, &course)?;
    Ok(course)
}

pub fn req_i64(params: &serde_json::Value, key: &str) -> Result<i64, HandlerErr> {
    opt_i64(params, key)?.ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn opt_i64(params: &serde_json::Value, key: &str) -> Result<Option<i64>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be an integer", key))),
    }
}

pub fn req_f64(params: &serde_json::Value, key: &str) -> Result<f64, HandlerErr> {
    match params.get(key) {
        None => Err(HandlerErr::bad_params(format!("missing {}", key))),
        Some(v) => v
            .as_f64()
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a number", key))),
    }
}

pub fn req_str<'a>(params: &'a serde_json::Value, key: &str) -> Result<&'a str, HandlerErr> {
    opt_str(params, key)?.ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn opt_str<'a>(params: &'a serde_json::Value, key: &str) -> Result<Option<&'a str>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_str()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a string", key))),
    }
}

/// `"--"` for undefined numbers, two decimals otherwise.
pub fn display_number(v: Option<f64>) -> String {
    v.map(|x| format!("{:.2}", x))
        .unwrap_or_else(|| "--".to_string())
}

pub fn number_json(v: Option<f64>) -> serde_json::Value {
    json!({ "value": v, "display": display_number(v) })
}
