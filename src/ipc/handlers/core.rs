use crate::db;
use crate::ipc::helpers::{db, opt_i64, req_str, respond, HandlerErr, HandlerResult};
use crate::ipc::types::{AppState, Request, Role, Session};
use crate::store;
use rusqlite::Connection;
use serde_json::json;
use std::path::PathBuf;
use tracing::{info, warn};

fn handle_health(state: &mut AppState, _req: &Request) -> HandlerResult {
    Ok(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
        "role": state.session.map(|s| s.role.as_str()),
        "studentId": state.session.and_then(|s| s.student_id),
        "teacherId": state.session.and_then(|s| s.teacher_id),
    }))
}

/// Opens (creating if needed) the gradebook database inside `path`.
pub fn select_workspace(state: &mut AppState, path: PathBuf) -> anyhow::Result<()> {
    let conn = db::open_db(&path)?;
    info!(path = %path.display(), "workspace selected");
    state.workspace = Some(path);
    state.db = Some(conn);
    revalidate_session(state);
    Ok(())
}

fn session_subject_exists(conn: &Connection, session: &Session) -> rusqlite::Result<bool> {
    if let Some(student_id) = session.student_id {
        return Ok(store::get_student(conn, student_id)?.is_some());
    }
    if let Some(teacher_id) = session.teacher_id {
        return Ok(store::get_teacher(conn, teacher_id)?.is_some());
    }
    Ok(true)
}

/// Closes a session whose student or teacher is not in the open workspace.
/// Run after anything that swaps or empties the database.
pub fn revalidate_session(state: &mut AppState) {
    let Some(session) = state.session else {
        return;
    };
    let valid = match state.db.as_ref() {
        Some(conn) => session_subject_exists(conn, &session).unwrap_or(false),
        None => session.student_id.is_none() && session.teacher_id.is_none(),
    };
    if !valid {
        warn!(
            role = session.role.as_str(),
            student_id = ?session.student_id,
            teacher_id = ?session.teacher_id,
            "session closed: its owner is not in this workspace"
        );
        state.session = None;
    }
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> HandlerResult {
    let path = PathBuf::from(req_str(&req.params, "path")?);
    if let Err(e) = select_workspace(state, path.clone()) {
        warn!(path = %path.display(), error = %e, "workspace open failed");
        return Err(HandlerErr::new("db_open_failed", format!("{e:#}")));
    }
    Ok(json!({ "workspacePath": path.to_string_lossy() }))
}

fn handle_session_open(state: &mut AppState, req: &Request) -> HandlerResult {
    let role_s = req_str(&req.params, "role")?;
    let Some(role) = Role::parse(role_s) else {
        return Err(HandlerErr::bad_params(
            "role must be one of: root, administrator, teacher, student",
        )
        .with_details(json!({ "role": role_s })));
    };

    let mut session = Session {
        role,
        student_id: None,
        teacher_id: None,
    };
    match role {
        Role::Student => {
            let Some(sid) = opt_i64(&req.params, "studentId")? else {
                return Err(HandlerErr::bad_params("student sessions require studentId"));
            };
            store::require_student(db(state)?, sid)?;
            session.student_id = Some(sid);
        }
        Role::Teacher => {
            if let Some(tid) = opt_i64(&req.params, "teacherId")? {
                store::require_teacher(db(state)?, tid)?;
                session.teacher_id = Some(tid);
            }
        }
        _ => {}
    }

    state.session = Some(session);
    info!(
        role = role.as_str(),
        student_id = ?session.student_id,
        teacher_id = ?session.teacher_id,
        "session opened"
    );
    Ok(json!({
        "role": role.as_str(),
        "studentId": session.student_id,
        "teacherId": session.teacher_id,
    }))
}

fn handle_session_close(state: &mut AppState, _req: &Request) -> HandlerResult {
    let was_open = state.session.take().is_some();
    Ok(json!({ "closed": was_open }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "health" => handle_health(state, req),
        "workspace.select" => handle_workspace_select(state, req),
        "session.open" => handle_session_open(state, req),
        "session.close" => handle_session_close(state, req),
        _ => return None,
    };
    Some(respond(&req.id, res))
}
