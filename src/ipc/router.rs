use super::handlers;
use super::types::{AppState, Request, Role};
use crate::ipc::error::err;
use serde_json::json;
use tracing::debug;

use super::types::Role::{Administrator, Root, Student, Teacher};

/// Roles allowed to call a method. `None` for methods that need no session
/// (and for unknown methods, which fall through to `not_implemented`).
fn capabilities(method: &str) -> Option<&'static [Role]> {
    let roles: &'static [Role] = match method {
        "students.create" | "courses.create" | "courses.enroll" | "calc.ranks"
        | "faculty.create" | "faculty.list" => &[Administrator],
        "students.get" | "students.list" | "courses.list" | "courses.roster" | "calc.courseGrade"
        | "calc.gpa" => &[Administrator, Teacher],
        "assignments.create" | "assignments.list" | "assignments.delete" | "grades.record" => {
            &[Teacher]
        }
        "grades.courseGrades" | "grades.assignmentGrades" => &[Administrator, Teacher, Student],
        "setup.get" | "setup.update" => &[Root, Administrator],
        "backup.export" | "backup.import" | "workspace.reset" => &[Root],
        _ => return None,
    };
    Some(roles)
}

fn authorize(state: &AppState, req: &Request) -> Result<(), serde_json::Value> {
    let Some(allowed) = capabilities(&req.method) else {
        return Ok(());
    };
    let Some(session) = state.session else {
        return Err(err(&req.id, "no_session", "open a session first", None));
    };
    if !allowed.contains(&session.role) {
        return Err(err(
            &req.id,
            "forbidden",
            format!("{} may not call {}", session.role.as_str(), req.method),
            Some(json!({
                "allowed": allowed.iter().map(|r| r.as_str()).collect::<Vec<_>>()
            })),
        ));
    }
    Ok(())
}

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    debug!(id = %req.id, method = %req.method, "request");

    if let Some(resp) = handlers::core::try_handle(state, &req) {
        return resp;
    }
    if let Err(resp) = authorize(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::students::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::courses::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::faculty::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::assignments::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::grades::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::calc::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::setup::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::backup_exchange::try_handle(state, &req) {
        return resp;
    }

    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
