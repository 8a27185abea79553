use crate::ipc::helpers::{db, opt_i64, req_i64, req_str, respond, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::store::{self, NewTeacher, Teacher};
use serde_json::json;
use tracing::info;

fn teacher_json(t: &Teacher) -> serde_json::Value {
    json!({
        "teacherId": t.teacher_id,
        "firstName": t.first_name,
        "lastName": t.last_name,
        "departmentId": t.department_id,
    })
}

fn handle_faculty_create(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db(state)?;
    let new = NewTeacher {
        first_name: req_str(&req.params, "firstName")?.to_string(),
        last_name: req_str(&req.params, "lastName")?.to_string(),
        department_id: req_i64(&req.params, "departmentId")?,
    };
    let teacher_id = store::insert_teacher(conn, &new)?;
    info!(teacher_id, department_id = new.department_id, "teacher created");
    Ok(json!({ "teacherId": teacher_id }))
}

/// All faculty, or one department's when `departmentId` is given.
fn handle_faculty_list(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db(state)?;
    let department_id = opt_i64(&req.params, "departmentId")?;
    let teachers = store::list_teachers(conn, department_id)?;
    Ok(json!({
        "departmentId": department_id,
        "teachers": teachers.iter().map(teacher_json).collect::<Vec<_>>()
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "faculty.create" => handle_faculty_create(state, req),
        "faculty.list" => handle_faculty_list(state, req),
        _ => return None,
    };
    Some(respond(&req.id, res))
}
