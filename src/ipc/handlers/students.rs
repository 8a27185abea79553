use crate::ipc::helpers::{
    db, number_json, opt_i64, req_i64, req_str, respond, HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::store::{self, NewStudent, Student};
use serde_json::json;
use tracing::info;

fn student_json(s: &Student) -> serde_json::Value {
    json!({
        "studentId": s.student_id,
        "firstName": s.first_name,
        "lastName": s.last_name,
        "gradeLevel": s.grade_level,
        "graduationYear": s.graduation_year,
        "gpa": number_json(s.gpa),
        "classRank": s.class_rank,
    })
}

fn handle_students_create(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db(state)?;
    let new = NewStudent {
        first_name: req_str(&req.params, "firstName")?.to_string(),
        last_name: req_str(&req.params, "lastName")?.to_string(),
        grade_level: req_i64(&req.params, "gradeLevel")?,
        graduation_year: req_i64(&req.params, "graduationYear")?,
    };
    let student_id = store::insert_student(conn, &new)?;
    info!(student_id, grade_level = new.grade_level, "student created");
    Ok(json!({ "studentId": student_id }))
}

fn handle_students_get(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db(state)?;
    let student_id = req_i64(&req.params, "studentId")?;
    let student = store::require_student(conn, student_id)?;
    Ok(json!({ "student": student_json(&student) }))
}

fn handle_students_list(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db(state)?;
    let grade_level = opt_i64(&req.params, "gradeLevel")?;
    if let Some(level) = grade_level {
        if !crate::calc::is_valid_grade_level(level) {
            return Err(HandlerErr::bad_params("gradeLevel must be in 9..=12")
                .with_details(json!({ "gradeLevel": level })));
        }
    }
    let students = store::list_students(conn, grade_level)?;
    Ok(json!({
        "students": students.iter().map(student_json).collect::<Vec<_>>()
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "students.create" => handle_students_create(state, req),
        "students.get" => handle_students_get(state, req),
        "students.list" => handle_students_list(state, req),
        _ => return None,
    };
    Some(respond(&req.id, res))
}
