use crate::ipc::helpers::{
    check_course_scope, db, number_json, opt_i64, opt_str, req_i64, req_str, respond, HandlerErr,
    HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::store::{self, Course, NewCourse};
use rusqlite::Connection;
use serde_json::json;
use tracing::info;

fn course_json(c: &Course) -> serde_json::Value {
    json!({
        "courseId": c.course_id,
        "courseNo": c.course_no,
        "title": c.title,
        "departmentId": c.department_id,
        "creditHours": c.credit_hours,
        "teacherId": c.teacher_id,
    })
}

/// Resolves `courseId` or, failing that, the `courseNo` business key.
fn resolve_course(conn: &Connection, params: &serde_json::Value) -> Result<Course, HandlerErr> {
    if let Some(course_id) = opt_i64(params, "courseId")? {
        return Ok(store::require_course(conn, course_id)?);
    }
    let Some(course_no) = opt_str(params, "courseNo")? else {
        return Err(HandlerErr::bad_params("missing courseId or courseNo"));
    };
    store::get_course_by_no(conn, course_no)?.ok_or_else(|| {
        HandlerErr::new("not_found", "course not found")
            .with_details(json!({ "courseNo": course_no }))
    })
}

fn handle_courses_create(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db(state)?;
    let new = NewCourse {
        course_no: req_str(&req.params, "courseNo")?.to_string(),
        title: req_str(&req.params, "title")?.to_string(),
        department_id: req_i64(&req.params, "departmentId")?,
        credit_hours: req_i64(&req.params, "creditHours")?,
        teacher_id: opt_i64(&req.params, "teacherId")?,
    };
    let course_id = store::insert_course(conn, &new)?;
    info!(course_id, course_no = %new.course_no, teacher_id = ?new.teacher_id, "course created");
    Ok(json!({ "courseId": course_id }))
}

fn handle_courses_list(state: &mut AppState, _req: &Request) -> HandlerResult {
    let conn = db(state)?;
    let teacher_id = state.session.and_then(|s| s.teacher_id);
    let courses = store::list_courses(conn, teacher_id)?;
    Ok(json!({
        "courses": courses.iter().map(course_json).collect::<Vec<_>>()
    }))
}

fn handle_courses_enroll(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db(state)?;
    let student_id = req_i64(&req.params, "studentId")?;
    let course = resolve_course(conn, &req.params)?;
    let created = store::enroll(conn, student_id, course.course_id)?;
    if created {
        info!(student_id, course_id = course.course_id, "student enrolled");
    }
    Ok(json!({
        "studentId": student_id,
        "courseId": course.course_id,
        "created": created,
    }))
}

fn handle_courses_roster(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db(state)?;
    let course = resolve_course(conn, &req.params)?;
    check_course_scope(state, &course)?;
    let students = store::roster(conn, course.course_id)?;
    Ok(json!({
        "course": course_json(&course),
        "students": students
            .iter()
            .map(|s| json!({
                "studentId": s.student_id,
                "firstName": s.first_name,
                "lastName": s.last_name,
                "gradeLevel": s.grade_level,
                "gpa": number_json(s.gpa),
            }))
            .collect::<Vec<_>>()
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "courses.create" => handle_courses_create(state, req),
        "courses.list" => handle_courses_list(state, req),
        "courses.enroll" => handle_courses_enroll(state, req),
        "courses.roster" => handle_courses_roster(state, req),
        _ => return None,
    };
    Some(respond(&req.id, res))
}
