use crate::ipc::helpers::{
    db, engine_settings, number_json, req_i64, respond, scoped_course, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::recompute;
use serde_json::json;

fn handle_calc_course_grade(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db(state)?;
    let student_id = req_i64(&req.params, "studentId")?;
    let course_id = req_i64(&req.params, "courseId")?;
    scoped_course(state, conn, course_id)?;
    let settings = engine_settings(conn)?;
    let grade = recompute::recompute_course(conn, student_id, course_id, &settings)?;
    Ok(json!({
        "studentId": student_id,
        "courseId": course_id,
        "courseGrade": number_json(grade),
    }))
}

fn handle_calc_gpa(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db(state)?;
    let student_id = req_i64(&req.params, "studentId")?;
    let settings = engine_settings(conn)?;
    let gpa = recompute::refresh_gpa(conn, student_id, &settings)?;
    Ok(json!({ "studentId": student_id, "gpa": number_json(gpa) }))
}

fn handle_calc_ranks(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db(state)?;
    let grade_level = req_i64(&req.params, "gradeLevel")?;
    let settings = engine_settings(conn)?;
    let ranks = recompute::refresh_ranks(conn, grade_level, &settings)?;
    Ok(json!({
        "gradeLevel": grade_level,
        "policy": settings.rank_policy,
        "ranks": ranks,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "calc.courseGrade" => handle_calc_course_grade(state, req),
        "calc.gpa" => handle_calc_gpa(state, req),
        "calc.ranks" => handle_calc_ranks(state, req),
        _ => return None,
    };
    Some(respond(&req.id, res))
}
