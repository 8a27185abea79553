use crate::calc::MarkingPeriod;
use crate::ipc::handlers::assignments::assignment_json;
use crate::ipc::helpers::{
    db, engine_settings, number_json, req_f64, req_i64, respond, scoped_course, HandlerErr,
    HandlerResult,
};
use crate::ipc::types::{AppState, Request, Role};
use crate::recompute::{self, GradeEntry};
use crate::store;
use serde_json::json;

/// Students may only look at their own records.
fn check_student_scope(state: &AppState, student_id: i64) -> Result<(), HandlerErr> {
    match state.session {
        Some(s) if s.role == Role::Student && s.student_id != Some(student_id) => Err(
            HandlerErr::new("forbidden", "students may only view their own grades")
                .with_details(json!({ "studentId": student_id })),
        ),
        _ => Ok(()),
    }
}

fn handle_grades_record(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db(state)?;
    let entry = GradeEntry {
        student_id: req_i64(&req.params, "studentId")?,
        assignment_id: req_i64(&req.params, "assignmentId")?,
        course_id: req_i64(&req.params, "courseId")?,
        points_earned: req_f64(&req.params, "pointsEarned")?,
    };
    scoped_course(state, conn, entry.course_id)?;
    let settings = engine_settings(conn)?;
    let outcome = recompute::record_assignment_grade(conn, &entry, &settings)?;
    Ok(json!({
        "studentId": outcome.student_id,
        "courseId": outcome.course_id,
        "markingPeriod": outcome.marking_period.label(),
        "periodAverage": number_json(outcome.period_average),
        "courseGrade": number_json(outcome.course_grade),
        "gpa": number_json(outcome.gpa),
    }))
}

fn handle_grades_course_grades(state: &mut AppState, req: &Request) -> HandlerResult {
    let student_id = req_i64(&req.params, "studentId")?;
    check_student_scope(state, student_id)?;
    let conn = db(state)?;
    let student = store::require_student(conn, student_id)?;
    let scope = state.session.and_then(|s| s.teacher_id);
    let rows: Vec<_> = store::student_course_grades(conn, student_id)?
        .into_iter()
        .filter(|r| scope.is_none() || r.course.teacher_id == scope)
        .collect();
    Ok(json!({
        "studentId": student_id,
        "gpa": number_json(student.gpa),
        "classRank": student.class_rank,
        "courses": rows
            .iter()
            .map(|r| {
                let mut periods = serde_json::Map::new();
                for mp in MarkingPeriod::ALL {
                    periods.insert(mp.label().to_string(), number_json(r.periods.get(mp)));
                }
                json!({
                    "courseId": r.course.course_id,
                    "courseNo": r.course.course_no,
                    "title": r.course.title,
                    "creditHours": r.course.credit_hours,
                    "periods": periods,
                    "grade": number_json(r.grade),
                })
            })
            .collect::<Vec<_>>()
    }))
}

fn handle_grades_assignment_grades(state: &mut AppState, req: &Request) -> HandlerResult {
    let student_id = req_i64(&req.params, "studentId")?;
    let course_id = req_i64(&req.params, "courseId")?;
    check_student_scope(state, student_id)?;
    let conn = db(state)?;
    scoped_course(state, conn, course_id)?;
    store::require_course_grade(conn, student_id, course_id)?;
    let results = store::student_assignment_results(conn, student_id, course_id)?;
    Ok(json!({
        "studentId": student_id,
        "courseId": course_id,
        "assignments": results
            .iter()
            .map(|r| {
                let mut v = assignment_json(&r.assignment);
                v["pointsEarned"] = number_json(r.points_earned);
                v
            })
            .collect::<Vec<_>>()
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "grades.record" => handle_grades_record(state, req),
        "grades.courseGrades" => handle_grades_course_grades(state, req),
        "grades.assignmentGrades" => handle_grades_assignment_grades(state, req),
        _ => return None,
    };
    Some(respond(&req.id, res))
}
