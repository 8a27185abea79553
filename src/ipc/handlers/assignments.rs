use crate::calc::MarkingPeriod;
use crate::ipc::helpers::{
    db, engine_settings, number_json, req_i64, req_str, respond, scoped_course, HandlerErr,
    HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::recompute;
use crate::store::{self, Assignment, NewAssignment};
use serde_json::json;
use tracing::info;

/// `markingPeriod` as `"mp1"`..`"mp4"`, `"midterm"`, `"final"` or 1..=6.
pub fn parse_marking_period(
    params: &serde_json::Value,
    key: &str,
) -> Result<Option<MarkingPeriod>, HandlerErr> {
    let parsed = match params.get(key) {
        None => return Ok(None),
        Some(v) if v.is_null() => return Ok(None),
        Some(v) => match (v.as_str(), v.as_i64()) {
            (Some(s), _) => MarkingPeriod::parse(s),
            (None, Some(n)) => MarkingPeriod::from_code(n),
            _ => None,
        },
    };
    parsed.map(Some).ok_or_else(|| {
        HandlerErr::bad_params(format!(
            "{} must be one of: mp1, mp2, mp3, mp4, midterm, final",
            key
        ))
        .with_details(json!({ "value": params.get(key) }))
    })
}

pub fn assignment_json(a: &Assignment) -> serde_json::Value {
    json!({
        "assignmentId": a.assignment_id,
        "courseId": a.course_id,
        "markingPeriod": a.marking_period.label(),
        "title": a.title,
        "pointValue": a.point_value,
    })
}

fn handle_assignments_create(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db(state)?;
    let Some(marking_period) = parse_marking_period(&req.params, "markingPeriod")? else {
        return Err(HandlerErr::bad_params("missing markingPeriod"));
    };
    let course = scoped_course(state, conn, req_i64(&req.params, "courseId")?)?;
    let new = NewAssignment {
        course_id: course.course_id,
        marking_period,
        title: req_str(&req.params, "title")?.to_string(),
        point_value: req_i64(&req.params, "pointValue")?,
    };
    let assignment_id = store::insert_assignment(conn, &new)?;
    info!(
        assignment_id,
        course_id = new.course_id,
        period = marking_period.label(),
        "assignment created"
    );
    Ok(json!({ "assignmentId": assignment_id }))
}

fn handle_assignments_list(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db(state)?;
    let course_id = req_i64(&req.params, "courseId")?;
    scoped_course(state, conn, course_id)?;
    let mp = parse_marking_period(&req.params, "markingPeriod")?;
    let assignments = store::list_assignments(conn, course_id, mp)?;
    Ok(json!({
        "assignments": assignments.iter().map(assignment_json).collect::<Vec<_>>()
    }))
}

fn handle_assignments_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db(state)?;
    let course_id = req_i64(&req.params, "courseId")?;
    let assignment_id = req_i64(&req.params, "assignmentId")?;
    scoped_course(state, conn, course_id)?;
    let settings = engine_settings(conn)?;
    let outcomes = recompute::remove_assignment(conn, course_id, assignment_id, &settings)?;
    Ok(json!({
        "assignmentId": assignment_id,
        "recomputed": outcomes
            .iter()
            .map(|o| json!({
                "studentId": o.student_id,
                "periodAverage": number_json(o.period_average),
                "courseGrade": number_json(o.course_grade),
                "gpa": number_json(o.gpa),
            }))
            .collect::<Vec<_>>()
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "assignments.create" => handle_assignments_create(state, req),
        "assignments.list" => handle_assignments_list(state, req),
        "assignments.delete" => handle_assignments_delete(state, req),
        _ => return None,
    };
    Some(respond(&req.id, res))
}
