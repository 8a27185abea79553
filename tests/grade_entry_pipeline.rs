mod test_support;

use serde_json::json;
use test_support::{approx, spawn_sidecar, temp_workspace, value_of};

#[test]
fn recording_grades_updates_period_course_and_gpa() {
    let ws = temp_workspace();
    let mut sc = spawn_sidecar();
    sc.select_workspace(&ws);

    sc.open_session("administrator");
    let sid = sc.create_student("Grace", "Hopper", 10);
    let cid = sc.create_course("ENG-10", 4);
    sc.enroll(sid, cid);

    sc.open_session("teacher");
    let essay = sc.create_assignment(cid, "mp1", "Essay", 10);
    let test = sc.create_assignment(cid, "mp1", "Unit test", 20);

    let first = sc.record(sid, cid, essay, 8.0);
    assert_eq!(first["markingPeriod"], "mp1");
    assert!(approx(value_of(&first["periodAverage"]), 80.0));

    let second = sc.record(sid, cid, test, 18.0);
    assert!(approx(value_of(&second["periodAverage"]), 85.0));
    assert!(approx(value_of(&second["courseGrade"]), 85.0));
    assert_eq!(value_of(&second["gpa"]), Some(3.0));
    assert_eq!(second["gpa"]["display"], "3.00");

    let grades = sc.request_ok("grades.courseGrades", json!({ "studentId": sid }));
    let course = &grades["courses"][0];
    assert!(approx(value_of(&course["periods"]["mp1"]), 85.0));
    assert_eq!(course["periods"]["mp2"]["value"], serde_json::Value::Null);
    assert_eq!(course["periods"]["mp2"]["display"], "--");
    assert_eq!(value_of(&grades["gpa"]), Some(3.0));
}

#[test]
fn reentering_a_grade_replaces_it() {
    let ws = temp_workspace();
    let mut sc = spawn_sidecar();
    sc.select_workspace(&ws);

    sc.open_session("admin");
    let sid = sc.create_student("Alan", "Turing", 11);
    let cid = sc.create_course("MATH-11", 4);
    sc.enroll(sid, cid);

    sc.open_session("teacher");
    let quiz = sc.create_assignment(cid, "mp2", "Quiz", 100);

    let once = sc.record(sid, cid, quiz, 92.0);
    let twice = sc.record(sid, cid, quiz, 92.0);
    assert_eq!(once, twice);
    assert_eq!(value_of(&twice["periodAverage"]), Some(92.0));

    let detail = sc.request_ok(
        "grades.assignmentGrades",
        json!({ "studentId": sid, "courseId": cid }),
    );
    let rows = detail["assignments"].as_array().expect("assignments");
    assert_eq!(rows.len(), 1);
    assert_eq!(value_of(&rows[0]["pointsEarned"]), Some(92.0));
}

#[test]
fn gpa_is_credit_weighted_across_courses() {
    let ws = temp_workspace();
    let mut sc = spawn_sidecar();
    sc.select_workspace(&ws);

    sc.open_session("administrator");
    let sid = sc.create_student("Katherine", "Johnson", 12);
    let math = sc.create_course("MATH-12", 4);
    let art = sc.create_course("ART-12", 3);
    let gym = sc.create_course("GYM-12", 1);
    for c in [math, art, gym] {
        sc.enroll(sid, c);
    }

    sc.open_session("teacher");
    let m1 = sc.create_assignment(math, "mp1", "Unit 1", 100);
    let m3 = sc.create_assignment(math, "mp3", "Unit 3", 100);
    let a1 = sc.create_assignment(art, "mp1", "Portfolio", 100);
    sc.record(sid, math, m1, 95.0);
    let math_out = sc.record(sid, math, m3, 88.0);
    assert_eq!(value_of(&math_out["courseGrade"]), Some(91.5));
    let art_out = sc.record(sid, art, a1, 78.0);
    assert_eq!(value_of(&art_out["gpa"]), Some(3.1));

    let gpa = sc.request_ok("calc.gpa", json!({ "studentId": sid }));
    assert_eq!(value_of(&gpa["gpa"]), Some(3.1));
}

#[test]
fn invalid_entries_are_rejected() {
    let ws = temp_workspace();
    let mut sc = spawn_sidecar();
    sc.select_workspace(&ws);

    sc.open_session("administrator");
    let sid = sc.create_student("Ada", "Lovelace", 9);
    let cid = sc.create_course("CS-9", 3);
    let other = sc.create_course("BIO-9", 3);
    sc.enroll(sid, cid);

    sc.open_session("teacher");
    let quiz = sc.create_assignment(cid, "mp1", "Quiz", 10);
    let lab = sc.create_assignment(other, "mp1", "Lab", 10);

    let over = sc.request_err(
        "grades.record",
        json!({ "studentId": sid, "courseId": cid, "assignmentId": quiz, "pointsEarned": 11 }),
    );
    assert_eq!(over, "bad_params");

    let not_enrolled = sc.request_err(
        "grades.record",
        json!({ "studentId": sid, "courseId": other, "assignmentId": lab, "pointsEarned": 5 }),
    );
    assert_eq!(not_enrolled, "not_found");

    let bad_period = sc.request_err(
        "assignments.create",
        json!({ "courseId": cid, "markingPeriod": "mp7", "title": "X", "pointValue": 10 }),
    );
    assert_eq!(bad_period, "bad_params");

    let bad_points = sc.request_err(
        "assignments.create",
        json!({ "courseId": cid, "markingPeriod": 1, "title": "Huge", "pointValue": 101 }),
    );
    assert_eq!(bad_points, "bad_params");

    let grades = sc.request_ok(
        "grades.assignmentGrades",
        json!({ "studentId": sid, "courseId": cid }),
    );
    assert_eq!(grades["assignments"][0]["pointsEarned"]["display"], "--");
}
