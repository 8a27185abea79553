mod test_support;

use serde_json::json;
use test_support::{spawn_sidecar, temp_workspace};

#[test]
fn health_works_without_a_workspace() {
    let mut sc = spawn_sidecar();
    let health = sc.request_ok("health", json!({}));
    assert_eq!(health["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(health["workspacePath"], serde_json::Value::Null);
    assert_eq!(health["role"], serde_json::Value::Null);

    sc.open_session("teacher");
    assert_eq!(sc.request_err("courses.list", json!({})), "no_workspace");
}

#[test]
fn malformed_lines_and_unknown_methods_get_error_replies() {
    let mut sc = spawn_sidecar();
    let bad = sc.send_raw("{ this is not json");
    assert_eq!(bad["ok"], false);
    assert_eq!(bad["error"]["code"], "bad_json");

    assert_eq!(sc.request_err("grid.get", json!({})), "not_implemented");

    // Still serving after the bad line.
    let _ = sc.request_ok("health", json!({}));
}

#[test]
fn every_handler_family_answers() {
    let ws = temp_workspace();
    let mut sc = spawn_sidecar();
    sc.select_workspace(&ws);

    sc.open_session("administrator");
    let sid = sc.create_student("Linus", "Pauling", 11);
    let cid = sc.create_course("CHEM-11", 4);
    sc.enroll(sid, cid);
    let again = sc.request_ok(
        "courses.enroll",
        json!({ "studentId": sid, "courseNo": "CHEM-11" }),
    );
    assert_eq!(again["created"], false);

    let roster = sc.request_ok("courses.roster", json!({ "courseNo": "CHEM-11" }));
    assert_eq!(roster["students"][0]["studentId"], sid);
    assert_eq!(
        sc.request_err("courses.roster", json!({ "courseNo": "NOPE-1" })),
        "not_found"
    );
    assert_eq!(
        sc.request_err(
            "courses.create",
            json!({ "courseNo": "CHEM-11", "title": "Dup", "departmentId": 1, "creditHours": 4 })
        ),
        "bad_params"
    );

    sc.open_session("teacher");
    let lab = sc.create_assignment(cid, "midterm", "Titration", 40);
    sc.record(sid, cid, lab, 30.0);
    let listed = sc.request_ok(
        "assignments.list",
        json!({ "courseId": cid, "markingPeriod": "midterm" }),
    );
    assert_eq!(listed["assignments"][0]["assignmentId"], lab);

    let grade = sc.request_ok(
        "calc.courseGrade",
        json!({ "studentId": sid, "courseId": cid }),
    );
    assert_eq!(grade["courseGrade"]["display"], "75.00");

    sc.open_session("root");
    let _ = sc.request_ok("setup.get", json!({}));
    let health = sc.request_ok("health", json!({}));
    assert_eq!(health["role"], "root");
}
