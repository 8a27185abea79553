mod test_support;

use serde_json::json;
use test_support::{spawn_sidecar, temp_workspace, Sidecar};

fn create_teacher(sc: &mut Sidecar, first: &str, last: &str, department_id: i64) -> i64 {
    let res = sc.request_ok(
        "faculty.create",
        json!({ "firstName": first, "lastName": last, "departmentId": department_id }),
    );
    res["teacherId"].as_i64().expect("teacherId")
}

fn create_taught_course(sc: &mut Sidecar, course_no: &str, teacher_id: i64) -> i64 {
    let res = sc.request_ok(
        "courses.create",
        json!({
            "courseNo": course_no,
            "title": format!("Course {}", course_no),
            "departmentId": 1,
            "creditHours": 3,
            "teacherId": teacher_id,
        }),
    );
    res["courseId"].as_i64().expect("courseId")
}

fn last_names(result: &serde_json::Value) -> Vec<String> {
    result["teachers"]
        .as_array()
        .expect("teachers")
        .iter()
        .filter_map(|t| t["lastName"].as_str().map(str::to_string))
        .collect()
}

#[test]
fn administrators_list_faculty_by_department() {
    let ws = temp_workspace();
    let mut sc = spawn_sidecar();
    sc.select_workspace(&ws);
    sc.open_session("administrator");

    create_teacher(&mut sc, "Marie", "Curie", 2);
    create_teacher(&mut sc, "Carl", "Sagan", 2);
    create_teacher(&mut sc, "Maya", "Angelou", 4);

    let all = sc.request_ok("faculty.list", json!({}));
    assert_eq!(last_names(&all), vec!["Angelou", "Curie", "Sagan"]);

    let science = sc.request_ok("faculty.list", json!({ "departmentId": 2 }));
    assert_eq!(science["departmentId"], 2);
    assert_eq!(last_names(&science), vec!["Curie", "Sagan"]);

    assert_eq!(
        sc.request_err(
            "faculty.create",
            json!({ "firstName": " ", "lastName": "Blank", "departmentId": 1 })
        ),
        "bad_params"
    );

    sc.open_session("teacher");
    assert_eq!(sc.request_err("faculty.list", json!({})), "forbidden");
}

#[test]
fn teacher_sessions_are_limited_to_their_courses() {
    let ws = temp_workspace();
    let mut sc = spawn_sidecar();
    sc.select_workspace(&ws);

    sc.open_session("administrator");
    let curie = create_teacher(&mut sc, "Marie", "Curie", 2);
    let sagan = create_teacher(&mut sc, "Carl", "Sagan", 2);
    let chem = create_taught_course(&mut sc, "CHEM-10", curie);
    let astro = create_taught_course(&mut sc, "ASTRO-10", sagan);
    let sid = sc.create_student("Ada", "Lovelace", 10);
    sc.enroll(sid, chem);
    sc.enroll(sid, astro);
    assert_eq!(
        sc.request_err(
            "courses.create",
            json!({ "courseNo": "GEO-10", "title": "Geo", "departmentId": 1, "creditHours": 3, "teacherId": 999 })
        ),
        "not_found"
    );

    let opened = sc.request_ok(
        "session.open",
        json!({ "role": "teacher", "teacherId": curie }),
    );
    assert_eq!(opened["teacherId"], curie);

    let listed = sc.request_ok("courses.list", json!({}));
    let ids: Vec<i64> = listed["courses"]
        .as_array()
        .expect("courses")
        .iter()
        .filter_map(|c| c["courseId"].as_i64())
        .collect();
    assert_eq!(ids, vec![chem]);

    let lab = sc.create_assignment(chem, "mp1", "Lab", 20);
    sc.record(sid, chem, lab, 18.0);
    let grades = sc.request_ok("grades.courseGrades", json!({ "studentId": sid }));
    assert_eq!(grades["courses"].as_array().map(|c| c.len()), Some(1));

    assert_eq!(
        sc.request_err(
            "assignments.create",
            json!({ "courseId": astro, "markingPeriod": "mp1", "title": "Stars", "pointValue": 10 })
        ),
        "forbidden"
    );
    assert_eq!(
        sc.request_err("courses.roster", json!({ "courseNo": "ASTRO-10" })),
        "forbidden"
    );
    assert_eq!(
        sc.request_err("calc.courseGrade", json!({ "studentId": sid, "courseId": astro })),
        "forbidden"
    );

    // An unbound teacher session still sees every course.
    sc.open_session("teacher");
    let listed = sc.request_ok("courses.list", json!({}));
    assert_eq!(listed["courses"].as_array().map(|c| c.len()), Some(2));

    assert_eq!(
        sc.request_err("session.open", json!({ "role": "teacher", "teacherId": 999 })),
        "not_found"
    );
}
