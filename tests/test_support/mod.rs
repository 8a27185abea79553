#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use tempfile::TempDir;

/// One running sidecar plus the pipes used to talk to it.
pub struct Sidecar {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    next_id: u64,
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub fn temp_workspace() -> TempDir {
    tempfile::Builder::new()
        .prefix("gradebookd-test-")
        .tempdir()
        .expect("create temp workspace")
}

pub fn spawn_sidecar() -> Sidecar {
    let exe = env!("CARGO_BIN_EXE_gradebookd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn gradebookd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    Sidecar {
        child,
        stdin,
        reader: BufReader::new(stdout),
        next_id: 0,
    }
}

impl Sidecar {
    pub fn send_raw(&mut self, line: &str) -> serde_json::Value {
        writeln!(self.stdin, "{}", line).expect("write request");
        self.stdin.flush().expect("flush request");
        let mut out = String::new();
        self.reader.read_line(&mut out).expect("read response line");
        assert!(!out.trim().is_empty(), "empty response");
        serde_json::from_str(out.trim()).expect("parse response json")
    }

    pub fn request(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        self.next_id += 1;
        let id = self.next_id.to_string();
        let payload = json!({ "id": id, "method": method, "params": params });
        let value = self.send_raw(&payload.to_string());
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
        value
    }

    pub fn request_ok(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let value = self.request(method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(true),
            "{} failed: {}",
            method,
            value
        );
        value.get("result").cloned().unwrap_or_else(|| json!({}))
    }

    /// Returns the error code of a failed request.
    pub fn request_err(&mut self, method: &str, params: serde_json::Value) -> String {
        let value = self.request(method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "{} unexpectedly succeeded: {}",
            method,
            value
        );
        value
            .pointer("/error/code")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string()
    }

    pub fn select_workspace(&mut self, ws: &TempDir) {
        let _ = self.request_ok(
            "workspace.select",
            json!({ "path": ws.path().to_string_lossy() }),
        );
    }

    pub fn open_session(&mut self, role: &str) {
        let _ = self.request_ok("session.open", json!({ "role": role }));
    }

    pub fn open_student_session(&mut self, student_id: i64) {
        let _ = self.request_ok(
            "session.open",
            json!({ "role": "student", "studentId": student_id }),
        );
    }

    pub fn create_student(&mut self, first: &str, last: &str, grade_level: i64) -> i64 {
        let res = self.request_ok(
            "students.create",
            json!({
                "firstName": first,
                "lastName": last,
                "gradeLevel": grade_level,
                "graduationYear": 2030 - (grade_level - 9),
            }),
        );
        res["studentId"].as_i64().expect("studentId")
    }

    pub fn create_course(&mut self, course_no: &str, credit_hours: i64) -> i64 {
        let res = self.request_ok(
            "courses.create",
            json!({
                "courseNo": course_no,
                "title": format!("Course {}", course_no),
                "departmentId": 1,
                "creditHours": credit_hours,
            }),
        );
        res["courseId"].as_i64().expect("courseId")
    }

    pub fn enroll(&mut self, student_id: i64, course_id: i64) {
        let _ = self.request_ok(
            "courses.enroll",
            json!({ "studentId": student_id, "courseId": course_id }),
        );
    }

    pub fn create_assignment(
        &mut self,
        course_id: i64,
        marking_period: &str,
        title: &str,
        point_value: i64,
    ) -> i64 {
        let res = self.request_ok(
            "assignments.create",
            json!({
                "courseId": course_id,
                "markingPeriod": marking_period,
                "title": title,
                "pointValue": point_value,
            }),
        );
        res["assignmentId"].as_i64().expect("assignmentId")
    }

    pub fn record(
        &mut self,
        student_id: i64,
        course_id: i64,
        assignment_id: i64,
        points_earned: f64,
    ) -> serde_json::Value {
        self.request_ok(
            "grades.record",
            json!({
                "studentId": student_id,
                "courseId": course_id,
                "assignmentId": assignment_id,
                "pointsEarned": points_earned,
            }),
        )
    }
}

pub fn value_of(v: &serde_json::Value) -> Option<f64> {
    v.get("value").and_then(|x| x.as_f64())
}

pub fn approx(a: Option<f64>, b: f64) -> bool {
    a.map(|x| (x - b).abs() < 1e-9).unwrap_or(false)
}
