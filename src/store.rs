//! Typed access to the gradebook tables.
//!
//! Derived numbers (`grade`, `gpa`, `class_rank`) are persisted with a `-1`
//! sentinel and period percentages as `NULL`; both read back as `None` here, so
//! nothing above this module ever sees a sentinel.

use crate::calc::{is_valid_grade_level, EngineError, MarkingPeriod, PeriodMarks};
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;

const UNSET: f64 = -1.0;

fn from_sentinel(v: Option<f64>) -> Option<f64> {
    v.filter(|x| *x >= 0.0)
}

fn to_sentinel(v: Option<f64>) -> f64 {
    v.unwrap_or(UNSET)
}

fn rank_from_sentinel(v: Option<i64>) -> Option<i64> {
    v.filter(|x| *x > 0)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub student_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub grade_level: i64,
    pub graduation_year: i64,
    pub gpa: Option<f64>,
    pub class_rank: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewStudent {
    pub first_name: String,
    pub last_name: String,
    pub grade_level: i64,
    pub graduation_year: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub teacher_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub department_id: i64,
}

#[derive(Debug, Clone)]
pub struct NewTeacher {
    pub first_name: String,
    pub last_name: String,
    pub department_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub course_id: i64,
    pub course_no: String,
    pub title: String,
    pub department_id: i64,
    pub credit_hours: i64,
    /// Teacher of record; `None` until one is assigned.
    pub teacher_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewCourse {
    pub course_no: String,
    pub title: String,
    pub department_id: i64,
    pub credit_hours: i64,
    pub teacher_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub assignment_id: i64,
    pub course_id: i64,
    pub marking_period: MarkingPeriod,
    pub title: String,
    pub point_value: i64,
}

#[derive(Debug, Clone)]
pub struct NewAssignment {
    pub course_id: i64,
    pub marking_period: MarkingPeriod,
    pub title: String,
    pub point_value: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentGrade {
    pub assignment_id: i64,
    pub student_id: i64,
    pub course_id: i64,
    pub points_earned: f64,
    pub points_possible: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseGrade {
    pub course_id: i64,
    pub student_id: i64,
    pub periods: PeriodMarks,
    pub grade: Option<f64>,
}

/// One enrollment of a student joined with its course.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentCourseGrade {
    pub course: Course,
    pub periods: PeriodMarks,
    pub grade: Option<f64>,
}

/// An assignment of a course and the student's earned points, if graded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentResult {
    pub assignment: Assignment,
    pub points_earned: Option<f64>,
}

const STUDENT_COLS: &str =
    "student_id, first_name, last_name, grade_level, graduation_year, gpa, class_rank";

fn student_from_row(r: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        student_id: r.get(0)?,
        first_name: r.get(1)?,
        last_name: r.get(2)?,
        grade_level: r.get(3)?,
        graduation_year: r.get(4)?,
        gpa: from_sentinel(r.get(5)?),
        class_rank: rank_from_sentinel(r.get(6)?),
    })
}

const TEACHER_COLS: &str = "teacher_id, first_name, last_name, department_id";

fn teacher_from_row(r: &Row<'_>) -> rusqlite::Result<Teacher> {
    Ok(Teacher {
        teacher_id: r.get(0)?,
        first_name: r.get(1)?,
        last_name: r.get(2)?,
        department_id: r.get(3)?,
    })
}

const COURSE_COLS: &str = "course_id, course_no, title, department_id, credit_hours, teacher_id";

fn course_from_row(r: &Row<'_>, offset: usize) -> rusqlite::Result<Course> {
    Ok(Course {
        course_id: r.get(offset)?,
        course_no: r.get(offset + 1)?,
        title: r.get(offset + 2)?,
        department_id: r.get(offset + 3)?,
        credit_hours: r.get(offset + 4)?,
        teacher_id: r.get(offset + 5)?,
    })
}

const ASSIGNMENT_COLS: &str = "assignment_id, course_id, marking_period, title, point_value";

fn assignment_from_row(r: &Row<'_>) -> rusqlite::Result<Assignment> {
    let code: i64 = r.get(2)?;
    let marking_period = MarkingPeriod::from_code(code).ok_or_else(|| {
        rusqlite::Error::IntegralValueOutOfRange(2, code)
    })?;
    Ok(Assignment {
        assignment_id: r.get(0)?,
        course_id: r.get(1)?,
        marking_period,
        title: r.get(3)?,
        point_value: r.get(4)?,
    })
}

fn periods_from_row(r: &Row<'_>, offset: usize) -> rusqlite::Result<PeriodMarks> {
    let mut marks = PeriodMarks::default();
    for (i, mp) in MarkingPeriod::ALL.into_iter().enumerate() {
        marks.set(mp, from_sentinel(r.get(offset + i)?));
    }
    Ok(marks)
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

pub fn insert_student(conn: &Connection, s: &NewStudent) -> Result<i64, EngineError> {
    let first = s.first_name.trim();
    let last = s.last_name.trim();
    if first.is_empty() || last.is_empty() {
        return Err(EngineError::Validation(
            "firstName and lastName must not be empty".into(),
        ));
    }
    if !is_valid_grade_level(s.grade_level) {
        return Err(EngineError::Validation(format!(
            "gradeLevel must be in 9..=12, got {}",
            s.grade_level
        )));
    }
    conn.execute(
        "INSERT INTO students(first_name, last_name, grade_level, graduation_year, gpa, class_rank)
         VALUES(?, ?, ?, ?, -1, -1)",
        (first, last, s.grade_level, s.graduation_year),
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_student(conn: &Connection, student_id: i64) -> rusqlite::Result<Option<Student>> {
    conn.query_row(
        &format!("SELECT {} FROM students WHERE student_id = ?", STUDENT_COLS),
        [student_id],
        student_from_row,
    )
    .optional()
}

pub fn require_student(conn: &Connection, student_id: i64) -> Result<Student, EngineError> {
    get_student(conn, student_id)?.ok_or(EngineError::NotFound("student"))
}

/// All students, or one grade level, ordered by last then first name.
pub fn list_students(conn: &Connection, grade_level: Option<i64>) -> rusqlite::Result<Vec<Student>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM students
         WHERE (?1 IS NULL OR grade_level = ?1)
         ORDER BY last_name, first_name, student_id",
        STUDENT_COLS
    ))?;
    let rows = stmt
        .query_map([grade_level], student_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn set_student_gpa(conn: &Connection, student_id: i64, gpa: Option<f64>) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE students SET gpa = ? WHERE student_id = ?",
        (to_sentinel(gpa), student_id),
    )
}

pub fn set_student_rank(
    conn: &Connection,
    student_id: i64,
    rank: Option<i64>,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE students SET class_rank = ? WHERE student_id = ?",
        (rank.unwrap_or(-1), student_id),
    )
}

pub fn insert_teacher(conn: &Connection, t: &NewTeacher) -> Result<i64, EngineError> {
    let first = t.first_name.trim();
    let last = t.last_name.trim();
    if first.is_empty() || last.is_empty() {
        return Err(EngineError::Validation(
            "firstName and lastName must not be empty".into(),
        ));
    }
    conn.execute(
        "INSERT INTO teachers(first_name, last_name, department_id) VALUES(?, ?, ?)",
        (first, last, t.department_id),
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_teacher(conn: &Connection, teacher_id: i64) -> rusqlite::Result<Option<Teacher>> {
    conn.query_row(
        &format!("SELECT {} FROM teachers WHERE teacher_id = ?", TEACHER_COLS),
        [teacher_id],
        teacher_from_row,
    )
    .optional()
}

pub fn require_teacher(conn: &Connection, teacher_id: i64) -> Result<Teacher, EngineError> {
    get_teacher(conn, teacher_id)?.ok_or(EngineError::NotFound("teacher"))
}

/// Faculty, optionally of one department, ordered by last then first name.
pub fn list_teachers(
    conn: &Connection,
    department_id: Option<i64>,
) -> rusqlite::Result<Vec<Teacher>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM teachers
         WHERE (?1 IS NULL OR department_id = ?1)
         ORDER BY last_name, first_name, teacher_id",
        TEACHER_COLS
    ))?;
    let rows = stmt
        .query_map([department_id], teacher_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn insert_course(conn: &Connection, c: &NewCourse) -> Result<i64, EngineError> {
    let course_no = c.course_no.trim();
    let title = c.title.trim();
    if course_no.is_empty() || title.is_empty() {
        return Err(EngineError::Validation(
            "courseNo and title must not be empty".into(),
        ));
    }
    if c.credit_hours <= 0 {
        return Err(EngineError::Validation(format!(
            "creditHours must be positive, got {}",
            c.credit_hours
        )));
    }
    if let Some(teacher_id) = c.teacher_id {
        require_teacher(conn, teacher_id)?;
    }
    match conn.execute(
        "INSERT INTO courses(course_no, title, department_id, credit_hours, teacher_id)
         VALUES(?, ?, ?, ?, ?)",
        (course_no, title, c.department_id, c.credit_hours, c.teacher_id),
    ) {
        Ok(_) => Ok(conn.last_insert_rowid()),
        Err(e) if is_unique_violation(&e) => Err(EngineError::Validation(format!(
            "course number {} already exists",
            course_no
        ))),
        Err(e) => Err(e.into()),
    }
}

pub fn get_course(conn: &Connection, course_id: i64) -> rusqlite::Result<Option<Course>> {
    conn.query_row(
        &format!("SELECT {} FROM courses WHERE course_id = ?", COURSE_COLS),
        [course_id],
        |r| course_from_row(r, 0),
    )
    .optional()
}

pub fn get_course_by_no(conn: &Connection, course_no: &str) -> rusqlite::Result<Option<Course>> {
    conn.query_row(
        &format!("SELECT {} FROM courses WHERE course_no = ?", COURSE_COLS),
        [course_no.trim()],
        |r| course_from_row(r, 0),
    )
    .optional()
}

pub fn require_course(conn: &Connection, course_id: i64) -> Result<Course, EngineError> {
    get_course(conn, course_id)?.ok_or(EngineError::NotFound("course"))
}

/// All courses, or only those taught by `teacher_id`.
pub fn list_courses(conn: &Connection, teacher_id: Option<i64>) -> rusqlite::Result<Vec<Course>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM courses
         WHERE (?1 IS NULL OR teacher_id = ?1)
         ORDER BY course_id",
        COURSE_COLS
    ))?;
    let rows = stmt
        .query_map([teacher_id], |r| course_from_row(r, 0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Creates the course grade row that enrolls a student. Returns false when the
/// student was already enrolled.
pub fn enroll(conn: &Connection, student_id: i64, course_id: i64) -> Result<bool, EngineError> {
    require_student(conn, student_id)?;
    require_course(conn, course_id)?;
    let n = conn.execute(
        "INSERT OR IGNORE INTO course_grades(course_id, student_id, grade) VALUES(?, ?, -1)",
        (course_id, student_id),
    )?;
    Ok(n > 0)
}

pub fn roster(conn: &Connection, course_id: i64) -> rusqlite::Result<Vec<Student>> {
    let mut stmt = conn.prepare(
        "SELECT s.student_id, s.first_name, s.last_name, s.grade_level, s.graduation_year,
                s.gpa, s.class_rank
         FROM students s
         JOIN course_grades cg ON cg.student_id = s.student_id
         WHERE cg.course_id = ?
         ORDER BY s.last_name, s.first_name, s.student_id",
    )?;
    let rows = stmt
        .query_map([course_id], student_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_course_grade(
    conn: &Connection,
    student_id: i64,
    course_id: i64,
) -> rusqlite::Result<Option<CourseGrade>> {
    conn.query_row(
        "SELECT course_id, student_id, mp1, mp2, mp3, mp4, midterm_exam, final_exam, grade
         FROM course_grades
         WHERE student_id = ? AND course_id = ?",
        (student_id, course_id),
        |r| {
            Ok(CourseGrade {
                course_id: r.get(0)?,
                student_id: r.get(1)?,
                periods: periods_from_row(r, 2)?,
                grade: from_sentinel(r.get(8)?),
            })
        },
    )
    .optional()
}

pub fn require_course_grade(
    conn: &Connection,
    student_id: i64,
    course_id: i64,
) -> Result<CourseGrade, EngineError> {
    get_course_grade(conn, student_id, course_id)?.ok_or(EngineError::NotFound("enrollment"))
}

pub fn student_course_grades(
    conn: &Connection,
    student_id: i64,
) -> rusqlite::Result<Vec<StudentCourseGrade>> {
    let mut stmt = conn.prepare(
        "SELECT c.course_id, c.course_no, c.title, c.department_id, c.credit_hours, c.teacher_id,
                cg.mp1, cg.mp2, cg.mp3, cg.mp4, cg.midterm_exam, cg.final_exam, cg.grade
         FROM course_grades cg
         JOIN courses c ON c.course_id = cg.course_id
         WHERE cg.student_id = ?
         ORDER BY c.course_id",
    )?;
    let rows = stmt
        .query_map([student_id], |r| {
            Ok(StudentCourseGrade {
                course: course_from_row(r, 0)?,
                periods: periods_from_row(r, 6)?,
                grade: from_sentinel(r.get(12)?),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn set_period_mark(
    conn: &Connection,
    student_id: i64,
    course_id: i64,
    mp: MarkingPeriod,
    value: Option<f64>,
) -> rusqlite::Result<usize> {
    // Column names come from a closed enum, never from input.
    conn.execute(
        &format!(
            "UPDATE course_grades SET {} = ? WHERE student_id = ? AND course_id = ?",
            mp.column()
        ),
        (value, student_id, course_id),
    )
}

pub fn set_course_grade(
    conn: &Connection,
    student_id: i64,
    course_id: i64,
    grade: Option<f64>,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE course_grades SET grade = ? WHERE student_id = ? AND course_id = ?",
        (to_sentinel(grade), student_id, course_id),
    )
}

pub fn insert_assignment(conn: &Connection, a: &NewAssignment) -> Result<i64, EngineError> {
    let title = a.title.trim();
    if title.is_empty() {
        return Err(EngineError::Validation("title must not be empty".into()));
    }
    if !(1..=100).contains(&a.point_value) {
        return Err(EngineError::Validation(format!(
            "pointValue must be in 1..=100, got {}",
            a.point_value
        )));
    }
    require_course(conn, a.course_id)?;
    match conn.execute(
        "INSERT INTO assignments(course_id, marking_period, title, point_value) VALUES(?, ?, ?, ?)",
        (a.course_id, a.marking_period.code(), title, a.point_value),
    ) {
        Ok(_) => Ok(conn.last_insert_rowid()),
        Err(e) if is_unique_violation(&e) => Err(EngineError::Validation(format!(
            "an assignment titled {:?} already exists in {}",
            title,
            a.marking_period.label()
        ))),
        Err(e) => Err(e.into()),
    }
}

pub fn get_assignment(conn: &Connection, assignment_id: i64) -> rusqlite::Result<Option<Assignment>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM assignments WHERE assignment_id = ?",
            ASSIGNMENT_COLS
        ),
        [assignment_id],
        assignment_from_row,
    )
    .optional()
}

pub fn require_assignment(conn: &Connection, assignment_id: i64) -> Result<Assignment, EngineError> {
    get_assignment(conn, assignment_id)?.ok_or(EngineError::NotFound("assignment"))
}

pub fn list_assignments(
    conn: &Connection,
    course_id: i64,
    mp: Option<MarkingPeriod>,
) -> rusqlite::Result<Vec<Assignment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM assignments
         WHERE course_id = ?1 AND (?2 IS NULL OR marking_period = ?2)
         ORDER BY marking_period, assignment_id",
        ASSIGNMENT_COLS
    ))?;
    let rows = stmt
        .query_map((course_id, mp.map(|m| m.code())), assignment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Deletes an assignment and all of its grades. Returns the ids of students
/// who had a grade on it.
pub fn delete_assignment(conn: &Connection, assignment_id: i64) -> rusqlite::Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT student_id FROM assignment_grades WHERE assignment_id = ? ORDER BY student_id",
    )?;
    let affected = stmt
        .query_map([assignment_id], |r| r.get::<_, i64>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    conn.execute(
        "DELETE FROM assignment_grades WHERE assignment_id = ?",
        [assignment_id],
    )?;
    conn.execute(
        "DELETE FROM assignments WHERE assignment_id = ?",
        [assignment_id],
    )?;
    Ok(affected)
}

pub fn delete_assignment_grade(
    conn: &Connection,
    assignment_id: i64,
    student_id: i64,
) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM assignment_grades WHERE assignment_id = ? AND student_id = ?",
        (assignment_id, student_id),
    )
}

pub fn insert_assignment_grade(conn: &Connection, g: &AssignmentGrade) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO assignment_grades(assignment_id, student_id, course_id, points_earned, points_possible)
         VALUES(?, ?, ?, ?, ?)",
        (
            g.assignment_id,
            g.student_id,
            g.course_id,
            g.points_earned,
            g.points_possible,
        ),
    )
}

/// `(earned, possible)` for every graded assignment of one student, course and period.
pub fn period_grades(
    conn: &Connection,
    student_id: i64,
    course_id: i64,
    mp: MarkingPeriod,
) -> rusqlite::Result<Vec<(f64, f64)>> {
    let mut stmt = conn.prepare(
        "SELECT ag.points_earned, ag.points_possible
         FROM assignment_grades ag
         JOIN assignments a ON a.assignment_id = ag.assignment_id
         WHERE ag.student_id = ? AND a.course_id = ? AND a.marking_period = ?
         ORDER BY a.assignment_id",
    )?;
    let rows = stmt
        .query_map((student_id, course_id, mp.code()), |r| {
            Ok((r.get::<_, f64>(0)?, r.get::<_, f64>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn student_assignment_results(
    conn: &Connection,
    student_id: i64,
    course_id: i64,
) -> rusqlite::Result<Vec<AssignmentResult>> {
    let mut stmt = conn.prepare(
        "SELECT a.assignment_id, a.course_id, a.marking_period, a.title, a.point_value,
                ag.points_earned
         FROM assignments a
         LEFT JOIN assignment_grades ag
           ON ag.assignment_id = a.assignment_id AND ag.student_id = ?1
         WHERE a.course_id = ?2
         ORDER BY a.marking_period, a.assignment_id",
    )?;
    let rows = stmt
        .query_map((student_id, course_id), |r| {
            Ok(AssignmentResult {
                assignment: assignment_from_row(r)?,
                points_earned: r.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// `(student_id, gpa)` for a grade level; `None` GPAs are included so callers
/// can clear their rank.
pub fn grade_level_gpas(
    conn: &Connection,
    grade_level: i64,
) -> rusqlite::Result<Vec<(i64, Option<f64>)>> {
    let mut stmt = conn.prepare(
        "SELECT student_id, gpa FROM students WHERE grade_level = ? ORDER BY student_id",
    )?;
    let rows = stmt
        .query_map([grade_level], |r| {
            Ok((r.get::<_, i64>(0)?, from_sentinel(r.get(1)?)))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
