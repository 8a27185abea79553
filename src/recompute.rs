//! The recomputation chain: period average -> course grade -> GPA -> rank.
//!
//! Each `recompute_*` stage reads what the previous stage persisted and writes
//! its own derived field; stages never open transactions themselves. The
//! top-level operations below wrap a whole chain in one transaction.

use crate::calc::{
    self, is_valid_grade_level, EngineError, EngineSettings, MarkingPeriod, RankEntry,
};
use crate::db;
use crate::store::{self, AssignmentGrade};
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info, warn};

pub const ENGINE_SETTINGS_KEY: &str = "setup.engine";

pub fn load_settings(conn: &Connection) -> anyhow::Result<EngineSettings> {
    let Some(raw) = db::settings_get_json(conn, ENGINE_SETTINGS_KEY)? else {
        return Ok(EngineSettings::default());
    };
    Ok(serde_json::from_value(raw)?)
}

pub fn save_settings(conn: &Connection, settings: &EngineSettings) -> anyhow::Result<()> {
    db::settings_set_json(conn, ENGINE_SETTINGS_KEY, &serde_json::to_value(settings)?)
}

/// Persists `updated`. If the GPA inputs (`gpaDecimals`, `percentRounding`)
/// differ from `previous`, every stored GPA is recomputed under the new
/// settings in the same transaction. Returns how many GPAs were refreshed.
pub fn update_settings(
    conn: &Connection,
    previous: &EngineSettings,
    updated: &EngineSettings,
) -> anyhow::Result<usize> {
    let tx = conn.unchecked_transaction()?;
    save_settings(&tx, updated)?;
    let mut refreshed = 0;
    if previous.gpa_decimals != updated.gpa_decimals
        || previous.percent_rounding != updated.percent_rounding
    {
        for student in store::list_students(&tx, None)? {
            recompute_gpa(&tx, student.student_id, updated)?;
            refreshed += 1;
        }
    }
    tx.commit()?;
    if refreshed > 0 {
        info!(refreshed, "stored GPAs recomputed under new engine settings");
    }
    Ok(refreshed)
}

/// Recomputes one marking period for one student/course and persists it.
/// A period with no graded work is written back as unset.
pub fn recompute_marking_period(
    conn: &Connection,
    student_id: i64,
    course_id: i64,
    mp: MarkingPeriod,
) -> Result<Option<f64>, EngineError> {
    store::require_course(conn, course_id)?;
    store::require_course_grade(conn, student_id, course_id)?;

    let grades = store::period_grades(conn, student_id, course_id, mp)?;
    let average = calc::period_average(grades.iter().copied());
    store::set_period_mark(conn, student_id, course_id, mp, average)?;
    debug!(
        student_id,
        course_id,
        period = mp.label(),
        graded = grades.len(),
        ?average,
        "marking period recomputed"
    );
    Ok(average)
}

pub fn recompute_course_grade(
    conn: &Connection,
    student_id: i64,
    course_id: i64,
) -> Result<Option<f64>, EngineError> {
    let row = store::require_course_grade(conn, student_id, course_id)?;
    let grade = calc::course_grade(&row.periods);
    store::set_course_grade(conn, student_id, course_id, grade)?;
    debug!(student_id, course_id, ?grade, "course grade recomputed");
    Ok(grade)
}

pub fn recompute_gpa(
    conn: &Connection,
    student_id: i64,
    settings: &EngineSettings,
) -> Result<Option<f64>, EngineError> {
    store::require_student(conn, student_id)?;
    let courses = store::student_course_grades(conn, student_id)?;
    let gpa = calc::weighted_gpa(
        courses
            .iter()
            .filter_map(|c| c.grade.map(|g| (g, c.course.credit_hours))),
        settings,
    );
    store::set_student_gpa(conn, student_id, gpa)?;
    debug!(student_id, ?gpa, "gpa recomputed");
    Ok(gpa)
}

pub fn recompute_ranks(
    conn: &Connection,
    grade_level: i64,
    settings: &EngineSettings,
) -> Result<Vec<RankEntry>, EngineError> {
    if !is_valid_grade_level(grade_level) {
        return Err(EngineError::Validation(format!(
            "gradeLevel must be in 9..=12, got {}",
            grade_level
        )));
    }
    let mut ranked: Vec<(i64, f64)> = Vec::new();
    for (student_id, gpa) in store::grade_level_gpas(conn, grade_level)? {
        match gpa {
            Some(g) => ranked.push((student_id, g)),
            None => {
                store::set_student_rank(conn, student_id, None)?;
            }
        }
    }
    let entries = calc::assign_ranks(ranked, settings.rank_policy);
    for e in &entries {
        store::set_student_rank(conn, e.student_id, Some(e.rank))?;
    }
    debug!(grade_level, ranked = entries.len(), "ranks recomputed");
    Ok(entries)
}

/// Runs period -> course -> GPA for one student/course.
fn run_chain(
    conn: &Connection,
    student_id: i64,
    course_id: i64,
    mp: MarkingPeriod,
    settings: &EngineSettings,
) -> Result<GradeOutcome, EngineError> {
    let period_average = recompute_marking_period(conn, student_id, course_id, mp)?;
    let course_grade = recompute_course_grade(conn, student_id, course_id)?;
    let gpa = recompute_gpa(conn, student_id, settings)?;
    Ok(GradeOutcome {
        student_id,
        course_id,
        marking_period: mp,
        period_average,
        course_grade,
        gpa,
    })
}

#[derive(Debug, Clone)]
pub struct GradeEntry {
    pub student_id: i64,
    pub assignment_id: i64,
    pub course_id: i64,
    pub points_earned: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeOutcome {
    pub student_id: i64,
    pub course_id: i64,
    pub marking_period: MarkingPeriod,
    pub period_average: Option<f64>,
    pub course_grade: Option<f64>,
    pub gpa: Option<f64>,
}

/// Replaces the student's grade on an assignment and brings every derived
/// field that depends on it up to date, all in one transaction.
pub fn record_assignment_grade(
    conn: &Connection,
    entry: &GradeEntry,
    settings: &EngineSettings,
) -> Result<GradeOutcome, EngineError> {
    let assignment = store::require_assignment(conn, entry.assignment_id)?;
    if assignment.course_id != entry.course_id {
        return Err(EngineError::Validation(format!(
            "assignment {} does not belong to course {}",
            assignment.assignment_id, entry.course_id
        )));
    }
    store::require_course(conn, entry.course_id)?;
    store::require_student(conn, entry.student_id)?;
    store::require_course_grade(conn, entry.student_id, entry.course_id)?;

    let possible = assignment.point_value as f64;
    if !entry.points_earned.is_finite() || entry.points_earned < 0.0 || entry.points_earned > possible
    {
        warn!(
            student_id = entry.student_id,
            assignment_id = entry.assignment_id,
            points_earned = entry.points_earned,
            point_value = assignment.point_value,
            "rejected out-of-range grade"
        );
        return Err(EngineError::Validation(format!(
            "pointsEarned must be in 0..={}, got {}",
            assignment.point_value, entry.points_earned
        )));
    }

    let tx = conn.unchecked_transaction()?;
    store::delete_assignment_grade(&tx, entry.assignment_id, entry.student_id)?;
    store::insert_assignment_grade(
        &tx,
        &AssignmentGrade {
            assignment_id: entry.assignment_id,
            student_id: entry.student_id,
            course_id: entry.course_id,
            points_earned: entry.points_earned,
            points_possible: assignment.point_value,
        },
    )?;
    let outcome = run_chain(
        &tx,
        entry.student_id,
        entry.course_id,
        assignment.marking_period,
        settings,
    )?;
    tx.commit()?;

    info!(
        student_id = entry.student_id,
        assignment_id = entry.assignment_id,
        points_earned = entry.points_earned,
        gpa = ?outcome.gpa,
        "assignment grade recorded"
    );
    Ok(outcome)
}

/// Deletes an assignment with its grades and recomputes every student who had
/// one. Returns the refreshed outcomes.
pub fn remove_assignment(
    conn: &Connection,
    course_id: i64,
    assignment_id: i64,
    settings: &EngineSettings,
) -> Result<Vec<GradeOutcome>, EngineError> {
    let assignment = store::require_assignment(conn, assignment_id)?;
    if assignment.course_id != course_id {
        return Err(EngineError::Validation(format!(
            "assignment {} does not belong to course {}",
            assignment_id, course_id
        )));
    }

    let tx = conn.unchecked_transaction()?;
    let affected = store::delete_assignment(&tx, assignment_id)?;
    let mut outcomes = Vec::with_capacity(affected.len());
    for student_id in affected {
        outcomes.push(run_chain(
            &tx,
            student_id,
            course_id,
            assignment.marking_period,
            settings,
        )?);
    }
    tx.commit()?;

    info!(
        course_id,
        assignment_id,
        recomputed = outcomes.len(),
        "assignment deleted"
    );
    Ok(outcomes)
}

/// Re-synthesizes a course grade from its stored periods and refreshes the GPA
/// it feeds.
pub fn recompute_course(
    conn: &Connection,
    student_id: i64,
    course_id: i64,
    settings: &EngineSettings,
) -> Result<Option<f64>, EngineError> {
    store::require_course(conn, course_id)?;
    let tx = conn.unchecked_transaction()?;
    let grade = recompute_course_grade(&tx, student_id, course_id)?;
    recompute_gpa(&tx, student_id, settings)?;
    tx.commit()?;
    Ok(grade)
}

pub fn refresh_gpa(
    conn: &Connection,
    student_id: i64,
    settings: &EngineSettings,
) -> Result<Option<f64>, EngineError> {
    let tx = conn.unchecked_transaction()?;
    let gpa = recompute_gpa(&tx, student_id, settings)?;
    tx.commit()?;
    Ok(gpa)
}

pub fn refresh_ranks(
    conn: &Connection,
    grade_level: i64,
    settings: &EngineSettings,
) -> Result<Vec<RankEntry>, EngineError> {
    let tx = conn.unchecked_transaction()?;
    let entries = recompute_ranks(&tx, grade_level, settings)?;
    tx.commit()?;
    info!(grade_level, ranked = entries.len(), "class ranks refreshed");
    Ok(entries)
}
