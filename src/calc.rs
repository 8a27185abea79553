use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("SQLite error: {0}")]
    Db(#[from] rusqlite::Error),
}

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "bad_params",
            Self::NotFound(_) => "not_found",
            Self::Db(_) => "db_query_failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MarkingPeriod {
    Mp1,
    Mp2,
    Mp3,
    Mp4,
    Midterm,
    Final,
}

impl MarkingPeriod {
    pub const ALL: [MarkingPeriod; 6] = [
        Self::Mp1,
        Self::Mp2,
        Self::Mp3,
        Self::Mp4,
        Self::Midterm,
        Self::Final,
    ];

    /// Persisted integer tag, 1..=6.
    pub fn code(self) -> i64 {
        match self {
            Self::Mp1 => 1,
            Self::Mp2 => 2,
            Self::Mp3 => 3,
            Self::Mp4 => 4,
            Self::Midterm => 5,
            Self::Final => 6,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|mp| mp.code() == code)
    }

    /// Accepts `mp1`..`mp4`, `midterm`, `final` (any case) or the integer tag as text.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mp1" | "1" => Some(Self::Mp1),
            "mp2" | "2" => Some(Self::Mp2),
            "mp3" | "3" => Some(Self::Mp3),
            "mp4" | "4" => Some(Self::Mp4),
            "midterm" | "5" => Some(Self::Midterm),
            "final" | "6" => Some(Self::Final),
            _ => None,
        }
    }

    /// Column in `course_grades` holding this period's percentage.
    pub fn column(self) -> &'static str {
        match self {
            Self::Mp1 => "mp1",
            Self::Mp2 => "mp2",
            Self::Mp3 => "mp3",
            Self::Mp4 => "mp4",
            Self::Midterm => "midterm_exam",
            Self::Final => "final_exam",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Mp1 => "mp1",
            Self::Mp2 => "mp2",
            Self::Mp3 => "mp3",
            Self::Mp4 => "mp4",
            Self::Midterm => "midterm",
            Self::Final => "final",
        }
    }
}

/// The six period percentages of one course grade row, in `MarkingPeriod::ALL` order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PeriodMarks(pub [Option<f64>; 6]);

impl PeriodMarks {
    pub fn get(&self, mp: MarkingPeriod) -> Option<f64> {
        self.0[(mp.code() - 1) as usize]
    }

    pub fn set(&mut self, mp: MarkingPeriod, value: Option<f64>) {
        self.0[(mp.code() - 1) as usize] = value;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RankPolicy {
    Sequential,
    Competition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PercentRounding {
    None,
    NearestWhole,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    pub rank_policy: RankPolicy,
    pub gpa_decimals: u32,
    pub percent_rounding: PercentRounding,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            rank_policy: RankPolicy::Sequential,
            gpa_decimals: 2,
            percent_rounding: PercentRounding::None,
        }
    }
}

pub const MAX_GPA_DECIMALS: u32 = 4;

/// Half-up rounding: `Int(x * 10^places + 0.5) / 10^places`.
pub fn round_half_up(x: f64, places: u32) -> f64 {
    let scale = 10_f64.powi(places as i32);
    ((x * scale) + 0.5).floor() / scale
}

/// Mean of per-assignment percentages; every assignment weighs the same
/// regardless of its point value. `None` when nothing is graded.
pub fn period_average<I>(grades: I) -> Option<f64>
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let mut sum = 0.0_f64;
    let mut count = 0_usize;
    for (earned, possible) in grades {
        if possible <= 0.0 {
            continue;
        }
        sum += 100.0 * earned / possible;
        count += 1;
    }
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Equal-weight mean over the defined periods only.
pub fn course_grade(marks: &PeriodMarks) -> Option<f64> {
    let defined: Vec<f64> = marks.0.iter().flatten().copied().collect();
    if defined.is_empty() {
        return None;
    }
    Some(defined.iter().sum::<f64>() / defined.len() as f64)
}

/// Bracket floors and their quality in tenths of a point.
const QUALITY_TABLE: [(f64, i64); 10] = [
    (93.0, 40),
    (90.0, 37),
    (87.0, 33),
    (83.0, 30),
    (80.0, 27),
    (77.0, 23),
    (73.0, 20),
    (70.0, 17),
    (67.0, 13),
    (65.0, 10),
];

fn quality_tenths(percent: f64, rounding: PercentRounding) -> i64 {
    let p = match rounding {
        PercentRounding::None => percent,
        PercentRounding::NearestWhole => round_half_up(percent, 0),
    };
    QUALITY_TABLE
        .iter()
        .find(|(floor, _)| p >= *floor)
        .map(|(_, q)| *q)
        .unwrap_or(0)
}

/// 4.0-scale quality for a course percentage. Bracket floors are inclusive.
pub fn quality_points(percent: f64, rounding: PercentRounding) -> f64 {
    quality_tenths(percent, rounding) as f64 / 10.0
}

/// Credit-hour weighted GPA over `(course percentage, credit hours)` pairs.
/// `None` when no credit hours qualify.
///
/// Quality points are summed as integer tenths and the half-up rounding is
/// applied to the exact ratio, so ties such as 3.475 land on 3.48.
pub fn weighted_gpa<I>(courses: I, settings: &EngineSettings) -> Option<f64>
where
    I: IntoIterator<Item = (f64, i64)>,
{
    let mut points_tenths = 0_i64;
    let mut hours = 0_i64;
    for (percent, credit_hours) in courses {
        if credit_hours <= 0 {
            continue;
        }
        points_tenths += quality_tenths(percent, settings.percent_rounding) * credit_hours;
        hours += credit_hours;
    }
    if hours == 0 {
        return None;
    }
    let scale = 10_i64.pow(settings.gpa_decimals.min(MAX_GPA_DECIMALS));
    // gpa * scale == num / den; both sides are non-negative.
    let num = points_tenths * scale;
    let den = 10 * hours;
    let scaled = (2 * num + den) / (2 * den);
    Some(scaled as f64 / scale as f64)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankEntry {
    pub student_id: i64,
    pub gpa: f64,
    pub rank: i64,
}

/// Orders by GPA descending, then student id ascending, and numbers the result.
pub fn assign_ranks(mut students: Vec<(i64, f64)>, policy: RankPolicy) -> Vec<RankEntry> {
    students.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });

    let mut out: Vec<RankEntry> = Vec::with_capacity(students.len());
    for (i, (student_id, gpa)) in students.into_iter().enumerate() {
        let position = i as i64 + 1;
        let rank = match (policy, out.last()) {
            (RankPolicy::Competition, Some(prev)) if prev.gpa == gpa => prev.rank,
            _ => position,
        };
        out.push(RankEntry {
            student_id,
            gpa,
            rank,
        });
    }
    out
}

pub fn is_valid_grade_level(level: i64) -> bool {
    (9..=12).contains(&level)
}
