use crate::error::{Result, StoreError};
use crate::model::{
    AppState, AssessmentType, AttendanceRecord, AttendanceStatus, DailyAttendance, Student,
};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Score histogram buckets as (label, inclusive lower bound). A score lands in
/// the last bucket whose lower bound it reaches, so 60/75/90 go up.
pub const SCORE_BUCKETS: [(&str, f64); 4] = [
    ("0-59", 0.0),
    ("60-74", 60.0),
    ("75-89", 75.0),
    ("90-100", 90.0),
];

pub const STRENGTH_THRESHOLD: i64 = 85;

/// Max answer value of a questionnaire item.
pub const MAX_ANSWER_SCORE: u32 = 4;

pub fn round_off_1_decimal(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Arithmetic mean, 0 for an empty scope.
pub fn average(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    scores.iter().sum::<f64>() / scores.len() as f64
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBucket {
    pub range: &'static str,
    pub count: usize,
}

pub fn bucket_index(score: f64) -> usize {
    if score < SCORE_BUCKETS[1].1 {
        0
    } else if score < SCORE_BUCKETS[2].1 {
        1
    } else if score < SCORE_BUCKETS[3].1 {
        2
    } else {
        3
    }
}

pub fn histogram(scores: &[f64]) -> Vec<ScoreBucket> {
    let mut counts = [0usize; 4];
    for s in scores {
        counts[bucket_index(*s)] += 1;
    }
    SCORE_BUCKETS
        .iter()
        .zip(counts)
        .map(|(&(range, _), count)| ScoreBucket { range, count })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSummary {
    pub count: usize,
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub passed: usize,
    pub failed: usize,
    pub histogram: Vec<ScoreBucket>,
}

pub fn summarize_scores(scores: &[f64], kkm: f64) -> ScoreSummary {
    let passed = scores.iter().filter(|s| **s >= kkm).count();
    let (min, max) = if scores.is_empty() {
        (0.0, 0.0)
    } else {
        scores
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
                (lo.min(*s), hi.max(*s))
            })
    };
    ScoreSummary {
        count: scores.len(),
        average: average(scores),
        min,
        max,
        passed,
        failed: scores.len() - passed,
        histogram: histogram(scores),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentStats {
    pub assessment_id: String,
    pub title: String,
    pub max_score: f64,
    pub kkm: f64,
    pub summary: ScoreSummary,
}

/// Live statistics for one assessment over the saved grades of its class.
pub fn assessment_stats(state: &AppState, assessment_id: &str) -> Result<AssessmentStats> {
    let assessment = state
        .assessment(assessment_id)
        .ok_or_else(|| StoreError::not_found("assessment", assessment_id))?;
    let scores: Vec<f64> = state
        .students_in_class(&assessment.class_id)
        .filter_map(|s| state.grade_for(assessment_id, &s.id))
        .map(|g| g.score)
        .collect();
    Ok(AssessmentStats {
        assessment_id: assessment.id.clone(),
        title: assessment.title.clone(),
        max_score: assessment.max_score,
        kkm: state.settings.kkm,
        summary: summarize_scores(&scores, state.settings.kkm),
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassAverage {
    pub class_id: String,
    pub name: String,
    pub average: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypePerformance {
    #[serde(rename = "type")]
    pub kind: AssessmentType,
    pub name: &'static str,
    pub average: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardModel {
    pub total_students: usize,
    pub total_classes: usize,
    pub global_average: f64,
    pub below_kkm_count: usize,
    pub class_averages: Vec<ClassAverage>,
    pub type_performance: Vec<TypePerformance>,
}

pub fn class_average(state: &AppState, class_id: &str) -> f64 {
    let members: HashSet<&str> = state
        .students_in_class(class_id)
        .map(|s| s.id.as_str())
        .collect();
    let scores: Vec<f64> = state
        .grades
        .iter()
        .filter(|g| members.contains(g.student_id.as_str()))
        .map(|g| g.score)
        .collect();
    average(&scores)
}

/// Average per assessment type over every grade in the snapshot. Types with
/// no grades report 0 rather than being dropped.
pub fn type_performance(state: &AppState) -> Vec<TypePerformance> {
    AssessmentType::ALL
        .iter()
        .map(|kind| {
            let ids: HashSet<&str> = state
                .assessments
                .iter()
                .filter(|a| a.kind == *kind)
                .map(|a| a.id.as_str())
                .collect();
            let scores: Vec<f64> = state
                .grades
                .iter()
                .filter(|g| ids.contains(g.assessment_id.as_str()))
                .map(|g| g.score)
                .collect();
            TypePerformance {
                kind: *kind,
                name: kind.short_name(),
                average: round_off_1_decimal(average(&scores)),
            }
        })
        .collect()
}

pub fn dashboard(state: &AppState) -> DashboardModel {
    let scores: Vec<f64> = state.grades.iter().map(|g| g.score).collect();
    let kkm = state.settings.kkm;
    DashboardModel {
        total_students: state.students.len(),
        total_classes: state.classes.len(),
        global_average: round_off_1_decimal(average(&scores)),
        below_kkm_count: scores.iter().filter(|s| **s < kkm).count(),
        class_averages: state
            .classes
            .iter()
            .map(|c| ClassAverage {
                class_id: c.id.clone(),
                name: c.name.clone(),
                average: round_off_1_decimal(class_average(state, &c.id)),
            })
            .collect(),
        type_performance: type_performance(state),
    }
}

/// Sample of grade values handed to the class-trend insight prompt.
pub fn insight_sample(state: &AppState, limit: usize) -> Vec<f64> {
    state.grades.iter().take(limit).map(|g| g.score).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RadarPoint {
    #[serde(rename = "type")]
    pub kind: AssessmentType,
    pub subject: &'static str,
    pub average: f64,
    pub full_mark: f64,
}

/// Per-type sums of one student's grades on the assessments of a class.
fn student_type_totals(
    state: &AppState,
    class_id: &str,
    student_id: &str,
) -> BTreeMap<AssessmentType, (f64, usize)> {
    let mut totals: BTreeMap<AssessmentType, (f64, usize)> = BTreeMap::new();
    for a in state.assessments.iter().filter(|a| a.class_id == class_id) {
        if let Some(g) = state.grade_for(&a.id, student_id) {
            let entry = totals.entry(a.kind).or_insert((0.0, 0));
            entry.0 += g.score;
            entry.1 += 1;
        }
    }
    totals
}

/// Competency balance for one student. Only types the student has at least
/// one grade in are included.
pub fn student_radar(state: &AppState, class_id: &str, student_id: &str) -> Vec<RadarPoint> {
    student_type_totals(state, class_id, student_id)
        .into_iter()
        .filter(|(_, (_, count))| *count > 0)
        .map(|(kind, (total, count))| RadarPoint {
            kind,
            subject: kind.short_name(),
            average: total / count as f64,
            full_mark: 100.0,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub assessment_id: String,
    pub name: String,
    pub date: String,
    pub student_score: Option<f64>,
    pub class_average: f64,
}

pub fn student_trend(state: &AppState, class_id: &str, student_id: &str) -> Vec<TrendPoint> {
    let mut assessments: Vec<_> = state
        .assessments
        .iter()
        .filter(|a| a.class_id == class_id)
        .collect();
    // Stable sort keeps insertion order for equal dates.
    assessments.sort_by(|a, b| a.date.cmp(&b.date));
    assessments
        .into_iter()
        .map(|a| {
            let scores: Vec<f64> = state
                .grades
                .iter()
                .filter(|g| g.assessment_id == a.id)
                .map(|g| g.score)
                .collect();
            TrendPoint {
                assessment_id: a.id.clone(),
                name: a.title.clone(),
                date: a.date.clone(),
                student_score: state.grade_for(&a.id, student_id).map(|g| g.score),
                class_average: round_off_1_decimal(average(&scores)),
            }
        })
        .collect()
}

/// Report-card final grade: unweighted mean of the per-type means over the
/// types that have at least one graded assessment. `Assessment::weight` is
/// deliberately not consulted.
pub fn final_grade(state: &AppState, class_id: &str, student_id: &str) -> f64 {
    let per_type: Vec<f64> = student_type_totals(state, class_id, student_id)
        .values()
        .filter(|(_, count)| *count > 0)
        .map(|(total, count)| total / *count as f64)
        .collect();
    average(&per_type)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    #[serde(rename = "type")]
    pub kind: AssessmentType,
    /// `None` when the class has no assessment of this type.
    pub average: Option<i64>,
    pub predicate: &'static str,
}

pub fn predicate(value: i64) -> &'static str {
    if value >= 90 {
        "A (Sangat Baik)"
    } else if value >= 80 {
        "B (Baik)"
    } else if value >= 70 {
        "C (Cukup)"
    } else if value > 0 {
        "D (Kurang)"
    } else {
        "-"
    }
}

/// Per-type rows of the printed report. Unlike the radar, a missing grade on
/// an existing assessment counts as 0 here.
pub fn report_breakdown(state: &AppState, class_id: &str, student_id: &str) -> Vec<ReportRow> {
    AssessmentType::ALL
        .iter()
        .map(|kind| {
            let scores: Vec<f64> = state
                .assessments
                .iter()
                .filter(|a| a.kind == *kind && a.class_id == class_id)
                .map(|a| {
                    state
                        .grade_for(&a.id, student_id)
                        .map(|g| g.score)
                        .unwrap_or(0.0)
                })
                .collect();
            let avg = (!scores.is_empty()).then(|| average(&scores).round() as i64);
            ReportRow {
                kind: *kind,
                average: avg,
                predicate: predicate(avg.unwrap_or(0)),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    #[serde(rename = "H")]
    pub h: usize,
    #[serde(rename = "S")]
    pub s: usize,
    #[serde(rename = "I")]
    pub i: usize,
    #[serde(rename = "A")]
    pub a: usize,
    #[serde(rename = "T")]
    pub t: usize,
    pub total: usize,
}

impl StatusCounts {
    pub fn add(&mut self, status: AttendanceStatus) {
        match status {
            AttendanceStatus::H => self.h += 1,
            AttendanceStatus::S => self.s += 1,
            AttendanceStatus::I => self.i += 1,
            AttendanceStatus::A => self.a += 1,
            AttendanceStatus::T => self.t += 1,
        }
        self.total += 1;
    }

    pub fn get(&self, status: AttendanceStatus) -> usize {
        match status {
            AttendanceStatus::H => self.h,
            AttendanceStatus::S => self.s,
            AttendanceStatus::I => self.i,
            AttendanceStatus::A => self.a,
            AttendanceStatus::T => self.t,
        }
    }

    pub fn present(&self) -> usize {
        AttendanceStatus::ALL
            .iter()
            .filter(|st| st.is_present())
            .map(|st| self.get(*st))
            .sum()
    }

    fn merge(&mut self, other: &StatusCounts) {
        self.h += other.h;
        self.s += other.s;
        self.i += other.i;
        self.a += other.a;
        self.t += other.t;
        self.total += other.total;
    }
}

/// Present rate in whole percent. Sessions are the recorded sheets, so an
/// empty period is 0% rather than undefined.
pub fn present_rate(counts: &StatusCounts, sessions: usize) -> u32 {
    if sessions == 0 {
        return 0;
    }
    ((counts.present() as f64 / sessions as f64) * 100.0).round() as u32
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecap {
    pub student_id: String,
    pub name: String,
    pub counts: StatusCounts,
    pub present_rate: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSlice {
    pub status: AttendanceStatus,
    pub name: &'static str,
    pub value: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecap {
    pub class_id: String,
    pub month: String,
    pub total_days: usize,
    pub students: Vec<StudentRecap>,
    pub totals: StatusCounts,
    /// Non-zero status totals, for the class pie chart.
    pub chart: Vec<StatusSlice>,
}

/// Accepts `YYYY-MM` and returns it normalized.
pub fn parse_month_prefix(month: &str) -> Result<String> {
    let t = month.trim();
    NaiveDate::parse_from_str(&format!("{}-01", t), "%Y-%m-%d")
        .map(|d| d.format("%Y-%m").to_string())
        .map_err(|_| StoreError::validation("month must be YYYY-MM"))
}

fn sorted_by_name<'a>(students: impl Iterator<Item = &'a Student>) -> Vec<&'a Student> {
    let mut v: Vec<&Student> = students.collect();
    v.sort_by(|a, b| a.name.cmp(&b.name));
    v
}

pub fn attendance_recap(state: &AppState, class_id: &str, month: &str) -> Result<AttendanceRecap> {
    if state.class(class_id).is_none() {
        return Err(StoreError::not_found("class", class_id));
    }
    let prefix = parse_month_prefix(month)?;
    let sheets: Vec<_> = state
        .daily_attendance
        .iter()
        .filter(|d| d.class_id == class_id && d.date.starts_with(&prefix))
        .collect();

    let mut students = Vec::new();
    let mut totals = StatusCounts::default();
    for s in sorted_by_name(state.students_in_class(class_id)) {
        let mut counts = StatusCounts::default();
        for sheet in &sheets {
            if let Some(rec) = sheet_record(sheet, &s.id) {
                counts.add(rec.status);
            }
        }
        totals.merge(&counts);
        students.push(StudentRecap {
            student_id: s.id.clone(),
            name: s.name.clone(),
            present_rate: present_rate(&counts, sheets.len()),
            counts,
        });
    }

    let chart = AttendanceStatus::ALL
        .iter()
        .map(|st| StatusSlice {
            status: *st,
            name: st.label(),
            value: totals.get(*st),
        })
        .filter(|slice| slice.value > 0)
        .collect();

    Ok(AttendanceRecap {
        class_id: class_id.to_string(),
        month: prefix,
        total_days: sheets.len(),
        students,
        totals,
        chart,
    })
}

/// Attendance of one student across every recorded sheet of the class.
pub fn student_attendance(state: &AppState, class_id: &str, student_id: &str) -> StatusCounts {
    let mut counts = StatusCounts::default();
    for sheet in state.daily_attendance.iter().filter(|d| d.class_id == class_id) {
        if let Some(rec) = sheet_record(sheet, student_id) {
            counts.add(rec.status);
        }
    }
    counts
}

/// A student's record on one sheet. Duplicates in an imported sheet count
/// once; the first one wins.
fn sheet_record<'a>(
    sheet: &'a DailyAttendance,
    student_id: &str,
) -> Option<&'a AttendanceRecord> {
    sheet.records.iter().find(|r| r.student_id == student_id)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportCard {
    pub school_name: String,
    pub teacher_name: String,
    pub class_id: String,
    pub class_name: String,
    pub academic_year: String,
    pub student_id: String,
    pub student_name: String,
    pub nis: String,
    pub rows: Vec<ReportRow>,
    pub final_grade: f64,
    pub attendance: StatusCounts,
    pub strengths: Vec<AssessmentType>,
    pub weaknesses: Vec<AssessmentType>,
}

pub fn report_card(state: &AppState, class_id: &str, student_id: &str) -> Result<ReportCard> {
    let class = state
        .class(class_id)
        .ok_or_else(|| StoreError::not_found("class", class_id))?;
    let student = state
        .student(student_id)
        .filter(|s| s.class_id == class_id)
        .ok_or_else(|| StoreError::not_found("student", student_id))?;

    let rows = report_breakdown(state, class_id, student_id);
    let kkm = state.settings.kkm;
    let strengths = rows
        .iter()
        .filter(|r| r.average.map(|v| v >= STRENGTH_THRESHOLD).unwrap_or(false))
        .map(|r| r.kind)
        .collect();
    let weaknesses = rows
        .iter()
        .filter(|r| r.average.map(|v| (v as f64) < kkm).unwrap_or(false))
        .map(|r| r.kind)
        .collect();

    Ok(ReportCard {
        school_name: state.settings.school_name.clone(),
        teacher_name: state.settings.teacher_name.clone(),
        class_id: class.id.clone(),
        class_name: class.name.clone(),
        academic_year: class.year.clone(),
        student_id: student.id.clone(),
        student_name: student.name.clone(),
        nis: student.nis.clone(),
        final_grade: round_off_1_decimal(final_grade(state, class_id, student_id)),
        attendance: student_attendance(state, class_id, student_id),
        rows,
        strengths,
        weaknesses,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryScore {
    pub category: String,
    pub score: u32,
    pub max_score: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TalentProfile {
    pub questionnaire_id: String,
    pub student_id: String,
    pub categories: Vec<CategoryScore>,
    pub ai_analysis: Option<String>,
}

/// Sums a student's answers per question category. `None` when the student
/// has not responded.
pub fn talent_profile(
    state: &AppState,
    questionnaire_id: &str,
    student_id: &str,
) -> Option<TalentProfile> {
    let questionnaire = state.questionnaire(questionnaire_id)?;
    let response = state.response_for(questionnaire_id, student_id)?;

    let mut order: Vec<String> = Vec::new();
    let mut sums: BTreeMap<String, (u32, u32)> = BTreeMap::new();
    for q in &questionnaire.questions {
        let value = response.answers.get(&q.id).copied().unwrap_or(0) as u32;
        let entry = sums.entry(q.category.clone()).or_insert_with(|| {
            order.push(q.category.clone());
            (0, 0)
        });
        entry.0 += value;
        entry.1 += MAX_ANSWER_SCORE;
    }

    let categories = order
        .into_iter()
        .map(|category| {
            let (score, max_score) = sums.get(&category).copied().unwrap_or((0, 0));
            CategoryScore {
                category,
                score,
                max_score,
            }
        })
        .collect();

    Some(TalentProfile {
        questionnaire_id: questionnaire_id.to_string(),
        student_id: student_id.to_string(),
        categories,
        ai_analysis: response.ai_analysis.clone(),
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionnaireOverview {
    pub questionnaire_id: String,
    pub title: String,
    pub question_count: usize,
    pub response_count: usize,
}

pub fn questionnaire_overview(state: &AppState) -> Vec<QuestionnaireOverview> {
    state
        .questionnaires
        .iter()
        .map(|q| QuestionnaireOverview {
            questionnaire_id: q.id.clone(),
            title: q.title.clone(),
            question_count: q.questions.len(),
            response_count: state
                .questionnaire_responses
                .iter()
                .filter(|r| r.questionnaire_id == q.id)
                .count(),
        })
        .collect()
}
