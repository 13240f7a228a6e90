//! Replace-snapshot mutations.
//!
//! Every function takes the current snapshot by reference and returns a new
//! one. Validation runs before anything is copied, so an `Err` always means
//! the caller's snapshot is still the authoritative state.

use crate::error::{Result, StoreError};
use crate::model::{
    attendance_id, new_id, response_id, AppState, Assessment, AssessmentType, AttendanceRecord,
    ClassGroup, DailyAttendance, ExamPackage, ExamQuestion, ForumComment, ForumPost, ForumRole,
    Gender, Grade, Question, Questionnaire, QuestionnaireResponse, QuestionKind, Settings,
    Student, TeachingJournal,
};
use chrono::{Datelike, Local, NaiveDate, SecondsFormat, Utc};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};

pub const DEFAULT_GRADE_LEVEL: i64 = 10;
pub const DEFAULT_MAX_SCORE: f64 = 100.0;
pub const DEFAULT_WEIGHT: f64 = 10.0;
pub const MIN_ANSWER: u8 = 1;
pub const MAX_ANSWER: u8 = 4;

pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn required(value: &str, field: &str) -> Result<String> {
    let t = value.trim();
    if t.is_empty() {
        return Err(StoreError::validation(format!("{} is required", field)));
    }
    Ok(t.to_string())
}

fn required_date(value: &str, field: &str) -> Result<String> {
    let t = required(value, field)?;
    NaiveDate::parse_from_str(&t, "%Y-%m-%d")
        .map_err(|_| StoreError::validation(format!("{} must be YYYY-MM-DD", field)))?;
    Ok(t)
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ----- settings -----

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub kkm: Option<f64>,
    pub school_name: Option<String>,
    pub teacher_name: Option<String>,
}

pub fn update_settings(state: &AppState, patch: SettingsPatch) -> Result<AppState> {
    if let Some(kkm) = patch.kkm {
        if !kkm.is_finite() || !(0.0..=100.0).contains(&kkm) {
            return Err(StoreError::validation("kkm must be between 0 and 100"));
        }
    }
    let current = &state.settings;
    Ok(AppState {
        settings: Settings {
            kkm: patch.kkm.unwrap_or(current.kkm),
            school_name: patch
                .school_name
                .map(|s| s.trim().to_string())
                .unwrap_or_else(|| current.school_name.clone()),
            teacher_name: patch
                .teacher_name
                .map(|s| s.trim().to_string())
                .unwrap_or_else(|| current.teacher_name.clone()),
        },
        ..state.clone()
    })
}

// ----- classes -----

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDraft {
    #[serde(default)]
    pub name: String,
    pub grade_level: Option<i64>,
    pub year: Option<String>,
}

pub fn create_class(state: &AppState, draft: ClassDraft) -> Result<(AppState, ClassGroup)> {
    let class = ClassGroup {
        id: new_id(),
        name: required(&draft.name, "name")?,
        grade_level: draft.grade_level.unwrap_or(DEFAULT_GRADE_LEVEL),
        year: optional_text(draft.year).unwrap_or_else(|| Local::now().year().to_string()),
    };
    let mut next = state.clone();
    next.classes.push(class.clone());
    Ok((next, class))
}

pub fn update_class(state: &AppState, class_id: &str, draft: ClassDraft) -> Result<AppState> {
    let name = required(&draft.name, "name")?;
    if state.class(class_id).is_none() {
        return Err(StoreError::not_found("class", class_id));
    }
    let year = optional_text(draft.year);
    let classes = state
        .classes
        .iter()
        .map(|c| {
            if c.id != class_id {
                return c.clone();
            }
            ClassGroup {
                id: c.id.clone(),
                name: name.clone(),
                grade_level: draft.grade_level.unwrap_or(c.grade_level),
                year: year.clone().unwrap_or_else(|| c.year.clone()),
            }
        })
        .collect();
    Ok(AppState {
        classes,
        ..state.clone()
    })
}

/// Removes a class and everything that hangs off it: its students, its
/// assessments, grades of either, its attendance sheets and journals, and
/// questionnaire responses of its students.
pub fn delete_class(state: &AppState, class_id: &str) -> Result<AppState> {
    if state.class(class_id).is_none() {
        return Err(StoreError::not_found("class", class_id));
    }
    let student_ids: HashSet<&str> = state
        .students_in_class(class_id)
        .map(|s| s.id.as_str())
        .collect();
    let assessment_ids: HashSet<&str> = state
        .assessments
        .iter()
        .filter(|a| a.class_id == class_id)
        .map(|a| a.id.as_str())
        .collect();

    Ok(AppState {
        classes: state
            .classes
            .iter()
            .filter(|c| c.id != class_id)
            .cloned()
            .collect(),
        students: state
            .students
            .iter()
            .filter(|s| s.class_id != class_id)
            .cloned()
            .collect(),
        assessments: state
            .assessments
            .iter()
            .filter(|a| a.class_id != class_id)
            .cloned()
            .collect(),
        grades: state
            .grades
            .iter()
            .filter(|g| {
                !student_ids.contains(g.student_id.as_str())
                    && !assessment_ids.contains(g.assessment_id.as_str())
            })
            .cloned()
            .collect(),
        daily_attendance: state
            .daily_attendance
            .iter()
            .filter(|d| d.class_id != class_id)
            .cloned()
            .collect(),
        journals: state
            .journals
            .iter()
            .filter(|j| j.class_id != class_id)
            .cloned()
            .collect(),
        questionnaire_responses: state
            .questionnaire_responses
            .iter()
            .filter(|r| !student_ids.contains(r.student_id.as_str()))
            .cloned()
            .collect(),
        ..state.clone()
    })
}

// ----- students -----

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentDraft {
    #[serde(default)]
    pub nis: String,
    #[serde(default)]
    pub name: String,
    pub gender: Option<Gender>,
    pub photo_url: Option<String>,
    pub birth_date: Option<String>,
    pub parent_name: Option<String>,
    pub parent_phone: Option<String>,
    pub address: Option<String>,
    pub email: Option<String>,
    pub notes: Option<String>,
}

fn build_student(id: String, class_id: String, draft: StudentDraft) -> Result<Student> {
    Ok(Student {
        id,
        class_id,
        nis: required(&draft.nis, "nis")?,
        name: required(&draft.name, "name")?,
        gender: draft.gender.unwrap_or_default(),
        photo_url: optional_text(draft.photo_url),
        birth_date: optional_text(draft.birth_date),
        parent_name: optional_text(draft.parent_name),
        parent_phone: optional_text(draft.parent_phone),
        address: optional_text(draft.address),
        email: optional_text(draft.email),
        notes: optional_text(draft.notes),
    })
}

pub fn create_student(
    state: &AppState,
    class_id: &str,
    draft: StudentDraft,
) -> Result<(AppState, Student)> {
    if state.class(class_id).is_none() {
        return Err(StoreError::not_found("class", class_id));
    }
    let student = build_student(new_id(), class_id.to_string(), draft)?;
    let mut next = state.clone();
    next.students.push(student.clone());
    Ok((next, student))
}

/// Replaces the profile fields of a student. The owning class is kept.
pub fn update_student(state: &AppState, student_id: &str, draft: StudentDraft) -> Result<AppState> {
    let Some(existing) = state.student(student_id) else {
        return Err(StoreError::not_found("student", student_id));
    };
    let updated = build_student(existing.id.clone(), existing.class_id.clone(), draft)?;
    let students = state
        .students
        .iter()
        .map(|s| {
            if s.id == student_id {
                updated.clone()
            } else {
                s.clone()
            }
        })
        .collect();
    Ok(AppState {
        students,
        ..state.clone()
    })
}

fn strip_records(records: &[AttendanceRecord], student_id: &str) -> Vec<AttendanceRecord> {
    records
        .iter()
        .filter(|r| r.student_id != student_id)
        .cloned()
        .collect()
}

/// Removes a student with their grades, questionnaire responses and the
/// attendance records that name them.
pub fn delete_student(state: &AppState, student_id: &str) -> Result<AppState> {
    if state.student(student_id).is_none() {
        return Err(StoreError::not_found("student", student_id));
    }
    Ok(AppState {
        students: state
            .students
            .iter()
            .filter(|s| s.id != student_id)
            .cloned()
            .collect(),
        grades: state
            .grades
            .iter()
            .filter(|g| g.student_id != student_id)
            .cloned()
            .collect(),
        questionnaire_responses: state
            .questionnaire_responses
            .iter()
            .filter(|r| r.student_id != student_id)
            .cloned()
            .collect(),
        daily_attendance: state
            .daily_attendance
            .iter()
            .map(|d| DailyAttendance {
                records: strip_records(&d.records, student_id),
                ..d.clone()
            })
            .collect(),
        journals: state
            .journals
            .iter()
            .map(|j| TeachingJournal {
                attendance: strip_records(&j.attendance, student_id),
                ..j.clone()
            })
            .collect(),
        ..state.clone()
    })
}

/// Bulk roster import from pasted `NIS,Nama,L/P` lines. Lines without both
/// NIS and name are skipped; gender defaults to L unless the column is `P`.
pub fn import_students_csv(
    state: &AppState,
    class_id: &str,
    text: &str,
) -> Result<(AppState, Vec<Student>)> {
    if state.class(class_id).is_none() {
        return Err(StoreError::not_found("class", class_id));
    }
    let mut added = Vec::new();
    for line in text.lines() {
        let mut cols = line.split(',');
        let nis = cols.next().unwrap_or("").trim();
        let name = cols.next().unwrap_or("").trim();
        if nis.is_empty() || name.is_empty() {
            continue;
        }
        let gender = match cols.next().map(|g| g.trim().to_ascii_uppercase()) {
            Some(g) if g == "P" => Gender::P,
            _ => Gender::L,
        };
        added.push(Student {
            id: new_id(),
            nis: nis.to_string(),
            name: name.to_string(),
            gender,
            class_id: class_id.to_string(),
            photo_url: None,
            birth_date: None,
            parent_name: None,
            parent_phone: None,
            address: None,
            email: None,
            notes: None,
        });
    }
    if added.is_empty() {
        return Err(StoreError::validation(
            "no valid rows; expected NIS,Nama,L/P per line",
        ));
    }
    let mut next = state.clone();
    next.students.extend(added.iter().cloned());
    Ok((next, added))
}

// ----- assessments & grades -----

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentDraft {
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type")]
    pub kind: Option<AssessmentType>,
    #[serde(default)]
    pub date: String,
    pub max_score: Option<f64>,
    pub weight: Option<f64>,
}

fn positive_or(value: Option<f64>, default: f64) -> f64 {
    // A zero/blank form value falls back to the default, like the entry form did.
    match value {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => default,
    }
}

pub fn create_assessment(
    state: &AppState,
    class_id: &str,
    draft: AssessmentDraft,
) -> Result<(AppState, Assessment)> {
    let title = required(&draft.title, "title")?;
    let date = required_date(&draft.date, "date")?;
    if state.class(class_id).is_none() {
        return Err(StoreError::not_found("class", class_id));
    }
    let assessment = Assessment {
        id: new_id(),
        title,
        kind: draft.kind.unwrap_or_default(),
        class_id: class_id.to_string(),
        date,
        max_score: positive_or(draft.max_score, DEFAULT_MAX_SCORE),
        weight: positive_or(draft.weight, DEFAULT_WEIGHT),
    };
    let mut next = state.clone();
    next.assessments.push(assessment.clone());
    Ok((next, assessment))
}

pub fn update_assessment(
    state: &AppState,
    assessment_id: &str,
    draft: AssessmentDraft,
) -> Result<AppState> {
    let title = required(&draft.title, "title")?;
    let date = required_date(&draft.date, "date")?;
    let Some(current) = state.assessment(assessment_id) else {
        return Err(StoreError::not_found("assessment", assessment_id));
    };
    let max_score = positive_or(draft.max_score, current.max_score);
    let assessments = state
        .assessments
        .iter()
        .map(|a| {
            if a.id != assessment_id {
                return a.clone();
            }
            Assessment {
                title: title.clone(),
                date: date.clone(),
                kind: draft.kind.unwrap_or(a.kind),
                max_score,
                weight: draft.weight.unwrap_or(a.weight),
                ..a.clone()
            }
        })
        .collect();
    // Saved scores must stay within the (possibly lowered) maximum.
    let grades = state
        .grades
        .iter()
        .map(|g| {
            if g.assessment_id != assessment_id {
                return g.clone();
            }
            Grade {
                score: clamp_score(Some(g.score), max_score),
                ..g.clone()
            }
        })
        .collect();
    Ok(AppState {
        assessments,
        grades,
        ..state.clone()
    })
}

pub fn delete_assessment(state: &AppState, assessment_id: &str) -> Result<AppState> {
    if state.assessment(assessment_id).is_none() {
        return Err(StoreError::not_found("assessment", assessment_id));
    }
    Ok(AppState {
        assessments: state
            .assessments
            .iter()
            .filter(|a| a.id != assessment_id)
            .cloned()
            .collect(),
        grades: state
            .grades
            .iter()
            .filter(|g| g.assessment_id != assessment_id)
            .cloned()
            .collect(),
        ..state.clone()
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeEntry {
    pub student_id: String,
    pub score: Option<f64>,
    pub feedback: Option<String>,
}

/// Entry-time clamp: blank or non-numeric is 0, values are bounded to
/// [0, max_score].
pub fn clamp_score(score: Option<f64>, max_score: f64) -> f64 {
    match score {
        Some(v) if v.is_finite() => v.max(0.0).min(max_score),
        _ => 0.0,
    }
}

/// Saves a batch of scores for one assessment, upserting by
/// (assessmentId, studentId).
pub fn save_grades(
    state: &AppState,
    assessment_id: &str,
    entries: Vec<GradeEntry>,
) -> Result<AppState> {
    let Some(assessment) = state.assessment(assessment_id) else {
        return Err(StoreError::not_found("assessment", assessment_id));
    };
    for e in &entries {
        match state.student(&e.student_id) {
            Some(s) if s.class_id == assessment.class_id => {}
            _ => return Err(StoreError::not_found("student", &e.student_id)),
        }
    }

    let mut grades = state.grades.clone();
    for e in entries {
        let score = clamp_score(e.score, assessment.max_score);
        match grades
            .iter()
            .position(|g| g.assessment_id == assessment_id && g.student_id == e.student_id)
        {
            Some(idx) => {
                let g = &mut grades[idx];
                g.score = score;
                if e.feedback.is_some() {
                    g.feedback = optional_text(e.feedback);
                }
            }
            None => grades.push(Grade {
                assessment_id: assessment_id.to_string(),
                student_id: e.student_id,
                score,
                feedback: optional_text(e.feedback),
            }),
        }
    }
    Ok(AppState {
        grades,
        ..state.clone()
    })
}

// ----- attendance -----

/// Completes a record list against the current roster of a class: roster
/// order, unknown students dropped, missing students present.
fn normalize_roster(
    state: &AppState,
    class_id: &str,
    records: &[AttendanceRecord],
) -> Vec<AttendanceRecord> {
    state
        .students_in_class(class_id)
        .map(|s| {
            records
                .iter()
                .find(|r| r.student_id == s.id)
                .map(|r| AttendanceRecord {
                    note: optional_text(r.note.clone()),
                    ..r.clone()
                })
                .unwrap_or_else(|| AttendanceRecord::present(&s.id))
        })
        .collect()
}

/// Attendance sheet for a class/date, falling back to everyone present.
pub fn attendance_for_date(
    state: &AppState,
    class_id: &str,
    date: &str,
) -> Result<Vec<AttendanceRecord>> {
    if state.class(class_id).is_none() {
        return Err(StoreError::not_found("class", class_id));
    }
    let date = required_date(date, "date")?;
    let existing = state
        .daily_attendance
        .iter()
        .find(|d| d.class_id == class_id && d.date == date)
        .map(|d| d.records.as_slice())
        .unwrap_or(&[]);
    Ok(normalize_roster(state, class_id, existing))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSheetDraft {
    #[serde(default)]
    pub class_id: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub records: Vec<AttendanceRecord>,
}

/// Upserts the attendance sheet keyed by (classId, date).
pub fn save_attendance(
    state: &AppState,
    draft: AttendanceSheetDraft,
) -> Result<(AppState, DailyAttendance)> {
    let class_id = required(&draft.class_id, "classId")?;
    let date = required_date(&draft.date, "date")?;
    if state.class(&class_id).is_none() {
        return Err(StoreError::not_found("class", &class_id));
    }
    let sheet = DailyAttendance {
        id: attendance_id(&class_id, &date),
        records: normalize_roster(state, &class_id, &draft.records),
        date,
        class_id,
    };
    let mut next = state.clone();
    match next
        .daily_attendance
        .iter()
        .position(|d| d.class_id == sheet.class_id && d.date == sheet.date)
    {
        Some(idx) => next.daily_attendance[idx] = sheet.clone(),
        None => next.daily_attendance.push(sheet.clone()),
    }
    Ok((next, sheet))
}

// ----- journals -----

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalDraft {
    pub id: Option<String>,
    #[serde(default)]
    pub class_id: String,
    #[serde(default)]
    pub date: String,
    pub time_start: Option<String>,
    pub time_end: Option<String>,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub activity: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub attendance: Vec<AttendanceRecord>,
}

/// Creates (newest first) or replaces a teaching journal entry. Its
/// attendance snapshot is independent of the daily attendance sheets.
pub fn save_journal(state: &AppState, draft: JournalDraft) -> Result<(AppState, TeachingJournal)> {
    let class_id = required(&draft.class_id, "classId")?;
    let subject = required(&draft.subject, "subject")?;
    let topic = required(&draft.topic, "topic")?;
    let date = required_date(&draft.date, "date")?;
    if state.class(&class_id).is_none() {
        return Err(StoreError::not_found("class", &class_id));
    }
    let existing_id = draft.id.filter(|id| !id.trim().is_empty());
    if let Some(id) = &existing_id {
        if !state.journals.iter().any(|j| &j.id == id) {
            return Err(StoreError::not_found("journal", id));
        }
    }

    let journal = TeachingJournal {
        id: existing_id.clone().unwrap_or_else(new_id),
        attendance: normalize_roster(state, &class_id, &draft.attendance),
        class_id,
        date,
        time_start: optional_text(draft.time_start).unwrap_or_else(|| "07:00".to_string()),
        time_end: optional_text(draft.time_end).unwrap_or_else(|| "08:30".to_string()),
        subject,
        topic,
        activity: draft.activity.trim().to_string(),
        notes: draft.notes.trim().to_string(),
    };

    let journals = match existing_id {
        Some(id) => state
            .journals
            .iter()
            .map(|j| if j.id == id { journal.clone() } else { j.clone() })
            .collect(),
        None => std::iter::once(journal.clone())
            .chain(state.journals.iter().cloned())
            .collect(),
    };
    Ok((
        AppState {
            journals,
            ..state.clone()
        },
        journal,
    ))
}

pub fn delete_journal(state: &AppState, journal_id: &str) -> Result<AppState> {
    if !state.journals.iter().any(|j| j.id == journal_id) {
        return Err(StoreError::not_found("journal", journal_id));
    }
    Ok(AppState {
        journals: state
            .journals
            .iter()
            .filter(|j| j.id != journal_id)
            .cloned()
            .collect(),
        ..state.clone()
    })
}

// ----- questionnaires -----

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDraft {
    pub id: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub category: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionnaireDraft {
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub questions: Vec<QuestionDraft>,
}

pub fn save_questionnaire(
    state: &AppState,
    draft: QuestionnaireDraft,
) -> Result<(AppState, Questionnaire)> {
    let title = required(&draft.title, "title")?;
    if draft.questions.is_empty() {
        return Err(StoreError::validation("at least one question is required"));
    }
    let mut questions = Vec::with_capacity(draft.questions.len());
    for (idx, q) in draft.questions.into_iter().enumerate() {
        questions.push(Question {
            id: q
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(new_id),
            text: required(&q.text, &format!("questions[{}].text", idx))?,
            category: required(&q.category, &format!("questions[{}].category", idx))?,
        });
    }

    let existing_id = draft.id.filter(|id| !id.trim().is_empty());
    if let Some(id) = &existing_id {
        if state.questionnaire(id).is_none() {
            return Err(StoreError::not_found("questionnaire", id));
        }
    }
    let questionnaire = Questionnaire {
        id: existing_id.clone().unwrap_or_else(new_id),
        title,
        description: draft.description.trim().to_string(),
        questions,
    };
    let mut next = state.clone();
    match existing_id {
        Some(id) => {
            for q in next.questionnaires.iter_mut().filter(|q| q.id == id) {
                *q = questionnaire.clone();
            }
        }
        None => next.questionnaires.push(questionnaire.clone()),
    }
    Ok((next, questionnaire))
}

pub fn delete_questionnaire(state: &AppState, questionnaire_id: &str) -> Result<AppState> {
    if state.questionnaire(questionnaire_id).is_none() {
        return Err(StoreError::not_found("questionnaire", questionnaire_id));
    }
    Ok(AppState {
        questionnaires: state
            .questionnaires
            .iter()
            .filter(|q| q.id != questionnaire_id)
            .cloned()
            .collect(),
        questionnaire_responses: state
            .questionnaire_responses
            .iter()
            .filter(|r| r.questionnaire_id != questionnaire_id)
            .cloned()
            .collect(),
        ..state.clone()
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseDraft {
    #[serde(default)]
    pub questionnaire_id: String,
    #[serde(default)]
    pub student_id: String,
    #[serde(default)]
    pub answers: BTreeMap<String, u8>,
}

/// Upserts a student's answers by (questionnaireId, studentId). Every
/// question must be answered on the 1..=4 scale. A re-submission replaces
/// the previous response, cached analysis included.
pub fn save_response(
    state: &AppState,
    draft: ResponseDraft,
) -> Result<(AppState, QuestionnaireResponse)> {
    let Some(questionnaire) = state.questionnaire(&draft.questionnaire_id) else {
        return Err(StoreError::not_found("questionnaire", &draft.questionnaire_id));
    };
    if state.student(&draft.student_id).is_none() {
        return Err(StoreError::not_found("student", &draft.student_id));
    }
    let mut answers = BTreeMap::new();
    for q in &questionnaire.questions {
        let Some(v) = draft.answers.get(&q.id).copied() else {
            return Err(StoreError::validation("all questions must be answered"));
        };
        if !(MIN_ANSWER..=MAX_ANSWER).contains(&v) {
            return Err(StoreError::validation(format!(
                "answer for {} must be between {} and {}",
                q.id, MIN_ANSWER, MAX_ANSWER
            )));
        }
        answers.insert(q.id.clone(), v);
    }

    let response = QuestionnaireResponse {
        id: response_id(&draft.questionnaire_id, &draft.student_id),
        questionnaire_id: draft.questionnaire_id,
        student_id: draft.student_id,
        date: now_iso(),
        answers,
        ai_analysis: None,
    };
    let mut next = state.clone();
    match next.questionnaire_responses.iter().position(|r| {
        r.questionnaire_id == response.questionnaire_id && r.student_id == response.student_id
    }) {
        Some(idx) => next.questionnaire_responses[idx] = response.clone(),
        None => next.questionnaire_responses.push(response.clone()),
    }
    Ok((next, response))
}

/// Attaches an AI narrative to the response that exists *now* for the
/// composite key. If it was deleted while the analysis ran, nothing changes.
pub fn attach_talent_analysis(
    state: &AppState,
    questionnaire_id: &str,
    student_id: &str,
    analysis: String,
) -> Result<AppState> {
    if state.response_for(questionnaire_id, student_id).is_none() {
        return Err(StoreError::not_found(
            "response",
            &response_id(questionnaire_id, student_id),
        ));
    }
    let questionnaire_responses = state
        .questionnaire_responses
        .iter()
        .map(|r| {
            if r.questionnaire_id == questionnaire_id && r.student_id == student_id {
                QuestionnaireResponse {
                    ai_analysis: Some(analysis.clone()),
                    ..r.clone()
                }
            } else {
                r.clone()
            }
        })
        .collect();
    Ok(AppState {
        questionnaire_responses,
        ..state.clone()
    })
}

// ----- exam packages -----

pub fn validate_question(q: &ExamQuestion) -> Result<()> {
    if q.text.trim().is_empty() {
        return Err(StoreError::validation("question text is required"));
    }
    if !q.points.is_finite() || q.points < 0.0 {
        return Err(StoreError::validation("question points must be >= 0"));
    }
    match &q.kind {
        QuestionKind::MultipleChoice { options } => {
            if options.len() < 2 {
                return Err(StoreError::validation(
                    "multiple choice needs at least 2 options",
                ));
            }
            let correct = options.iter().filter(|o| o.is_correct).count();
            if correct != 1 {
                return Err(StoreError::validation(
                    "multiple choice needs exactly one correct option",
                ));
            }
        }
        QuestionKind::Essay { .. } | QuestionKind::TrueFalse { .. } => {}
    }
    Ok(())
}

fn with_ids(mut q: ExamQuestion) -> ExamQuestion {
    if q.id.trim().is_empty() {
        q.id = new_id();
    }
    if let QuestionKind::MultipleChoice { options } = &mut q.kind {
        for o in options.iter_mut().filter(|o| o.id.trim().is_empty()) {
            o.id = new_id();
        }
    }
    q
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamDraft {
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub subject: String,
    pub grade_level: Option<i64>,
    #[serde(default)]
    pub questions: Vec<ExamQuestion>,
}

pub fn save_exam(state: &AppState, draft: ExamDraft) -> Result<(AppState, ExamPackage)> {
    let title = required(&draft.title, "title")?;
    let subject = required(&draft.subject, "subject")?;
    for q in &draft.questions {
        validate_question(q)?;
    }
    let existing_id = draft.id.filter(|id| !id.trim().is_empty());
    let existing = match &existing_id {
        Some(id) => Some(
            state
                .exam_packages
                .iter()
                .find(|e| &e.id == id)
                .ok_or_else(|| StoreError::not_found("exam", id))?,
        ),
        None => None,
    };

    let exam = ExamPackage {
        id: existing_id.clone().unwrap_or_else(new_id),
        title,
        subject,
        grade_level: draft.grade_level.unwrap_or(DEFAULT_GRADE_LEVEL),
        questions: draft.questions.into_iter().map(with_ids).collect(),
        created_date: existing
            .map(|e| e.created_date.clone())
            .unwrap_or_else(now_iso),
    };
    let mut next = state.clone();
    match existing_id {
        Some(id) => {
            for e in next.exam_packages.iter_mut().filter(|e| e.id == id) {
                *e = exam.clone();
            }
        }
        None => next.exam_packages.push(exam.clone()),
    }
    Ok((next, exam))
}

pub fn delete_exam(state: &AppState, exam_id: &str) -> Result<AppState> {
    if !state.exam_packages.iter().any(|e| e.id == exam_id) {
        return Err(StoreError::not_found("exam", exam_id));
    }
    Ok(AppState {
        exam_packages: state
            .exam_packages
            .iter()
            .filter(|e| e.id != exam_id)
            .cloned()
            .collect(),
        ..state.clone()
    })
}

/// Merges generated questions into the package as it is *now*: a question
/// whose id already exists is replaced in place, others are appended.
/// Questions that fail validation are dropped; the count of merged ones is
/// returned.
pub fn merge_generated_questions(
    state: &AppState,
    exam_id: &str,
    generated: Vec<ExamQuestion>,
) -> Result<(AppState, usize)> {
    if !state.exam_packages.iter().any(|e| e.id == exam_id) {
        return Err(StoreError::not_found("exam", exam_id));
    }
    let accepted: Vec<ExamQuestion> = generated
        .into_iter()
        .map(with_ids)
        .filter(|q| match validate_question(q) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    question_type = q.kind.type_name(),
                    error = %e,
                    "generated question dropped"
                );
                false
            }
        })
        .collect();
    let merged = accepted.len();

    let mut next = state.clone();
    for exam in next.exam_packages.iter_mut().filter(|e| e.id == exam_id) {
        for q in &accepted {
            match exam.questions.iter().position(|existing| existing.id == q.id) {
                Some(idx) => exam.questions[idx] = q.clone(),
                None => exam.questions.push(q.clone()),
            }
        }
    }
    Ok((next, merged))
}

// ----- forum -----

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDraft {
    #[serde(default)]
    pub author: String,
    pub role: Option<ForumRole>,
    #[serde(default)]
    pub content: String,
}

/// New posts go to the top of the feed.
pub fn create_post(state: &AppState, draft: PostDraft) -> Result<(AppState, ForumPost)> {
    let content = required(&draft.content, "content")?;
    let author = optional_text(Some(draft.author))
        .unwrap_or_else(|| state.settings.teacher_name.clone());
    let post = ForumPost {
        id: new_id(),
        author,
        role: draft.role.unwrap_or(ForumRole::Teacher),
        content,
        date: now_iso(),
        likes: 0,
        comments: Vec::new(),
    };
    let mut next = state.clone();
    next.forum_posts.insert(0, post.clone());
    Ok((next, post))
}

fn map_post(
    state: &AppState,
    post_id: &str,
    f: impl Fn(&ForumPost) -> ForumPost,
) -> Result<AppState> {
    if !state.forum_posts.iter().any(|p| p.id == post_id) {
        return Err(StoreError::not_found("post", post_id));
    }
    let forum_posts = state
        .forum_posts
        .iter()
        .map(|p| if p.id == post_id { f(p) } else { p.clone() })
        .collect();
    Ok(AppState {
        forum_posts,
        ..state.clone()
    })
}

pub fn like_post(state: &AppState, post_id: &str) -> Result<AppState> {
    map_post(state, post_id, |p| ForumPost {
        likes: p.likes.saturating_add(1),
        ..p.clone()
    })
}

pub fn delete_post(state: &AppState, post_id: &str) -> Result<AppState> {
    if !state.forum_posts.iter().any(|p| p.id == post_id) {
        return Err(StoreError::not_found("post", post_id));
    }
    Ok(AppState {
        forum_posts: state
            .forum_posts
            .iter()
            .filter(|p| p.id != post_id)
            .cloned()
            .collect(),
        ..state.clone()
    })
}

/// Teacher reply, signed with the configured teacher name.
pub fn add_comment(
    state: &AppState,
    post_id: &str,
    content: &str,
) -> Result<(AppState, ForumComment)> {
    let content = required(content, "content")?;
    let comment = ForumComment {
        id: new_id(),
        author: state.settings.teacher_name.clone(),
        role: ForumRole::Teacher,
        content,
        date: now_iso(),
    };
    let next = map_post(state, post_id, |p| {
        let mut comments = p.comments.clone();
        comments.push(comment.clone());
        ForumPost {
            comments,
            ..p.clone()
        }
    })?;
    Ok((next, comment))
}

pub fn delete_comment(state: &AppState, post_id: &str, comment_id: &str) -> Result<AppState> {
    let Some(post) = state.forum_posts.iter().find(|p| p.id == post_id) else {
        return Err(StoreError::not_found("post", post_id));
    };
    if !post.comments.iter().any(|c| c.id == comment_id) {
        return Err(StoreError::not_found("comment", comment_id));
    }
    map_post(state, post_id, |p| ForumPost {
        comments: p
            .comments
            .iter()
            .filter(|c| c.id != comment_id)
            .cloned()
            .collect(),
        ..p.clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttendanceStatus, ExamOption};

    fn seeded() -> (AppState, String, Vec<String>) {
        let (s, class) = create_class(
            &AppState::skeleton(),
            ClassDraft {
                name: "X Sains 2".into(),
                grade_level: Some(10),
                year: Some("2024/2025".into()),
            },
        )
        .expect("class");
        let mut state = s;
        let mut ids = Vec::new();
        for (nis, name) in [("2301", "Aisyah"), ("2302", "Fatimah")] {
            let (next, st) = create_student(
                &state,
                &class.id,
                StudentDraft {
                    nis: nis.into(),
                    name: name.into(),
                    ..Default::default()
                },
            )
            .expect("student");
            state = next;
            ids.push(st.id);
        }
        (state, class.id, ids)
    }

    fn add_assessment(state: &AppState, class_id: &str, title: &str) -> (AppState, String) {
        let (next, a) = create_assessment(
            state,
            class_id,
            AssessmentDraft {
                title: title.into(),
                date: "2024-09-02".into(),
                ..Default::default()
            },
        )
        .expect("assessment");
        (next, a.id)
    }

    fn entry(student_id: &str, score: f64) -> GradeEntry {
        GradeEntry {
            student_id: student_id.to_string(),
            score: Some(score),
            feedback: None,
        }
    }

    #[test]
    fn validation_failure_leaves_state_untouched() {
        let (state, class_id, _) = seeded();
        let before = state.clone();
        let err = create_student(&state, &class_id, StudentDraft::default()).unwrap_err();
        assert_eq!(err.code(), "bad_params");
        assert_eq!(state, before);

        let err = create_class(&state, ClassDraft::default()).unwrap_err();
        assert_eq!(err.code(), "bad_params");
    }

    #[test]
    fn grade_save_replaces_existing_composite_key() {
        let (state, class_id, students) = seeded();
        let (state, a_id) = add_assessment(&state, &class_id, "PH 1");
        let state = save_grades(&state, &a_id, vec![entry(&students[0], 70.0)]).expect("save");
        let len = state.grades.len();

        let state = save_grades(&state, &a_id, vec![entry(&students[0], 88.0)]).expect("resave");
        assert_eq!(state.grades.len(), len);
        let matches: Vec<_> = state
            .grades
            .iter()
            .filter(|g| g.assessment_id == a_id && g.student_id == students[0])
            .collect();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].score, 88.0);
    }

    #[test]
    fn grade_scores_are_clamped_to_max() {
        let (state, class_id, students) = seeded();
        let (state, a_id) = add_assessment(&state, &class_id, "PH 1");
        let state = save_grades(
            &state,
            &a_id,
            vec![
                entry(&students[0], 140.0),
                GradeEntry {
                    student_id: students[1].clone(),
                    score: Some(-5.0),
                    feedback: None,
                },
            ],
        )
        .expect("save");
        assert_eq!(state.grade_for(&a_id, &students[0]).map(|g| g.score), Some(100.0));
        assert_eq!(state.grade_for(&a_id, &students[1]).map(|g| g.score), Some(0.0));
        assert_eq!(clamp_score(None, 50.0), 0.0);
        assert_eq!(clamp_score(Some(f64::NAN), 50.0), 0.0);
    }

    #[test]
    fn lowering_max_score_clamps_saved_grades() {
        let (state, class_id, students) = seeded();
        let (state, a_id) = add_assessment(&state, &class_id, "PH 2");
        let (state, other_id) = add_assessment(&state, &class_id, "PH 3");
        let state = save_grades(
            &state,
            &a_id,
            vec![entry(&students[0], 90.0), entry(&students[1], 40.0)],
        )
        .expect("save");
        let state = save_grades(&state, &other_id, vec![entry(&students[0], 95.0)]).expect("save");

        let state = update_assessment(
            &state,
            &a_id,
            AssessmentDraft {
                title: "PH 2".into(),
                date: "2024-08-01".into(),
                max_score: Some(50.0),
                ..Default::default()
            },
        )
        .expect("update");

        assert_eq!(state.assessment(&a_id).map(|a| a.max_score), Some(50.0));
        assert_eq!(state.grade_for(&a_id, &students[0]).map(|g| g.score), Some(50.0));
        assert_eq!(state.grade_for(&a_id, &students[1]).map(|g| g.score), Some(40.0));
        assert_eq!(state.grade_for(&other_id, &students[0]).map(|g| g.score), Some(95.0));
    }

    #[test]
    fn deleting_class_leaves_no_orphans() {
        let (state, class_id, students) = seeded();
        let (other, other_class) = create_class(
            &state,
            ClassDraft {
                name: "XI".into(),
                ..Default::default()
            },
        )
        .expect("other class");
        let (state, other_student) = create_student(
            &other,
            &other_class.id,
            StudentDraft {
                nis: "9".into(),
                name: "Maryam".into(),
                ..Default::default()
            },
        )
        .expect("other student");
        let (state, a_id) = add_assessment(&state, &class_id, "PH 1");
        let state = save_grades(&state, &a_id, vec![entry(&students[0], 80.0)]).expect("grades");
        let (state, _) = save_attendance(
            &state,
            AttendanceSheetDraft {
                class_id: class_id.clone(),
                date: "2024-09-02".into(),
                records: vec![],
            },
        )
        .expect("attendance");
        let (state, _) = save_journal(
            &state,
            JournalDraft {
                class_id: class_id.clone(),
                date: "2024-09-02".into(),
                subject: "Fiqih".into(),
                topic: "Thaharah".into(),
                ..Default::default()
            },
        )
        .expect("journal");
        let (state, _) = save_response(
            &state,
            ResponseDraft {
                questionnaire_id: "q1".into(),
                student_id: students[1].clone(),
                answers: [("q1_1", 4u8), ("q1_2", 3), ("q1_3", 2)]
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect(),
            },
        )
        .expect("response");

        let next = delete_class(&state, &class_id).expect("delete");
        assert!(next.classes.iter().all(|c| c.id != class_id));
        assert!(next.students.iter().all(|s| s.class_id != class_id));
        assert!(next.assessments.iter().all(|a| a.class_id != class_id));
        assert!(next.grades.iter().all(|g| !students.contains(&g.student_id)));
        assert!(next.daily_attendance.iter().all(|d| d.class_id != class_id));
        assert!(next.journals.iter().all(|j| j.class_id != class_id));
        assert!(next.questionnaire_responses.is_empty());
        // Untouched class survives.
        assert!(next.student(&other_student.id).is_some());
        assert_eq!(next.classes.len(), 1);
    }

    #[test]
    fn deleting_student_strips_attendance_records() {
        let (state, class_id, students) = seeded();
        let (state, _) = save_attendance(
            &state,
            AttendanceSheetDraft {
                class_id: class_id.clone(),
                date: "2024-09-03".into(),
                records: vec![AttendanceRecord {
                    student_id: students[0].clone(),
                    status: AttendanceStatus::A,
                    note: Some("tanpa keterangan".into()),
                }],
            },
        )
        .expect("attendance");
        assert_eq!(state.daily_attendance[0].records.len(), 2);

        let next = delete_student(&state, &students[0]).expect("delete");
        assert_eq!(next.daily_attendance[0].records.len(), 1);
        assert_eq!(next.daily_attendance[0].records[0].student_id, students[1]);
    }

    #[test]
    fn attendance_resave_replaces_sheet_in_place() {
        let (state, class_id, students) = seeded();
        let draft = |status| AttendanceSheetDraft {
            class_id: class_id.clone(),
            date: "2024-09-04".into(),
            records: vec![AttendanceRecord {
                student_id: students[1].clone(),
                status,
                note: None,
            }],
        };
        let (state, first) = save_attendance(&state, draft(AttendanceStatus::S)).expect("save");
        let (state, second) = save_attendance(&state, draft(AttendanceStatus::I)).expect("resave");
        assert_eq!(first.id, second.id);
        assert_eq!(state.daily_attendance.len(), 1);
        assert_eq!(state.daily_attendance[0].records[0].status, AttendanceStatus::H);
        assert_eq!(state.daily_attendance[0].records[1].status, AttendanceStatus::I);
    }

    #[test]
    fn response_requires_every_answer_in_range() {
        let (state, _, students) = seeded();
        let partial = ResponseDraft {
            questionnaire_id: "q1".into(),
            student_id: students[0].clone(),
            answers: [("q1_1".to_string(), 4u8)].into_iter().collect(),
        };
        assert_eq!(save_response(&state, partial).unwrap_err().code(), "bad_params");

        let out_of_range = ResponseDraft {
            questionnaire_id: "q1".into(),
            student_id: students[0].clone(),
            answers: [("q1_1", 5u8), ("q1_2", 1), ("q1_3", 1)]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        };
        assert!(save_response(&state, out_of_range).is_err());
    }

    #[test]
    fn talent_analysis_attaches_to_current_response_only() {
        let (state, _, students) = seeded();
        let answers: BTreeMap<String, u8> = [("q1_1", 4u8), ("q1_2", 3), ("q1_3", 2)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let (state, _) = save_response(
            &state,
            ResponseDraft {
                questionnaire_id: "q1".into(),
                student_id: students[0].clone(),
                answers,
            },
        )
        .expect("response");
        let next = attach_talent_analysis(&state, "q1", &students[0], "Visual dominan".into())
            .expect("attach");
        assert_eq!(
            next.response_for("q1", &students[0])
                .and_then(|r| r.ai_analysis.clone()),
            Some("Visual dominan".to_string())
        );

        let gone = delete_questionnaire(&next, "q1").expect("delete");
        assert!(gone.questionnaire_responses.is_empty());
        assert!(attach_talent_analysis(&gone, "q1", &students[0], "x".into()).is_err());
    }

    fn mc(id: &str, correct: &[bool]) -> ExamQuestion {
        ExamQuestion {
            id: id.to_string(),
            text: "Hukum bacaan nun mati bertemu ba?".into(),
            points: 10.0,
            kind: QuestionKind::MultipleChoice {
                options: correct
                    .iter()
                    .enumerate()
                    .map(|(i, c)| ExamOption {
                        id: String::new(),
                        text: format!("opsi {}", i),
                        is_correct: *c,
                    })
                    .collect(),
            },
        }
    }

    #[test]
    fn exam_requires_exactly_one_correct_option() {
        let state = AppState::skeleton();
        let draft = |q| ExamDraft {
            title: "PTS Tajwid".into(),
            subject: "Tajwid".into(),
            questions: vec![q],
            ..Default::default()
        };
        assert!(save_exam(&state, draft(mc("", &[true, true]))).is_err());
        assert!(save_exam(&state, draft(mc("", &[false, false]))).is_err());
        let (next, exam) = save_exam(&state, draft(mc("", &[false, true]))).expect("save");
        assert_eq!(next.exam_packages.len(), 1);
        assert!(!exam.questions[0].id.is_empty());
        match &exam.questions[0].kind {
            QuestionKind::MultipleChoice { options } => {
                assert!(options.iter().all(|o| !o.id.is_empty()))
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn generated_questions_upsert_by_id() {
        let state = AppState::skeleton();
        let (state, exam) = save_exam(
            &state,
            ExamDraft {
                title: "PH".into(),
                subject: "Fiqih".into(),
                questions: vec![mc("keep", &[true, false])],
                ..Default::default()
            },
        )
        .expect("save");
        let mut replacement = mc("keep", &[false, true]);
        replacement.text = "Diganti".into();
        let (next, merged) = merge_generated_questions(
            &state,
            &exam.id,
            vec![replacement, mc("", &[true, false]), mc("bad", &[false, false])],
        )
        .expect("merge");
        assert_eq!(merged, 2);
        let questions = &next.exam_packages[0].questions;
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].id, "keep");
        assert_eq!(questions[0].text, "Diganti");
    }

    #[test]
    fn forum_comment_lifecycle() {
        let state = AppState::skeleton();
        let (state, post) = create_post(
            &state,
            PostDraft {
                author: "Nadia".into(),
                role: Some(ForumRole::Student),
                content: "Besok bawa kitab.".into(),
            },
        )
        .expect("post");
        let state = like_post(&state, &post.id).expect("like");
        let (state, comment) = add_comment(&state, &post.id, "Siap").expect("comment");
        assert_eq!(comment.author, state.settings.teacher_name);
        assert_eq!(state.forum_posts[0].likes, 1);
        assert_eq!(state.forum_posts[0].comments.len(), 1);

        let state = delete_comment(&state, &post.id, &comment.id).expect("delete comment");
        assert!(state.forum_posts[0].comments.is_empty());
        let state = delete_post(&state, &post.id).expect("delete post");
        assert!(state.forum_posts.is_empty());
    }

    #[test]
    fn csv_import_skips_incomplete_lines() {
        let (state, class_id, _) = seeded();
        let (next, added) =
            import_students_csv(&state, &class_id, "2401,Hafsah,P\n,NoNis,L\n2402,Wardah\n")
                .expect("import");
        assert_eq!(added.len(), 2);
        assert_eq!(added[0].gender, Gender::P);
        assert_eq!(added[1].gender, Gender::L);
        assert_eq!(next.students.len(), state.students.len() + 2);
    }

    #[test]
    fn settings_patch_rejects_out_of_range_kkm() {
        let state = AppState::skeleton();
        assert!(update_settings(
            &state,
            SettingsPatch {
                kkm: Some(120.0),
                ..Default::default()
            }
        )
        .is_err());
        let next = update_settings(
            &state,
            SettingsPatch {
                kkm: Some(70.0),
                school_name: Some("DIGISS Boarding School".into()),
                teacher_name: None,
            },
        )
        .expect("update");
        assert_eq!(next.settings.kkm, 70.0);
        assert_eq!(next.settings.teacher_name, state.settings.teacher_name);
    }
}
