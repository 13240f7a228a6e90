use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

pub const SCHEMA_VERSION: u32 = 1;

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Composite id for the single attendance sheet of a class on a date.
pub fn attendance_id(class_id: &str, date: &str) -> String {
    format!("{}_{}", class_id, date)
}

/// Composite id for the single response of a student to a questionnaire.
pub fn response_id(questionnaire_id: &str, student_id: &str) -> String {
    format!("{}_{}", questionnaire_id, student_id)
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub enum AssessmentType {
    #[default]
    #[serde(rename = "Penilaian Harian")]
    Ph,
    #[serde(rename = "Penilaian Tengah Semester")]
    Pts,
    #[serde(rename = "Penilaian Akhir Semester")]
    Pas,
    #[serde(rename = "Tugas/Proyek")]
    Tugas,
    #[serde(rename = "Sikap")]
    Sikap,
    #[serde(rename = "Keterampilan")]
    Keterampilan,
}

impl AssessmentType {
    pub const ALL: [AssessmentType; 6] = [
        AssessmentType::Ph,
        AssessmentType::Pts,
        AssessmentType::Pas,
        AssessmentType::Tugas,
        AssessmentType::Sikap,
        AssessmentType::Keterampilan,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AssessmentType::Ph => "Penilaian Harian",
            AssessmentType::Pts => "Penilaian Tengah Semester",
            AssessmentType::Pas => "Penilaian Akhir Semester",
            AssessmentType::Tugas => "Tugas/Proyek",
            AssessmentType::Sikap => "Sikap",
            AssessmentType::Keterampilan => "Keterampilan",
        }
    }

    /// First word of the label, used for chart axes.
    pub fn short_name(self) -> &'static str {
        let label = self.label();
        label.split(' ').next().unwrap_or(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Gender {
    #[default]
    #[serde(rename = "Laki-laki")]
    L,
    #[serde(rename = "Perempuan")]
    P,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassGroup {
    pub id: String,
    pub name: String,
    pub grade_level: i64,
    pub year: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub nis: String,
    pub name: String,
    #[serde(default)]
    pub gender: Gender,
    pub class_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: AssessmentType,
    pub class_id: String,
    pub date: String,
    pub max_score: f64,
    /// Percentage captured at entry. Not consumed by any aggregate.
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub assessment_id: String,
    pub student_id: String,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AttendanceStatus {
    #[default]
    H,
    S,
    I,
    A,
    T,
}

impl AttendanceStatus {
    pub const ALL: [AttendanceStatus; 5] = [
        AttendanceStatus::H,
        AttendanceStatus::S,
        AttendanceStatus::I,
        AttendanceStatus::A,
        AttendanceStatus::T,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AttendanceStatus::H => "Hadir",
            AttendanceStatus::S => "Sakit",
            AttendanceStatus::I => "Izin",
            AttendanceStatus::A => "Alpha",
            AttendanceStatus::T => "Terlambat",
        }
    }

    /// Late arrivals count as present.
    pub fn is_present(self) -> bool {
        matches!(self, AttendanceStatus::H | AttendanceStatus::T)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub student_id: String,
    pub status: AttendanceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl AttendanceRecord {
    pub fn present(student_id: &str) -> Self {
        Self {
            student_id: student_id.to_string(),
            status: AttendanceStatus::H,
            note: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyAttendance {
    pub id: String,
    pub date: String,
    pub class_id: String,
    pub records: Vec<AttendanceRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeachingJournal {
    pub id: String,
    pub class_id: String,
    pub date: String,
    pub time_start: String,
    pub time_end: String,
    pub subject: String,
    pub topic: String,
    #[serde(default)]
    pub activity: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub attendance: Vec<AttendanceRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub text: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Questionnaire {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionnaireResponse {
    pub id: String,
    pub questionnaire_id: String,
    pub student_id: String,
    pub date: String,
    pub answers: BTreeMap<String, u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_analysis: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamOption {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

/// Variant-specific payload of an exam question, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionKind {
    MultipleChoice {
        #[serde(default)]
        options: Vec<ExamOption>,
    },
    Essay {
        #[serde(rename = "answerKey", default)]
        answer_key: String,
    },
    TrueFalse {
        #[serde(rename = "correctAnswer", default)]
        correct_answer: bool,
    },
}

impl QuestionKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            QuestionKind::MultipleChoice { .. } => "MULTIPLE_CHOICE",
            QuestionKind::Essay { .. } => "ESSAY",
            QuestionKind::TrueFalse { .. } => "TRUE_FALSE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamQuestion {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub points: f64,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamPackage {
    pub id: String,
    pub title: String,
    pub subject: String,
    pub grade_level: i64,
    pub questions: Vec<ExamQuestion>,
    pub created_date: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ForumRole {
    Teacher,
    Student,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForumComment {
    pub id: String,
    pub author: String,
    pub role: ForumRole,
    pub content: String,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForumPost {
    pub id: String,
    pub author: String,
    pub role: ForumRole,
    pub content: String,
    pub date: String,
    #[serde(default)]
    pub likes: u32,
    #[serde(default)]
    pub comments: Vec<ForumComment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub kkm: f64,
    pub school_name: String,
    pub teacher_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            kkm: 75.0,
            school_name: "Sekolah Saya".to_string(),
            teacher_name: "Guru".to_string(),
        }
    }
}

/// The whole persisted document. Every mutation produces a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub schema_version: u32,
    pub classes: Vec<ClassGroup>,
    pub students: Vec<Student>,
    pub assessments: Vec<Assessment>,
    pub grades: Vec<Grade>,
    pub journals: Vec<TeachingJournal>,
    pub daily_attendance: Vec<DailyAttendance>,
    pub questionnaires: Vec<Questionnaire>,
    pub questionnaire_responses: Vec<QuestionnaireResponse>,
    pub exam_packages: Vec<ExamPackage>,
    pub forum_posts: Vec<ForumPost>,
    pub settings: Settings,
}

impl AppState {
    pub fn skeleton() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            classes: Vec::new(),
            students: Vec::new(),
            assessments: Vec::new(),
            grades: Vec::new(),
            journals: Vec::new(),
            daily_attendance: Vec::new(),
            questionnaires: vec![starter_questionnaire()],
            questionnaire_responses: Vec::new(),
            exam_packages: Vec::new(),
            forum_posts: Vec::new(),
            settings: Settings::default(),
        }
    }

    pub fn class(&self, class_id: &str) -> Option<&ClassGroup> {
        self.classes.iter().find(|c| c.id == class_id)
    }

    pub fn student(&self, student_id: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.id == student_id)
    }

    pub fn assessment(&self, assessment_id: &str) -> Option<&Assessment> {
        self.assessments.iter().find(|a| a.id == assessment_id)
    }

    pub fn questionnaire(&self, questionnaire_id: &str) -> Option<&Questionnaire> {
        self.questionnaires.iter().find(|q| q.id == questionnaire_id)
    }

    pub fn students_in_class<'a>(&'a self, class_id: &'a str) -> impl Iterator<Item = &'a Student> {
        self.students.iter().filter(move |s| s.class_id == class_id)
    }

    pub fn grade_for(&self, assessment_id: &str, student_id: &str) -> Option<&Grade> {
        self.grades
            .iter()
            .find(|g| g.assessment_id == assessment_id && g.student_id == student_id)
    }

    pub fn response_for(
        &self,
        questionnaire_id: &str,
        student_id: &str,
    ) -> Option<&QuestionnaireResponse> {
        self.questionnaire_responses
            .iter()
            .find(|r| r.questionnaire_id == questionnaire_id && r.student_id == student_id)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::skeleton()
    }
}

fn starter_questionnaire() -> Questionnaire {
    let q = |id: &str, text: &str, category: &str| Question {
        id: id.to_string(),
        text: text.to_string(),
        category: category.to_string(),
    };
    Questionnaire {
        id: "q1".to_string(),
        title: "Tes Gaya Belajar (V-A-K)".to_string(),
        description: "Mengenali kecenderungan gaya belajar visual, auditori, atau kinestetik."
            .to_string(),
        questions: vec![
            q(
                "q1_1",
                "Saya lebih mudah paham lewat gambar atau diagram daripada penjelasan lisan.",
                "Visual",
            ),
            q(
                "q1_2",
                "Saya mudah mengingat hal yang saya dengar di kelas.",
                "Auditory",
            ),
            q(
                "q1_3",
                "Saya senang belajar sambil bergerak atau memegang benda.",
                "Kinestetik",
            ),
        ],
    }
}
