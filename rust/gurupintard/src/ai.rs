//! Generative-text collaborator.
//!
//! Narrative features (report feedback, class insight, talent analysis)
//! never fail from the caller's point of view: an unconfigured or failing
//! service yields a fixed Indonesian fallback sentence. Question generation
//! reports `AiError` instead.

use crate::calc::CategoryScore;
use crate::config::AiConfig;
use crate::error::AiError;
use crate::model::{ExamOption, ExamQuestion, QuestionKind};
use serde::Deserialize;
use serde_json::{json, Value};

pub const FEEDBACK_UNAVAILABLE: &str = "Layanan AI tidak tersedia. Cek konfigurasi API Key.";
pub const FEEDBACK_FAILED: &str = "Gagal menghasilkan saran otomatis. Silakan tulis manual.";
pub const INSIGHT_UNAVAILABLE: &str = "Analisis tidak tersedia.";
pub const INSIGHT_FAILED: &str = "Gagal menganalisis data.";
pub const TALENT_UNAVAILABLE: &str = "Analisis AI tidak tersedia.";
pub const TALENT_FAILED: &str = "Gagal melakukan analisis bakat saat ini.";
pub const GENERATE_FAILED: &str = "Gagal membuat soal. Coba lagi.";

pub const INSIGHT_SCOPE_ALL_CLASSES: &str = "Semua Kelas (Sampel)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Text,
    Json,
}

pub trait TextGenerator {
    fn generate(&self, prompt: &str, format: ResponseFormat) -> Result<String, AiError>;
}

/// Gemini `generateContent` over blocking HTTP.
pub struct GeminiClient {
    http: reqwest::blocking::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl GeminiClient {
    pub fn new(cfg: &AiConfig) -> Result<Self, AiError> {
        let Some(api_key) = cfg.api_key.clone() else {
            return Err(AiError::NotConfigured);
        };
        let http = reqwest::blocking::Client::builder()
            .timeout(cfg.timeout)
            .build()?;
        Ok(Self {
            http,
            api_key,
            model: cfg.model.clone(),
            endpoint: cfg.endpoint.clone(),
        })
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

impl TextGenerator for GeminiClient {
    fn generate(&self, prompt: &str, format: ResponseFormat) -> Result<String, AiError> {
        let mut body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
        });
        if format == ResponseFormat::Json {
            body["generationConfig"] = json!({ "responseMimeType": "application/json" });
        }

        tracing::debug!(model = %self.model, prompt_len = prompt.len(), "calling generateContent");
        let resp = self
            .http
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(AiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let value: Value = resp.json()?;
        extract_text(&value)
    }
}

/// Concatenates the text parts of the first candidate.
fn extract_text(value: &Value) -> Result<String, AiError> {
    let parts = value
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| AiError::Parse("no candidates in response".to_string()))?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();
    if text.trim().is_empty() {
        return Err(AiError::Empty);
    }
    Ok(text)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GeneratedKind {
    MultipleChoice,
    Essay,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRequest {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub level: String,
    #[serde(default = "default_question_count")]
    pub count: u32,
    #[serde(rename = "type", default = "default_generated_kind")]
    pub kind: GeneratedKind,
}

fn default_question_count() -> u32 {
    5
}

fn default_generated_kind() -> GeneratedKind {
    GeneratedKind::MultipleChoice
}

pub struct Assistant {
    generator: Option<Box<dyn TextGenerator>>,
}

impl Assistant {
    pub fn new(generator: Option<Box<dyn TextGenerator>>) -> Self {
        Self { generator }
    }

    pub fn from_config(cfg: &AiConfig) -> Self {
        match GeminiClient::new(cfg) {
            Ok(client) => {
                tracing::info!(model = %cfg.model, "AI service configured");
                Self::new(Some(Box::new(client)))
            }
            Err(AiError::NotConfigured) => {
                tracing::info!("no AI API key set; narrative features use fallbacks");
                Self::new(None)
            }
            Err(e) => {
                tracing::warn!(error = %e, "AI client could not be built");
                Self::new(None)
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.generator.is_some()
    }

    fn narrative(&self, prompt: &str, unavailable: &str, failed: &str) -> String {
        let Some(generator) = self.generator.as_ref() else {
            return unavailable.to_string();
        };
        match generator.generate(prompt, ResponseFormat::Text) {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "AI narrative request failed");
                failed.to_string()
            }
        }
    }

    pub fn student_feedback(
        &self,
        student_name: &str,
        average: f64,
        strengths: &[&str],
        weaknesses: &[&str],
    ) -> String {
        let prompt = feedback_prompt(student_name, average, strengths, weaknesses);
        self.narrative(&prompt, FEEDBACK_UNAVAILABLE, FEEDBACK_FAILED)
    }

    pub fn class_insight(&self, scope: &str, scores: &[f64]) -> String {
        let prompt = insight_prompt(scope, scores);
        self.narrative(&prompt, INSIGHT_UNAVAILABLE, INSIGHT_FAILED)
    }

    pub fn talent_analysis(
        &self,
        student_name: &str,
        questionnaire_title: &str,
        categories: &[CategoryScore],
    ) -> String {
        let prompt = talent_prompt(student_name, questionnaire_title, categories);
        self.narrative(&prompt, TALENT_UNAVAILABLE, TALENT_FAILED)
    }

    pub fn generate_questions(&self, req: &QuestionRequest) -> Result<Vec<ExamQuestion>, AiError> {
        let Some(generator) = self.generator.as_ref() else {
            return Err(AiError::NotConfigured);
        };
        let raw = generator.generate(&question_prompt(req), ResponseFormat::Json)?;
        parse_generated_questions(&raw, req.kind)
    }
}

fn list_or(items: &[&str], fallback: &str) -> String {
    if items.is_empty() {
        fallback.to_string()
    } else {
        items.join(", ")
    }
}

pub fn feedback_prompt(
    student_name: &str,
    average: f64,
    strengths: &[&str],
    weaknesses: &[&str],
) -> String {
    format!(
        "Bertindaklah sebagai guru yang bijaksana dan suportif di sekolah Indonesia.\n\
         Buatlah narasi deskripsi rapor singkat (maksimal 3 kalimat) untuk siswa bernama {}.\n\
         Nilai rata-rata: {}.\n\
         Kekuatan akademik: {}.\n\
         Area yang perlu ditingkatkan: {}.\n\
         Gunakan bahasa Indonesia yang formal namun memotivasi, fokus pada apresiasi proses belajar.",
        student_name,
        average,
        list_or(strengths, "Cukup baik secara umum"),
        list_or(weaknesses, "Pertahankan prestasi"),
    )
}

pub fn insight_prompt(scope: &str, scores: &[f64]) -> String {
    let sample = serde_json::to_string(scores).unwrap_or_else(|_| "[]".to_string());
    format!(
        "Analisis data nilai kelas {}.\n\
         Rata-rata kelas: {:.2}.\n\
         Sebaran nilai: {}.\n\
         Berikan 3 rekomendasi strategi mengajar singkat untuk guru berdasarkan data ini untuk meningkatkan hasil belajar.",
        scope,
        crate::calc::average(scores),
        sample,
    )
}

pub fn talent_prompt(
    student_name: &str,
    questionnaire_title: &str,
    categories: &[CategoryScore],
) -> String {
    let scores = categories
        .iter()
        .map(|c| format!("{}: {}", c.category, c.score))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Bertindaklah sebagai konselor pendidikan profesional dan psikolog sekolah.\n\
         Siswa bernama {} telah mengisi kuesioner \"{}\".\n\n\
         Hasil Skor per Kategori:\n{}\n\n\
         Tugas Anda:\n\
         1. Identifikasi gaya belajar atau potensi dominan siswa.\n\
         2. Berikan 3 strategi belajar spesifik yang cocok untuk siswa ini.\n\
         3. Sarankan 2 potensi karir atau bidang studi masa depan yang relevan.\n\n\
         Gunakan bahasa Indonesia yang personal, memotivasi, dan mudah dipahami siswa. Format output dalam poin-poin singkat.",
        student_name, questionnaire_title, scores,
    )
}

pub fn question_prompt(req: &QuestionRequest) -> String {
    let (label, shape) = match req.kind {
        GeneratedKind::MultipleChoice => (
            "Pilihan Ganda",
            "\"options\": [\n\
             {\"text\": \"Pilihan A\", \"isCorrect\": false},\n\
             {\"text\": \"Pilihan B (Jawaban Benar)\", \"isCorrect\": true},\n\
             {\"text\": \"Pilihan C\", \"isCorrect\": false},\n\
             {\"text\": \"Pilihan D\", \"isCorrect\": false}\n\
             ]",
        ),
        GeneratedKind::Essay => (
            "Essay",
            "\"answerKey\": \"Kunci jawaban atau poin-poin penting jawaban\"",
        ),
    };
    format!(
        "Buatkan {} soal ujian {} untuk topik \"{}\" tingkat sekolah {}.\n\n\
         Output WAJIB dalam format JSON Array murni tanpa format markdown code block.\n\n\
         Struktur JSON per item:\n\
         {{\n\"text\": \"Pertanyaan\",\n\"points\": 10,\n{}\n}}",
        req.count, label, req.topic, req.level, shape,
    )
}

fn strip_code_fence(raw: &str) -> &str {
    let t = raw.trim();
    let t = t
        .strip_prefix("```json")
        .or_else(|| t.strip_prefix("```"))
        .unwrap_or(t);
    t.strip_suffix("```").unwrap_or(t).trim()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOption {
    #[serde(default)]
    text: String,
    #[serde(default)]
    is_correct: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQuestion {
    #[serde(default)]
    text: String,
    #[serde(default)]
    points: Option<f64>,
    #[serde(default)]
    options: Vec<RawOption>,
    #[serde(default)]
    answer_key: String,
}

/// Turns the model's JSON array into questions of the requested type, each
/// with fresh ids.
pub fn parse_generated_questions(
    raw: &str,
    kind: GeneratedKind,
) -> Result<Vec<ExamQuestion>, AiError> {
    let items: Vec<RawQuestion> = serde_json::from_str(strip_code_fence(raw))
        .map_err(|e| AiError::Parse(e.to_string()))?;
    if items.is_empty() {
        return Err(AiError::Empty);
    }
    Ok(items
        .into_iter()
        .map(|q| ExamQuestion {
            id: crate::model::new_id(),
            text: q.text,
            points: q.points.unwrap_or(10.0),
            kind: match kind {
                GeneratedKind::MultipleChoice => QuestionKind::MultipleChoice {
                    options: q
                        .options
                        .into_iter()
                        .map(|o| ExamOption {
                            id: crate::model::new_id(),
                            text: o.text,
                            is_correct: o.is_correct,
                        })
                        .collect(),
                },
                GeneratedKind::Essay => QuestionKind::Essay {
                    answer_key: q.answer_key,
                },
            },
        })
        .collect())
}


#[cfg(test)]
mod tests {
    use super::testing::StubGenerator;
    use super::*;

    fn request(kind: GeneratedKind) -> QuestionRequest {
        QuestionRequest {
            topic: "Fotosintesis".to_string(),
            level: "SMP".to_string(),
            count: 2,
            kind,
        }
    }

    #[test]
    fn unconfigured_assistant_returns_unavailable_texts() {
        let a = Assistant::new(None);
        assert!(!a.is_configured());
        assert_eq!(a.student_feedback("Ani", 80.0, &[], &[]), FEEDBACK_UNAVAILABLE);
        assert_eq!(a.class_insight(INSIGHT_SCOPE_ALL_CLASSES, &[]), INSIGHT_UNAVAILABLE);
        assert_eq!(a.talent_analysis("Ani", "VAK", &[]), TALENT_UNAVAILABLE);
        assert!(matches!(
            a.generate_questions(&request(GeneratedKind::Essay)),
            Err(AiError::NotConfigured)
        ));
    }

    #[test]
    fn failing_generator_returns_failure_texts() {
        let a = Assistant::new(Some(Box::new(StubGenerator::failing())));
        assert_eq!(a.student_feedback("Ani", 80.0, &[], &[]), FEEDBACK_FAILED);
        assert_eq!(a.class_insight("X", &[70.0]), INSIGHT_FAILED);
        assert_eq!(a.talent_analysis("Ani", "VAK", &[]), TALENT_FAILED);
    }

    #[test]
    fn narrative_is_trimmed() {
        let a = Assistant::new(Some(Box::new(StubGenerator::ok("  Ananda rajin.\n"))));
        assert_eq!(a.student_feedback("Ani", 88.5, &["Sikap"], &[]), "Ananda rajin.");
    }

    #[test]
    fn feedback_prompt_uses_defaults_for_empty_lists() {
        let p = feedback_prompt("Budi", 77.5, &[], &["Keterampilan"]);
        assert!(p.contains("Budi"));
        assert!(p.contains("Nilai rata-rata: 77.5."));
        assert!(p.contains("Cukup baik secara umum"));
        assert!(p.contains("Area yang perlu ditingkatkan: Keterampilan."));
    }

    #[test]
    fn insight_prompt_has_two_decimal_average_and_zero_for_empty() {
        assert!(insight_prompt("X", &[80.0, 90.0, 50.0, 60.0]).contains("Rata-rata kelas: 70.00."));
        assert!(insight_prompt("X", &[]).contains("Rata-rata kelas: 0.00."));
    }

    #[test]
    fn generated_multiple_choice_gets_ids_and_type() {
        let raw = r#"```json
[{"text": "Organel fotosintesis?", "points": 10,
  "options": [{"text": "Mitokondria", "isCorrect": false},
              {"text": "Kloroplas", "isCorrect": true}]}]
```"#;
        let qs = parse_generated_questions(raw, GeneratedKind::MultipleChoice).expect("parse");
        assert_eq!(qs.len(), 1);
        assert!(!qs[0].id.is_empty());
        match &qs[0].kind {
            QuestionKind::MultipleChoice { options } => {
                assert_eq!(options.len(), 2);
                assert!(options.iter().all(|o| !o.id.is_empty()));
                assert_ne!(options[0].id, options[1].id);
                assert!(options[1].is_correct);
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn generated_essay_defaults_points() {
        let stub = StubGenerator::ok(r#"[{"text": "Jelaskan fotosintesis.", "answerKey": "Cahaya"}]"#);
        let a = Assistant::new(Some(Box::new(stub)));
        let qs = a
            .generate_questions(&request(GeneratedKind::Essay))
            .expect("generate");
        assert_eq!(qs[0].points, 10.0);
        assert!(matches!(&qs[0].kind, QuestionKind::Essay { answer_key } if answer_key == "Cahaya"));
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(matches!(
            parse_generated_questions("Maaf, saya tidak bisa.", GeneratedKind::Essay),
            Err(AiError::Parse(_))
        ));
        assert!(matches!(
            parse_generated_questions("[]", GeneratedKind::Essay),
            Err(AiError::Empty)
        ));
    }

    #[test]
    fn extract_text_joins_parts() {
        let v = serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": "a" }, { "text": "b" }] } }]
        });
        assert_eq!(extract_text(&v).expect("text"), "ab");
        assert!(matches!(
            extract_text(&serde_json::json!({ "candidates": [] })),
            Err(AiError::Parse(_))
        ));
    }
}
