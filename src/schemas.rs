//! # Schemas Module
//!
//! Request and response bodies for the tutoring operations, plus the small
//! value types the orchestrators pass around (evaluation level, question
//! mode, quiz score).
//!
//! Inbound enums are deliberately forgiving: an unknown evaluation level
//! reads as `medium` and an unknown question mode reads as `practice`.

use crate::{credentials::RotationStats, dispatch::DispatchStats, store::HistoryEntry};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Points awarded per question.
pub const MAX_QUESTION_SCORE: u32 = 10;

pub const DEFAULT_QUESTION_COUNT: u32 = 25;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatMessage {
    pub message: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatResponse {
    pub response: String,
    /// RFC 3339
    pub timestamp: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HistoryResponse {
    pub history: Vec<HistoryEntry>,
}

/// Plain acknowledgement body.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// # Question Mode
///
/// `quiz` asks for multiple-choice questions; anything else is open-ended
/// practice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "String", rename_all = "lowercase")]
pub enum QuestionMode {
    Quiz,
    #[default]
    Practice,
}

impl From<String> for QuestionMode {
    fn from(value: String) -> Self {
        if value.trim().eq_ignore_ascii_case("quiz") {
            QuestionMode::Quiz
        } else {
            QuestionMode::Practice
        }
    }
}

/// # Evaluation Level
///
/// Strictness of the grading rubric embedded in evaluation prompts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "String", rename_all = "lowercase")]
pub enum EvaluationLevel {
    Easy,
    #[default]
    Medium,
    Strict,
}

impl From<String> for EvaluationLevel {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "easy" => EvaluationLevel::Easy,
            "strict" => EvaluationLevel::Strict,
            _ => EvaluationLevel::Medium,
        }
    }
}

impl EvaluationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluationLevel::Easy => "easy",
            EvaluationLevel::Medium => "medium",
            EvaluationLevel::Strict => "strict",
        }
    }
}

/// Question identifiers arrive as numbers or strings depending on the client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum QuestionId {
    Number(i64),
    Text(String),
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionId::Number(n) => write!(f, "{}", n),
            QuestionId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuestionGenerationRequest {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default = "default_question_count")]
    pub count: u32,
    #[serde(default)]
    pub mode: QuestionMode,
}

fn default_question_count() -> u32 {
    DEFAULT_QUESTION_COUNT
}

impl QuestionGenerationRequest {
    /// Topic filter with surrounding whitespace removed; `None` when blank.
    pub fn topic_filter(&self) -> Option<&str> {
        self.topic.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}

/// # Multiple-Choice Question
///
/// Options carry their letter prefix (`"A) ..."`); `correct_answer` is the
/// letter alone.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct McqQuestion {
    pub question: String,
    pub options: Vec<String>,
    #[serde(rename = "correctAnswer", alias = "correct_answer")]
    pub correct_answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum GeneratedQuestions {
    MultipleChoice(Vec<McqQuestion>),
    OpenEnded(Vec<String>),
}

impl GeneratedQuestions {
    pub fn len(&self) -> usize {
        match self {
            GeneratedQuestions::MultipleChoice(q) => q.len(),
            GeneratedQuestions::OpenEnded(q) => q.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn truncate(&mut self, count: usize) {
        match self {
            GeneratedQuestions::MultipleChoice(q) => q.truncate(count),
            GeneratedQuestions::OpenEnded(q) => q.truncate(count),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuestionGenerationResponse {
    pub questions: GeneratedQuestions,
    pub mode: QuestionMode,
    pub count: usize,
    /// Set when the model reply could not be used and the questions are
    /// placeholders.
    pub fallback: bool,
    pub timestamp: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnswerEvaluationRequest {
    pub question: String,
    #[serde(default)]
    pub user_answer: String,
    pub question_id: QuestionId,
    #[serde(default)]
    pub evaluation_level: Option<EvaluationLevel>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AnswerEvaluationResponse {
    pub question_id: QuestionId,
    pub score: u32,
    pub max_score: u32,
    pub feedback: String,
    pub suggestions: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer_hint: Option<String>,
}

/// One submitted quiz item.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuizAnswer {
    pub question_id: QuestionId,
    pub question: String,
    #[serde(default)]
    pub user_answer: String,
    #[serde(default = "default_question_type")]
    pub question_type: String,
    #[serde(default)]
    pub correct_answer: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
}

fn default_question_type() -> String {
    "open".to_string()
}

impl QuizAnswer {
    /// Correct answer for multiple-choice items scored without the model.
    pub fn mcq_key(&self) -> Option<&str> {
        if !self.question_type.eq_ignore_ascii_case("mcq") {
            return None;
        }
        self.correct_answer
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuizSubmissionRequest {
    pub answers: Vec<QuizAnswer>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub evaluation_level: Option<EvaluationLevel>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuizSubmissionResponse {
    pub overall_score: u32,
    pub max_score: u32,
    pub percentage: f64,
    pub grade: String,
    pub individual_results: Vec<AnswerEvaluationResponse>,
    pub overall_feedback: String,
    pub study_suggestions: Vec<String>,
    pub strengths: Vec<String>,
    pub areas_for_improvement: Vec<String>,
}

/// # Quiz Score
///
/// Aggregate of per-question scores. `percentage` is kept unrounded; the
/// grade is derived from it before any rounding for display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuizScore {
    pub total: u32,
    pub max: u32,
    pub percentage: f64,
    pub grade: char,
}

impl QuizScore {
    pub fn from_scores(scores: &[u32]) -> Self {
        let total: u32 = scores.iter().sum();
        let max = scores.len() as u32 * MAX_QUESTION_SCORE;
        let percentage = if max > 0 {
            f64::from(total) / f64::from(max) * 100.0
        } else {
            0.0
        };
        Self {
            total,
            max,
            percentage,
            grade: letter_grade(percentage),
        }
    }

    /// Percentage rounded to one decimal place.
    pub fn rounded_percentage(&self) -> f64 {
        (self.percentage * 10.0).round() / 10.0
    }
}

pub fn letter_grade(percentage: f64) -> char {
    if percentage >= 90.0 {
        'A'
    } else if percentage >= 80.0 {
        'B'
    } else if percentage >= 70.0 {
        'C'
    } else if percentage >= 60.0 {
        'D'
    } else {
        'F'
    }
}

/// Body for selecting the session's document.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DocumentSelection {
    pub filename: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DocumentSelectedResponse {
    pub message: String,
    pub filename: String,
    pub characters: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RotationStatusResponse {
    pub enabled: bool,
    pub stats: RotationStats,
    pub dispatch: DispatchStats,
    pub cached_clients: usize,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
}
