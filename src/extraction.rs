//! # Response Extractor
//!
//! Pulls a typed payload out of free-form model text.
//!
//! The reply is stripped of a surrounding code fence, then scanned for
//! balanced `{...}` substrings in a single pass. The scanner understands JSON
//! string literals and escapes, so braces inside strings do not confuse it,
//! unclosed braces in surrounding prose do not hide later objects, and any
//! object nested deeper than [`MAX_DEPTH`] is skipped. Each candidate is
//! parsed strictly against the target shape and then validated; the first
//! one that survives wins.
//!
//! Nothing here returns an error. A reply that contains a candidate but no
//! usable payload degrades to the shape's fallback; a reply with no
//! candidate at all is reported as [`ExtractionResult::Failed`] together
//! with the raw text.

use crate::{
    fallback,
    schemas::{McqQuestion, QuizScore, MAX_QUESTION_SCORE},
};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Deepest `{`/`[` nesting a candidate may have.
pub const MAX_DEPTH: usize = 16;

/// Maximum number of top-level candidates handed to the parser.
pub const MAX_CANDIDATES: usize = 16;

/// The operations whose replies are extracted or degraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Chat,
    McqQuestions,
    OpenQuestions,
    AnswerEvaluation,
    McqExplanation,
    QuizFeedback,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Chat => "chat",
            OperationKind::McqQuestions => "mcq_questions",
            OperationKind::OpenQuestions => "open_questions",
            OperationKind::AnswerEvaluation => "answer_evaluation",
            OperationKind::McqExplanation => "mcq_explanation",
            OperationKind::QuizFeedback => "quiz_feedback",
        }
    }
}

/// Outcome of one extraction.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionResult<T> {
    /// A candidate parsed and validated.
    Structured(T),
    /// Candidates existed but none was usable; the payload is the shape's
    /// fallback.
    Fallback(T),
    /// No balanced candidate in the reply.
    Failed { raw: String },
}

impl<T> ExtractionResult<T> {
    pub fn is_structured(&self) -> bool {
        matches!(self, ExtractionResult::Structured(_))
    }

    /// Collapse into a payload plus a `degraded` flag, building the payload
    /// for `Failed` from the raw text.
    pub fn resolve(self, on_failed: impl FnOnce(String) -> T) -> (T, bool) {
        match self {
            ExtractionResult::Structured(value) => (value, false),
            ExtractionResult::Fallback(value) => (value, true),
            ExtractionResult::Failed { raw } => (on_failed(raw), true),
        }
    }
}

/// A payload shape the extractor can produce.
pub trait ExtractShape: DeserializeOwned + Sized {
    /// Caller data needed to validate or build a fallback.
    type Context: ?Sized;

    const KIND: OperationKind;

    /// Check required fields and normalise. `None` rejects the candidate.
    fn validate(self, ctx: &Self::Context) -> Option<Self>;

    /// Degraded default for this shape.
    fn fallback(ctx: &Self::Context) -> Self;
}

/// Extract a `T` from `raw`.
pub fn extract<T: ExtractShape>(raw: &str, ctx: &T::Context) -> ExtractionResult<T> {
    let body = strip_code_fence(raw);
    let candidates = balanced_candidates(body);
    if candidates.is_empty() {
        debug!(kind = T::KIND.as_str(), raw_len = raw.len(), "No structured payload in model reply");
        return ExtractionResult::Failed { raw: raw.to_string() };
    }

    for candidate in &candidates {
        match serde_json::from_str::<T>(candidate) {
            Ok(parsed) => {
                if let Some(valid) = parsed.validate(ctx) {
                    return ExtractionResult::Structured(valid);
                }
                debug!(kind = T::KIND.as_str(), "Candidate failed validation");
            }
            Err(err) => debug!(kind = T::KIND.as_str(), error = %err, "Candidate failed to parse"),
        }
    }

    warn!(
        kind = T::KIND.as_str(),
        candidates = candidates.len(),
        "Model reply did not match the expected shape, using fallback"
    );
    ExtractionResult::Fallback(T::fallback(ctx))
}

/// Remove a leading ```` ```lang ```` and trailing ```` ``` ```` if present.
pub fn strip_code_fence(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        text = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

struct Frame {
    start: usize,
    opener: u8,
    /// Nesting height of the deepest object closed inside this one, plus one.
    height: usize,
}

/// Balanced brace-delimited substrings of `text`, in order of appearance.
/// Nested objects are reported only as part of their outermost candidate.
///
/// One pass with an explicit stack: a stray `{` in prose stays open on the
/// stack without hiding objects that follow it. String state is tracked only
/// inside an open bracket, and a raw newline ends a string literal.
pub fn balanced_candidates(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut stack: Vec<Frame> = Vec::new();
    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' || b == b'\n' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' if !stack.is_empty() => in_string = true,
            b'{' | b'[' => stack.push(Frame { start: i, opener: b, height: 1 }),
            b'}' | b']' => {
                let Some(frame) = stack.pop() else { continue };
                if let Some(parent) = stack.last_mut() {
                    parent.height = parent.height.max(frame.height + 1);
                }
                if b == b'}' && frame.opener == b'{' && frame.height <= MAX_DEPTH {
                    spans.push((frame.start, i));
                }
            }
            _ => {}
        }
    }

    spans.sort_unstable();
    let mut found = Vec::new();
    let mut covered_to = None;
    for (start, end) in spans {
        if covered_to.is_some_and(|limit| start <= limit) {
            continue;
        }
        found.push(&text[start..=end]);
        covered_to = Some(end);
        if found.len() == MAX_CANDIDATES {
            break;
        }
    }
    found
}

/// Clamp a model-reported score into `0..=10`, rounding to the nearest point.
pub fn clamp_score(raw: f64) -> u32 {
    if raw.is_nan() {
        return 0;
    }
    raw.round().clamp(0.0, f64::from(MAX_QUESTION_SCORE)) as u32
}

/// Accepts integers, floats and numeric strings (`"7"`, `"7.5"`, `"7/10"`).
fn deserialize_score<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value = Value::deserialize(deserializer)?;
    let raw = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            let numerator = s.split('/').next().unwrap_or(s).trim();
            numerator.parse::<f64>().ok()
        }
        _ => None,
    };
    raw.map(clamp_score)
        .ok_or_else(|| D::Error::custom(format!("score is not numeric: {}", value)))
}

/// Reduce `"B"`, `"b)"` or `"B) text"` to `"B"`; anything else is kept trimmed.
pub fn normalize_choice(answer: &str) -> String {
    let trimmed = answer.trim();
    let mut chars = trimmed.chars();
    match (chars.next(), chars.next()) {
        (Some(letter), None) | (Some(letter), Some(')')) if letter.is_ascii_alphabetic() => {
            letter.to_ascii_uppercase().to_string()
        }
        _ => trimmed.to_string(),
    }
}

#[derive(Deserialize)]
struct RawQuestionSet {
    questions: Vec<Value>,
}

/// Multiple-choice question set. Malformed items are dropped.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawQuestionSet")]
pub struct McqQuestionSet {
    pub questions: Vec<McqQuestion>,
}

impl From<RawQuestionSet> for McqQuestionSet {
    fn from(raw: RawQuestionSet) -> Self {
        let questions = raw
            .questions
            .into_iter()
            .filter_map(|item| serde_json::from_value::<McqQuestion>(item).ok())
            .filter_map(|mut q| {
                let well_formed = !q.question.trim().is_empty()
                    && q.options.len() >= 2
                    && !q.correct_answer.trim().is_empty();
                if !well_formed {
                    return None;
                }
                q.correct_answer = normalize_choice(&q.correct_answer);
                Some(q)
            })
            .collect();
        Self { questions }
    }
}

impl ExtractShape for McqQuestionSet {
    type Context = ();
    const KIND: OperationKind = OperationKind::McqQuestions;

    fn validate(self, _ctx: &()) -> Option<Self> {
        (!self.questions.is_empty()).then_some(self)
    }

    fn fallback(_ctx: &()) -> Self {
        fallback::mcq_questions()
    }
}

/// Open-ended question set. Items may be plain strings or
/// `{"question": ...}` objects.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawQuestionSet")]
pub struct OpenQuestionSet {
    pub questions: Vec<String>,
}

impl From<RawQuestionSet> for OpenQuestionSet {
    fn from(raw: RawQuestionSet) -> Self {
        let questions = raw
            .questions
            .into_iter()
            .filter_map(|item| match item {
                Value::String(text) => Some(text),
                Value::Object(mut map) => match map.remove("question") {
                    Some(Value::String(text)) => Some(text),
                    _ => None,
                },
                _ => None,
            })
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect();
        Self { questions }
    }
}

impl ExtractShape for OpenQuestionSet {
    type Context = ();
    const KIND: OperationKind = OperationKind::OpenQuestions;

    fn validate(self, _ctx: &()) -> Option<Self> {
        (!self.questions.is_empty()).then_some(self)
    }

    fn fallback(_ctx: &()) -> Self {
        fallback::open_questions()
    }
}

fn default_feedback() -> String {
    "No feedback provided".to_string()
}

fn default_suggestions() -> String {
    "No suggestions provided".to_string()
}

/// Graded answer. `score` is required and clamped.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EvaluationPayload {
    #[serde(deserialize_with = "deserialize_score")]
    pub score: u32,
    #[serde(default = "default_feedback")]
    pub feedback: String,
    #[serde(default = "default_suggestions")]
    pub suggestions: String,
    #[serde(default)]
    pub correct_answer_hint: Option<String>,
}

impl ExtractShape for EvaluationPayload {
    type Context = ();
    const KIND: OperationKind = OperationKind::AnswerEvaluation;

    fn validate(mut self, _ctx: &()) -> Option<Self> {
        if self.feedback.trim().is_empty() {
            self.feedback = default_feedback();
        }
        if self.suggestions.trim().is_empty() {
            self.suggestions = default_suggestions();
        }
        self.correct_answer_hint = self.correct_answer_hint.filter(|h| !h.trim().is_empty());
        Some(self)
    }

    fn fallback(_ctx: &()) -> Self {
        fallback::answer_evaluation()
    }
}

/// Holistic quiz feedback. Missing fields are filled from the score.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QuizFeedbackPayload {
    #[serde(default)]
    pub overall_feedback: String,
    #[serde(default)]
    pub study_suggestions: Vec<String>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub areas_for_improvement: Vec<String>,
}

impl ExtractShape for QuizFeedbackPayload {
    type Context = QuizScore;
    const KIND: OperationKind = OperationKind::QuizFeedback;

    fn validate(mut self, score: &QuizScore) -> Option<Self> {
        let nothing_usable = self.overall_feedback.trim().is_empty()
            && self.study_suggestions.is_empty()
            && self.strengths.is_empty()
            && self.areas_for_improvement.is_empty();
        if nothing_usable {
            return None;
        }

        let defaults = fallback::quiz_feedback_field_defaults(score);
        if self.overall_feedback.trim().is_empty() {
            self.overall_feedback = defaults.overall_feedback;
        }
        if self.study_suggestions.is_empty() {
            self.study_suggestions = defaults.study_suggestions;
        }
        if self.strengths.is_empty() {
            self.strengths = defaults.strengths;
        }
        if self.areas_for_improvement.is_empty() {
            self.areas_for_improvement = defaults.areas_for_improvement;
        }
        Some(self)
    }

    fn fallback(score: &QuizScore) -> Self {
        fallback::quiz_feedback(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn test_scanner_ignores_braces_in_strings() {
        let text = r#"Sure! {"feedback": "use } and { freely", "score": 3} done"#;
        let candidates = balanced_candidates(text);
        assert_eq!(candidates, vec![r#"{"feedback": "use } and { freely", "score": 3}"#]);
    }

    #[test]
    fn test_scanner_handles_escaped_quotes() {
        let text = r#"{"feedback": "he said \"}\" loudly", "score": 1}"#;
        assert_eq!(balanced_candidates(text), vec![text]);
    }

    #[test]
    fn test_scanner_skips_unbalanced_prefix() {
        let text = r#"{ oops {"score": 4}"#;
        assert_eq!(balanced_candidates(text), vec![r#"{"score": 4}"#]);
    }

    #[test]
    fn test_scanner_supports_deep_nesting() {
        let text = r#"{"a":{"b":{"c":{"d":1}}}}"#;
        assert_eq!(balanced_candidates(text), vec![text]);
    }

    #[test]
    fn test_scanner_rejects_excessive_depth() {
        let text = format!("{}{}", "{".repeat(MAX_DEPTH + 1), "}".repeat(MAX_DEPTH + 1));
        // The outermost object is abandoned; the one inside it is within bounds.
        assert_eq!(balanced_candidates(&text), vec![&text[1..text.len() - 1]]);
    }

    #[test]
    fn test_scanner_survives_stray_open_braces() {
        let prose = "Write `fn main() {` then `if ready {` and keep going. ".repeat(20);
        let text = format!(r#"{}{{"score": 7}}"#, prose);
        assert_eq!(balanced_candidates(&text), vec![r#"{"score": 7}"#]);
    }

    #[test]
    fn test_scanner_caps_candidate_count() {
        let text = "{} ".repeat(MAX_CANDIDATES * 3);
        assert_eq!(balanced_candidates(&text).len(), MAX_CANDIDATES);
    }

    #[test]
    fn test_candidate_budget_bounds_work() {
        let text = "{".repeat(10_000);
        assert!(balanced_candidates(&text).is_empty());
    }

    #[test]
    fn test_clamp_score() {
        assert_eq!(clamp_score(-5.0), 0);
        assert_eq!(clamp_score(0.0), 0);
        assert_eq!(clamp_score(7.0), 7);
        assert_eq!(clamp_score(15.0), 10);
        assert_eq!(clamp_score(6.6), 7);
        assert_eq!(clamp_score(f64::NAN), 0);
    }

    #[test]
    fn test_score_accepts_strings() {
        let payload: EvaluationPayload = serde_json::from_str(r#"{"score": "8/10"}"#).unwrap();
        assert_eq!(payload.score, 8);
        assert_eq!(payload.feedback, "No feedback provided");
        assert!(serde_json::from_str::<EvaluationPayload>(r#"{"score": "great"}"#).is_err());
    }

    #[test]
    fn test_normalize_choice() {
        assert_eq!(normalize_choice(" b "), "B");
        assert_eq!(normalize_choice("C) Okinawa"), "C");
        assert_eq!(normalize_choice("Okinawa"), "Okinawa");
    }

    #[test]
    fn test_mcq_set_drops_malformed_items() {
        let raw = r#"{"questions": [
            {"question": "Q1", "options": ["A) x", "B) y"], "correctAnswer": "b"},
            {"question": "Q2", "options": ["A) x"], "correctAnswer": "A"},
            {"question": "Q3", "options": ["A) x", "B) y"], "correct_answer": "A) x"},
            "not an object"
        ]}"#;
        let result = extract::<McqQuestionSet>(raw, &());
        let ExtractionResult::Structured(set) = result else {
            panic!("expected structured result");
        };
        assert_eq!(set.questions.len(), 2);
        assert_eq!(set.questions[0].correct_answer, "B");
        assert_eq!(set.questions[1].correct_answer, "A");
    }

    #[test]
    fn test_open_set_accepts_strings_and_objects() {
        let raw = r#"```json
{"questions": ["Explain Ikigai.", {"question": "Describe Blue Zones."}, 42, ""]}
```"#;
        let result = extract::<OpenQuestionSet>(raw, &());
        assert_eq!(
            result,
            ExtractionResult::Structured(OpenQuestionSet {
                questions: vec!["Explain Ikigai.".to_string(), "Describe Blue Zones.".to_string()]
            })
        );
    }

    #[test]
    fn test_empty_set_falls_back() {
        let result = extract::<McqQuestionSet>(r#"{"questions": []}"#, &());
        assert_eq!(result, ExtractionResult::Fallback(fallback::mcq_questions()));
    }

    #[test]
    fn test_prose_only_fails_with_raw_text() {
        let raw = "I could not produce JSON, sorry.";
        let result = extract::<EvaluationPayload>(raw, &());
        assert_eq!(result, ExtractionResult::Failed { raw: raw.to_string() });
    }

    #[test]
    fn test_quiz_feedback_fills_missing_fields() {
        let score = QuizScore::from_scores(&[10, 10]);
        let result = extract::<QuizFeedbackPayload>(r#"{"overall_feedback": "Well done."}"#, &score);
        let ExtractionResult::Structured(payload) = result else {
            panic!("expected structured result");
        };
        assert_eq!(payload.overall_feedback, "Well done.");
        assert_eq!(payload.strengths, vec!["Attempted all questions".to_string()]);
    }

    #[test]
    fn test_resolve_reports_degradation() {
        let (value, degraded) = ExtractionResult::Structured(1).resolve(|_| 0);
        assert_eq!((value, degraded), (1, false));
        let (value, degraded) = ExtractionResult::<usize>::Failed { raw: "abc".to_string() }.resolve(|raw| raw.len());
        assert_eq!((value, degraded), (3, true));
    }
}
