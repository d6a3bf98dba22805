//! # Extraction Tests
//!
//! Model replies as they actually arrive: fenced, wrapped in prose, or
//! not JSON at all.

use serde_json::json;
use tutor_gateway::{
    extraction::{clamp_score, EvaluationPayload, McqQuestionSet, OpenQuestionSet, QuizFeedbackPayload},
    extract,
    schemas::QuizScore,
    ExtractionResult,
};

#[test]
fn test_fenced_evaluation_is_structured() {
    let raw = "```json\n{\"score\": 8, \"feedback\": \"Good\", \"suggestions\": \"More detail\"}\n```";

    match extract::<EvaluationPayload>(raw, &()) {
        ExtractionResult::Structured(payload) => {
            assert_eq!(payload.score, 8);
            assert_eq!(payload.feedback, "Good");
            assert_eq!(payload.suggestions, "More detail");
            assert_eq!(payload.correct_answer_hint, None);
        }
        other => panic!("expected structured payload, got {:?}", other),
    }
}

#[test]
fn test_payload_wrapped_in_prose() {
    let payload = json!({
        "score": 6,
        "feedback": "Mentions purpose {but not} community",
        "suggestions": "Cite the \"Blue Zones\" chapter"
    });
    let raw = format!("Sure! Here is my evaluation:\n\n{}\n\nLet me know if you need more.", payload);

    let result = extract::<EvaluationPayload>(&raw, &());

    assert!(result.is_structured());
    let (payload, degraded) = result.resolve(|_| unreachable!());
    assert!(!degraded);
    assert_eq!(payload.feedback, "Mentions purpose {but not} community");
    assert_eq!(payload.suggestions, "Cite the \"Blue Zones\" chapter");
}

#[test]
fn test_payload_after_prose_with_unclosed_braces() {
    let prose = "In Rust you write `fn main() {` and `if x {` before the body. ".repeat(8);
    let raw = format!(
        "{}\n{{\"score\": 7, \"feedback\": \"ok\", \"suggestions\": \"none\"}}",
        prose
    );

    match extract::<EvaluationPayload>(&raw, &()) {
        ExtractionResult::Structured(payload) => {
            assert_eq!(payload.score, 7);
            assert_eq!(payload.feedback, "ok");
        }
        other => panic!("expected structured payload, got {:?}", other),
    }
}

#[test]
fn test_garbage_reply_fails_with_raw_text() {
    let raw = "I'm sorry, I can't evaluate that answer.";

    match extract::<EvaluationPayload>(raw, &()) {
        ExtractionResult::Failed { raw: kept } => assert_eq!(kept, raw),
        other => panic!("expected failure, got {:?}", other),
    }
}

#[test]
fn test_wrong_shape_uses_fallback_payload() {
    let result = extract::<EvaluationPayload>(r#"{"grade": "B+"}"#, &());

    match result {
        ExtractionResult::Fallback(payload) => assert_eq!(payload.score, 5),
        other => panic!("expected fallback, got {:?}", other),
    }
}

#[test]
fn test_scores_are_clamped() {
    for (reported, expected) in [(-5, 0), (0, 0), (7, 7), (15, 10)] {
        let raw = json!({"score": reported}).to_string();
        let (payload, _) = extract::<EvaluationPayload>(&raw, &()).resolve(|_| unreachable!());
        assert_eq!(payload.score, expected, "reported {}", reported);
    }
    assert_eq!(clamp_score(7.6), 8);
    assert_eq!(clamp_score(f64::NAN), 0);
}

#[test]
fn test_second_candidate_is_used_when_first_is_unusable() {
    let raw = r#"Schema: {"type": "object"} Answer: {"questions": ["Why Okinawa?"]}"#;

    let result = extract::<OpenQuestionSet>(raw, &());

    match result {
        ExtractionResult::Structured(set) => assert_eq!(set.questions, vec!["Why Okinawa?".to_string()]),
        other => panic!("expected structured payload, got {:?}", other),
    }
}

#[test]
fn test_mcq_set_normalizes_answers_and_drops_bad_items() {
    let raw = json!({"questions": [
        {"question": "Where is Okinawa?", "options": ["A) Japan", "B) Peru"], "correctAnswer": "a)"},
        {"question": "Missing options", "correctAnswer": "A"},
        {"question": "", "options": ["A) x", "B) y"], "correctAnswer": "A"}
    ]})
    .to_string();

    let (set, degraded) = extract::<McqQuestionSet>(&raw, &()).resolve(|_| unreachable!());

    assert!(!degraded);
    assert_eq!(set.questions.len(), 1);
    assert_eq!(set.questions[0].correct_answer, "A");
}

#[test]
fn test_quiz_feedback_partial_and_empty() {
    let score = QuizScore::from_scores(&[10, 5]);

    let (partial, degraded) = extract::<QuizFeedbackPayload>(r#"{"strengths": ["Recall"]}"#, &score)
        .resolve(|_| unreachable!());
    assert!(!degraded);
    assert_eq!(partial.strengths, vec!["Recall".to_string()]);
    assert_eq!(partial.overall_feedback, "You scored 15/20 (75.0%)");
    assert!(!partial.study_suggestions.is_empty());

    let empty = extract::<QuizFeedbackPayload>("{}", &score);
    match empty {
        ExtractionResult::Fallback(payload) => {
            assert!(payload.overall_feedback.starts_with("You scored 15/20 (75.0%)."));
        }
        other => panic!("expected fallback, got {:?}", other),
    }
}

#[test]
fn test_unbalanced_reply_is_a_failure() {
    let raw = r#"{"score": 7, "feedback": "cut off mid-"#;

    let result = extract::<EvaluationPayload>(raw, &());

    assert!(matches!(result, ExtractionResult::Failed { .. }));
}
