//! # Fallback Table
//!
//! Deterministic, model-free defaults, one entry per [`OperationKind`] that
//! can degrade. Orchestrators and the extractor take every placeholder from
//! here.
//!
//! [`OperationKind`]: crate::extraction::OperationKind

use crate::{
    extraction::{EvaluationPayload, McqQuestionSet, OpenQuestionSet, QuizFeedbackPayload},
    schemas::{McqQuestion, QuizScore},
};

const FALLBACK_QUESTION: &str = "What is the main topic discussed in this document?";

const REVIEW_SUGGESTION: &str = "Please review the document content for more accurate information.";
const REVIEW_HINT: &str = "Refer to the relevant sections in the document.";

pub const UNANSWERED_FEEDBACK: &str = "No answer was provided for this question.";
pub const UNANSWERED_SUGGESTION: &str =
    "Please provide an answer based on the document content to receive a score.";

/// Score given when the model's evaluation could not be read.
pub const MIDRANGE_SCORE: u32 = 5;

/// [`OperationKind::McqQuestions`](crate::extraction::OperationKind::McqQuestions)
pub fn mcq_questions() -> McqQuestionSet {
    McqQuestionSet {
        questions: vec![McqQuestion {
            question: FALLBACK_QUESTION.to_string(),
            options: vec![
                "A) Main topic".to_string(),
                "B) Secondary topic".to_string(),
                "C) Supporting detail".to_string(),
                "D) Conclusion".to_string(),
            ],
            correct_answer: "A".to_string(),
            explanation: Some("This is a fallback question based on the document content.".to_string()),
        }],
    }
}

/// [`OperationKind::OpenQuestions`](crate::extraction::OperationKind::OpenQuestions)
pub fn open_questions() -> OpenQuestionSet {
    OpenQuestionSet {
        questions: vec![FALLBACK_QUESTION.to_string()],
    }
}

/// [`OperationKind::AnswerEvaluation`](crate::extraction::OperationKind::AnswerEvaluation),
/// used when the reply held JSON of the wrong shape.
pub fn answer_evaluation() -> EvaluationPayload {
    EvaluationPayload {
        score: MIDRANGE_SCORE,
        feedback: "Your answer was received, but a detailed evaluation is not available.".to_string(),
        suggestions: REVIEW_SUGGESTION.to_string(),
        correct_answer_hint: Some(REVIEW_HINT.to_string()),
    }
}

/// Evaluation built from a reply with no JSON at all: the model's prose
/// becomes the feedback.
pub fn answer_evaluation_from_raw(raw: String) -> EvaluationPayload {
    EvaluationPayload {
        score: MIDRANGE_SCORE,
        feedback: raw.trim().to_string(),
        suggestions: REVIEW_SUGGESTION.to_string(),
        correct_answer_hint: Some(REVIEW_HINT.to_string()),
    }
}

/// [`OperationKind::McqExplanation`](crate::extraction::OperationKind::McqExplanation)
pub fn mcq_explanation(correct: &str) -> String {
    format!("Option {} is the correct answer according to the document.", correct)
}

/// [`OperationKind::QuizFeedback`](crate::extraction::OperationKind::QuizFeedback),
/// used when the reply could not be read.
pub fn quiz_feedback(score: &QuizScore) -> QuizFeedbackPayload {
    let verdict = if score.percentage >= 80.0 {
        "Great job!"
    } else {
        "Keep practicing to improve your understanding."
    };
    QuizFeedbackPayload {
        overall_feedback: format!(
            "You scored {}/{} ({:.1}%). {}",
            score.total, score.max, score.percentage, verdict
        ),
        study_suggestions: strings(&[
            "Review the document content thoroughly",
            "Focus on key concepts and definitions",
            "Practice explaining concepts in your own words",
        ]),
        strengths: strings(&["Completed all questions", "Showed effort in answering"]),
        areas_for_improvement: strings(&[
            "Accuracy of responses",
            "Depth of understanding",
            "Use of specific examples from the text",
        ]),
    }
}

/// Holistic feedback when the feedback call itself failed.
pub fn quiz_feedback_unavailable(score: &QuizScore) -> QuizFeedbackPayload {
    QuizFeedbackPayload {
        overall_feedback: format!(
            "Quiz completed. Score: {}/{} ({:.1}%)",
            score.total, score.max, score.percentage
        ),
        study_suggestions: strings(&["Review the document content", "Practice more questions"]),
        strengths: strings(&["Completed the quiz"]),
        areas_for_improvement: strings(&["Continue studying the material"]),
    }
}

/// Per-field defaults for a partially filled feedback reply.
pub fn quiz_feedback_field_defaults(score: &QuizScore) -> QuizFeedbackPayload {
    QuizFeedbackPayload {
        overall_feedback: format!("You scored {}/{} ({:.1}%)", score.total, score.max, score.percentage),
        study_suggestions: strings(&["Review the document content", "Practice more questions"]),
        strengths: strings(&["Attempted all questions"]),
        areas_for_improvement: strings(&["Focus on accuracy", "Provide more detailed answers"]),
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
