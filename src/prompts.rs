//! # Prompt Builders
//!
//! Prompt text for every upstream call, plus the per-operation document
//! budgets. Truncation counts characters, never bytes, and appends
//! [`TRUNCATION_MARKER`] when anything was cut.

use crate::{
    schemas::{AnswerEvaluationResponse, EvaluationLevel, QuestionMode, QuizAnswer, QuizScore},
    store::{DocumentContext, HistoryEntry},
};
use std::{borrow::Cow, fmt::Write};

pub const TRUNCATION_MARKER: &str = "...";

/// Document budget for ordinary chat turns.
pub const CHAT_CONTEXT_LIMIT: usize = 15_000;
/// Document budget for chat turns that ask for generation or analysis, and
/// for question generation.
pub const ANALYSIS_CONTEXT_LIMIT: usize = 50_000;
pub const EVALUATION_CONTEXT_LIMIT: usize = 20_000;
pub const EXPLANATION_CONTEXT_LIMIT: usize = 15_000;

/// Chat history entries included in a chat prompt.
pub const CHAT_HISTORY_WINDOW: usize = 3;

const ANALYSIS_KEYWORDS: &[&str] = &[
    "generate",
    "create",
    "analyze this document",
    "questions",
    "sections",
    "comprehensive",
];

/// Clip `text` to `limit` characters, appending the marker when clipped.
pub fn truncate_chars(text: &str, limit: usize) -> Cow<'_, str> {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => Cow::Owned(format!("{}{}", &text[..byte_idx], TRUNCATION_MARKER)),
        None => Cow::Borrowed(text),
    }
}

/// Chat messages that look like generation or analysis requests get the
/// larger document budget.
pub fn chat_context_limit(message: &str) -> usize {
    let lowered = message.to_lowercase();
    if ANALYSIS_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        ANALYSIS_CONTEXT_LIMIT
    } else {
        CHAT_CONTEXT_LIMIT
    }
}

pub fn chat_prompt(document: &DocumentContext, history: &[HistoryEntry], message: &str) -> String {
    let content = truncate_chars(&document.content, chat_context_limit(message));
    let conversation = history
        .iter()
        .map(|turn| format!("User: {}\nAssistant: {}", turn.user, turn.assistant))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are an AI assistant helping students learn from their selected PDF document.\n\
         \n\
         Document: {filename}\n\
         Content: {content}\n\
         \n\
         Previous conversation:\n\
         {conversation}\n\
         \n\
         Current question: {message}\n\
         \n\
         Please provide a helpful, educational response based on the document content and conversation history.\n",
        filename = document.filename,
    )
}

const MCQ_FORMAT: &str = r#"FORMAT: Create Multiple Choice Questions (MCQ) with 4 options each.

Respond with ONLY a valid JSON object, with no text or markdown before or after it.
Use double quotes for all strings and no trailing commas.

{
  "questions": [
    {
      "question": "Which of the following is mentioned as a Blue Zone in the document?",
      "options": ["A) Tokyo, Japan", "B) New York, USA", "C) Okinawa, Japan", "D) London, UK"],
      "correctAnswer": "C"
    }
  ]
}

- Each question has exactly 4 options labeled A), B), C), D)
- Exactly ONE option is correct according to the document
- Incorrect options are plausible but clearly wrong based on the text
- correctAnswer contains only the letter (A, B, C or D)
"#;

const OPEN_FORMAT: &str = r#"FORMAT: Create open-ended questions for practice. Respond with ONLY a valid JSON object:
{
  "questions": [
    "What is the main concept of Ikigai according to the document?",
    "Explain the characteristics of Blue Zones mentioned in the text."
  ]
}
"#;

pub fn generation_prompt(
    document: &DocumentContext,
    topic: Option<&str>,
    count: u32,
    mode: QuestionMode,
) -> String {
    let content = truncate_chars(&document.content, ANALYSIS_CONTEXT_LIMIT);
    let format_instruction = match mode {
        QuestionMode::Quiz => MCQ_FORMAT,
        QuestionMode::Practice => OPEN_FORMAT,
    };
    let (topic_block, scope) = match topic {
        Some(topic) => (
            format!(
                "SPECIFIC TOPIC FOCUS: \"{topic}\"\n\
                 Focus the questions on this topic, using the full document as context.\n"
            ),
            format!("Focus specifically on the topic \"{topic}\"; every question must be answerable from the document"),
        ),
        None => (
            String::new(),
            "Cover the full scope of the document and all of its major themes".to_string(),
        ),
    };

    format!(
        "You are an educational AI assistant. Analyze the following document content and create questions for learning.\n\
         \n\
         Document: {filename}\n\
         {topic_block}\n\
         FULL DOCUMENT CONTENT:\n\
         {content}\n\
         \n\
         TASK: Create exactly {count} educational questions based on the document content above.\n\
         \n\
         REQUIREMENTS:\n\
         1. {scope}.\n\
         2. Include key concepts and definitions, important facts, practical applications, examples, \
         processes, people, places and events, cause and effect, and comparisons made in the text.\n\
         3. Progress from basic to advanced understanding.\n\
         4. Use actual terms, concepts and examples from the text.\n\
         \n\
         {format_instruction}\n\
         Generate exactly {count} questions now.\n",
        filename = document.filename,
    )
}

/// Scoring rubric embedded in evaluation prompts.
pub fn rubric(level: EvaluationLevel) -> &'static str {
    match level {
        EvaluationLevel::Easy => {
            "EVALUATION LEVEL: EASY (Lenient)\n\
             - Focus on basic understanding and effort\n\
             - Give credit for partial answers and good attempts\n\
             - Be encouraging and supportive in feedback\n\
             \n\
             SCORING SCALE (0-10):\n\
             - 8-10: Shows basic understanding, good effort\n\
             - 6-7: Partially correct, some understanding shown\n\
             - 4-5: Minimal understanding but attempted\n\
             - 2-3: Little understanding but some effort\n\
             - 0-1: No answer or completely off-topic"
        }
        EvaluationLevel::Medium => {
            "EVALUATION LEVEL: MEDIUM (Balanced)\n\
             - Expect reasonable understanding and adequate detail\n\
             - Balance being supportive with maintaining standards\n\
             - Look for key concepts and main points\n\
             \n\
             SCORING SCALE (0-10):\n\
             - 9-10: Excellent - accurate, complete, deep understanding\n\
             - 7-8: Good - mostly accurate, covers the main points\n\
             - 5-6: Satisfactory - partially correct, basic understanding\n\
             - 3-4: Needs Improvement - some correct elements, significant gaps\n\
             - 1-2: Poor - mostly incorrect or irrelevant\n\
             - 0: No answer provided or completely wrong"
        }
        EvaluationLevel::Strict => {
            "EVALUATION LEVEL: STRICT (Rigorous)\n\
             - Require precise, detailed and comprehensive answers\n\
             - Expect specific examples and thorough explanations\n\
             - Be critical of incomplete or vague responses\n\
             \n\
             SCORING SCALE (0-10):\n\
             - 9-10: Exceptional - precise, comprehensive, with specific examples\n\
             - 7-8: Very Good - accurate and detailed, minor gaps acceptable\n\
             - 5-6: Adequate - correct but lacks depth\n\
             - 3-4: Below Standard - significant gaps or inaccuracies\n\
             - 1-2: Poor - major errors or very incomplete\n\
             - 0: No answer or completely wrong"
        }
    }
}

pub fn evaluation_prompt(
    document: &DocumentContext,
    question: &str,
    answer: &str,
    level: EvaluationLevel,
) -> String {
    let content = truncate_chars(&document.content, EVALUATION_CONTEXT_LIMIT);
    format!(
        "You are an expert educational evaluator. Evaluate a student's answer to a question using the document below.\n\
         \n\
         Document: {filename}\n\
         Document Content: {content}\n\
         \n\
         Question: {question}\n\
         Student's Answer: {answer}\n\
         \n\
         Judge accuracy, completeness, understanding and relevance.\n\
         \n\
         {rubric}\n\
         \n\
         Respond in this JSON format:\n\
         {{\n\
         \x20   \"score\": <integer 0-10>,\n\
         \x20   \"feedback\": \"<what was correct and what was missing>\",\n\
         \x20   \"suggestions\": \"<specific suggestions for improvement>\",\n\
         \x20   \"correct_answer_hint\": \"<brief hint without giving the answer away>\"\n\
         }}\n\
         \n\
         Be constructive and encouraging while being honest about areas for improvement.\n",
        filename = document.filename,
        rubric = rubric(level),
    )
}

pub fn explanation_prompt(document: &DocumentContext, question: &str, correct: &str) -> String {
    let content = truncate_chars(&document.content, EXPLANATION_CONTEXT_LIMIT);
    format!(
        "You are an educational AI providing feedback on a multiple choice question.\n\
         \n\
         Document: {filename}\n\
         Document Content: {content}\n\
         \n\
         Question: {question}\n\
         Correct Answer: Option {correct}\n\
         \n\
         In 1-2 sentences, explain why option {correct} is correct, citing the information in the document that supports it.\n\
         Respond with just the explanation, no additional formatting.\n",
        filename = document.filename,
    )
}

pub fn quiz_feedback_prompt(
    document: &DocumentContext,
    topic: Option<&str>,
    score: &QuizScore,
    answers: &[QuizAnswer],
    results: &[AnswerEvaluationResponse],
) -> String {
    let mut prompt = format!(
        "You are an educational AI providing comprehensive feedback on a student's quiz performance.\n\
         \n\
         Document: {filename}\n\
         Topic: {topic}\n\
         \n\
         Quiz Results:\n\
         - Total Score: {total}/{max} ({percentage:.1}%)\n\
         - Grade: {grade}\n\
         - Number of Questions: {questions}\n\
         \n\
         Individual Question Performance:\n",
        filename = document.filename,
        topic = topic.unwrap_or("General"),
        total = score.total,
        max = score.max,
        percentage = score.percentage,
        grade = score.grade,
        questions = answers.len(),
    );

    for (i, (answer, result)) in answers.iter().zip(results).enumerate() {
        // Writing to a String cannot fail.
        let _ = write!(
            prompt,
            "Question {}: {}\nStudent Answer: {}\nScore: {}/{}\n\n",
            i + 1,
            answer.question,
            answer.user_answer,
            result.score,
            result.max_score
        );
    }

    prompt.push_str(
        "Based on this performance, provide:\n\
         1. Overall feedback (2-3 sentences)\n\
         2. Study suggestions (3-4 specific recommendations)\n\
         3. Strengths (2-3 areas where the student did well)\n\
         4. Areas for improvement (2-3 specific areas)\n\
         \n\
         Respond in this JSON format:\n\
         {\n\
         \x20   \"overall_feedback\": \"<overall assessment>\",\n\
         \x20   \"study_suggestions\": [\"suggestion1\", \"suggestion2\", \"suggestion3\"],\n\
         \x20   \"strengths\": [\"strength1\", \"strength2\"],\n\
         \x20   \"areas_for_improvement\": [\"area1\", \"area2\"]\n\
         }\n\
         \n\
         Be encouraging and constructive while giving actionable feedback.\n",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(content: &str) -> DocumentContext {
        DocumentContext {
            filename: "ikigai.pdf".to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_truncate_chars_appends_marker_only_when_clipped() {
        assert_eq!(truncate_chars("abcdef", 3), "abc...");
        assert_eq!(truncate_chars("abc", 3), "abc");
        assert!(matches!(truncate_chars("abc", 10), Cow::Borrowed(_)));
    }

    #[test]
    fn test_truncate_chars_is_utf8_safe() {
        assert_eq!(truncate_chars("ééééé", 2), "éé...");
        assert_eq!(truncate_chars("日本語テキスト", 3), "日本語...");
    }

    #[test]
    fn test_chat_context_limit_keywords() {
        assert_eq!(chat_context_limit("hello there"), CHAT_CONTEXT_LIMIT);
        assert_eq!(chat_context_limit("Please GENERATE a summary"), ANALYSIS_CONTEXT_LIMIT);
        assert_eq!(chat_context_limit("Analyze this document for me"), ANALYSIS_CONTEXT_LIMIT);
    }

    #[test]
    fn test_chat_prompt_uses_budget_and_history() {
        let long = "x".repeat(CHAT_CONTEXT_LIMIT + 10);
        let history = vec![HistoryEntry {
            user: "What is Ikigai?".to_string(),
            assistant: "A reason for being.".to_string(),
            timestamp: "2024-01-01T00:00:00Z".to_string(),
        }];
        let prompt = chat_prompt(&doc(&long), &history, "hello");
        assert!(prompt.contains(&format!("{}...", "x".repeat(CHAT_CONTEXT_LIMIT))));
        assert!(!prompt.contains(&"x".repeat(CHAT_CONTEXT_LIMIT + 1)));
        assert!(prompt.contains("User: What is Ikigai?\nAssistant: A reason for being."));
        assert!(prompt.contains("Current question: hello"));
    }

    #[test]
    fn test_generation_prompt_mode_and_topic() {
        let prompt = generation_prompt(&doc("content"), Some("Blue Zones"), 5, QuestionMode::Quiz);
        assert!(prompt.contains("Create exactly 5 educational questions"));
        assert!(prompt.contains("SPECIFIC TOPIC FOCUS: \"Blue Zones\""));
        assert!(prompt.contains("correctAnswer"));

        let prompt = generation_prompt(&doc("content"), None, 3, QuestionMode::Practice);
        assert!(prompt.contains("open-ended"));
        assert!(!prompt.contains("SPECIFIC TOPIC FOCUS"));
    }

    #[test]
    fn test_evaluation_prompt_embeds_rubric() {
        let prompt = evaluation_prompt(&doc("c"), "Q?", "A.", EvaluationLevel::Strict);
        assert!(prompt.contains("EVALUATION LEVEL: STRICT"));
        assert!(prompt.contains("\"score\": <integer 0-10>"));
    }

    #[test]
    fn test_rubrics_are_distinct() {
        assert_ne!(rubric(EvaluationLevel::Easy), rubric(EvaluationLevel::Medium));
        assert_ne!(rubric(EvaluationLevel::Medium), rubric(EvaluationLevel::Strict));
    }
}
