use super::TutorService;
use crate::{
    error::GatewayError,
    extraction::{extract, normalize_choice, EvaluationPayload, OperationKind, QuizFeedbackPayload},
    fallback::{self, UNANSWERED_FEEDBACK, UNANSWERED_SUGGESTION},
    prompts,
    schemas::{
        AnswerEvaluationRequest, AnswerEvaluationResponse, EvaluationLevel, QuestionId, QuizAnswer,
        QuizScore, QuizSubmissionRequest, QuizSubmissionResponse, MAX_QUESTION_SCORE,
    },
    store::DocumentContext,
    Result,
};
use tracing::{debug, info, warn};

/// Clients send this literal for skipped questions.
const NO_ANSWER_SENTINEL: &str = "no answer provided";

/// Blank answers and the "no answer provided" sentinel, in any case.
pub fn is_unanswered(answer: &str) -> bool {
    let trimmed = answer.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case(NO_ANSWER_SENTINEL)
}

fn option_text<'a>(options: &'a [String], letter: &str) -> Option<&'a str> {
    let prefix = format!("{})", letter);
    options
        .iter()
        .map(|o| o.trim())
        .find(|o| o.to_ascii_uppercase().starts_with(&prefix))
}

fn unanswered(question_id: &QuestionId) -> AnswerEvaluationResponse {
    AnswerEvaluationResponse {
        question_id: question_id.clone(),
        score: 0,
        max_score: MAX_QUESTION_SCORE,
        feedback: UNANSWERED_FEEDBACK.to_string(),
        suggestions: UNANSWERED_SUGGESTION.to_string(),
        correct_answer_hint: None,
    }
}

/// Binary multiple-choice scoring: full marks on an exact letter match,
/// zero otherwise. `explanation` is appended to the feedback.
pub fn score_mcq(answer: &QuizAnswer, correct: &str, explanation: &str) -> AnswerEvaluationResponse {
    let correct = normalize_choice(correct).to_ascii_uppercase();
    let correct_label = option_text(&answer.options, &correct)
        .map(str::to_string)
        .unwrap_or_else(|| format!("Option {}", correct));

    let (score, feedback, suggestions) = if is_unanswered(&answer.user_answer) {
        (
            0,
            format!(
                "❌ {} The correct answer is '{}'. {}",
                UNANSWERED_FEEDBACK, correct_label, explanation
            ),
            UNANSWERED_SUGGESTION.to_string(),
        )
    } else {
        let chosen = normalize_choice(&answer.user_answer).to_ascii_uppercase();
        let chosen_label = option_text(&answer.options, &chosen)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Option {}", chosen));

        if chosen == correct {
            (
                MAX_QUESTION_SCORE,
                format!("✅ Correct! You selected '{}'. {}", chosen_label, explanation),
                "Great job! Continue studying to maintain this level of understanding.".to_string(),
            )
        } else {
            (
                0,
                format!(
                    "❌ Incorrect. You selected '{}', but the correct answer is '{}'. {}",
                    chosen_label, correct_label, explanation
                ),
                "Review the relevant section in the document to understand the correct answer.".to_string(),
            )
        }
    };

    AnswerEvaluationResponse {
        question_id: answer.question_id.clone(),
        score,
        max_score: MAX_QUESTION_SCORE,
        feedback,
        suggestions,
        correct_answer_hint: None,
    }
}

impl TutorService {
    /// Grade one free-text answer against the session's document.
    ///
    /// Unanswered questions score zero without an upstream call.
    pub async fn evaluate_answer(
        &self,
        session: &str,
        request: &AnswerEvaluationRequest,
    ) -> Result<AnswerEvaluationResponse> {
        let document = self.document(session)?;
        self.evaluate_open(
            &document,
            &request.question,
            &request.user_answer,
            &request.question_id,
            request.evaluation_level.unwrap_or_default(),
        )
        .await
    }

    async fn evaluate_open(
        &self,
        document: &DocumentContext,
        question: &str,
        user_answer: &str,
        question_id: &QuestionId,
        level: EvaluationLevel,
    ) -> Result<AnswerEvaluationResponse> {
        if is_unanswered(user_answer) {
            debug!(question_id = %question_id, "Unanswered question scored zero");
            return Ok(unanswered(question_id));
        }

        let prompt = prompts::evaluation_prompt(document, question, user_answer, level);
        let reply = self.call_upstream(OperationKind::AnswerEvaluation, prompt).await?;
        let (payload, degraded) =
            extract::<EvaluationPayload>(&reply, &()).resolve(fallback::answer_evaluation_from_raw);
        if degraded {
            warn!(question_id = %question_id, "Answer evaluation degraded to fallback");
        }

        Ok(AnswerEvaluationResponse {
            question_id: question_id.clone(),
            score: payload.score,
            max_score: MAX_QUESTION_SCORE,
            feedback: payload.feedback,
            suggestions: payload.suggestions,
            correct_answer_hint: payload.correct_answer_hint,
        })
    }

    /// Model-written explanation of the correct option. Any failure degrades
    /// to the static explanation.
    async fn explain_mcq(&self, document: &DocumentContext, question: &str, correct: &str) -> String {
        let prompt = prompts::explanation_prompt(document, question, correct);
        match self.call_upstream(OperationKind::McqExplanation, prompt).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => fallback::mcq_explanation(correct),
            Err(err) => {
                warn!(error = %err, "Explanation unavailable, using static text");
                fallback::mcq_explanation(correct)
            }
        }
    }

    /// Grade a whole quiz.
    ///
    /// Items are graded in order. Multiple-choice scores never depend on
    /// the model; open-ended items go through [`TutorService::evaluate_answer`]'s
    /// path and their upstream failures fail the submission. The holistic
    /// feedback always degrades instead of failing.
    pub async fn evaluate_quiz(
        &self,
        session: &str,
        request: &QuizSubmissionRequest,
    ) -> Result<QuizSubmissionResponse> {
        if request.answers.is_empty() {
            return Err(GatewayError::validation("Quiz submission contains no answers"));
        }
        let document = self.document(session)?;
        let level = request.evaluation_level.unwrap_or_default();

        let mut results = Vec::with_capacity(request.answers.len());
        for answer in &request.answers {
            let result = match answer.mcq_key() {
                Some(key) => {
                    let correct = normalize_choice(key).to_ascii_uppercase();
                    let explanation = self.explain_mcq(&document, &answer.question, &correct).await;
                    score_mcq(answer, &correct, &explanation)
                }
                None => {
                    self.evaluate_open(
                        &document,
                        &answer.question,
                        &answer.user_answer,
                        &answer.question_id,
                        level,
                    )
                    .await?
                }
            };
            results.push(result);
        }

        let scores: Vec<u32> = results.iter().map(|r| r.score).collect();
        let score = QuizScore::from_scores(&scores);
        let topic = request.topic.as_deref().map(str::trim).filter(|t| !t.is_empty());

        let prompt = prompts::quiz_feedback_prompt(&document, topic, &score, &request.answers, &results);
        let feedback = match self.call_upstream(OperationKind::QuizFeedback, prompt).await {
            Ok(reply) => {
                extract::<QuizFeedbackPayload>(&reply, &score)
                    .resolve(|_| fallback::quiz_feedback(&score))
                    .0
            }
            Err(err) => {
                warn!(error = %err, "Holistic feedback unavailable, using static feedback");
                fallback::quiz_feedback_unavailable(&score)
            }
        };

        info!(
            session,
            questions = request.answers.len(),
            total = score.total,
            max = score.max,
            grade = %score.grade,
            "Quiz evaluated"
        );

        Ok(QuizSubmissionResponse {
            overall_score: score.total,
            max_score: score.max,
            percentage: score.rounded_percentage(),
            grade: score.grade.to_string(),
            individual_results: results,
            overall_feedback: feedback.overall_feedback,
            study_suggestions: feedback.study_suggestions,
            strengths: feedback.strengths,
            areas_for_improvement: feedback.areas_for_improvement,
        })
    }
}
