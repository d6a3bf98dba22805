use super::TutorService;
use crate::{
    error::GatewayError,
    extraction::{extract, ExtractShape, McqQuestionSet, OpenQuestionSet},
    fallback,
    prompts,
    schemas::{GeneratedQuestions, QuestionGenerationRequest, QuestionGenerationResponse, QuestionMode},
    Result,
};
use chrono::Utc;
use tracing::{info, warn};

pub const MAX_QUESTION_COUNT: u32 = 100;

/// Shortest trimmed document, in characters, worth generating from.
pub const MIN_DOCUMENT_CHARS: usize = 100;

impl TutorService {
    /// Generate `count` questions from the session's document.
    ///
    /// An unusable model reply degrades to the single-question fallback set
    /// and sets `fallback` on the response; upstream failures are errors.
    pub async fn generate_questions(
        &self,
        session: &str,
        request: &QuestionGenerationRequest,
    ) -> Result<QuestionGenerationResponse> {
        if request.count == 0 || request.count > MAX_QUESTION_COUNT {
            return Err(GatewayError::validation(format!(
                "Question count must be between 1 and {}",
                MAX_QUESTION_COUNT
            )));
        }

        let document = self.document(session)?;
        if document.content.trim().chars().count() < MIN_DOCUMENT_CHARS {
            return Err(GatewayError::validation(
                "Document content is too short to generate meaningful questions",
            ));
        }

        let topic = request.topic_filter();
        info!(
            session,
            filename = %document.filename,
            topic = topic.unwrap_or("-"),
            count = request.count,
            mode = ?request.mode,
            "Generating questions"
        );

        let prompt = prompts::generation_prompt(&document, topic, request.count, request.mode);
        let kind = match request.mode {
            QuestionMode::Quiz => McqQuestionSet::KIND,
            QuestionMode::Practice => OpenQuestionSet::KIND,
        };
        let reply = self.call_upstream(kind, prompt).await?;

        let (mut questions, degraded) = match request.mode {
            QuestionMode::Quiz => {
                let (set, degraded) =
                    extract::<McqQuestionSet>(&reply, &()).resolve(|_| fallback::mcq_questions());
                (GeneratedQuestions::MultipleChoice(set.questions), degraded)
            }
            QuestionMode::Practice => {
                let (set, degraded) =
                    extract::<OpenQuestionSet>(&reply, &()).resolve(|_| fallback::open_questions());
                (GeneratedQuestions::OpenEnded(set.questions), degraded)
            }
        };
        questions.truncate(request.count as usize);

        if degraded {
            warn!(session, "Question generation degraded to fallback questions");
        }

        Ok(QuestionGenerationResponse {
            count: questions.len(),
            questions,
            mode: request.mode,
            fallback: degraded,
            timestamp: Utc::now().to_rfc3339(),
        })
    }
}
