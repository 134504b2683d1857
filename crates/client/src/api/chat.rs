//! Support chat endpoint.

use serde_json::{Value, json};
use tracing::instrument;

use crate::api::{ApiClient, ApiError, extract_item};

/// Canned reply shown when the assistant cannot be reached.
pub const FALLBACK_ANSWER: &str =
    "Xin lỗi, tôi không thể trả lời ngay lúc này. Vui lòng thử lại sau.";

impl ApiClient {
    /// Ask the store assistant a question.
    ///
    /// Callers that want the degrade-gracefully behavior substitute
    /// [`FALLBACK_ANSWER`] on error instead of surfacing it.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or when the response carries
    /// no answer text.
    #[instrument(skip(self, question))]
    pub async fn ask(&self, question: &str) -> Result<String, ApiError> {
        let value = self
            .post_value("/chatbot/query", &json!({ "question": question }), None)
            .await?;

        answer_text(&value)
            .map(str::to_owned)
            .ok_or_else(|| ApiError::Shape("chat response missing answer".to_string()))
    }
}

fn answer_text(value: &Value) -> Option<&str> {
    value
        .get("answer")
        .or_else(|| extract_item(value).get("answer"))
        .and_then(Value::as_str)
}
