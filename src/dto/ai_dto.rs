use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AskAiRequest {
    #[validate(length(min = 1, max = 2000))]
    pub question: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AskAiResponse {
    pub answer: String,
    pub cached: bool,
}
