use std::time::Duration;

use reqwest::Client;
use serde_json::Value as JsonValue;
use tokio::fs;
use tokio::process::Command;
use tracing::warn;

use crate::dto::teacher_dto::{DraftQuestion, GeneratedQuizDraft};
use crate::error::Result;

const CHAT_COMPLETIONS_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const CHAT_MODEL: &str = "llama-3.1-8b-instant";

/// How much extracted document text goes into the generation prompt.
const MAX_PROMPT_CHARS: usize = 12_000;

#[derive(Clone)]
pub struct AiService {
    client: Client,
    api_key: String,
}

impl AiService {
    pub fn new(api_key: String, client: Client) -> Self {
        Self { client, api_key }
    }

    /// Free-form study question answering.
    pub async fn ask(&self, question: &str) -> Result<String> {
        let payload = serde_json::json!({
            "model": CHAT_MODEL,
            "messages": [
                {
                    "role": "system",
                    "content": "You are a helpful study assistant. Answer concisely and accurately."
                },
                {"role": "user", "content": question}
            ],
            "temperature": 0.5
        });

        let body = self.chat(payload).await?;
        Ok(extract_content(&body).unwrap_or_default())
    }

    /// Builds a reviewable quiz draft from extracted document text. Any
    /// failure along the way, from the API call to unparseable output, is
    /// logged and replaced by a fixed fallback draft so the teacher always
    /// gets something to edit.
    pub async fn generate_quiz_draft(&self, document_text: &str) -> GeneratedQuizDraft {
        let excerpt: String = document_text.chars().take(MAX_PROMPT_CHARS).collect();
        let system_prompt = r#"You are a quiz author. From the provided study material, generate a quiz as a valid JSON object with a 'questions' array.

Rules:
1. Generate 5 to 10 multiple-choice questions covering the material.
2. Each question has exactly 4 options.
3. 'correct' is the zero-based index of the right option. VARY it; do not always use 0.
4. Add a short 'explanation' for each question.
"#;

        let user_schema = serde_json::json!({
            "material": excerpt,
            "schema_example": {
                "questions": [
                    {
                        "question": "Question text...",
                        "options": ["Option 1", "Option 2", "Option 3", "Option 4"],
                        "correct": 2,
                        "explanation": "Why the option at index 2 is correct..."
                    }
                ]
            }
        });

        let payload = serde_json::json!({
            "model": CHAT_MODEL,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_schema.to_string()}
            ],
            "response_format": { "type": "json_object" },
            "temperature": 0.7
        });

        match self.chat(payload).await {
            Ok(body) => match parse_draft(&body) {
                Some(draft) => draft,
                None => {
                    warn!("Generation output had no usable questions; using fallback draft");
                    fallback_draft()
                }
            },
            Err(e) => {
                warn!("Quiz generation failed ({}); using fallback draft", e);
                fallback_draft()
            }
        }
    }

    async fn chat(&self, payload: JsonValue) -> Result<JsonValue> {
        let res = self
            .client
            .post(CHAT_COMPLETIONS_URL)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .timeout(Duration::from_secs(120))
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Chat API error {}: {}", status, text).into());
        }

        let body: JsonValue = res.json().await?;
        Ok(body)
    }
}

/// Extracts plain text from an uploaded PDF by shelling out to `pdftotext`.
/// Extraction failures degrade to an empty string; the draft generator
/// falls back on its own.
pub async fn extract_pdf_text(bytes: &[u8]) -> String {
    let path = format!("/tmp/quiz_upload_{}.pdf", uuid::Uuid::new_v4());
    if let Err(e) = fs::write(&path, bytes).await {
        warn!("Failed to stage uploaded PDF: {}", e);
        return String::new();
    }

    let output = Command::new("pdftotext")
        .arg("-layout")
        .arg(&path)
        .arg("-")
        .output()
        .await;
    let _ = fs::remove_file(&path).await;

    match output {
        Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout).into_owned(),
        Ok(out) => {
            warn!(
                "pdftotext exited with {}: {}",
                out.status,
                String::from_utf8_lossy(&out.stderr)
            );
            String::new()
        }
        Err(e) => {
            warn!("Failed to run pdftotext: {}", e);
            String::new()
        }
    }
}

fn extract_content(body: &JsonValue) -> Option<String> {
    body.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.trim().to_string())
}

fn parse_draft(body: &JsonValue) -> Option<GeneratedQuizDraft> {
    let content = extract_content(body)?;
    let parsed: JsonValue = serde_json::from_str(&content).ok()?;
    let draft = sanitize_draft(&parsed);
    if draft.questions.is_empty() {
        None
    } else {
        Some(draft)
    }
}

/// Coerces model output into well-formed draft questions, dropping anything
/// that is not a question with at least two options and an in-range answer.
fn sanitize_draft(raw: &JsonValue) -> GeneratedQuizDraft {
    let items = raw
        .get("questions")
        .and_then(|a| a.as_array())
        .cloned()
        .or_else(|| raw.as_array().cloned())
        .unwrap_or_default();

    let questions = items
        .iter()
        .filter_map(|item| {
            let question = item.get("question")?.as_str()?.trim().to_string();
            if question.is_empty() {
                return None;
            }
            let options: Vec<String> = item
                .get("options")?
                .as_array()?
                .iter()
                .filter_map(|o| o.as_str().map(|s| s.to_string()))
                .collect();
            if options.len() < 2 {
                return None;
            }
            let correct = item.get("correct").and_then(|c| c.as_i64()).unwrap_or(-1);
            if correct < 0 || correct as usize >= options.len() {
                return None;
            }
            let explanation = item
                .get("explanation")
                .and_then(|e| e.as_str())
                .map(|s| s.to_string());
            Some(DraftQuestion {
                question,
                options,
                correct: correct as i32,
                explanation,
            })
        })
        .collect();

    GeneratedQuizDraft { questions }
}

/// The draft returned when generation produces nothing usable. It is plainly
/// placeholder material, so the teacher sees immediately that generation
/// failed and can edit or retry.
pub fn fallback_draft() -> GeneratedQuizDraft {
    GeneratedQuizDraft {
        questions: vec![DraftQuestion {
            question: "Automatic generation failed for this document. What should you do next?"
                .to_string(),
            options: vec![
                "Edit this draft manually".to_string(),
                "Upload a different document".to_string(),
                "Retry generation".to_string(),
                "Publish this placeholder as-is".to_string(),
            ],
            correct: 0,
            explanation: Some(
                "The generator could not produce questions from the uploaded document."
                    .to_string(),
            ),
        }],
    }
}
