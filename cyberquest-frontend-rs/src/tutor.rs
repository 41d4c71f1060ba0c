//! Client for the remote AI tutor.
//!
//! Three request/response operations against the tutor backend. Every
//! failure mode (offline, quota, server error, bad payload) is absorbed into
//! a safe fallback here so callers never see an error: a missing explanation
//! renders as "unavailable", a failed chat turn gets a fixed apology. Nothing
//! in this module is retried automatically.

use serde::{Deserialize, Serialize};

/// Topic string sent with mistake explanations.
pub const TUTOR_TOPIC: &str = "Cyber Security";

/// Lesson bodies are clipped before being sent for simplification.
pub const MAX_SIMPLIFY_CHARS: usize = 2000;

/// Only the most recent turns of the conversation are sent as chat context.
pub const MAX_CHAT_HISTORY: usize = 5;

/// Fixed reply when the chat tutor cannot be reached.
pub const CHAT_FALLBACK_REPLY: &str =
    "فشل الاتصال بوحدة المعالجة المركزية (Error processing request).";

#[derive(Debug, thiserror::Error)]
pub enum TutorError {
    #[error("tutor request failed: {0}")]
    Request(#[from] reqwest::Error),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExplainMistakeRequest<'a> {
    question: &'a str,
    user_answer: &'a str,
    correct_answer: &'a str,
    topic: &'a str,
}

#[derive(Serialize)]
struct SimplifyRequest {
    content: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest<'a> {
    query: &'a str,
    history: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    image_base64: Option<&'a str>,
}

#[derive(Deserialize)]
struct TutorReply {
    text: String,
}

async fn hit_tutor_server<T: Serialize>(path: &str, request: &T) -> Result<TutorReply, TutorError> {
    let url = if cfg!(feature = "local-backend") {
        "http://localhost:8080"
    } else {
        "https://cyberquest-tutor.fly.dev"
    };
    let response = reqwest::Client::new()
        .post(format!("{url}{path}"))
        .json(request)
        .send()
        .await?
        .error_for_status()?;
    Ok(response.json().await?)
}

/// Explains why a quiz answer was wrong. `None` when the tutor is
/// unavailable; the quiz proceeds without feedback either way.
pub async fn explain_mistake(
    question: &str,
    user_answer: &str,
    correct_answer: &str,
    topic: &str,
) -> Option<String> {
    let request = ExplainMistakeRequest {
        question,
        user_answer,
        correct_answer,
        topic,
    };
    match hit_tutor_server("/explain-mistake", &request).await {
        Ok(reply) => Some(reply.text),
        Err(e) => {
            log::debug!("explain_mistake unavailable: {e}");
            None
        }
    }
}

/// Produces a bullet-point summary of a lesson body, or `None` when the
/// tutor is unavailable.
pub async fn simplify(content: &str) -> Option<String> {
    let request = SimplifyRequest {
        content: clip_for_prompt(content),
    };
    match hit_tutor_server("/simplify", &request).await {
        Ok(reply) => Some(reply.text),
        Err(e) => {
            log::debug!("simplify unavailable: {e}");
            None
        }
    }
}

/// One chat turn with the tutor. Always returns displayable text: failures
/// map to the fixed fallback reply.
pub async fn chat(query: &str, history: &[String], image_base64: Option<&str>) -> String {
    let request = ChatRequest {
        query,
        history: recent_history(history),
        image_base64,
    };
    match hit_tutor_server("/chat", &request).await {
        Ok(reply) => reply.text,
        Err(e) => {
            log::debug!("chat unavailable: {e}");
            CHAT_FALLBACK_REPLY.to_string()
        }
    }
}

fn clip_for_prompt(content: &str) -> String {
    content.chars().take(MAX_SIMPLIFY_CHARS).collect()
}

fn recent_history(history: &[String]) -> &[String] {
    &history[history.len().saturating_sub(MAX_CHAT_HISTORY)..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_respects_char_boundaries() {
        let content = "ع".repeat(MAX_SIMPLIFY_CHARS + 100);
        let clipped = clip_for_prompt(&content);
        assert_eq!(clipped.chars().count(), MAX_SIMPLIFY_CHARS);
    }

    #[test]
    fn test_short_content_is_not_clipped() {
        assert_eq!(clip_for_prompt("short lesson"), "short lesson");
    }

    #[test]
    fn test_recent_history_keeps_the_last_five_turns() {
        let history: Vec<String> = (0..8).map(|i| format!("turn {i}")).collect();
        let recent = recent_history(&history);
        assert_eq!(recent.len(), MAX_CHAT_HISTORY);
        assert_eq!(recent[0], "turn 3");
        assert_eq!(recent[4], "turn 7");
    }

    #[test]
    fn test_recent_history_handles_short_conversations() {
        let history = vec!["hi".to_string()];
        assert_eq!(recent_history(&history), history.as_slice());
        assert!(recent_history(&[]).is_empty());
    }

    #[test]
    fn test_chat_request_omits_absent_image() {
        let request = ChatRequest {
            query: "what is nmap",
            history: &[],
            image_base64: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("imageBase64").is_none());
    }
}
