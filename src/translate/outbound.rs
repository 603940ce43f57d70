//! Upstream Gemini `generateContent` response → OpenAI chat-completions
//! response, unary and streaming-chunk shapes, per `spec.md` §4.3.

use crate::schema::gemini::{Candidate, GenerateContentResponse};
use crate::schema::openai::{
    ChatCompletionChunk, ChatCompletionResponse, Choice, ChunkChoice, Delta, ResponseMessage,
};
use rand::RngCore;

pub fn new_completion_id() -> String {
    format!("chatcmpl-{}", random_hex(24))
}

fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::rng().fill_bytes(&mut buf);
    buf.iter().map(|b| format!("{b:02x}")).collect()
}

pub fn map_finish_reason(reason: Option<&str>) -> &'static str {
    match reason {
        Some("STOP") => "stop",
        Some("MAX_TOKENS") => "length",
        Some("SAFETY") | Some("RECITATION") => "content_filter",
        _ => "stop",
    }
}

struct Extracted {
    content: String,
    reasoning_content: Option<String>,
}

fn extract_candidate(candidate: &Candidate) -> Extracted {
    let mut content = String::new();
    let mut reasoning = String::new();

    if let Some(gemini_content) = &candidate.content {
        for part in &gemini_content.parts {
            if let Some(text) = &part.text {
                if part.thought == Some(true) {
                    reasoning.push_str(text);
                } else {
                    content.push_str(text);
                }
            } else if let Some(inline) = &part.inline_data {
                content.push_str(&format!(
                    "\n![image](data:{};base64,{})\n",
                    inline.mime_type, inline.data
                ));
            }
        }
    }

    Extracted {
        content,
        reasoning_content: (!reasoning.is_empty()).then_some(reasoning),
    }
}

/// Convert a unary `generateContent` response into an OpenAI
/// `chat.completion` object addressed under the originally-requested model
/// name (which may carry a variant suffix the upstream never saw).
pub fn unary_to_openai(
    response: &GenerateContentResponse,
    requested_model: &str,
    created: i64,
) -> ChatCompletionResponse {
    let candidate = response.candidates.first();
    let extracted = candidate
        .map(extract_candidate)
        .unwrap_or(Extracted { content: String::new(), reasoning_content: None });
    let finish_reason = map_finish_reason(candidate.and_then(|c| c.finish_reason.as_deref()));

    ChatCompletionResponse {
        id: new_completion_id(),
        object: "chat.completion",
        created,
        model: requested_model.to_string(),
        choices: vec![Choice {
            index: 0,
            message: ResponseMessage {
                role: "assistant",
                content: extracted.content,
                reasoning_content: extracted.reasoning_content,
            },
            finish_reason,
        }],
    }
}

/// State threaded across one streaming call so the first chunk can carry
/// `role="assistant"` and subsequent ones don't repeat it. Content and the
/// closing `finish_reason` are kept on separate chunks: upstream often
/// bundles both in its last event, but OpenAI clients expect the final
/// chunk's delta to be empty.
pub struct StreamState {
    id: String,
    model: String,
    created: i64,
    first_chunk_sent: bool,
    pending_finish_reason: Option<&'static str>,
}

impl StreamState {
    pub fn new(requested_model: &str, created: i64) -> Self {
        Self {
            id: new_completion_id(),
            model: requested_model.to_string(),
            created,
            first_chunk_sent: false,
            pending_finish_reason: None,
        }
    }

    /// The finish reason upstream has reported so far, if any — read this
    /// once the upstream stream ends to pick `final_chunk`'s argument.
    pub fn finish_reason(&self) -> Option<&'static str> {
        self.pending_finish_reason
    }

    /// Translate one upstream chunk into zero-or-one OpenAI chunk. Returns
    /// `None` when the chunk carries no candidate (e.g. a bare
    /// `usageMetadata`-only frame upstream sometimes sends) and no content.
    pub fn next_chunk(&mut self, response: &GenerateContentResponse) -> Option<ChatCompletionChunk> {
        let candidate = response.candidates.first()?;
        let extracted = extract_candidate(candidate);
        if let Some(reason) = candidate.finish_reason.as_deref() {
            self.pending_finish_reason = Some(map_finish_reason(Some(reason)));
        }

        let role = (!self.first_chunk_sent).then_some("assistant");
        let content = (!extracted.content.is_empty()).then_some(extracted.content);
        if role.is_none() && content.is_none() && extracted.reasoning_content.is_none() {
            return None;
        }
        self.first_chunk_sent = true;

        Some(ChatCompletionChunk {
            id: self.id.clone(),
            object: "chat.completion.chunk",
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChunkChoice {
                index: 0,
                delta: Delta {
                    role,
                    content,
                    reasoning_content: extracted.reasoning_content,
                },
                finish_reason: None,
            }],
        })
    }

    /// The closing chunk: empty delta, a finish reason, emitted once the
    /// upstream stream completes without ever reporting one itself.
    pub fn final_chunk(&self, finish_reason: &'static str) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: self.id.clone(),
            object: "chat.completion.chunk",
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChunkChoice {
                index: 0,
                delta: Delta::default(),
                finish_reason: Some(finish_reason),
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::gemini::{Content, Part};

    fn candidate_with_text(text: &str, thought: Option<bool>, finish: Option<&str>) -> Candidate {
        Candidate {
            content: Some(Content {
                role: Some("model".into()),
                parts: vec![Part {
                    text: Some(text.into()),
                    thought,
                    ..Default::default()
                }],
                extra: Default::default(),
            }),
            finish_reason: finish.map(str::to_string),
            extra: Default::default(),
        }
    }

    #[test]
    fn unary_response_concatenates_text_and_maps_stop() {
        let resp = GenerateContentResponse {
            candidates: vec![candidate_with_text("hello there", None, Some("STOP"))],
            ..Default::default()
        };
        let out = unary_to_openai(&resp, "gemini-2.5-flash", 0);
        assert_eq!(out.choices[0].message.content, "hello there");
        assert_eq!(out.choices[0].message.role, "assistant");
        assert_eq!(out.choices[0].finish_reason, "stop");
        assert_eq!(out.model, "gemini-2.5-flash");
    }

    #[test]
    fn thought_parts_go_to_reasoning_content() {
        let resp = GenerateContentResponse {
            candidates: vec![Candidate {
                content: Some(Content {
                    role: Some("model".into()),
                    parts: vec![
                        Part { text: Some("pondering".into()), thought: Some(true), ..Default::default() },
                        Part { text: Some("answer".into()), ..Default::default() },
                    ],
                    extra: Default::default(),
                }),
                finish_reason: Some("STOP".into()),
                extra: Default::default(),
            }],
            ..Default::default()
        };
        let out = unary_to_openai(&resp, "gemini-2.5-pro", 0);
        assert_eq!(out.choices[0].message.content, "answer");
        assert_eq!(out.choices[0].message.reasoning_content.as_deref(), Some("pondering"));
    }

    #[test]
    fn max_tokens_maps_to_length() {
        let resp = GenerateContentResponse {
            candidates: vec![candidate_with_text("cut off", None, Some("MAX_TOKENS"))],
            ..Default::default()
        };
        let out = unary_to_openai(&resp, "gemini-2.5-flash", 0);
        assert_eq!(out.choices[0].finish_reason, "length");
    }

    #[test]
    fn safety_maps_to_content_filter() {
        assert_eq!(map_finish_reason(Some("SAFETY")), "content_filter");
        assert_eq!(map_finish_reason(Some("RECITATION")), "content_filter");
        assert_eq!(map_finish_reason(Some("WHATEVER")), "stop");
    }

    #[test]
    fn stream_state_sends_role_on_first_chunk_only() {
        let mut state = StreamState::new("gemini-2.5-flash", 0);
        let resp = GenerateContentResponse {
            candidates: vec![candidate_with_text("a", None, None)],
            ..Default::default()
        };
        let first = state.next_chunk(&resp).unwrap();
        assert_eq!(first.choices[0].delta.role, Some("assistant"));
        let second = state.next_chunk(&resp).unwrap();
        assert_eq!(second.choices[0].delta.role, None);
    }

    #[test]
    fn final_chunk_has_empty_delta_and_finish_reason() {
        let state = StreamState::new("gemini-2.5-flash", 0);
        let chunk = state.final_chunk("stop");
        assert!(chunk.choices[0].delta.content.is_none());
        assert_eq!(chunk.choices[0].finish_reason, Some("stop"));
    }
}
