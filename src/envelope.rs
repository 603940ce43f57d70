//! The request-scoped identity that flows through the pipeline: an opaque
//! 8-hex-char id, the model name as received, the stream flag, and a
//! `tracing` span pre-populated with that id so every log line emitted
//! while handling the request carries it automatically.

use rand::RngCore;
use tracing::Span;

#[derive(Debug, Clone)]
pub struct RequestEnvelope {
    pub id: String,
    pub model: String,
    pub stream: bool,
}

impl RequestEnvelope {
    pub fn new(model: impl Into<String>, stream: bool) -> Self {
        Self {
            id: generate_request_id(),
            model: model.into(),
            stream,
        }
    }

    /// A `tracing` span carrying this request's id, to be entered for the
    /// duration of the pipeline call so every nested log line is tagged.
    pub fn span(&self) -> Span {
        tracing::info_span!("request", id = %self.id, model = %self.model, stream = self.stream)
    }
}

fn generate_request_id() -> String {
    let mut bytes = [0u8; 4];
    rand::rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_is_eight_hex_chars() {
        let env = RequestEnvelope::new("gemini-2.5-flash", false);
        assert_eq!(env.id.len(), 8);
        assert!(env.id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
