//! Bidirectional OpenAI⇄Gemini format translation, and the native Gemini
//! passthrough envelope wrap/unwrap. See `spec.md` §4.3.

mod images;
mod inbound;
mod native;
mod outbound;

pub use inbound::openai_to_gemini;
pub use native::{unwrap_response, wrap_request};
pub use outbound::{map_finish_reason, new_completion_id, unary_to_openai, StreamState};
