//! Typed wire schemas for both surfaces this proxy speaks: the upstream
//! Gemini CodeAssist shape and the inbound/outbound OpenAI chat-completions
//! shape. Every level carries a `#[serde(flatten)] extra: BTreeMap<String,
//! Value>` catch-all, following the teacher's `pollux-schema` idiom, so
//! fields neither side defines yet still round-trip instead of being
//! silently dropped.

pub mod gemini;
pub mod openai;
