//! Native Gemini passthrough: wrap the client's raw request body in the
//! CodeAssist envelope, unwrap the response conversely, per `spec.md` §4.3.

use crate::schema::gemini::{CodeAssistEnvelope, CodeAssistResponseEnvelope, GenerateContentResponse};

pub fn wrap_request<T>(base_name: &str, project_id: &str, body: T) -> CodeAssistEnvelope<T> {
    CodeAssistEnvelope {
        model: base_name.to_string(),
        project: project_id.to_string(),
        request: body,
    }
}

pub fn unwrap_response(envelope: CodeAssistResponseEnvelope) -> GenerateContentResponse {
    envelope.response
}
