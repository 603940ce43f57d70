//! OpenAI chat-completions request → upstream Gemini `generateContent`
//! request, per `spec.md` §4.3.

use super::images::extract_markdown_images;
use crate::model_catalog::{thinking_for, ResolvedModel};
use crate::schema::gemini;
use crate::schema::openai::{ChatCompletionRequest, ChatMessage, ContentPart, MessageContent};

/// Translate an inbound OpenAI request against an already-`resolve()`d model
/// into the upstream request body.
pub fn openai_to_gemini(
    req: &ChatCompletionRequest,
    resolved: &ResolvedModel,
) -> Result<gemini::GenerateContentRequest, String> {
    let mut system_texts = Vec::new();
    let mut contents = Vec::new();

    for message in &req.messages {
        let role = message.role.as_str();
        if role == "system" {
            if let Some(text) = flatten_to_text(message) {
                system_texts.push(text);
            }
            continue;
        }
        contents.push(convert_message(message)?);
    }

    let system_instruction = (!system_texts.is_empty()).then(|| gemini::Content {
        role: Some("user".to_string()),
        parts: vec![gemini::Part::text(system_texts.join("\n\n"))],
        extra: Default::default(),
    });

    let generation_config = build_generation_config(req, resolved);

    let thinking_config = thinking_for(resolved, req.reasoning_effort.as_deref())
        .map(|policy| gemini::ThinkingConfig {
            thinking_budget: policy.budget_tokens,
            include_thoughts: policy.include_thoughts,
        });

    let mut generation_config = generation_config;
    generation_config.thinking_config = thinking_config;

    let tools = resolved
        .search
        .then(|| vec![gemini::Tool::google_search()]);

    Ok(gemini::GenerateContentRequest {
        contents,
        system_instruction,
        generation_config: Some(generation_config),
        safety_settings: Some(
            req.safety_settings
                .clone()
                .unwrap_or_else(gemini::SafetySetting::block_none_defaults),
        ),
        tools,
        extra: Default::default(),
    })
}

fn gemini_role(role: &str) -> &'static str {
    match role {
        "assistant" => "model",
        "user" | "tool" => "user",
        _ => "user",
    }
}

fn convert_message(message: &ChatMessage) -> Result<gemini::Content, String> {
    let parts = match &message.content {
        None => Vec::new(),
        Some(MessageContent::Text(text)) => text_to_parts(text),
        Some(MessageContent::Parts(parts)) => {
            let mut out = Vec::with_capacity(parts.len());
            for part in parts {
                match part {
                    ContentPart::Text { text } => out.extend(text_to_parts(text)),
                    ContentPart::ImageUrl { image_url } => {
                        let (mime_type, data) = decode_data_url(&image_url.url).ok_or_else(|| {
                            "image_url content part must be a data: URL; plain HTTPS image URLs are not supported inbound".to_string()
                        })?;
                        out.push(gemini::Part::inline_data(mime_type, data));
                    }
                }
            }
            out
        }
    };

    Ok(gemini::Content {
        role: Some(gemini_role(&message.role).to_string()),
        parts,
        extra: Default::default(),
    })
}

/// Splits plain text into a leading text part plus any markdown inline
/// images it embeds, in appearance order.
fn text_to_parts(text: &str) -> Vec<gemini::Part> {
    let (stripped, images) = extract_markdown_images(text);
    let mut parts = Vec::new();
    if !stripped.is_empty() {
        parts.push(gemini::Part::text(stripped));
    }
    for image in images {
        parts.push(gemini::Part::inline_data(image.mime_type, image.data));
    }
    parts
}

fn flatten_to_text(message: &ChatMessage) -> Option<String> {
    match &message.content {
        None => None,
        Some(MessageContent::Text(text)) => Some(text.clone()),
        Some(MessageContent::Parts(parts)) => {
            let joined: Vec<&str> = parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect();
            (!joined.is_empty()).then(|| joined.join("\n\n"))
        }
    }
}

fn decode_data_url(url: &str) -> Option<(String, String)> {
    let body = url.strip_prefix("data:")?;
    let (mime_type, data) = body.split_once(";base64,")?;
    Some((mime_type.to_string(), data.to_string()))
}

fn build_generation_config(
    req: &ChatCompletionRequest,
    resolved: &ResolvedModel,
) -> gemini::GenerationConfig {
    let (response_mime_type, response_schema) = match &req.response_format {
        Some(fmt) if fmt.kind == "json_object" => (Some("application/json".to_string()), None),
        Some(fmt) if fmt.kind == "json_schema" => {
            (Some("application/json".to_string()), fmt.json_schema.clone())
        }
        _ => (None, None),
    };

    gemini::GenerationConfig {
        temperature: req.temperature,
        top_p: req.top_p,
        top_k: req.top_k,
        max_output_tokens: Some(req.output_limit(resolved.descriptor.output_token_limit as u32)),
        stop_sequences: req
            .stop
            .clone()
            .map(crate::schema::openai::StopSequences::into_vec),
        frequency_penalty: req.frequency_penalty,
        presence_penalty: req.presence_penalty,
        seed: req.seed,
        candidate_count: Some(1),
        response_mime_type,
        response_schema,
        thinking_config: None,
        extra: Default::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_catalog::resolve;
    use crate::schema::openai::ImageUrl;

    fn msg(role: &str, text: &str) -> ChatMessage {
        ChatMessage {
            role: role.to_string(),
            content: Some(MessageContent::Text(text.to_string())),
        }
    }

    #[test]
    fn system_messages_are_joined_and_placed_as_user_role_system_instruction() {
        let req = ChatCompletionRequest {
            model: "gemini-2.5-flash".into(),
            messages: vec![msg("system", "be terse"), msg("system", "no jokes"), msg("user", "hi")],
            stream: false,
            temperature: None,
            top_p: None,
            top_k: None,
            max_tokens: None,
            max_completion_tokens: None,
            stop: None,
            frequency_penalty: None,
            presence_penalty: None,
            seed: None,
            response_format: None,
            reasoning_effort: None,
            safety_settings: None,
            extra: Default::default(),
        };
        let resolved = resolve("gemini-2.5-flash").unwrap();
        let out = openai_to_gemini(&req, &resolved).unwrap();
        let si = out.system_instruction.unwrap();
        assert_eq!(si.role.as_deref(), Some("user"));
        assert_eq!(si.parts[0].text.as_deref(), Some("be terse\n\nno jokes"));
        assert_eq!(out.contents.len(), 1);
        assert_eq!(out.contents[0].role.as_deref(), Some("user"));
    }

    #[test]
    fn assistant_role_maps_to_model() {
        let req = ChatCompletionRequest {
            model: "gemini-2.5-flash".into(),
            messages: vec![msg("user", "hi"), msg("assistant", "hello")],
            stream: false,
            temperature: None,
            top_p: None,
            top_k: None,
            max_tokens: None,
            max_completion_tokens: None,
            stop: None,
            frequency_penalty: None,
            presence_penalty: None,
            seed: None,
            response_format: None,
            reasoning_effort: None,
            safety_settings: None,
            extra: Default::default(),
        };
        let resolved = resolve("gemini-2.5-flash").unwrap();
        let out = openai_to_gemini(&req, &resolved).unwrap();
        assert_eq!(out.contents[1].role.as_deref(), Some("model"));
    }

    #[test]
    fn image_url_with_data_uri_decodes_to_inline_data() {
        let req = ChatCompletionRequest {
            model: "gemini-2.5-flash".into(),
            messages: vec![ChatMessage {
                role: "user".into(),
                content: Some(MessageContent::Parts(vec![
                    ContentPart::Text { text: "look:".into() },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: "data:image/png;base64,QUJD".into(),
                        },
                    },
                ])),
            }],
            stream: false,
            temperature: None,
            top_p: None,
            top_k: None,
            max_tokens: None,
            max_completion_tokens: None,
            stop: None,
            frequency_penalty: None,
            presence_penalty: None,
            seed: None,
            response_format: None,
            reasoning_effort: None,
            safety_settings: None,
            extra: Default::default(),
        };
        let resolved = resolve("gemini-2.5-flash").unwrap();
        let out = openai_to_gemini(&req, &resolved).unwrap();
        let parts = &out.contents[0].parts;
        assert_eq!(parts[0].text.as_deref(), Some("look:"));
        let inline = parts[1].inline_data.as_ref().unwrap();
        assert_eq!(inline.mime_type, "image/png");
        assert_eq!(inline.data, "QUJD");
    }

    #[test]
    fn plain_https_image_url_is_rejected() {
        let req = ChatCompletionRequest {
            model: "gemini-2.5-flash".into(),
            messages: vec![ChatMessage {
                role: "user".into(),
                content: Some(MessageContent::Parts(vec![ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: "https://example.com/cat.png".into(),
                    },
                }])),
            }],
            stream: false,
            temperature: None,
            top_p: None,
            top_k: None,
            max_tokens: None,
            max_completion_tokens: None,
            stop: None,
            frequency_penalty: None,
            presence_penalty: None,
            seed: None,
            response_format: None,
            reasoning_effort: None,
            safety_settings: None,
            extra: Default::default(),
        };
        let resolved = resolve("gemini-2.5-flash").unwrap();
        assert!(openai_to_gemini(&req, &resolved).is_err());
    }

    #[test]
    fn search_variant_attaches_google_search_tool() {
        let req = ChatCompletionRequest {
            model: "gemini-2.5-flash-search".into(),
            messages: vec![msg("user", "news?")],
            stream: false,
            temperature: None,
            top_p: None,
            top_k: None,
            max_tokens: None,
            max_completion_tokens: None,
            stop: None,
            frequency_penalty: None,
            presence_penalty: None,
            seed: None,
            response_format: None,
            reasoning_effort: None,
            safety_settings: None,
            extra: Default::default(),
        };
        let resolved = resolve("gemini-2.5-flash-search").unwrap();
        let out = openai_to_gemini(&req, &resolved).unwrap();
        assert_eq!(out.tools.unwrap().len(), 1);
    }

    #[test]
    fn maxthinking_variant_attaches_thinking_config() {
        let req = ChatCompletionRequest {
            model: "gemini-2.5-pro-maxthinking".into(),
            messages: vec![msg("user", "think hard")],
            stream: false,
            temperature: None,
            top_p: None,
            top_k: None,
            max_tokens: None,
            max_completion_tokens: None,
            stop: None,
            frequency_penalty: None,
            presence_penalty: None,
            seed: None,
            response_format: None,
            reasoning_effort: None,
            safety_settings: None,
            extra: Default::default(),
        };
        let resolved = resolve("gemini-2.5-pro-maxthinking").unwrap();
        let out = openai_to_gemini(&req, &resolved).unwrap();
        let tc = out.generation_config.unwrap().thinking_config.unwrap();
        assert_eq!(tc.thinking_budget, 32_768);
        assert!(tc.include_thoughts);
        assert!(out.tools.is_none());
    }

    #[test]
    fn non_thinking_model_gets_no_thinking_config() {
        let req = ChatCompletionRequest {
            model: "gemini-2.0-flash".into(),
            messages: vec![msg("user", "hi")],
            stream: false,
            temperature: None,
            top_p: None,
            top_k: None,
            max_tokens: None,
            max_completion_tokens: None,
            stop: None,
            frequency_penalty: None,
            presence_penalty: None,
            seed: None,
            response_format: None,
            reasoning_effort: None,
            safety_settings: None,
            extra: Default::default(),
        };
        let resolved = resolve("gemini-2.0-flash").unwrap();
        let out = openai_to_gemini(&req, &resolved).unwrap();
        assert!(out.generation_config.unwrap().thinking_config.is_none());
    }
}
