//! `GET /v1/models` (OpenAI shape) and `GET /v1beta/models` (native shape),
//! both backed by the same synthesized catalogue. See `spec.md` §4.1/§4.5.

use crate::model_catalog::list_models;
use crate::schema::gemini::{NativeModel, NativeModelList};
use crate::schema::openai::{ModelListResponse, ModelObject};
use axum::Json;

pub async fn list_openai_models() -> Json<ModelListResponse> {
    let data = list_models()
        .iter()
        .map(|d| ModelObject {
            id: d.name.clone(),
            object: "model",
            created: 0,
            owned_by: "google",
        })
        .collect();

    Json(ModelListResponse {
        object: "list",
        data,
    })
}

pub async fn list_native_models() -> Json<NativeModelList> {
    let models = list_models()
        .iter()
        .map(|d| NativeModel {
            name: format!("models/{}", d.name),
            display_name: d.display_name.clone(),
            input_token_limit: d.input_token_limit,
            output_token_limit: d.output_token_limit,
            supported_generation_methods: vec!["generateContent", "streamGenerateContent"],
        })
        .collect();

    Json(NativeModelList { models })
}
