use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::{error::AppError, state::AppState};

/// Body of `POST /api/sonificate`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SonifyRequest {
    pub url: Option<String>,
    pub script_variant: Option<String>,
    pub preset: Option<String>,
}

pub async fn sonificate(
    state: web::Data<AppState>,
    body: web::Json<SonifyRequest>,
) -> Result<HttpResponse, AppError> {
    let request = body.into_inner();

    let result = state
        .service
        .sonify(
            request.url.as_deref(),
            request.script_variant.as_deref(),
            request.preset.as_deref(),
        )
        .await;
    state.record_sonification(result.is_ok());

    Ok(HttpResponse::Ok().json(result?))
}
