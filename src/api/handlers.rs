use crate::api::AppState;
use crate::error::Result;
use crate::models::SeverityCategory;
use crate::weather::WeatherSnapshot;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    let info = state.model.info();
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model_ready: true,
        model_trained_at: info.trained_at.to_rfc3339(),
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub model_ready: bool,
    pub model_trained_at: String,
}

/// Full consultation: resolve a CEP, fetch current weather, classify severity
pub async fn consulta(
    State(state): State<AppState>,
    Json(request): Json<ConsultaRequest>,
) -> Result<Json<ConsultaResponse>> {
    request.validate()?;

    // CEP unresolvable -> 400 (Geocoding error)
    let location = state.cep.lookup(&request.cep).await?;

    // Weather provider failure -> 502 (Network error)
    let snapshot = state
        .weather
        .current(location.latitude, location.longitude)
        .await?;

    let record = snapshot.to_feature_record();
    let category = state.model.predict(&record)?;

    Ok(Json(ConsultaResponse {
        cep: request.cep,
        location: LocationResponse {
            address: location.address,
            latitude: location.latitude,
            longitude: location.longitude,
        },
        weather: WeatherResponse {
            snapshot,
            previsao_condicao_climatica: category,
        },
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ConsultaRequest {
    #[validate(length(min = 8, max = 9))]
    pub cep: String,
}

#[derive(Debug, Serialize)]
pub struct ConsultaResponse {
    pub cep: String,
    pub location: LocationResponse,
    pub weather: WeatherResponse,
}

#[derive(Debug, Serialize)]
pub struct LocationResponse {
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Serialize)]
pub struct WeatherResponse {
    #[serde(flatten)]
    pub snapshot: WeatherSnapshot,
    pub previsao_condicao_climatica: SeverityCategory,
}

/// Direct prediction from a raw feature map. Extra keys are ignored; a
/// missing required feature is rejected with a MISSING_FEATURE error.
pub async fn previsao(
    State(state): State<AppState>,
    Json(features): Json<HashMap<String, f64>>,
) -> Result<Json<PrevisaoResponse>> {
    let category = state.model.predict_from_map(&features)?;
    Ok(Json(PrevisaoResponse {
        previsao_condicao_climatica: category,
    }))
}

#[derive(Debug, Serialize)]
pub struct PrevisaoResponse {
    pub previsao_condicao_climatica: SeverityCategory,
}
