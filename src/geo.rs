//! CEP (Brazilian postal code) to coordinates.
//!
//! Two-step, best-effort chain with no retries: ViaCEP resolves the CEP to a
//! street address, then Nominatim geocodes it. Small towns often lack street
//! and district fields, so geocoding is attempted at three precision levels —
//! full address, address without district, city only — and the first hit
//! wins. Every failure surfaces as a Geocoding error (a rejected request, not
//! a server fault).

use crate::config::GeocodingConfig;
use crate::error::{AppError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Coordinates resolved for a CEP
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedLocation {
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Deserialize)]
struct ViaCepResponse {
    #[serde(default)]
    erro: Option<serde_json::Value>,
    #[serde(default)]
    logradouro: Option<String>,
    #[serde(default)]
    bairro: Option<String>,
    #[serde(default)]
    localidade: Option<String>,
    #[serde(default)]
    uf: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    display_name: String,
}

/// Postal-code geocoding client
#[derive(Clone)]
pub struct CepClient {
    client: Client,
    config: GeocodingConfig,
}

impl CepClient {
    pub fn new(config: GeocodingConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Resolve a CEP to coordinates, or fail with a Geocoding error
    pub async fn lookup(&self, cep: &str) -> Result<ResolvedLocation> {
        let digits: String = cep.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.len() != 8 {
            return Err(AppError::Validation(format!(
                "CEP must contain exactly 8 digits, got {:?}",
                cep
            )));
        }

        let address = self.fetch_address(&digits).await?;
        debug!(cep = %digits, city = ?address.localidade, "CEP resolved to address");

        let street = address.logradouro.as_deref().unwrap_or("");
        let district = address.bairro.as_deref().unwrap_or("");
        let city = address
            .localidade
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                AppError::Geocoding(format!("CEP {} resolved to an address without a city", digits))
            })?;
        let uf = address.uf.as_deref().unwrap_or("");

        // Precision fallback: full address, then without district, then city only
        let queries = [
            format!("{}, {}, {} - {}, Brasil", street, district, city, uf),
            format!("{}, {} - {}, Brasil", street, city, uf),
            format!("{} - Brasil", city),
        ];

        for query in &queries {
            if let Some(place) = self.geocode(query).await? {
                let latitude = place.lat.parse::<f64>().map_err(|_| {
                    AppError::Geocoding(format!("Nominatim returned non-numeric latitude: {:?}", place.lat))
                })?;
                let longitude = place.lon.parse::<f64>().map_err(|_| {
                    AppError::Geocoding(format!("Nominatim returned non-numeric longitude: {:?}", place.lon))
                })?;
                info!(
                    cep = %digits,
                    latitude = latitude,
                    longitude = longitude,
                    "Geocoding succeeded"
                );
                return Ok(ResolvedLocation {
                    address: place.display_name,
                    latitude,
                    longitude,
                });
            }
        }

        Err(AppError::Geocoding(format!(
            "no coordinates found for CEP {}",
            digits
        )))
    }

    async fn fetch_address(&self, digits: &str) -> Result<ViaCepResponse> {
        let url = format!("{}/ws/{}/json/", self.config.viacep_url, digits);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::Geocoding(format!("ViaCEP request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Geocoding(format!(
                "ViaCEP returned status {}",
                response.status()
            )));
        }

        let body: ViaCepResponse = response
            .json()
            .await
            .map_err(|e| AppError::Geocoding(format!("ViaCEP response malformed: {}", e)))?;

        if body.erro.is_some() {
            return Err(AppError::Geocoding(format!("CEP {} not found", digits)));
        }
        Ok(body)
    }

    async fn geocode(&self, query: &str) -> Result<Option<NominatimPlace>> {
        let url = format!("{}/search", self.config.nominatim_url);
        let response = self
            .client
            .get(&url)
            .query(&[("q", query), ("format", "json"), ("limit", "1")])
            .send()
            .await
            .map_err(|e| AppError::Geocoding(format!("Nominatim request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Geocoding(format!(
                "Nominatim returned status {}",
                response.status()
            )));
        }

        let mut places: Vec<NominatimPlace> = response
            .json()
            .await
            .map_err(|e| AppError::Geocoding(format!("Nominatim response malformed: {}", e)))?;

        debug!(query = %query, found = !places.is_empty(), "Geocoding attempt");
        Ok(if places.is_empty() {
            None
        } else {
            Some(places.remove(0))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup_rejects_short_cep() {
        let client = CepClient::new(GeocodingConfig::default()).unwrap();
        let err = client.lookup("1234").await.unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_lookup_counts_digits_not_characters() {
        let client = CepClient::new(GeocodingConfig::default()).unwrap();
        // 7 digits after stripping the separator
        let err = client.lookup("05409-00").await.unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }
}
