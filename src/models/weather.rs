use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{Display, EnumString};

/// Canonical ordered list of the model's input columns. The order here is the
/// contract between the corpus file, the training pipeline, and inference:
/// every feature matrix and every persisted row uses exactly this order.
pub const FEATURE_COLUMNS: [&str; 18] = [
    // Instantaneous observation fields
    "apparent_temperature",
    "cloud_cover",
    "is_day",
    "precipitation",
    "pressure_msl",
    "rain",
    "relative_humidity_2m",
    "showers",
    "snowfall",
    "surface_pressure",
    "temperature_2m",
    "weather_code",
    "wind_direction_10m",
    "wind_gusts_10m",
    "wind_speed_10m",
    // Location context fields
    "elevation",
    "latitude",
    "longitude",
];

/// Label column name in the corpus file
pub const TARGET_COLUMN: &str = "previsao_condicao_climatica";

/// A single weather observation: all 18 model features, fully populated.
///
/// The field grouping (observation vs. location context) documents provenance
/// only; it has no runtime effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub apparent_temperature: f64,
    pub cloud_cover: f64,
    pub is_day: f64,
    pub precipitation: f64,
    pub pressure_msl: f64,
    pub rain: f64,
    pub relative_humidity_2m: f64,
    pub showers: f64,
    pub snowfall: f64,
    pub surface_pressure: f64,
    pub temperature_2m: f64,
    pub weather_code: f64,
    pub wind_direction_10m: f64,
    pub wind_gusts_10m: f64,
    pub wind_speed_10m: f64,
    pub elevation: f64,
    pub latitude: f64,
    pub longitude: f64,
}

impl FeatureRecord {
    /// Feature values in canonical column order
    pub fn to_vector(&self) -> [f64; 18] {
        [
            self.apparent_temperature,
            self.cloud_cover,
            self.is_day,
            self.precipitation,
            self.pressure_msl,
            self.rain,
            self.relative_humidity_2m,
            self.showers,
            self.snowfall,
            self.surface_pressure,
            self.temperature_2m,
            self.weather_code,
            self.wind_direction_10m,
            self.wind_gusts_10m,
            self.wind_speed_10m,
            self.elevation,
            self.latitude,
            self.longitude,
        ]
    }

    /// Build a record from canonical-order values
    pub fn from_vector(v: &[f64; 18]) -> Self {
        Self {
            apparent_temperature: v[0],
            cloud_cover: v[1],
            is_day: v[2],
            precipitation: v[3],
            pressure_msl: v[4],
            rain: v[5],
            relative_humidity_2m: v[6],
            showers: v[7],
            snowfall: v[8],
            surface_pressure: v[9],
            temperature_2m: v[10],
            weather_code: v[11],
            wind_direction_10m: v[12],
            wind_gusts_10m: v[13],
            wind_speed_10m: v[14],
            elevation: v[15],
            latitude: v[16],
            longitude: v[17],
        }
    }

    /// Extract the 18 required features from a keyed map.
    ///
    /// Extra keys are ignored; a missing key is rejected with
    /// [`AppError::MissingFeature`] naming the first absent column.
    pub fn from_map(map: &HashMap<String, f64>) -> Result<Self> {
        let mut values = [0.0f64; 18];
        for (i, column) in FEATURE_COLUMNS.iter().enumerate() {
            values[i] = *map
                .get(*column)
                .ok_or_else(|| AppError::MissingFeature((*column).to_string()))?;
        }
        Ok(Self::from_vector(&values))
    }
}

/// Weather hazard severity. Closed set: the rule engine and the classifier
/// only ever produce these five labels. Variants are declared
/// severity-descending; that ordering is informational only.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
pub enum SeverityCategory {
    #[strum(serialize = "Crítico (Emergência Imediata)")]
    #[serde(rename = "Crítico (Emergência Imediata)")]
    Critico,
    #[strum(serialize = "Severo (Alerta Vermelho)")]
    #[serde(rename = "Severo (Alerta Vermelho)")]
    Severo,
    #[strum(serialize = "Moderado (Atenção Amarela)")]
    #[serde(rename = "Moderado (Atenção Amarela)")]
    Moderado,
    #[strum(serialize = "Estável (Suporte Disponível)")]
    #[serde(rename = "Estável (Suporte Disponível)")]
    Estavel,
    #[strum(serialize = "Suave (Verde)")]
    #[serde(rename = "Suave (Verde)")]
    Suave,
}

impl SeverityCategory {
    /// All categories, severity-descending
    pub const ALL: [SeverityCategory; 5] = [
        SeverityCategory::Critico,
        SeverityCategory::Severo,
        SeverityCategory::Moderado,
        SeverityCategory::Estavel,
        SeverityCategory::Suave,
    ];

    /// Full label string as persisted in the corpus and returned by the API
    pub fn label(&self) -> String {
        self.to_string()
    }
}

/// A labeled training sample
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledSample {
    pub record: FeatureRecord,
    pub category: SeverityCategory,
}

impl LabeledSample {
    pub fn new(record: FeatureRecord, category: SeverityCategory) -> Self {
        Self { record, category }
    }
}
