pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::geo::CepClient;
use crate::ml::ModelService;
use crate::weather::WeatherClient;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub model: Arc<ModelService>,
    pub cep: Arc<CepClient>,
    pub weather: Arc<WeatherClient>,
}

impl AppState {
    pub fn new(model: Arc<ModelService>, cep: Arc<CepClient>, weather: Arc<WeatherClient>) -> Self {
        Self {
            model,
            cep,
            weather,
        }
    }
}
