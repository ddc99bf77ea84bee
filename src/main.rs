use std::sync::Arc;
use supernova_weather::{
    api::{build_router, AppState},
    config::Config,
    geo::CepClient,
    ml::ModelService,
    weather::WeatherClient,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "supernova_weather=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("Using default configuration");
        Config::default()
    });

    tracing::info!("Starting Supernova Weather v{}", env!("CARGO_PKG_VERSION"));

    // Load or train the model before accepting any traffic. First deployment
    // pays the full generate+train cost here; afterwards this is a fast
    // artifact load. Requests issued while this runs simply wait for the
    // listener, which is the documented "block until Ready" behavior.
    let ml_config = config.ml.clone();
    let model = tokio::task::spawn_blocking(move || ModelService::open(&ml_config)).await??;
    let model = Arc::new(model);
    tracing::info!(
        classes = model.info().classes.len(),
        rounds = model.info().rounds,
        "Model ready"
    );

    let cep = Arc::new(CepClient::new(config.geocoding.clone())?);
    let weather = Arc::new(WeatherClient::new(config.weather.clone())?);

    let state = AppState::new(model, cep, weather);
    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.http_port);
    tracing::info!("HTTP server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
