use crate::{
    config::Config,
    error::{ApiError, Result},
    ml::{GeminiGenerator, TextGenerator},
    models::CatalogSchema,
    routes::api_routes,
    services::{CatalogSnapshot, RecommendationService, SnapshotStore},
};
use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;
use tracing::info;

pub struct Application {
    port: u16,
    host: String,
    config: Config,
}

impl Application {
    /// Create a new application instance
    pub fn new(config: &Config) -> Self {
        Self {
            port: config.port,
            host: config.host.clone(),
            config: config.clone(),
        }
    }

    /// Build and run the server
    pub async fn run(&self) -> Result<()> {
        // Always bind to 0.0.0.0 for Docker compatibility
        let bind_address = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&bind_address)?;
        info!("Starting server at http://{}:{}", self.host, self.port);

        self.run_with_listener(listener).await
    }

    /// Run the server with a specific TCP listener
    /// This is useful for testing where we want to use a random port
    pub async fn run_with_listener(&self, listener: TcpListener) -> Result<()> {
        // The persisted triple must exist and agree with itself; a torn or
        // missing snapshot is a fatal configuration error at startup.
        let snapshot = CatalogSnapshot::load(&self.config.data_dir, CatalogSchema::standard())?;
        let snapshots = Arc::new(SnapshotStore::new(snapshot));

        let generator: Arc<dyn TextGenerator> = Arc::new(GeminiGenerator::new(
            &self.config.gemini_api_key,
            &self.config.gemini_model,
            self.config.adapter_timeout_seconds,
        )?);

        let recommendation_service = web::Data::new(RecommendationService::new(
            snapshots,
            generator,
            self.config.item_count,
            self.config.token_overlap_threshold,
        ));

        HttpServer::new(move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header();

            App::new()
                .wrap(cors)
                .wrap(Logger::default())
                .app_data(recommendation_service.clone())
                .app_data(json_config())
                .service(api_routes())
        })
        .listen(listener)?
        .run()
        .await?;

        Ok(())
    }
}

/// Malformed request bodies become the same structured error payload the
/// rest of the API speaks.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|err, _req| ApiError::ValidationError(err.to_string()).into())
}
