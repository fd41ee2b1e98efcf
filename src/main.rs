use recommend_a_product_api::error::{ApiError, Result};
use recommend_a_product_api::ml::GeminiEmbedder;
use recommend_a_product_api::models::CatalogSchema;
use recommend_a_product_api::{app, config, scripts};
use std::path::Path;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[actix_web::main]
async fn main() -> Result<()> {
    // Load configuration
    dotenv::dotenv().ok();

    // Setup logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                // Default to info level if RUST_LOG is not set
                "recommend_a_product_api=info,actix_web=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Loading configuration...");
    let config = config::Config::from_env()?;

    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        // Offline rebuild of the catalog/index/metadata triple.
        Some("build-index") => {
            let csv_path = args.next().ok_or_else(|| {
                ApiError::ValidationError(
                    "Usage: recommend-a-product-api build-index <catalog.csv>".to_string(),
                )
            })?;

            let embedder = GeminiEmbedder::new(
                &config.gemini_api_key,
                &config.gemini_embedding_model,
                config.adapter_timeout_seconds,
            )?;

            scripts::index_catalog(
                &embedder,
                CatalogSchema::standard(),
                Path::new(&csv_path),
                &config.data_dir,
            )
            .await?;
            Ok(())
        }
        Some(other) => Err(ApiError::ValidationError(format!(
            "Unknown subcommand '{}'; expected 'build-index' or no arguments",
            other
        ))),
        None => {
            // Create and run application
            let application = app::Application::new(&config);
            application.run().await
        }
    }
}
