mod analysis;
mod cache;
mod classifier;
mod config;
mod error;
mod routes;
mod store;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use analysis::analysis_service::AnalysisService;
use cache::result_cache::ResultCache;
use classifier::client::HttpClassifier;
use config::AppConfig;
use routes::configure_routes;
use std::sync::Arc;
use store::analysis_store::{AnalysisStore, InMemoryAnalysisStore};

const STORED_ANALYSES: usize = 64;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = match AppConfig::load() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            log::error!("Failed to load configuration: {}", e);
            return Err(std::io::Error::other(format!("Configuration failed: {}", e)));
        }
    };

    let classifier = HttpClassifier::new(&config.classifier).map_err(|e| {
        log::error!("Failed to build classifier client: {}", e);
        std::io::Error::other(format!("Classifier client failed: {}", e))
    })?;
    log::info!("Classifier backend at {}", config.classifier.base_url);

    let cache = ResultCache::new(config.cache.capacity);
    let service = AnalysisService::new(Arc::new(classifier), cache, config.clone());
    let store: Arc<dyn AnalysisStore> = Arc::new(InMemoryAnalysisStore::new(STORED_ANALYSES));
    let store = web::Data::from(store);
    let config_data = web::Data::from(config.clone());

    let bind_address = format!("0.0.0.0:{}", config.server.port);
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(web::JsonConfig::default().limit(config_data.limits.max_file_bytes))
            .app_data(web::Data::new(service.clone()))
            .app_data(store.clone())
            .app_data(config_data.clone())
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}
