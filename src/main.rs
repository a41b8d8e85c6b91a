use actix_cors::Cors;
use actix_web::{http, middleware, web, App, HttpServer};
use dotenv::dotenv;
use log::info;
use std::sync::Arc;

use video_sharing_backend::config::Config;
use video_sharing_backend::notifier::LogNotifier;
use video_sharing_backend::{handlers, services};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env().map_err(std::io::Error::other)?;
    let bind_addr = (config.host.clone(), config.port);
    let allowed_origins = config.cors_allowed_origins.clone();

    let app_state = services::init_app_state(config, Arc::new(LogNotifier))
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    let app_state = web::Data::new(app_state);

    info!("Starting HTTP server on {}:{}", bind_addr.0, bind_addr.1);
    HttpServer::new(move || {
        let mut cors = Cors::default()
            .allowed_methods(vec!["GET", "POST", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                http::header::CONTENT_TYPE,
                http::header::AUTHORIZATION,
                http::header::RANGE,
            ])
            .expose_headers(vec![
                http::header::ACCEPT_RANGES,
                http::header::CONTENT_RANGE,
                http::header::CONTENT_LENGTH,
            ])
            .supports_credentials();

        for origin in &allowed_origins {
            cors = cors.allowed_origin(origin);
        }

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(app_state.clone())
            .configure(handlers::configure_routes)
    })
    .bind(bind_addr)?
    .run()
    .await
}
