// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::modules::common::error::ErrorCapture;
use crate::modules::common::log::Tracing;
use crate::modules::error::code::ErrorCode;
use crate::modules::error::handler::error_handler;
use crate::modules::error::HoldMailResult;
use crate::modules::settings::cli::SETTINGS;
use crate::modules::smtp::client::RelayConfig;
use crate::modules::utils::shutdown::ShutdownHandle;

use super::error::ApiErrorResponse;
use crate::raise_error;
use api::create_openapi_service;
use poem::get;
use poem::listener::TcpListener;
use poem::middleware::{CatchPanic, Compression, Cors};
use poem::{Endpoint, EndpointExt, Route, Server};
use public::content::get_message_content;
use std::time::Duration;

pub mod api;
pub mod public;

pub type ApiResult<T, E = ApiErrorResponse> = std::result::Result<T, E>;

const DESCRIPTION: &str = r#"
    HoldMail is an SMTP server that holds every mail it receives instead of delivering it.

    - Held mails can be listed, inspected as HTML, text or raw source, and their inline parts fetched.
    - Any held mail can be forwarded unchanged to a real recipient through an outgoing SMTP relay.
"#;

/// The full HTTP application: REST API, API docs and middleware.
/// Forwarded mails are handed to `relay`.
pub fn build_routes(relay: RelayConfig) -> impl Endpoint {
    let api_service = create_openapi_service()
        .description(DESCRIPTION)
        .summary("Hold outgoing mail for inspection and forward it on demand");

    let swagger = api_service.swagger_ui();
    let redoc = api_service.redoc();
    let spec_json = api_service.spec_endpoint();

    let open_api_route = Route::new()
        .nest_no_strip("/rest", api_service)
        .at(
            "/rest/messages/:message_id/content/:content_id",
            get(get_message_content),
        )
        .with(ErrorCapture)
        .with(Tracing);

    let mut cors_origins = SETTINGS.holdmail_cors_origins.clone();
    if cors_origins.is_empty() {
        cors_origins = ["*".to_string()].into_iter().collect();
    }

    let cors = Cors::new()
        .allow_origins(cors_origins)
        .allow_credentials(true)
        .allow_methods(vec!["GET", "POST", "OPTIONS", "HEAD"])
        .allow_headers(vec!["Content-Type"])
        .expose_headers(vec!["Accept"])
        .max_age(SETTINGS.holdmail_cors_max_age);

    Route::new()
        .nest("/api-docs/swagger", swagger)
        .nest("/api-docs/redoc", redoc)
        .nest("/api-docs/spec.json", spec_json)
        .nest_no_strip("/rest", open_api_route)
        .with(cors)
        .with_if(
            SETTINGS.holdmail_http_compression_enabled,
            Compression::new(),
        )
        .with(CatchPanic::new())
        .data(relay)
        .catch_all_error(error_handler)
}

pub async fn start_http_server(mut shutdown: ShutdownHandle) -> HoldMailResult<()> {
    let listener = TcpListener::bind((
        SETTINGS
            .holdmail_bind_ip
            .clone()
            .unwrap_or("0.0.0.0".into()),
        SETTINGS.holdmail_http_port,
    ));

    let server = Server::new(listener)
        .name("HoldMail API Service")
        .idle_timeout(Duration::from_secs(60))
        .run_with_graceful_shutdown(
            build_routes(RelayConfig::from_settings()),
            async move { shutdown.wait().await },
            Some(Duration::from_secs(5)),
        );
    println!(
        "HoldMail API Service is now running on port {}.",
        SETTINGS.holdmail_http_port
    );
    server
        .await
        .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))
}
