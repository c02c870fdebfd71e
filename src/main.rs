// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use mimalloc::MiMalloc;
use modules::{
    common::rustls::HoldMailTls,
    context::Initialize,
    database::manager::DatabaseManager,
    dialog::client::forward_with_dialog,
    error::{code::ErrorCode, HoldMailResult},
    logger,
    rest::start_http_server,
    settings::{
        cli::{Command, SETTINGS},
        dir::DataDirManager,
    },
    smtp::receiver::start_smtp_server,
    utils::shutdown::ShutdownHandle,
};
use tracing::{error, info};

mod modules;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

static LOGO: &str = r#"
  _   _       _     _ __  __       _ _
 | | | | ___ | | __| |  \/  | __ _(_) |
 | |_| |/ _ \| |/ _` | |\/| |/ _` | | |
 |  _  | (_) | | (_| | |  | | (_| | | |
 |_| |_|\___/|_|\__,_|_|  |_|\__,_|_|_|
"#;

#[tokio::main]
async fn main() -> HoldMailResult<()> {
    logger::initialize_logging();

    if let Some(Command::Forward {
        server,
        message_id,
        recipient,
    }) = &SETTINGS.command
    {
        HoldMailTls::initialize().await?;
        return forward_with_dialog(server, *message_id, recipient).await;
    }

    info!("{}", LOGO);
    info!("Starting holdmail");
    info!("Version:  {}", holdmail_version!());

    if let Err(error) = initialize().await {
        eprintln!("{:?}", error);
        return Err(error);
    }

    start_server().await
}

async fn initialize() -> HoldMailResult<()> {
    DataDirManager::initialize().await?;
    DatabaseManager::initialize().await?;
    HoldMailTls::initialize().await?;
    Ok(())
}

async fn start_server() -> HoldMailResult<()> {
    let shutdown = ShutdownHandle::spawn_listener();
    let servers = vec![
        tokio::spawn({
            let http_server = start_http_server(shutdown.clone());
            async move {
                let result = http_server.await;
                if let Err(e) = &result {
                    error!("Failed to start REST server: {}", e);
                }
                result
            }
        }),
        tokio::spawn({
            let smtp_server = start_smtp_server(shutdown);
            async move {
                let result = smtp_server.await;
                if let Err(e) = &result {
                    error!("Failed to start SMTP server: {}", e);
                }
                result
            }
        }),
    ];

    let results = futures::future::try_join_all(servers)
        .await
        .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
    info!("All servers shut down");
    results.into_iter().collect()
}
