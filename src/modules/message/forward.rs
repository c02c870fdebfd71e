// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::modules::error::HoldMailResult;
use crate::modules::message::entity::HeldMessage;
use crate::modules::smtp::client::{RelayClient, RelayConfig};
use crate::validate_email;
use poem_openapi::Object;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize, Object)]
pub struct MessageForwardCommand {
    /// The address the held mail is re-sent to.
    #[oai(validator(custom = "crate::modules::common::validator::EmailValidator"))]
    pub recipient: String,
}

/// Re-sends a held mail through `relay`. The original headers and body go out
/// byte for byte; only the envelope is new.
pub async fn forward_message(
    relay: &RelayConfig,
    sender: &str,
    message_id: u64,
    recipient: &str,
) -> HoldMailResult<()> {
    validate_email!(recipient)?;
    let held = HeldMessage::get(message_id).await?;

    let mut client = RelayClient::connect(relay).await?;
    client.send_raw(sender, recipient, &held.raw).await?;
    client.quit().await;

    info!(
        message_id,
        recipient,
        relay_host = %relay.host,
        "Forwarded held message"
    );
    Ok(())
}
