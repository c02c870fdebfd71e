// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use message::MessageApi;
use poem_openapi::{OpenApiService, Tags};

use crate::holdmail_version;

pub mod message;

#[derive(Tags)]
pub enum ApiTags {
    /// Held mails and forwarding
    Message,
}

type HoldMailOpenApi = MessageApi;

pub fn create_openapi_service() -> OpenApiService<HoldMailOpenApi, ()> {
    OpenApiService::new(MessageApi, "HoldMailApi", holdmail_version!())
}
