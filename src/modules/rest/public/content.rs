// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use poem::{handler, http::header, web::Path, Response};

use crate::modules::message::{entity::HeldMessage, summary::find_content};

/// Serves one MIME part of a held mail with its own Content-Type.
///
/// Lives outside the OpenAPI service because the response type is only known at runtime.
#[handler]
pub async fn get_message_content(
    Path((message_id, content_id)): Path<(u64, String)>,
) -> poem::Result<Response> {
    let held = HeldMessage::get(message_id).await?;
    let content = find_content(&held, &content_id)?;
    Ok(Response::builder()
        .header(header::CONTENT_TYPE, content.content_type)
        .body(content.data))
}
