// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use super::error::HoldMailError;
use poem::error::ResponseError;
use poem::Body;
use poem::{http::StatusCode, Response};
use tracing::error;

pub mod error;
pub mod log;
pub mod rustls;
pub mod validator;

impl ResponseError for HoldMailError {
    fn status(&self) -> StatusCode {
        self.code().status()
    }

    fn as_response(&self) -> Response
    where
        Self: std::error::Error + Send + Sync + 'static,
    {
        match self {
            HoldMailError::Generic {
                message,
                location,
                code,
            } => {
                error!(
                    error_code = *code as u32,
                    error_message = %message,
                    error_location = ?location
                );

                let body = Body::from_json(serde_json::json!({
                    "code": *code as u32,
                    "message": message.to_string(),
                }))
                .unwrap_or_else(|_| Body::from_string(message.to_string()));

                Response::builder().status(self.status()).body(body)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::error::code::ErrorCode;
    use crate::raise_error;
    use poem::Error;

    #[tokio::test]
    async fn error_response_carries_code_and_message() {
        let error: Error = raise_error!("no such mail".into(), ErrorCode::ResourceNotFound).into();
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value =
            serde_json::from_slice(&response.into_body().into_vec().await.unwrap()).unwrap();
        assert_eq!(body["code"], ErrorCode::ResourceNotFound as u32);
        assert_eq!(body["message"], "no such mail");
    }
}
