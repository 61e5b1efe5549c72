use crate::application_port::*;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::warn;
use warp::http::StatusCode;
use warp::reply::{Json, WithStatus};
use warp::{Rejection, reject};

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    if let Some(code) = err.find::<ApiErrorCode>() {
        Ok(code.to_reply())
    } else if err.find::<warp::filters::body::BodyDeserializeError>().is_some()
        || err.find::<reject::LengthRequired>().is_some()
        || err.find::<reject::PayloadTooLarge>().is_some()
        || err.find::<reject::UnsupportedMediaType>().is_some()
    {
        Ok(ApiErrorCode::InvalidData.to_reply())
    } else if err.find::<reject::MissingHeader>().is_some() {
        Ok(ApiErrorCode::Unauthorized.to_reply())
    } else if err.is_not_found() {
        Ok(message_reply("Not found", StatusCode::NOT_FOUND))
    } else if err.find::<reject::MethodNotAllowed>().is_some() {
        Ok(message_reply("Method not allowed", StatusCode::METHOD_NOT_ALLOWED))
    } else {
        warn!("Unhandled rejection: {:?}", err);
        Ok(ApiErrorCode::InternalError.to_reply())
    }
}

/// Wire codes. Credential failures go out as `{"error":{"message":CODE,"code":400}}`,
/// everything else as `{"message":...}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiErrorCode {
    #[error("Request body is malformed")]
    InvalidData,
    #[error("Email already registered")]
    EmailExists,
    #[error("Email not found")]
    EmailNotFound,
    #[error("Invalid password")]
    InvalidPassword,
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Internal server error")]
    InternalError,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    message: ApiErrorCode,
    code: u16,
}

#[derive(Debug, Serialize)]
struct MessageBody {
    message: String,
}

impl ApiErrorCode {
    pub fn internal<E: std::fmt::Display>(error: E) -> ApiErrorCode {
        warn!("Internal error: {}", error);
        ApiErrorCode::InternalError
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiErrorCode::InvalidData
            | ApiErrorCode::EmailExists
            | ApiErrorCode::EmailNotFound
            | ApiErrorCode::InvalidPassword => StatusCode::BAD_REQUEST,
            ApiErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn to_reply(self) -> WithStatus<Json> {
        let status = self.status();
        match status {
            StatusCode::BAD_REQUEST => {
                let body = ErrorEnvelope {
                    error: ErrorDetail {
                        message: self,
                        code: status.as_u16(),
                    },
                };
                warp::reply::with_status(warp::reply::json(&body), status)
            }
            _ => message_reply(&self.to_string(), status),
        }
    }
}

fn message_reply(message: &str, status: StatusCode) -> WithStatus<Json> {
    let body = MessageBody {
        message: message.to_string(),
    };
    warp::reply::with_status(warp::reply::json(&body), status)
}

impl reject::Reject for ApiErrorCode {}

impl From<AuthError> for ApiErrorCode {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::EmailExists => ApiErrorCode::EmailExists,
            AuthError::EmailNotFound => ApiErrorCode::EmailNotFound,
            AuthError::InvalidPassword => ApiErrorCode::InvalidPassword,
            AuthError::InvalidToken | AuthError::Unauthorized => ApiErrorCode::Unauthorized,
            AuthError::StoreUnavailable(e) => ApiErrorCode::internal(e),
            AuthError::Internal(e) => ApiErrorCode::internal(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untrusted_tokens_are_auth_failures_not_faults() {
        assert_eq!(
            ApiErrorCode::from(AuthError::Unauthorized).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiErrorCode::from(AuthError::InvalidToken).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiErrorCode::from(AuthError::StoreUnavailable("down".into())),
            ApiErrorCode::InternalError
        );
    }

    #[test]
    fn credential_codes_serialize_in_screaming_case() {
        assert_eq!(
            serde_json::to_string(&ApiErrorCode::EmailExists).unwrap(),
            "\"EMAIL_EXISTS\""
        );
        assert_eq!(
            serde_json::to_string(&ApiErrorCode::InvalidPassword).unwrap(),
            "\"INVALID_PASSWORD\""
        );
    }
}
