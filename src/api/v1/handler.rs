use super::error::*;
use crate::application_port::*;
use crate::domain_model::UserId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::http::StatusCode;
use warp::reply::{Json, WithStatus};
use warp::{self, reject};

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub user_id: UserId,
}

fn session_reply(session: &AuthSession, status: StatusCode) -> WithStatus<Json> {
    warp::reply::with_status(warp::reply::json(session), status)
}

pub async fn sign_up(
    body: CredentialsRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let input = SignUpInput {
        email: body.email,
        password: body.password,
    };
    let session = auth_service
        .sign_up(input)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(session_reply(&session, StatusCode::CREATED))
}

pub async fn sign_in_with_password(
    body: CredentialsRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let input = SignInInput {
        email: body.email,
        password: body.password,
    };
    let session = auth_service
        .sign_in(input)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(session_reply(&session, StatusCode::OK))
}

pub async fn refresh_token(
    body: TokenRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    // A body without a token is an unauthenticated call, not a malformed one.
    let presented = body
        .refresh_token
        .ok_or_else(|| reject::custom(ApiErrorCode::Unauthorized))?;
    let session = auth_service
        .refresh(&presented)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(session_reply(&session, StatusCode::OK))
}

pub async fn me(user_id: UserId) -> Result<impl warp::Reply, warp::Rejection> {
    Ok(warp::reply::json(&MeResponse { user_id }))
}
