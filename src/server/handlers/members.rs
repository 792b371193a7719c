use axum::extract::{Extension, Json};
use axum::http::StatusCode;
use serde::Serialize;
use uuid::Uuid;

use crate::entities::{Member, SignUpRequest};
use crate::error::Error;
use crate::server::extract::Payload;
use crate::server::DynAPI;

#[derive(Serialize)]
pub struct SignUpResponse {
    message: &'static str,
    member: Member,
    token: Uuid,
}

pub async fn sign_up(
    Extension(api): Extension<DynAPI>,
    Payload(params): Payload<SignUpRequest>,
) -> Result<(StatusCode, Json<SignUpResponse>), Error> {
    let signed_up = api.sign_up(params).await?;

    let response = SignUpResponse {
        message: "User created successfully",
        member: signed_up.member,
        token: signed_up.token,
    };

    Ok((StatusCode::CREATED, response.into()))
}
