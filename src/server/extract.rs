use axum::{
    async_trait,
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts, Json, Path, Query,
    },
    http::{header::AUTHORIZATION, request::Parts, Request},
};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::auth::User;
use crate::error::{invalid_input_error, unauthenticated_error, unexpected_error, Error};
use crate::server::DynAPI;

/// Resolves the caller from an `Authorization: Bearer <token>` header.
#[async_trait]
impl<S> FromRequestParts<S> for User
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let api = parts
            .extensions
            .get::<DynAPI>()
            .cloned()
            .ok_or_else(unexpected_error)?;

        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token)
            .ok_or_else(unauthenticated_error)?;

        api.authenticate(token).await
    }
}

fn bearer_token(header: &str) -> Option<Uuid> {
    let (scheme, token) = header.trim().split_once(' ')?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    Uuid::parse_str(token.trim()).ok()
}

/// A JSON body. An unreadable body reads as `T::default()`, leaving the
/// engine to report missing fields after its role checks.
pub struct Payload<T>(pub T);

#[async_trait]
impl<S, B, T> FromRequest<S, B> for Payload<T>
where
    T: DeserializeOwned + Default + Send,
    B: Send + 'static,
    S: Send + Sync,
    Json<T>: FromRequest<S, B, Rejection = JsonRejection>,
{
    type Rejection = Error;

    async fn from_request(req: Request<B>, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                tracing::debug!(%rejection, "unreadable request body");
                Ok(Self(T::default()))
            }
        }
    }
}

/// Query string parameters; malformed ones are a JSON 400.
pub struct Params<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for Params<T>
where
    T: Send,
    S: Send + Sync,
    Query<T>: FromRequestParts<S, Rejection = QueryRejection>,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(params) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| {
                tracing::debug!(%rejection, "malformed query string");
                invalid_input_error("Invalid query parameters")
            })?;

        Ok(Self(params))
    }
}

/// The `:id` path segment. Ids that are not UUIDs become the nil UUID, which
/// never names a ride, so the engine answers 404 in its usual order.
pub struct RideId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for RideId
where
    S: Send + Sync,
    Path<Uuid>: FromRequestParts<S, Rejection = PathRejection>,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<Uuid>::from_request_parts(parts, state).await {
            Ok(Path(id)) => Ok(Self(id)),
            Err(rejection) => {
                tracing::debug!(%rejection, "ride id is not a uuid");
                Ok(Self(Uuid::nil()))
            }
        }
    }
}

#[test]
fn bearer_token_test() {
    let token = Uuid::new_v4();

    assert_eq!(bearer_token(&format!("Bearer {token}")), Some(token));
    assert_eq!(bearer_token(&format!("bearer  {token} ")), Some(token));
    assert_eq!(bearer_token(&format!("Basic {token}")), None);
    assert_eq!(bearer_token("Bearer not-a-token"), None);
    assert_eq!(bearer_token(""), None);
}
