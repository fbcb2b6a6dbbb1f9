//! Request extractors that report malformed input as validation errors.

use axum::{
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::common::OPERATOR_HEADER;
use crate::error::{AppError, CoreError};
use crate::model::OperatorContext;

const MAX_OPERATOR_LEN: usize = 100;

/// JSON body. Unknown fields and type mismatches become `ValidationError`.
#[derive(Debug, Clone)]
pub struct Payload<T>(pub T);

impl<S, T> FromRequest<S> for Payload<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(CoreError::validation(rejection.body_text()).into()),
        }
    }
}

/// Query string, with the same error mapping as [`Payload`].
#[derive(Debug, Clone)]
pub struct Params<T>(pub T);

impl<S, T> FromRequestParts<S> for Params<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(Self(value)),
            Err(rejection) => Err(CoreError::validation(rejection.body_text()).into()),
        }
    }
}

/// Single UUID path segment, with the same error mapping as [`Payload`].
#[derive(Debug, Clone, Copy)]
pub struct PathId(pub Uuid);

impl<S> FromRequestParts<S> for PathId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<Uuid>::from_request_parts(parts, state).await {
            Ok(Path(id)) => Ok(Self(id)),
            Err(rejection) => Err(CoreError::validation(rejection.body_text()).into()),
        }
    }
}

/// Operator named by the `X-Operator` header; absent means the system.
#[derive(Debug, Clone)]
pub struct Operator(pub OperatorContext);

impl<S> FromRequestParts<S> for Operator
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(raw) = parts.headers.get(OPERATOR_HEADER) else {
            return Ok(Self(OperatorContext::system()));
        };
        let name = raw
            .to_str()
            .map_err(|_| CoreError::validation("X-Operator must be visible ASCII"))?
            .trim();

        if name.is_empty() {
            return Ok(Self(OperatorContext::system()));
        }
        if name.chars().count() > MAX_OPERATOR_LEN {
            return Err(CoreError::validation(format!(
                "X-Operator must be at most {MAX_OPERATOR_LEN} characters"
            ))
            .into());
        }
        Ok(Self(OperatorContext::named(name)))
    }
}
