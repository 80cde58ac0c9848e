//! Request body extractor accepting JSON or HTML form encoding
//!
//! Author: hephaex@gmail.com

use crate::error::AppError;
use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::header,
    Form, Json,
};
use serde::de::DeserializeOwned;

/// Body decoded as `application/x-www-form-urlencoded` when the request says
/// so, and as JSON otherwise
///
/// Any decoding failure rejects with [`AppError::MalformedBody`].
#[derive(Debug, Clone)]
pub struct FormOrJson<T>(pub T);

fn is_form_encoded(request: &Request) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|mime| {
            mime.trim()
                .eq_ignore_ascii_case("application/x-www-form-urlencoded")
        })
        .unwrap_or(false)
}

#[async_trait]
impl<T, S> FromRequest<S> for FormOrJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        if is_form_encoded(&request) {
            let Form(value) = Form::<T>::from_request(request, state)
                .await
                .map_err(|rejection| AppError::MalformedBody(rejection.body_text()))?;
            Ok(Self(value))
        } else {
            let Json(value) = Json::<T>::from_request(request, state)
                .await
                .map_err(|rejection| AppError::MalformedBody(rejection.body_text()))?;
            Ok(Self(value))
        }
    }
}
