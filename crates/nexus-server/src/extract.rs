//! Request body extractors that validate after deserializing.
//!
//! Deserialization and validation failures both become
//! [`AppError::BadRequest`], so malformed input is always a 400 with the
//! standard JSON error body.

use axum::extract::rejection::{FormRejection, JsonRejection};
use axum::extract::{FromRequest, Request};
use axum::{Form, Json};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::AppError;

/// A JSON body that passed its `Validate` rules.
#[derive(Debug, Clone)]
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(json_rejection_message(&e)))?;
        value.validate()?;
        Ok(Self(value))
    }
}

/// A URL-encoded form body that passed its `Validate` rules.
#[derive(Debug, Clone)]
pub struct ValidForm<T>(pub T);

impl<S, T> FromRequest<S> for ValidForm<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Form(value) = Form::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(form_rejection_message(&e)))?;
        value.validate()?;
        Ok(Self(value))
    }
}

// serde messages quote the offending value, which may be a secret. Those
// rejections get a fixed message instead of the rejection text.

fn json_rejection_message(rejection: &JsonRejection) -> String {
    match rejection {
        JsonRejection::JsonDataError(_) => {
            "request body does not match the expected fields".to_owned()
        }
        JsonRejection::JsonSyntaxError(_) => "request body is not valid JSON".to_owned(),
        other => other.body_text(),
    }
}

fn form_rejection_message(rejection: &FormRejection) -> String {
    match rejection {
        FormRejection::FailedToDeserializeForm(_)
        | FormRejection::FailedToDeserializeFormBody(_) => {
            "form body does not match the expected fields".to_owned()
        }
        other => other.body_text(),
    }
}

/// Deserialize a field that distinguishes "absent" from "null".
///
/// Use with `#[serde(default, deserialize_with = "present")]` on an
/// `Option<Option<T>>`: absent gives `None`, `null` gives `Some(None)`.
///
/// # Errors
///
/// Propagates the inner deserializer's error.
pub fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::Deserialize<'de>,
{
    <Option<T> as serde::Deserialize>::deserialize(deserializer).map(Some)
}
