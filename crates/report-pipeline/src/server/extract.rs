//! Request extractors whose rejections use the API's `{"detail"}` error body

use axum::extract::{FromRequest, FromRequestParts};

use crate::error::Error;

/// JSON request body; malformed or incomplete bodies become `Validation` errors
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(Error))]
pub struct ApiJson<T>(pub T);

/// Path parameters
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(Error))]
pub struct ApiPath<T>(pub T);

/// Query string parameters
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(Error))]
pub struct ApiQuery<T>(pub T);
