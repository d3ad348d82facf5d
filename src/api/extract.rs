//! Body, path and query extractors that reject with the usual
//! `{"success": false, "error": ...}` body instead of axum's plain text.

use axum::extract::{FromRequest, FromRequestParts};

use crate::middleware::logging::ApiError;

#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct Json<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct Path<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct Query<T>(pub T);
