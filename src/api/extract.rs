//! Extractors whose rejections come back through `BooksError`, so a bad body,
//! path or query string gets the same JSON error envelope as everything else.

use axum::extract::{FromRequest, FromRequestParts, Path, Query};
use axum::Json;

use crate::error::BooksError;

#[derive(FromRequest)]
#[from_request(via(Json), rejection(BooksError))]
pub struct ApiJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(Path), rejection(BooksError))]
pub struct ApiPath<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(BooksError))]
pub struct ApiQuery<T>(pub T);
