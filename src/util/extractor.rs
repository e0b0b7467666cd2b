//! Request extractors whose rejections render as [`ApiError`] JSON bodies.

use crate::errors::ApiError;
use crate::model::post::{PostPageQuery, PostSearchQuery};
use crate::util::common::split_tags;
use crate::AppState;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use validator::Validate;

/// `axum::Json` with an [`ApiError`] rejection. Also used for responses.
#[derive(FromRequest)]
#[from_request(via(axum::extract::Json), rejection(ApiError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// `axum::extract::Query` with an [`ApiError`] rejection.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct Query<T>(pub T);

/// A query string that must also pass its `validator` rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
    Query<T>: FromRequestParts<S, Rejection = ApiError>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        value.validate()?;
        Ok(ValidatedQuery(value))
    }
}

/// A JSON body that must also pass its `validator` rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = ApiError>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

/// Keyset paging parameters ready for the repository.
///
/// A missing `max_id` starts above every id, `per_page` is clamped to the
/// configured bounds and `tags` is split from its comma separated form.
#[derive(Debug, Clone, PartialEq)]
pub struct Paging {
    pub max_id: i64,
    pub per_page: i64,
    pub tags: Vec<String>,
}

impl FromRequestParts<AppState> for Paging {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Query(query) = Query::<PostPageQuery>::from_request_parts(parts, state).await?;
        Ok(Paging {
            max_id: query.max_id.unwrap_or(i64::MAX),
            per_page: state.config.page_size(query.per_page),
            tags: split_tags(query.tags.as_deref().unwrap_or_default()),
        })
    }
}

/// A validated search query with the title needle trimmed and tags split.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchFilter {
    pub title: String,
    pub tags: Vec<String>,
}

impl<S: Send + Sync> FromRequestParts<S> for SearchFilter {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let ValidatedQuery(query) = ValidatedQuery::<PostSearchQuery>::from_request_parts(parts, state).await?;
        Ok(SearchFilter {
            title: query.query.trim().to_string(),
            tags: split_tags(query.tags.as_deref().unwrap_or_default()),
        })
    }
}
