use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use crate::{
    application::{apod::RecentEntry, error::HttpError},
    domain::apod::NormalizedRecord,
};

use super::HttpState;

const SOURCE: &str = "infra::http::apod";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct DateQuery {
    date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct RecentQuery {
    days: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct Health {
    status: &'static str,
}

pub(super) async fn today(
    State(state): State<HttpState>,
) -> Result<Json<NormalizedRecord>, HttpError> {
    let record = state.apod.today().await?;
    Ok(Json(record))
}

pub(super) async fn by_date(
    State(state): State<HttpState>,
    query: Result<Query<DateQuery>, QueryRejection>,
) -> Result<Json<NormalizedRecord>, HttpError> {
    let Query(query) = query.map_err(query_error)?;
    let record = state.apod.by_date(query.date.as_deref()).await?;
    Ok(Json(record))
}

pub(super) async fn recent(
    State(state): State<HttpState>,
    query: Result<Query<RecentQuery>, QueryRejection>,
) -> Result<Json<Vec<RecentEntry>>, HttpError> {
    let Query(query) = query.map_err(query_error)?;
    let entries = state.apod.recent(query.days.as_deref()).await?;
    Ok(Json(entries))
}

pub(super) async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

fn query_error(rejection: QueryRejection) -> HttpError {
    HttpError::from_error(
        SOURCE,
        StatusCode::BAD_REQUEST,
        "Invalid query string",
        &rejection,
    )
}
