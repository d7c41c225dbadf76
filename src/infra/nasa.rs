//! reqwest-backed client for the NASA APOD endpoint.

use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use time::Date;
use tracing::warn;

use crate::application::upstream::{ApodSource, FetchFailure};
use crate::config::UpstreamSettings;
use crate::domain::apod::{RawRecord, format_date};

use super::error::InfraError;

pub const METRIC_UPSTREAM_FAILURE_TOTAL: &str = "apod_upstream_failure_total";

#[derive(Clone)]
pub struct NasaClient {
    client: Client,
    base_url: Url,
    api_key: String,
    timeout: Duration,
}

impl NasaClient {
    pub fn new(settings: &UpstreamSettings) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;

        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
            api_key: settings.api_key.clone(),
            timeout: settings.timeout,
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("apod-relay/", env!("CARGO_PKG_VERSION"))
    }

    /// Issue one request, bounded by `timeout` instead of the configured default.
    pub async fn fetch_with_timeout(
        &self,
        date: Option<Date>,
        timeout: Duration,
    ) -> Result<RawRecord, FetchFailure> {
        let date_key = date.map_or_else(|| "today".to_string(), format_date);

        self.send(date, &date_key, timeout)
            .await
            .inspect_err(|failure| {
                counter!(METRIC_UPSTREAM_FAILURE_TOTAL, "kind" => failure.kind().as_str())
                    .increment(1);
            })
    }

    async fn send(
        &self,
        date: Option<Date>,
        date_key: &str,
        timeout: Duration,
    ) -> Result<RawRecord, FetchFailure> {
        let response = self
            .client
            .get(self.request_url(date))
            .timeout(timeout)
            .send()
            .await
            .map_err(|err| transport_failure(date_key, err))?;

        let status = response.status();
        if let Some(failure) = classify_status(status) {
            warn!(
                date = date_key,
                status = status.as_u16(),
                kind = failure.kind().as_str(),
                "upstream rejected request"
            );
            return Err(failure);
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| transport_failure(date_key, err))?;

        parse_body(&body).inspect_err(|failure| {
            warn!(
                date = date_key,
                status = status.as_u16(),
                kind = failure.kind().as_str(),
                body_len = body.len(),
                "upstream returned an unexpected body"
            );
        })
    }

    fn request_url(&self, date: Option<Date>) -> Url {
        let mut url = self.base_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("api_key", &self.api_key);
            if let Some(date) = date {
                query.append_pair("date", &format_date(date));
            }
        }
        url
    }
}

#[async_trait]
impl ApodSource for NasaClient {
    async fn fetch(&self, date: Option<Date>) -> Result<RawRecord, FetchFailure> {
        self.fetch_with_timeout(date, self.timeout).await
    }
}

/// Map a response status to a failure; `None` means the body should be parsed.
pub(crate) fn classify_status(status: StatusCode) -> Option<FetchFailure> {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Some(FetchFailure::unauthorized()),
        StatusCode::TOO_MANY_REQUESTS => Some(FetchFailure::rate_limited()),
        status if !status.is_success() => Some(FetchFailure::network()),
        _ => None,
    }
}

pub(crate) fn parse_body(body: &[u8]) -> Result<RawRecord, FetchFailure> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(object)) => Ok(RawRecord::from_object(&object)),
        _ => Err(FetchFailure::malformed()),
    }
}

fn transport_failure(date_key: &str, err: reqwest::Error) -> FetchFailure {
    // The request URL carries the API key; keep it out of the logs.
    let err = err.without_url();
    warn!(
        date = date_key,
        timeout = err.is_timeout(),
        connect = err.is_connect(),
        error = %err,
        "request to upstream failed"
    );
    FetchFailure::network()
}
