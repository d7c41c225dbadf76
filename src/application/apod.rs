//! Read-through orchestration between the record cache and the upstream source.

use std::{num::NonZeroUsize, sync::Arc};

use futures::stream::{self, StreamExt};
use serde::Serialize;
use thiserror::Error;
use time::{Date, Duration, OffsetDateTime};
use tracing::{debug, warn};

use crate::application::upstream::{ApodSource, FetchFailure};
use crate::cache::ExpiringCache;
use crate::domain::apod::{NormalizedRecord, format_date, parse_date, transform};

pub const CACHE_NAMESPACE: &str = "apod";
pub const TODAY_KEY: &str = "today";
pub const DEFAULT_RECENT_DAYS: u32 = 10;
pub const MIN_RECENT_DAYS: u32 = 1;
pub const MAX_RECENT_DAYS: u32 = 100;

const MISSING_DATE: &str = "Missing date parameter";
const INVALID_DAYS: &str = "days must be integer between 1 and 100";
const INVALID_DATE: &str = "date must be formatted as YYYY-MM-DD";

#[derive(Debug, Error)]
pub enum ApodError {
    /// Rejected before touching the cache or the upstream.
    #[error("{0}")]
    InvalidInput(String),
    #[error(transparent)]
    Fetch(#[from] FetchFailure),
}

impl ApodError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

/// One slot of a `recent` batch: a record, or the reason its date could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RecentEntry {
    Record(NormalizedRecord),
    Placeholder { date: String, error: String },
}

impl RecentEntry {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, RecentEntry::Placeholder { .. })
    }
}

#[derive(Clone)]
pub struct ApodService {
    source: Arc<dyn ApodSource>,
    cache: Arc<ExpiringCache<NormalizedRecord>>,
    recent_concurrency: NonZeroUsize,
}

impl ApodService {
    pub fn new(source: Arc<dyn ApodSource>, cache: Arc<ExpiringCache<NormalizedRecord>>) -> Self {
        Self {
            source,
            cache,
            recent_concurrency: NonZeroUsize::MIN,
        }
    }

    /// Allow up to `concurrency` upstream fetches in flight per `recent` batch.
    pub fn with_recent_concurrency(mut self, concurrency: NonZeroUsize) -> Self {
        self.recent_concurrency = concurrency;
        self
    }

    pub fn cache(&self) -> &Arc<ExpiringCache<NormalizedRecord>> {
        &self.cache
    }

    /// The most recent record, cached under the `today` key.
    pub async fn today(&self) -> Result<NormalizedRecord, ApodError> {
        Ok(self.resolve(TODAY_KEY, None).await?)
    }

    /// The record for a `YYYY-MM-DD` date.
    pub async fn by_date(&self, date: Option<&str>) -> Result<NormalizedRecord, ApodError> {
        let raw = date
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ApodError::invalid_input(MISSING_DATE))?;
        let date = parse_date(raw).map_err(|_| {
            ApodError::invalid_input(format!("{INVALID_DATE}, got `{raw}`"))
        })?;

        Ok(self.resolve(&format_date(date), Some(date)).await?)
    }

    /// Records for the last `days` days (default 10), newest first, counting from today in UTC.
    pub async fn recent(&self, days: Option<&str>) -> Result<Vec<RecentEntry>, ApodError> {
        let days = parse_days(days)?;
        let today = OffsetDateTime::now_utc().date();
        self.recent_from(today, days).await
    }

    /// Records for `today` and the `days - 1` preceding dates, newest first.
    ///
    /// A failed date yields a placeholder; it never aborts the batch.
    pub async fn recent_from(
        &self,
        today: Date,
        days: u32,
    ) -> Result<Vec<RecentEntry>, ApodError> {
        if !(MIN_RECENT_DAYS..=MAX_RECENT_DAYS).contains(&days) {
            return Err(ApodError::invalid_input(INVALID_DAYS));
        }

        let dates: Vec<Date> = (0..days)
            .map_while(|offset| today.checked_sub(Duration::days(i64::from(offset))))
            .collect();

        let entries: Vec<RecentEntry> = stream::iter(dates)
            .map(|date| self.recent_entry(date))
            .buffered(self.recent_concurrency.get())
            .collect()
            .await;

        Ok(entries)
    }

    async fn recent_entry(&self, date: Date) -> RecentEntry {
        let key = format_date(date);
        match self.resolve(&key, Some(date)).await {
            Ok(record) => RecentEntry::Record(record),
            Err(failure) => RecentEntry::Placeholder {
                date: key,
                error: failure.to_string(),
            },
        }
    }

    async fn resolve(
        &self,
        key: &str,
        date: Option<Date>,
    ) -> Result<NormalizedRecord, FetchFailure> {
        if let Some(record) = self.cache.get(CACHE_NAMESPACE, key) {
            debug!(key, outcome = "hit", "serving cached record");
            return Ok(record);
        }
        debug!(key, outcome = "miss", "fetching record from upstream");

        let raw = self.source.fetch(date).await.inspect_err(|failure| {
            warn!(
                key,
                kind = failure.kind().as_str(),
                detail = failure.message(),
                "failed to fetch record"
            );
        })?;

        let record = transform(raw);
        self.cache.set(CACHE_NAMESPACE, key, record.clone());
        Ok(record)
    }
}

/// Parse the `days` query value, defaulting to 10 when absent.
pub fn parse_days(days: Option<&str>) -> Result<u32, ApodError> {
    let Some(raw) = days else {
        return Ok(DEFAULT_RECENT_DAYS);
    };

    raw.trim()
        .parse::<i64>()
        .ok()
        .and_then(|value| u32::try_from(value).ok())
        .filter(|value| (MIN_RECENT_DAYS..=MAX_RECENT_DAYS).contains(value))
        .ok_or_else(|| ApodError::invalid_input(INVALID_DAYS))
}
