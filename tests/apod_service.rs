mod support;

use std::{num::NonZeroUsize, time::Duration};

use apod_relay::{
    application::{
        apod::{ApodError, ApodService, RecentEntry},
        upstream::{FetchFailure, FetchFailureKind},
    },
    cache::CacheConfig,
    domain::apod::{NormalizedRecord, format_date},
};
use time::macros::date;

use support::{FakeSource, TODAY_DATE, service, service_with};

fn entry_date(entry: &RecentEntry) -> String {
    match entry {
        RecentEntry::Record(record) => record.date.clone().expect("record date"),
        RecentEntry::Placeholder { date, .. } => date.clone(),
    }
}

async fn record_for(service: &ApodService, date: &str) -> NormalizedRecord {
    service.by_date(Some(date)).await.expect("record for date")
}

#[tokio::test]
async fn by_date_fetches_once_then_serves_from_cache() {
    let source = FakeSource::new();
    let service = service(source.clone());

    let first = record_for(&service, "2024-01-01").await;
    let second = record_for(&service, "2024-01-01").await;

    assert_eq!(first, second);
    assert_eq!(source.calls(), 1);
    assert_eq!(source.requested(), vec![Some(date!(2024 - 01 - 01))]);
    assert_eq!(
        first.media_url.as_deref(),
        Some("https://apod.example/2024-01-01-hd.jpg")
    );
}

#[tokio::test]
async fn today_is_cached_under_its_own_key() {
    let source = FakeSource::new();
    let service = service(source.clone());

    let record = service.today().await.expect("today");
    service.today().await.expect("cached today");

    assert_eq!(record.date.as_deref(), Some(TODAY_DATE));
    assert_eq!(source.calls(), 1);
    assert_eq!(source.requested(), vec![None]);
    assert_eq!(service.cache().len(), 1);
}

#[tokio::test]
async fn failed_fetch_is_not_cached() {
    let source = FakeSource::new();
    let service = service(source.clone());
    source.fail(None, FetchFailure::unauthorized());

    let err = service.today().await.expect_err("unauthorized");
    match err {
        ApodError::Fetch(failure) => {
            assert_eq!(failure.kind(), FetchFailureKind::Unauthorized);
            assert_eq!(failure.message(), "API key invalid or unauthorized");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(service.cache().is_empty());

    source.recover(None);
    service.today().await.expect("recovered");
    assert_eq!(source.calls(), 2);
}

#[tokio::test]
async fn invalid_dates_never_reach_upstream() {
    let source = FakeSource::new();
    let service = service(source.clone());

    for missing in [None, Some(""), Some("   ")] {
        let err = service.by_date(missing).await.expect_err("missing date");
        assert!(matches!(err, ApodError::InvalidInput(_)));
        assert_eq!(err.to_string(), "Missing date parameter");
    }

    for malformed in ["2024-13-01", "2024/01/01", "yesterday", "2024-02-30"] {
        let err = service.by_date(Some(malformed)).await.unwrap_err();
        assert!(matches!(err, ApodError::InvalidInput(_)), "{malformed}");
    }

    assert_eq!(source.calls(), 0);
}

#[tokio::test]
async fn recent_inserts_placeholder_for_failed_date() {
    let source = FakeSource::new();
    let service = service(source.clone());
    let today = date!(2024 - 01 - 03);
    source.fail(Some(date!(2024 - 01 - 02)), FetchFailure::rate_limited());

    let entries = service.recent_from(today, 3).await.expect("recent");

    let dates: Vec<String> = entries.iter().map(entry_date).collect();
    assert_eq!(dates, vec!["2024-01-03", "2024-01-02", "2024-01-01"]);
    assert!(!entries[0].is_placeholder());
    assert_eq!(
        entries[1],
        RecentEntry::Placeholder {
            date: "2024-01-02".to_string(),
            error: "Rate limit exceeded".to_string(),
        }
    );
    assert!(!entries[2].is_placeholder());
    assert_eq!(source.calls(), 3);

    // The failed date is retried on the next batch; the others come from cache.
    service.recent_from(today, 3).await.expect("recent again");
    assert_eq!(source.calls(), 4);
}

#[tokio::test]
async fn recent_accepts_inclusive_bounds() {
    let source = FakeSource::new();
    let service = service_with(
        source.clone(),
        CacheConfig {
            max_entries: 200,
            ..Default::default()
        },
    );
    let today = date!(2024 - 03 - 01);

    let single = service.recent_from(today, 1).await.expect("one day");
    assert_eq!(single.len(), 1);
    assert_eq!(entry_date(&single[0]), "2024-03-01");

    let hundred = service.recent_from(today, 100).await.expect("100 days");
    assert_eq!(hundred.len(), 100);
    let expected: Vec<String> = (0..100)
        .map(|offset| format_date(today - time::Duration::days(offset)))
        .collect();
    let actual: Vec<String> = hundred.iter().map(entry_date).collect();
    assert_eq!(actual, expected);
    assert!(hundred.iter().all(|entry| !entry.is_placeholder()));
}

#[tokio::test]
async fn recent_rejects_out_of_range_days_without_fetching() {
    let source = FakeSource::new();
    let service = service(source.clone());
    let today = date!(2024 - 03 - 01);

    for days in [0, 101] {
        let err = service.recent_from(today, days).await.unwrap_err();
        assert_eq!(err.to_string(), "days must be integer between 1 and 100");
    }

    for raw in ["0", "101", "abc", "-1"] {
        let err = service.recent(Some(raw)).await.expect_err(raw);
        assert!(matches!(err, ApodError::InvalidInput(_)), "{raw}");
    }

    assert_eq!(source.calls(), 0);
}

#[tokio::test]
async fn recent_defaults_to_ten_days() {
    let source = FakeSource::new();
    let service = service(source.clone());

    let entries = service.recent(None).await.expect("recent");

    assert_eq!(entries.len(), 10);
    assert_eq!(source.calls(), 10);
}

#[tokio::test]
async fn recent_reuses_records_cached_by_date_lookups() {
    let source = FakeSource::new();
    let service = service(source.clone());

    record_for(&service, "2024-01-02").await;
    let today = date!(2024 - 01 - 03);
    service.recent_from(today, 3).await.expect("recent");

    assert_eq!(source.calls(), 3);
}

#[tokio::test]
async fn concurrent_recent_keeps_newest_first_order() {
    let source = FakeSource::new();
    let concurrency = NonZeroUsize::new(4).expect("non-zero");
    let service = service(source.clone());
    let service = service.with_recent_concurrency(concurrency);
    let today = date!(2024 - 05 - 10);
    // Newest dates answer slowest so completion order is the reverse of request order.
    source.delay(today, Duration::from_millis(40));
    source.delay(date!(2024 - 05 - 09), Duration::from_millis(20));

    let entries = service.recent_from(today, 4).await.expect("recent");
    let dates: Vec<String> = entries.iter().map(entry_date).collect();

    assert_eq!(
        dates,
        vec!["2024-05-10", "2024-05-09", "2024-05-08", "2024-05-07"]
    );
    assert_eq!(source.calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn expired_records_are_fetched_again() {
    let source = FakeSource::new();
    let service = service_with(
        source.clone(),
        CacheConfig {
            ttl: Duration::from_secs(60),
            max_entries: 10,
        },
    );

    record_for(&service, "2024-01-01").await;
    tokio::time::advance(Duration::from_secs(59)).await;
    record_for(&service, "2024-01-01").await;
    assert_eq!(source.calls(), 1);

    tokio::time::advance(Duration::from_secs(1)).await;
    record_for(&service, "2024-01-01").await;
    assert_eq!(source.calls(), 2);
}
