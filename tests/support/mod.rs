#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use apod_relay::{
    application::{
        apod::ApodService,
        upstream::{ApodSource, FetchFailure},
    },
    cache::{CacheConfig, ExpiringCache},
    domain::apod::{RawRecord, format_date},
};
use async_trait::async_trait;
use time::Date;

pub const TODAY_DATE: &str = "2024-06-01";

/// Scripted [`ApodSource`] that records every call it receives.
#[derive(Default)]
pub struct FakeSource {
    calls: AtomicUsize,
    requested: Mutex<Vec<Option<Date>>>,
    failures: Mutex<HashMap<Option<Date>, FetchFailure>>,
    delays: Mutex<HashMap<Date, Duration>>,
}

impl FakeSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail(&self, date: Option<Date>, failure: FetchFailure) {
        self.failures
            .lock()
            .expect("failures lock")
            .insert(date, failure);
    }

    pub fn recover(&self, date: Option<Date>) {
        self.failures.lock().expect("failures lock").remove(&date);
    }

    pub fn delay(&self, date: Date, wait: Duration) {
        self.delays.lock().expect("delay lock").insert(date, wait);
    }

    fn delay_for(&self, date: Date) -> Option<Duration> {
        self.delays.lock().expect("delay lock").get(&date).copied()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requested(&self) -> Vec<Option<Date>> {
        self.requested.lock().expect("requested lock").clone()
    }
}

#[async_trait]
impl ApodSource for FakeSource {
    async fn fetch(&self, date: Option<Date>) -> Result<RawRecord, FetchFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().expect("requested lock").push(date);

        if let Some(delay) = date.and_then(|date| self.delay_for(date)) {
            tokio::time::sleep(delay).await;
        }

        if let Some(failure) = self.failures.lock().expect("failures lock").get(&date) {
            return Err(failure.clone());
        }

        Ok(sample_raw(date))
    }
}

pub fn sample_raw(date: Option<Date>) -> RawRecord {
    let date = date.map_or_else(|| TODAY_DATE.to_string(), format_date);
    RawRecord {
        title: Some(format!("Picture for {date}")),
        explanation: Some("A long exposure of the night sky.".to_string()),
        media_type: Some("image".to_string()),
        url: Some(format!("https://apod.example/{date}.jpg")),
        hdurl: Some(format!("https://apod.example/{date}-hd.jpg")),
        copyright: None,
        date: Some(date),
    }
}

pub fn service_with(source: Arc<FakeSource>, config: CacheConfig) -> ApodService {
    ApodService::new(source, Arc::new(ExpiringCache::new(&config)))
}

pub fn service(source: Arc<FakeSource>) -> ApodService {
    service_with(source, CacheConfig::default())
}
