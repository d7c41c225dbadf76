//! Astronomy Picture of the Day records as received from upstream and as served.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

use super::error::DomainError;

const ISO_DATE: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Record exactly as the upstream provider returned it.
///
/// No field is required: the provider occasionally omits `hdurl` or `copyright`,
/// and older entries may lack more than that. Missing fields stay `None` and
/// surface as `null` in the normalized output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawRecord {
    pub date: Option<String>,
    pub title: Option<String>,
    pub explanation: Option<String>,
    pub media_type: Option<String>,
    pub url: Option<String>,
    pub hdurl: Option<String>,
    pub copyright: Option<String>,
}

impl RawRecord {
    /// Build a record from an arbitrary JSON object.
    ///
    /// Non-string values are treated as absent rather than rejected.
    pub fn from_object(object: &Map<String, Value>) -> Self {
        let field = |name: &str| object.get(name)?.as_str().map(str::to_owned);

        Self {
            date: field("date"),
            title: field("title"),
            explanation: field("explanation"),
            media_type: field("media_type"),
            url: field("url"),
            hdurl: field("hdurl"),
            copyright: field("copyright"),
        }
    }
}

/// Media classification used when resolving the served URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Other,
}

impl MediaKind {
    pub fn from_media_type(media_type: Option<&str>) -> Self {
        match media_type {
            Some("image") => MediaKind::Image,
            Some("video") => MediaKind::Video,
            _ => MediaKind::Other,
        }
    }
}

/// Shape returned to clients. Always derived from a [`RawRecord`] via [`transform`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub date: Option<String>,
    pub title: Option<String>,
    pub explanation: Option<String>,
    pub media_type: Option<String>,
    pub media_url: Option<String>,
    pub copyright: Option<String>,
}

/// Normalize an upstream record.
///
/// Images prefer the high-definition URL and fall back to `url`; videos and
/// everything else always use `url`.
pub fn transform(raw: RawRecord) -> NormalizedRecord {
    let media_url = match MediaKind::from_media_type(raw.media_type.as_deref()) {
        MediaKind::Image => raw.hdurl.or(raw.url),
        MediaKind::Video | MediaKind::Other => raw.url,
    };

    NormalizedRecord {
        date: raw.date,
        title: raw.title,
        explanation: raw.explanation,
        media_type: raw.media_type,
        media_url,
        copyright: raw.copyright,
    }
}

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(value: &str) -> Result<Date, DomainError> {
    Date::parse(value.trim(), ISO_DATE)
        .map_err(|err| DomainError::validation(format!("invalid date `{value}`: {err}")))
}

/// Render a date in the canonical `YYYY-MM-DD` form used for cache keys and upstream queries.
pub fn format_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::macros::date;

    use super::*;

    fn raw(media_type: &str, url: Option<&str>, hdurl: Option<&str>) -> RawRecord {
        RawRecord {
            date: Some("2024-01-01".to_string()),
            title: Some("Orion".to_string()),
            media_type: Some(media_type.to_string()),
            url: url.map(str::to_string),
            hdurl: hdurl.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn image_prefers_hdurl() {
        let record = transform(raw("image", Some("u"), Some("hd")));
        assert_eq!(record.media_url.as_deref(), Some("hd"));
    }

    #[test]
    fn image_falls_back_to_url() {
        let record = transform(raw("image", Some("u"), None));
        assert_eq!(record.media_url.as_deref(), Some("u"));
    }

    #[test]
    fn video_ignores_hdurl() {
        let record = transform(raw("video", Some("yt"), Some("hd")));
        assert_eq!(record.media_url.as_deref(), Some("yt"));
    }

    #[test]
    fn unknown_media_uses_url() {
        let record = transform(raw("other", Some("u"), Some("hd")));
        assert_eq!(record.media_url.as_deref(), Some("u"));

        let missing = transform(RawRecord {
            url: Some("u".to_string()),
            hdurl: Some("hd".to_string()),
            ..Default::default()
        });
        assert_eq!(missing.media_url.as_deref(), Some("u"));
        assert!(missing.media_type.is_none());
    }

    #[test]
    fn missing_fields_stay_absent() {
        let record = transform(RawRecord::default());
        assert_eq!(
            serde_json::to_value(&record).expect("serialize"),
            json!({
                "date": null,
                "title": null,
                "explanation": null,
                "media_type": null,
                "media_url": null,
                "copyright": null,
            })
        );
    }

    #[test]
    fn from_object_drops_non_string_fields() {
        let value = json!({
            "date": "2024-01-01",
            "title": 42,
            "media_type": "image",
            "url": "u",
            "service_version": "v1",
        });
        let object = value.as_object().expect("object");

        let record = RawRecord::from_object(object);
        assert_eq!(record.date.as_deref(), Some("2024-01-01"));
        assert!(record.title.is_none());
        assert_eq!(record.url.as_deref(), Some("u"));
    }

    #[test]
    fn dates_parse_and_format() {
        assert_eq!(
            parse_date("2024-02-29").expect("leap day"),
            date!(2024 - 02 - 29)
        );
        assert_eq!(format_date(date!(2024 - 03 - 05)), "2024-03-05");
        assert!(parse_date("2023-02-29").is_err());
        assert!(parse_date("yesterday").is_err());
        assert!(parse_date("2024-1-1").is_err());
    }

    #[test]
    fn formatted_dates_are_zero_padded_and_parse_back() {
        assert_eq!(format_date(date!(999 - 01 - 05)), "0999-01-05");

        for day in [
            date!(999 - 01 - 05),
            date!(1995 - 06 - 16),
            date!(2024 - 12 - 31),
        ] {
            assert_eq!(parse_date(&format_date(day)).expect("round trip"), day);
        }
    }
}
