//! Search-interest adapter (Google Trends).
//!
//! Two requests per load, both for the whole keyword set at once:
//! 1. `explore` returns the widget list; the `TIMESERIES` widget carries a
//!    token and a request payload.
//! 2. `widgetdata/multiline` with that payload returns one value per keyword
//!    per period, plus an `isPartial` flag on the still-open last period.
//!
//! The partial-period indicator is dropped before the table leaves the adapter.
//! Both bodies start with an anti-JSON-hijacking prefix that is stripped first.

use super::catalog::DateRange;
use super::http::HttpClient;
use super::provider::{DataError, KeywordProvider};
use crate::series::TimeSeriesTable;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};

const EXPLORE_URL: &str = "https://trends.google.com/trends/api/explore";
const MULTILINE_URL: &str = "https://trends.google.com/trends/api/widgetdata/multiline";
const PARTIAL_COLUMN: &str = "isPartial";

#[derive(Debug, Deserialize)]
struct ExploreResponse {
    widgets: Vec<Widget>,
}

#[derive(Debug, Deserialize)]
struct Widget {
    id: String,
    token: Option<String>,
    request: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct MultilineResponse {
    default: Timeline,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Timeline {
    timeline_data: Vec<TimelinePoint>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimelinePoint {
    time: String,
    value: Vec<f64>,
    #[serde(default)]
    is_partial: bool,
}

pub struct GoogleTrendsProvider {
    http: HttpClient,
    geo: String,
    language: String,
    tz_offset_minutes: i32,
}

impl GoogleTrendsProvider {
    /// Turkish locale, geo `TR`, UTC+3.
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            geo: "TR".to_string(),
            language: "tr-TR".to_string(),
            tz_offset_minutes: 180,
        }
    }

    fn explore_payload(&self, keywords: &[String], range: &DateRange) -> String {
        let time = format!("{} {}", range.start, range.end);
        let items: Vec<Value> = keywords
            .iter()
            .map(|k| json!({"keyword": k, "geo": self.geo, "time": time}))
            .collect();
        json!({"comparisonItem": items, "category": 0, "property": ""}).to_string()
    }

    fn base_query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("hl", self.language.clone()),
            ("tz", self.tz_offset_minutes.to_string()),
        ]
    }

    /// Extract the timeseries widget token and request payload.
    pub fn parse_explore(body: &str) -> Result<(String, Value), DataError> {
        let resp: ExploreResponse = serde_json::from_str(strip_prefix(body)).map_err(|e| {
            DataError::ResponseFormatChanged(format!("unreadable explore response: {e}"))
        })?;
        let widget = resp
            .widgets
            .into_iter()
            .find(|w| w.id == "TIMESERIES")
            .ok_or_else(|| DataError::ResponseFormatChanged("no TIMESERIES widget".into()))?;
        match (widget.token, widget.request) {
            (Some(token), Some(request)) => Ok((token, request)),
            _ => Err(DataError::ResponseFormatChanged(
                "TIMESERIES widget without token".into(),
            )),
        }
    }

    /// Parse the multiline body into one column per keyword, partial flag removed.
    pub fn parse_multiline(keywords: &[String], body: &str) -> Result<TimeSeriesTable, DataError> {
        let resp: MultilineResponse = serde_json::from_str(strip_prefix(body)).map_err(|e| {
            DataError::ResponseFormatChanged(format!("unreadable multiline response: {e}"))
        })?;

        let mut rows: Vec<(NaiveDate, Vec<Option<f64>>)> = Vec::new();
        for point in resp.default.timeline_data {
            let ts: i64 = point.time.parse().map_err(|e| {
                DataError::ResponseFormatChanged(format!("bad timestamp '{}': {e}", point.time))
            })?;
            let date = chrono::DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.naive_utc().date())
                .ok_or_else(|| DataError::ResponseFormatChanged(format!("bad timestamp {ts}")))?;
            if point.value.len() != keywords.len() {
                return Err(DataError::ResponseFormatChanged(format!(
                    "{} values for {} keywords",
                    point.value.len(),
                    keywords.len()
                )));
            }
            let mut values: Vec<Option<f64>> = point.value.into_iter().map(Some).collect();
            values.push(Some(if point.is_partial { 1.0 } else { 0.0 }));
            rows.push((date, values));
        }

        if rows.is_empty() {
            return Err(DataError::EmptyResult {
                symbol: keywords.join(","),
            });
        }

        let mut names: Vec<&str> = keywords.iter().map(String::as_str).collect();
        names.push(PARTIAL_COLUMN);
        Ok(TimeSeriesTable::from_rows(&names, rows)?.without_column(PARTIAL_COLUMN))
    }
}

impl KeywordProvider for GoogleTrendsProvider {
    fn name(&self) -> &str {
        "google_trends"
    }

    fn fetch_keywords(
        &self,
        keywords: &[String],
        range: &DateRange,
    ) -> Result<TimeSeriesTable, DataError> {
        if keywords.is_empty() {
            return Err(DataError::ContractViolation("empty keyword set".into()));
        }
        log::info!("fetching search interest for keywords {keywords:?} ({range})");

        let mut query = self.base_query();
        query.push(("req", self.explore_payload(keywords, range)));
        let explore = self.http.get_text(EXPLORE_URL, &query)?;
        let (token, request) = Self::parse_explore(&explore)?;

        let mut query = self.base_query();
        query.push(("req", request.to_string()));
        query.push(("token", token));
        let body = self.http.get_text(MULTILINE_URL, &query)?;
        Self::parse_multiline(keywords, &body)
    }
}

/// Drop everything before the first `{`.
fn strip_prefix(body: &str) -> &str {
    body.find('{').map_or(body, |i| &body[i..])
}
