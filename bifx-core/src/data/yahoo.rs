//! Market-data adapter (Yahoo Finance v8 chart API).
//!
//! Produces daily `Open, High, Low, Close, Volume` with prices auto-adjusted by
//! the `adjclose / close` factor, so splits and dividends don't show up as
//! returns. Yahoo has no official API and changes format without notice; a
//! parse failure surfaces as `ResponseFormatChanged` and the source is skipped.

use super::catalog::DateRange;
use super::http::HttpClient;
use super::provider::{DataError, DataProvider};
use crate::series::TimeSeriesTable;
use chrono::NaiveDate;
use serde::Deserialize;

const COLUMNS: [&str; 5] = ["Open", "High", "Low", "Close", "Volume"];

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

/// Yahoo Finance chart adapter.
pub struct YahooProvider {
    http: HttpClient,
}

impl YahooProvider {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    fn chart_url(symbol: &str) -> String {
        format!("https://query2.finance.yahoo.com/v8/finance/chart/{symbol}")
    }

    fn chart_query(range: &DateRange) -> Vec<(&'static str, String)> {
        let start_ts = range.start.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
        // Inclusive end: the whole end day.
        let end_ts = (range.end + chrono::Duration::days(1))
            .and_time(chrono::NaiveTime::MIN)
            .and_utc()
            .timestamp()
            - 1;
        vec![
            ("period1", start_ts.to_string()),
            ("period2", end_ts.to_string()),
            ("interval", "1d".to_string()),
            ("includeAdjustedClose", "true".to_string()),
        ]
    }

    /// Parse the chart API body into an auto-adjusted table.
    pub fn parse_chart(symbol: &str, body: &str) -> Result<TimeSeriesTable, DataError> {
        let resp: ChartResponse = serde_json::from_str(body).map_err(|e| {
            DataError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
        })?;

        let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
            Some(err) if err.code == "Not Found" => DataError::EmptyResult {
                symbol: symbol.to_string(),
            },
            Some(err) => DataError::ProviderMessage(format!("{}: {}", err.code, err.description)),
            None => DataError::ResponseFormatChanged("empty result with no error".into()),
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))?;

        // No timestamps at all means no trading days in range.
        let Some(timestamps) = data.timestamp else {
            return Err(DataError::EmptyResult {
                symbol: symbol.to_string(),
            });
        };

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

        let adj_closes = data
            .indicators
            .adjclose
            .and_then(|v| v.into_iter().next())
            .map(|a| a.adjclose);

        let at = |v: &Vec<Option<f64>>, i: usize| v.get(i).copied().flatten();

        let mut rows: Vec<(NaiveDate, Vec<Option<f64>>)> = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let date = chrono::DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.naive_utc().date())
                .ok_or_else(|| {
                    DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
                })?;

            let open = at(&quote.open, i);
            let high = at(&quote.high, i);
            let low = at(&quote.low, i);
            let close = at(&quote.close, i);
            let volume = at(&quote.volume, i);

            // Holidays come back as all-null rows.
            if open.is_none() && high.is_none() && low.is_none() && close.is_none() {
                continue;
            }

            let factor = match (adj_closes.as_ref().and_then(|v| at(v, i)), close) {
                (Some(adj), Some(c)) if c != 0.0 => adj / c,
                _ => 1.0,
            };
            let adjust = |p: Option<f64>| p.map(|x| x * factor);

            rows.push((
                date,
                vec![adjust(open), adjust(high), adjust(low), adjust(close), volume],
            ));
        }

        if rows.is_empty() {
            return Err(DataError::EmptyResult {
                symbol: symbol.to_string(),
            });
        }

        Ok(TimeSeriesTable::from_rows(&COLUMNS, rows)?)
    }
}

impl DataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(&self, symbol: &str, range: &DateRange) -> Result<TimeSeriesTable, DataError> {
        log::info!("fetching {symbol} from yahoo_finance ({range})");
        let body = self
            .http
            .get_text(&Self::chart_url(symbol), &Self::chart_query(range))?;
        Self::parse_chart(symbol, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{"chart":{"result":[{"timestamp":[1704196800,1704283200,1704369600],
        "indicators":{"quote":[{"open":[10.0,null,12.0],"high":[11.0,null,13.0],
        "low":[9.0,null,11.0],"close":[10.0,null,12.0],"volume":[100,null,300]}],
        "adjclose":[{"adjclose":[5.0,null,6.0]}]}}],"error":null}}"#;

    #[test]
    fn parses_and_auto_adjusts() {
        let table = YahooProvider::parse_chart("XU100.IS", BODY).unwrap();
        assert_eq!(table.len(), 2, "holiday row dropped");
        assert_eq!(table.column_names(), COLUMNS.to_vec());
        let close = table.close().unwrap();
        assert_eq!(close.values, vec![Some(5.0), Some(6.0)]);
        let open = table.column("Open").unwrap();
        assert_eq!(open.values, vec![Some(5.0), Some(6.0)]);
        let vol = table.column("Volume").unwrap();
        assert_eq!(vol.values, vec![Some(100.0), Some(300.0)]);
    }

    #[test]
    fn missing_timestamps_is_empty_result() {
        let body = r#"{"chart":{"result":[{"indicators":{"quote":[{}]}}],"error":null}}"#;
        let err = YahooProvider::parse_chart("X", body).unwrap_err();
        assert!(matches!(err, DataError::EmptyResult { .. }));
    }

    #[test]
    fn not_found_is_empty_result() {
        let body =
            r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data"}}}"#;
        let err = YahooProvider::parse_chart("NOPE", body).unwrap_err();
        assert!(matches!(err, DataError::EmptyResult { .. }));
    }

    #[test]
    fn garbage_is_format_change() {
        let err = YahooProvider::parse_chart("X", "<html>").unwrap_err();
        assert!(matches!(err, DataError::ResponseFormatChanged(_)));
    }

    #[test]
    fn query_covers_whole_end_day() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        );
        let q = YahooProvider::chart_query(&range);
        let p1: i64 = q[0].1.parse().unwrap();
        let p2: i64 = q[1].1.parse().unwrap();
        assert_eq!(p2 - p1, 86_399);
    }
}
