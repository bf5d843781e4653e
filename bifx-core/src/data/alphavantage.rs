//! FX adapter (Alpha Vantage `FX_DAILY`).
//!
//! Quotes are requested from USD into the source symbol (e.g. `TRY`). The
//! endpoint needs an API key; without one the adapter refuses up front with
//! `MissingCredential` and never touches the network. The full history comes
//! back in one response and is restricted to the requested range here.

use super::catalog::DateRange;
use super::http::HttpClient;
use super::provider::{DataError, DataProvider};
use crate::series::TimeSeriesTable;
use chrono::NaiveDate;
use serde_json::Value;

const ENDPOINT: &str = "https://www.alphavantage.co/query";
const SERIES_KEY: &str = "Time Series FX (Daily)";
const FIELDS: [(&str, &str); 4] = [
    ("Open", "1. open"),
    ("High", "2. high"),
    ("Low", "3. low"),
    ("Close", "4. close"),
];

pub struct AlphaVantageProvider {
    http: HttpClient,
    api_key: Option<String>,
    from_symbol: String,
}

impl AlphaVantageProvider {
    pub fn new(http: HttpClient, api_key: Option<String>) -> Self {
        Self {
            http,
            api_key,
            from_symbol: "USD".to_string(),
        }
    }

    /// Parse an `FX_DAILY` body and keep rows inside `range`.
    pub fn parse_fx_daily(
        symbol: &str,
        body: &str,
        range: &DateRange,
    ) -> Result<TimeSeriesTable, DataError> {
        let json: Value = serde_json::from_str(body).map_err(|e| {
            DataError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
        })?;

        let Some(series) = json.get(SERIES_KEY).and_then(Value::as_object) else {
            // Throttling and bad keys come back as 200 with a note instead of data.
            let note = ["Note", "Information", "Error Message"]
                .iter()
                .find_map(|k| json.get(*k).and_then(Value::as_str))
                .map(str::to_string)
                .unwrap_or_else(|| json.to_string());
            return Err(DataError::ProviderMessage(format!(
                "invalid response from Alpha Vantage: {note}"
            )));
        };

        let mut rows = Vec::with_capacity(series.len());
        for (date_str, fields) in series {
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
                DataError::ResponseFormatChanged(format!("bad date '{date_str}': {e}"))
            })?;
            if !range.contains(date) {
                continue;
            }
            let values = FIELDS
                .iter()
                .map(|(_, key)| {
                    fields
                        .get(*key)
                        .and_then(Value::as_str)
                        .and_then(|s| s.trim().parse::<f64>().ok())
                })
                .collect();
            rows.push((date, values));
        }

        if rows.is_empty() {
            return Err(DataError::EmptyResult {
                symbol: symbol.to_string(),
            });
        }

        let names: Vec<&str> = FIELDS.iter().map(|(name, _)| *name).collect();
        Ok(TimeSeriesTable::from_rows(&names, rows)?)
    }
}

impl DataProvider for AlphaVantageProvider {
    fn name(&self) -> &str {
        "alphavantage"
    }

    fn fetch(&self, symbol: &str, range: &DateRange) -> Result<TimeSeriesTable, DataError> {
        let Some(key) = self.api_key.as_deref() else {
            return Err(DataError::MissingCredential(format!(
                "Alpha Vantage API key not configured - skipping {symbol} \
                 (set ALPHAVANTAGE_API_KEY or disable the source)"
            )));
        };

        log::info!("fetching {symbol} from alphavantage ({range})");
        let query = [
            ("function", "FX_DAILY".to_string()),
            ("from_symbol", self.from_symbol.clone()),
            ("to_symbol", symbol.to_string()),
            ("outputsize", "full".to_string()),
            ("apikey", key.to_string()),
        ];
        let body = self.http.get_text(ENDPOINT, &query)?;
        Self::parse_fx_daily(symbol, &body, range)
    }
}
