//! Blocking HTTP client shared by the network adapters.
//!
//! One fixed per-request timeout, bounded retries with exponential backoff on
//! transient failures (connect errors, timeouts, 429 and 5xx). Everything else
//! is returned as a `DataError` for the loader to downgrade.

use super::provider::DataError;
use std::time::Duration;

pub struct HttpClient {
    client: reqwest::blocking::Client,
    max_retries: u32,
    base_delay: Duration,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    /// GET `url` with query parameters and return the body as text.
    pub fn get_text(&self, url: &str, query: &[(&str, String)]) -> Result<String, DataError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                std::thread::sleep(delay);
            }

            match self.client.get(url).query(query).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);
                        log::debug!("{url}: rate limited (attempt {})", attempt + 1);
                        last_error = Some(DataError::RateLimited {
                            retry_after_secs: retry_after,
                        });
                        continue;
                    }

                    if status == reqwest::StatusCode::UNAUTHORIZED
                        || status == reqwest::StatusCode::FORBIDDEN
                    {
                        return Err(DataError::ProviderMessage(format!(
                            "HTTP {status} from {url}"
                        )));
                    }

                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(DataError::ProviderMessage(format!("HTTP 404 from {url}")));
                    }

                    if !status.is_success() {
                        last_error = Some(DataError::Other(format!("HTTP {status} from {url}")));
                        continue;
                    }

                    return resp.text().map_err(|e| {
                        DataError::ResponseFormatChanged(format!("unreadable body from {url}: {e}"))
                    });
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                        continue;
                    }
                    return Err(DataError::NetworkUnreachable(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}
