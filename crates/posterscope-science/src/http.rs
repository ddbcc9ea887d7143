use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{Result, ScienceError};

/// Bytes written by [`RateLimitedClient::download_to_file`].
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    pub bytes: u64,
    pub content_type: Option<String>,
}

// ─── RateLimitedClient ────────────────────────────────────────────────────────

pub struct RateLimitedClient {
    client: reqwest::Client,
    min_interval: Duration,
    last_request: Arc<Mutex<Option<Instant>>>,
    max_retries: u32,
}

impl RateLimitedClient {
    pub fn new(min_interval: Duration, max_retries: u32, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .gzip(true)
            .build()?;
        Ok(Self {
            client,
            min_interval,
            last_request: Arc::new(Mutex::new(None)),
            max_retries,
        })
    }

    async fn wait_for_rate_limit(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(t) = *last {
            let elapsed = t.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// GET with query parameters; 429 honours `Retry-After`, transport errors
    /// back off exponentially, both bounded by `max_retries`.
    pub async fn get_text(
        &self,
        url: &str,
        query: &[(&str, String)],
        timeout: Duration,
    ) -> Result<String> {
        let mut attempt = 0u32;
        loop {
            self.wait_for_rate_limit().await;
            let resp = self
                .client
                .get(url)
                .query(query)
                .timeout(timeout)
                .send()
                .await;
            match resp {
                Ok(r) if r.status() == 429 => {
                    if attempt >= self.max_retries {
                        return Err(ScienceError::RateLimit(url.to_string(), 60));
                    }
                    let wait = r
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .unwrap_or(60);
                    sleep(Duration::from_secs(wait)).await;
                    attempt += 1;
                }
                Ok(r) if !r.status().is_success() => {
                    let status = r.status().as_u16();
                    let body = r.text().await.unwrap_or_default();
                    return Err(ScienceError::ApiError(
                        url.to_string(),
                        format!("HTTP {status}: {body}"),
                    ));
                }
                Ok(r) => return r.text().await.map_err(ScienceError::Http),
                Err(e) if e.is_timeout() => return Err(ScienceError::Timeout(url.to_string())),
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(ScienceError::Http(e));
                    }
                    let backoff = 2u64.pow(attempt);
                    sleep(Duration::from_secs(backoff)).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Stream `url` into `dest`, creating parent directories. Never retried;
    /// a partially written file is removed before an error is returned.
    pub async fn download_to_file(
        &self,
        url: &str,
        dest: &Path,
        timeout: Duration,
    ) -> Result<DownloadedFile> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let result = self.stream_to_file(url, dest, timeout).await;
        if result.is_err() && dest.exists() {
            if let Err(e) = tokio::fs::remove_file(dest).await {
                warn!("failed to remove partial download {}: {e}", dest.display());
            }
        }
        result
    }

    async fn stream_to_file(&self, url: &str, dest: &Path, timeout: Duration) -> Result<DownloadedFile> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScienceError::ApiError(url.to_string(), format!("HTTP {status}")));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut out = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut bytes: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| classify(url, e))?;
            out.write_all(&chunk).await?;
            bytes += chunk.len() as u64;
        }
        out.flush().await?;

        debug!("downloaded {bytes} bytes from {url}");
        Ok(DownloadedFile {
            bytes,
            content_type,
        })
    }
}

fn classify(url: &str, err: reqwest::Error) -> ScienceError {
    if err.is_timeout() {
        ScienceError::Timeout(url.to_string())
    } else {
        ScienceError::Http(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn client() -> RateLimitedClient {
        RateLimitedClient::new(Duration::ZERO, 0, "posterscope-test").unwrap()
    }

    #[tokio::test]
    async fn get_text_sends_query_parameters() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/api/query")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("search_query".into(), "all:\"foo bar\"".into()),
                Matcher::UrlEncoded("start".into(), "0".into()),
            ]))
            .with_status(200)
            .with_body("<feed/>")
            .create_async()
            .await;

        let body = client()
            .get_text(
                &format!("{}/api/query", server.url()),
                &[
                    ("search_query", "all:\"foo bar\"".to_string()),
                    ("start", "0".to_string()),
                ],
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert_eq!(body, "<feed/>");
    }

    #[tokio::test]
    async fn get_text_surfaces_api_errors() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/api/query")
            .with_status(503)
            .with_body("down")
            .create_async()
            .await;

        let err = client()
            .get_text(&format!("{}/api/query", server.url()), &[], Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, ScienceError::ApiError(_, ref msg) if msg.contains("503")));
    }

    #[tokio::test]
    async fn download_streams_into_nested_path() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/pdf/1.pdf")
            .with_status(200)
            .with_header("content-type", "application/pdf")
            .with_body(vec![7u8; 4096])
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("conf").join("pdfs").join("paper.pdf");
        let file = client()
            .download_to_file(&format!("{}/pdf/1.pdf", server.url()), &dest, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(file.bytes, 4096);
        assert_eq!(file.content_type.as_deref(), Some("application/pdf"));
        assert_eq!(std::fs::metadata(&dest).unwrap().len(), 4096);
    }

    #[tokio::test]
    async fn failed_download_leaves_no_file() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/pdf/missing.pdf")
            .with_status(404)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("paper.pdf");
        let err = client()
            .download_to_file(
                &format!("{}/pdf/missing.pdf", server.url()),
                &dest,
                Duration::from_secs(5),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ScienceError::ApiError(..)));
        assert!(!dest.exists());
    }
}
