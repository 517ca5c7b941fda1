use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use surge_instruments::prelude::{report_operation, OperationRecord, Reporter, STATUS_ATTR};
use url::Url;

/// Request timeout used when a scenario doesn't choose one.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// What came back from one request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    /// `None` when response bodies are being discarded.
    pub body: Option<Bytes>,
}

/// An HTTP client that reports every request it makes as an operation.
///
/// Requests with a transport error or a status of 400 or above are reported as errors. Cloning is
/// cheap and clones share the same connection pool.
#[derive(Debug, Clone)]
pub struct HttpClientInstrumented {
    inner: reqwest::Client,
    reporter: Arc<Reporter>,
    discard_response_bodies: bool,
}

impl HttpClientInstrumented {
    pub fn new(
        reporter: Arc<Reporter>,
        discard_response_bodies: bool,
        request_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let inner = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("surge/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self::from_client(inner, reporter, discard_response_bodies))
    }

    pub fn from_client(
        inner: reqwest::Client,
        reporter: Arc<Reporter>,
        discard_response_bodies: bool,
    ) -> Self {
        Self {
            inner,
            reporter,
            discard_response_bodies,
        }
    }

    /// Issue a GET with default headers.
    ///
    /// The operation carries the response status, or `none` when no response arrived.
    pub async fn get(&self, url: &Url) -> anyhow::Result<HttpResponse> {
        let mut record = OperationRecord::new("http_get").with_attr("url", url);

        let response = self.fetch(url).await;
        let status = match &response {
            Ok(r) => r.status.to_string(),
            Err(_) => "none".to_string(),
        };
        record.attr.insert(STATUS_ATTR.to_string(), status);

        let outcome = match &response {
            Ok(r) if r.status >= 400 => Err(format!("HTTP status {}", r.status)),
            Ok(_) => Ok(()),
            Err(e) => Err(e.to_string()),
        };
        if let Err(reason) = &outcome {
            log::trace!("GET {url} counted as an error: {reason}");
        }
        report_operation(&self.reporter, record, &outcome);

        response
    }

    async fn fetch(&self, url: &Url) -> anyhow::Result<HttpResponse> {
        let response = self
            .inner
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?;
        let status = response.status().as_u16();

        // The body is always read so the connection can go back into the pool.
        let body = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read response body from {url}"))?;

        Ok(HttpResponse {
            status,
            body: (!self.discard_response_bodies).then_some(body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use surge_instruments::prelude::ReportConfig;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn server_returning(status: u16, body: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&server)
            .await;
        server
    }

    fn client(discard: bool) -> (HttpClientInstrumented, Arc<Reporter>) {
        let reporter = Arc::new(ReportConfig::default().init());
        let client =
            HttpClientInstrumented::new(reporter.clone(), discard, Duration::from_secs(5)).unwrap();
        (client, reporter)
    }

    #[tokio::test]
    async fn successful_get_keeps_body() {
        let server = server_returning(200, "hello").await;
        let (client, reporter) = client(false);

        let response = client.get(&server.uri().parse().unwrap()).await.unwrap();

        assert_eq!(200, response.status);
        assert_eq!(Some(Bytes::from_static(b"hello")), response.body);
        let stats = reporter.operation_stats();
        assert_eq!(1, stats[0].total_operations);
        assert_eq!(0, stats[0].error_count);
        assert_eq!(Some(&1), stats[0].status_counts.get("200"));
    }

    #[tokio::test]
    async fn discarded_body_keeps_status() {
        let server = server_returning(200, "hello").await;
        let (client, _) = client(true);

        let response = client.get(&server.uri().parse().unwrap()).await.unwrap();

        assert_eq!(200, response.status);
        assert!(response.body.is_none());
    }

    #[tokio::test]
    async fn server_error_is_reported_as_failed_operation() {
        let server = server_returning(500, "").await;
        let (client, reporter) = client(true);

        let response = client.get(&server.uri().parse().unwrap()).await.unwrap();

        assert_eq!(500, response.status);
        let stats = &reporter.operation_stats()[0];
        assert_eq!(1, stats.error_count);
        assert_eq!(Some(&1), stats.status_counts.get("500"));
    }

    #[tokio::test]
    async fn connection_refused_is_an_error() {
        // Bind then drop a listener to get a port with nothing behind it.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let (client, reporter) = client(true);

        let result = client
            .get(&format!("http://127.0.0.1:{port}").parse().unwrap())
            .await;

        assert!(result.is_err());
        let stats = reporter.operation_stats();
        assert_eq!(1, stats[0].total_operations);
        assert_eq!(1, stats[0].error_count);
        assert_eq!(Some(&1), stats[0].status_counts.get("none"));
    }
}
