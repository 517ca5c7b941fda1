use http_client_instrumented::HttpClientInstrumented;
use surge_runner::prelude::UserValuesConstraint;
use url::Url;

/// HTTP specific runner context values, filled in by [crate::prelude::configure_http_client].
#[derive(Debug, Default)]
pub struct HttpRunnerContext {
    pub(crate) client: Option<HttpClientInstrumented>,
    pub(crate) target_url: Option<Url>,
}

impl UserValuesConstraint for HttpRunnerContext {}

impl HttpRunnerContext {
    pub fn client(&self) -> anyhow::Result<HttpClientInstrumented> {
        self.client.clone().ok_or_else(|| {
            anyhow::anyhow!(
                "HTTP client is not set, did you forget to call `configure_http_client` in your setup?"
            )
        })
    }

    pub fn target_url(&self) -> anyhow::Result<&Url> {
        self.target_url.as_ref().ok_or_else(|| {
            anyhow::anyhow!(
                "Target URL is not set, did you forget to call `configure_http_client` in your setup?"
            )
        })
    }
}
