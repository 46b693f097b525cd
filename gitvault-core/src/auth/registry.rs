// gitvault-core/src/auth/registry.rs
//
// Host provider selection. Pattern matching runs first and never touches
// the network; when no pattern claims the host, a single lightweight probe
// request lets providers recognize self-hosted instances from response
// headers. The generic provider is registered at low priority and is the
// ultimate fallback.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use gitvault_common::error::Error;
use gitvault_common::models::input::InputArguments;

use crate::auth::HostProvider;
use crate::http::{HttpClient, HttpResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostProviderPriority {
    Normal,
    Low,
}

pub struct HostProviderRegistry {
    normal: Vec<Arc<dyn HostProvider>>,
    low: Vec<Arc<dyn HostProvider>>,
    http: Arc<dyn HttpClient<Error = Error>>,
    probe_enabled: bool,
    probe_timeout: Duration,
}

impl HostProviderRegistry {
    pub fn new(http: Arc<dyn HttpClient<Error = Error>>) -> Self {
        Self {
            normal: Vec::new(),
            low: Vec::new(),
            http,
            probe_enabled: true,
            probe_timeout: Duration::from_millis(1500),
        }
    }

    pub fn with_probe(mut self, enabled: bool, timeout: Duration) -> Self {
        self.probe_enabled = enabled;
        self.probe_timeout = timeout;
        self
    }

    pub fn register(&mut self, provider: Arc<dyn HostProvider>, priority: HostProviderPriority) {
        match priority {
            HostProviderPriority::Normal => self.normal.push(provider),
            HostProviderPriority::Low => self.low.push(provider),
        }
    }

    /// Selects the provider for a request. Normal-priority providers are
    /// consulted in registration order by hostname pattern; if none claims
    /// the host, an optional HTTP probe lets them inspect response
    /// headers; the low-priority providers are last.
    pub async fn get_provider(
        &self,
        input: &InputArguments,
    ) -> Result<Arc<dyn HostProvider>, Error> {
        for provider in &self.normal {
            if provider.is_supported(input) {
                debug!(provider = provider.id(), "provider claimed request by pattern");
                return Ok(Arc::clone(provider));
            }
        }

        if self.probe_enabled {
            if let Some(response) = self.probe(input).await {
                for provider in &self.normal {
                    if provider.is_supported_response(&response) {
                        debug!(provider = provider.id(), "provider claimed request by probe");
                        return Ok(Arc::clone(provider));
                    }
                }
            }
        }

        for provider in &self.low {
            if provider.is_supported(input) {
                debug!(provider = provider.id(), "falling back to low-priority provider");
                return Ok(Arc::clone(provider));
            }
        }

        Err(Error::NoProviderFound(format!(
            "no host provider available for {}://{}",
            input.protocol(),
            input.host()
        )))
    }

    /// Probe failures never abort selection; they just mean "no claim".
    async fn probe(&self, input: &InputArguments) -> Option<HttpResponse> {
        let url = format!("{}://{}/", input.protocol(), input.host());
        debug!(%url, "probing remote for provider detection");
        match tokio::time::timeout(self.probe_timeout, self.http.head(url.clone())).await {
            Ok(Ok(response)) => Some(response),
            Ok(Err(err)) => {
                warn!("provider detection probe against {} failed: {}", url, err);
                None
            }
            Err(_) => {
                warn!("provider detection probe against {} timed out", url);
                None
            }
        }
    }
}
