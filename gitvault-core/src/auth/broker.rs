// gitvault-core/src/auth/broker.rs
//
// Seam for a native platform SSO/broker mechanism (e.g. the Windows web
// account manager). When a broker is available it is preferred over the
// browser and device-code flows for hosts that support it; everywhere
// else the `UnavailableBroker` keeps the selection logic honest.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use gitvault_common::error::Error;

#[derive(Debug, Clone)]
pub struct BrokerTokenResult {
    pub access_token: String,
    /// The signed-in account's UPN, when the broker can surface it.
    pub account_upn: Option<String>,
}

#[async_trait]
pub trait IdentityBroker: Send + Sync {
    fn is_available(&self) -> bool;

    async fn acquire_token(
        &self,
        authority: &str,
        scopes: &[String],
        username: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<BrokerTokenResult, Error>;
}

#[derive(Default)]
pub struct UnavailableBroker;

#[async_trait]
impl IdentityBroker for UnavailableBroker {
    fn is_available(&self) -> bool {
        false
    }

    async fn acquire_token(
        &self,
        _authority: &str,
        _scopes: &[String],
        _username: Option<&str>,
        _cancel: &CancellationToken,
    ) -> Result<BrokerTokenResult, Error> {
        Err(Error::Auth(
            "no platform identity broker is available on this system".to_string(),
        ))
    }
}
