// =============================================================================
// gitvault-core/src/auth/mod.rs
// =============================================================================

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use gitvault_common::error::Error;
use gitvault_common::models::credential::Credential;
use gitvault_common::models::input::InputArguments;

use crate::config::Settings;
use crate::http::HttpResponse;

pub mod broker;
pub mod callback_server;
pub mod helper;
pub mod oauth2;
pub mod oidc;
pub mod registry;
pub mod terminal;

pub use registry::{HostProviderPriority, HostProviderRegistry};

/// Each remote-Git host family implements this.
///
/// One instance serves one credential request at a time; the dispatcher
/// threads a single [`CancellationToken`] through the whole authentication
/// attempt so that loopback listeners, device-code polling, helper
/// subprocesses and terminal waits can all be torn down promptly.
#[async_trait]
pub trait HostProvider: Send + Sync {
    fn id(&self) -> &'static str;
    fn name(&self) -> &'static str;

    /// Cheap, pattern-only match against the request (hostname suffix or
    /// similar). Never performs network I/O.
    fn is_supported(&self, input: &InputArguments) -> bool;

    /// Claim a host based on a probe response (self-hosted instances on
    /// generic hostnames). Default: no claim.
    fn is_supported_response(&self, _response: &HttpResponse) -> bool {
        false
    }

    async fn get_credential(
        &self,
        input: &InputArguments,
        cancel: &CancellationToken,
    ) -> Result<Credential, Error>;

    async fn store_credential(&self, input: &InputArguments) -> Result<(), Error>;

    async fn erase_credential(&self, input: &InputArguments) -> Result<(), Error>;
}

pub(crate) fn ensure_interaction_allowed(settings: &Settings) -> Result<(), Error> {
    if !settings.is_interaction_allowed() {
        return Err(Error::InteractionDisabled(
            "cannot prompt because user interactivity has been disabled (GITVAULT_INTERACTIVE)"
                .to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn ensure_terminal_prompts_allowed(settings: &Settings) -> Result<(), Error> {
    if !settings.is_terminal_prompts_enabled() {
        return Err(Error::InteractionDisabled(
            "cannot prompt because terminal prompts have been disabled (GIT_TERMINAL_PROMPT)"
                .to_string(),
        ));
    }
    Ok(())
}
