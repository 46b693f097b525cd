// gitvault-core/src/providers/mod.rs

pub mod azure;
pub mod bitbucket;
pub mod generic;
pub mod github;

pub use azure::AzureReposProvider;
pub use bitbucket::BitbucketProvider;
pub use generic::GenericProvider;
pub use github::GitHubProvider;

use gitvault_common::models::input::InputArguments;

use crate::store::normalize_service;

/// The service URL a credential request maps to: `{protocol}://{host}`,
/// optionally with the request path appended (some setups key credentials
/// per-repository), trailing slash trimmed.
pub(crate) fn service_url(input: &InputArguments, include_path: bool) -> String {
    let mut url = format!("{}://{}", input.protocol(), input.host());
    if include_path {
        if let Some(path) = input.path() {
            url.push('/');
            url.push_str(path.trim_start_matches('/'));
        }
    }
    normalize_service(&url)
}

/// `store` with an empty username and password is how Git signals
/// integrated/ambient authentication succeeded; there is nothing worth
/// persisting in that case.
pub(crate) fn is_empty_store_request(input: &InputArguments) -> bool {
    input.username().is_none_or(|u| u.trim().is_empty())
        && input.password().is_none_or(|p| p.trim().is_empty())
}
