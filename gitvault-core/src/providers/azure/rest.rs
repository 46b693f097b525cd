// gitvault-core/src/providers/azure/rest.rs
//
// Tenant/authority resolution for an Azure DevOps organization. A HEAD
// request against the organization URL is enough: unauthenticated
// responses carry either a `WWW-Authenticate: Bearer authorization_uri=...`
// challenge or an `X-VSS-ResourceTenant` header with the AAD tenant id (an
// empty GUID marks an MSA-backed organization).

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use gitvault_common::error::Error;

use crate::http::{HttpClient, HttpResponse};

const AUTHORITY_BASE: &str = "https://login.microsoftonline.com";
const VSS_RESOURCE_TENANT_HEADER: &str = "X-VSS-ResourceTenant";

pub struct AzureDevOpsRestApi {
    http: Arc<dyn HttpClient<Error = Error>>,
}

impl AzureDevOpsRestApi {
    pub fn new(http: Arc<dyn HttpClient<Error = Error>>) -> Self {
        Self { http }
    }

    pub async fn get_authority(&self, organization_url: &str) -> Result<String, Error> {
        debug!("HTTP: HEAD {}", organization_url);
        let response = self.http.head(organization_url.to_string()).await?;
        Ok(Self::authority_from_response(&response))
    }

    fn authority_from_response(response: &HttpResponse) -> String {
        // A bearer challenge naming the authority wins outright.
        if let Some(www_authenticate) = response.header("WWW-Authenticate") {
            if let Some(authority) = Self::authority_from_challenge(www_authenticate) {
                debug!("found WWW-Authenticate header with bearer authority '{}'", authority);
                return authority;
            }
        }

        if let Some(value) = response.header(VSS_RESOURCE_TENANT_HEADER) {
            let tenant_ids: Vec<&str> = value.split(',').map(str::trim).collect();

            // The first tenant id that is a non-empty GUID names the AAD
            // tenant.
            for candidate in &tenant_ids {
                if let Ok(guid) = Uuid::parse_str(candidate) {
                    if !guid.is_nil() {
                        debug!("found {} header with AAD tenant id '{}'", VSS_RESOURCE_TENANT_HEADER, candidate);
                        return format!("{}/{}", AUTHORITY_BASE, candidate);
                    }
                }
            }

            // Exactly one empty GUID marks an MSA-backed organization, which
            // needs the "/organizations" authority (MSA pass-through).
            if tenant_ids.len() == 1 {
                if let Ok(guid) = Uuid::parse_str(tenant_ids[0]) {
                    if guid.is_nil() {
                        debug!("found {} header with MSA tenant id (empty GUID)", VSS_RESOURCE_TENANT_HEADER);
                        return format!("{}/organizations", AUTHORITY_BASE);
                    }
                }
            }
        }

        debug!("unable to determine AAD/MSA tenant; falling back to common authority");
        format!("{}/common", AUTHORITY_BASE)
    }

    fn authority_from_challenge(challenge: &str) -> Option<String> {
        for part in challenge.split([',', ' ']) {
            if let Some(value) = part.strip_prefix("authorization_uri=") {
                let value = value.trim_matches('"');
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response_with(headers: &[(&str, &str)]) -> HttpResponse {
        HttpResponse {
            status: 401,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
                .collect(),
            body: String::new(),
        }
    }

    #[test]
    fn bearer_challenge_wins() {
        let response = response_with(&[(
            "WWW-Authenticate",
            "Bearer authorization_uri=https://login.microsoftonline.com/fd3a4262-3b73-4b13-a56a-357dbbee9b3f",
        )]);
        assert_eq!(
            AzureDevOpsRestApi::authority_from_response(&response),
            "https://login.microsoftonline.com/fd3a4262-3b73-4b13-a56a-357dbbee9b3f"
        );
    }

    #[test]
    fn resource_tenant_guid() {
        let response = response_with(&[(
            "X-VSS-ResourceTenant",
            "fd3a4262-3b73-4b13-a56a-357dbbee9b3f",
        )]);
        assert_eq!(
            AzureDevOpsRestApi::authority_from_response(&response),
            "https://login.microsoftonline.com/fd3a4262-3b73-4b13-a56a-357dbbee9b3f"
        );
    }

    #[test]
    fn empty_guid_is_msa() {
        let response = response_with(&[(
            "X-VSS-ResourceTenant",
            "00000000-0000-0000-0000-000000000000",
        )]);
        assert_eq!(
            AzureDevOpsRestApi::authority_from_response(&response),
            "https://login.microsoftonline.com/organizations"
        );
    }

    #[test]
    fn no_headers_falls_back_to_common() {
        let response = response_with(&[]);
        assert_eq!(
            AzureDevOpsRestApi::authority_from_response(&response),
            "https://login.microsoftonline.com/common"
        );
    }
}
