use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::info;

use crate::{
    models::config::BlobServicePrincipal,
    utils::errors::{StorageError, StorageResult},
};

pub const STORAGE_RESOURCE: &str = "https://storage.azure.com/";

/// Bearer token accepted by the blob client.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BearerToken(***)")
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error_description: Option<String>,
}

/// Client-credentials exchange for a storage token. A missing service
/// principal is not an error, it just means there is no token.
pub fn get_azure_storage_token(
    principal: Option<&BlobServicePrincipal>,
    authority_host: &str,
) -> StorageResult<Option<BearerToken>> {
    let Some(principal) = principal else {
        return Ok(None);
    };

    let url = format!(
        "{}/{}/oauth2/token",
        authority_host.trim_end_matches('/'),
        principal.tenant_id
    );
    let form = [
        ("grant_type", "client_credentials"),
        ("client_id", principal.client_id.as_str()),
        ("client_secret", principal.client_secret.as_str()),
        ("resource", STORAGE_RESOURCE),
    ];

    let res = Client::new()
        .post(&url)
        .form(&form)
        .send()
        .map_err(|e| StorageError::CredentialExchange(e.to_string()))?;
    let status = res.status();
    let body: TokenResponse = res
        .json()
        .map_err(|e| StorageError::CredentialExchange(format!("status {status}: {e}")))?;

    if !status.is_success() {
        return Err(StorageError::CredentialExchange(format!(
            "status {status}: {}",
            body.error_description.unwrap_or_default()
        )));
    }
    let token = body.access_token.ok_or_else(|| {
        StorageError::CredentialExchange("response did not contain an access token".to_owned())
    })?;

    info!(
        "Retrieved SP token credential for client_id: {}",
        principal.client_id
    );
    Ok(Some(BearerToken::new(token)))
}
