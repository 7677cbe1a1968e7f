use std::collections::HashMap;

use tracing::debug;

pub const DEFAULT_MODEL_MOUNT_DIR: &str = "/mnt/models";
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";
pub const HEADERS_SUFFIX: &str = "-headers";

/// `AZURE_*` variables that give the blob client its own credentials.
const AZURE_AMBIENT_VARS: [&str; 12] = [
    "AZURE_STORAGE_ACCOUNT_KEY",
    "AZURE_STORAGE_ACCESS_KEY",
    "AZURE_STORAGE_MASTER_KEY",
    "AZURE_STORAGE_SAS_KEY",
    "AZURE_STORAGE_SAS_TOKEN",
    "AZURE_STORAGE_TOKEN",
    "AZURE_STORAGE_CLIENT_SECRET",
    "AZURE_CLIENT_SECRET",
    "AZURE_FEDERATED_TOKEN_FILE",
    "AZURE_MSI_ENDPOINT",
    "AZURE_IDENTITY_ENDPOINT",
    "AZURE_USE_AZURE_CLI",
];

/// Everything the backends need, read from the environment once at startup.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub s3: ObjectStoreConfig,
    pub azure: AzureConfig,
    pub http: HttpConfig,
    /// Paths under this prefix are populated by an external agent.
    pub model_mount_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            s3: ObjectStoreConfig::default(),
            azure: AzureConfig::default(),
            http: HttpConfig::default(),
            model_mount_dir: DEFAULT_MODEL_MOUNT_DIR.to_owned(),
        }
    }
}

impl StorageConfig {
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars().collect())
    }

    pub fn from_vars(vars: HashMap<String, String>) -> Self {
        let get = |key: &str| vars.get(key).filter(|v| !v.is_empty()).cloned();

        let config = Self {
            s3: ObjectStoreConfig::from_lookup(&get),
            azure: AzureConfig::from_lookup(&get),
            http: HttpConfig::from_vars(&vars),
            model_mount_dir: get("MODEL_MOUNT_DIR")
                .unwrap_or_else(|| DEFAULT_MODEL_MOUNT_DIR.to_owned()),
        };
        debug!("Storage config loaded: {:?}", config);
        config
    }
}

/// S3 (and S3-compatible) client settings.
#[derive(Clone)]
pub struct ObjectStoreConfig {
    pub endpoint: Option<String>,
    pub secure: bool,
    pub region: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            secure: true,
            region: None,
            access_key: None,
            secret_key: None,
        }
    }
}

impl std::fmt::Debug for ObjectStoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreConfig")
            .field("endpoint", &self.endpoint)
            .field("secure", &self.secure)
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "***"))
            .finish()
    }
}

impl ObjectStoreConfig {
    fn from_lookup(get: &impl Fn(&str) -> Option<String>) -> Self {
        let endpoint = get("AWS_ENDPOINT_URL");
        // An explicit scheme on the endpoint decides transport security.
        let secure = match endpoint.as_deref().and_then(|e| e.split_once("://")) {
            Some((scheme, _)) => scheme.eq_ignore_ascii_case("https"),
            None => get("S3_USE_HTTPS")
                .map(|v| !matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "no"))
                .unwrap_or(true),
        };

        Self {
            endpoint,
            secure,
            region: get("AWS_REGION"),
            access_key: get("AWS_ACCESS_KEY_ID"),
            secret_key: get("AWS_SECRET_ACCESS_KEY"),
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.access_key.is_some() && self.secret_key.is_some()
    }

    /// Fully qualified endpoint URL, `None` when the SDK default should be used.
    pub fn endpoint_url(&self) -> Option<String> {
        let endpoint = self.endpoint.as_deref()?;
        if endpoint.contains("://") {
            return Some(endpoint.trim_end_matches('/').to_owned());
        }
        let scheme = if self.secure { "https" } else { "http" };
        Some(format!("{scheme}://{}", endpoint.trim_end_matches('/')))
    }
}

/// Service principal used for the Azure token exchange fallback.
#[derive(Clone)]
pub struct BlobServicePrincipal {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub subscription_id: String,
}

impl std::fmt::Debug for BlobServicePrincipal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobServicePrincipal")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("subscription_id", &self.subscription_id)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AzureConfig {
    pub service_principal: Option<BlobServicePrincipal>,
    pub authority_host: String,
    /// Blob service URL replacing `https://<account>.blob.core.windows.net`,
    /// e.g. an Azurite emulator. Plain http is allowed when it says so.
    pub endpoint: Option<String>,
    /// The environment names credentials the blob client picks up itself.
    pub ambient_credentials: bool,
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            service_principal: None,
            authority_host: DEFAULT_AUTHORITY_HOST.to_owned(),
            endpoint: None,
            ambient_credentials: false,
        }
    }
}

impl AzureConfig {
    fn from_lookup(get: &impl Fn(&str) -> Option<String>) -> Self {
        // All four values or nothing.
        let service_principal = match (
            get("AZ_TENANT_ID"),
            get("AZ_CLIENT_ID"),
            get("AZ_CLIENT_SECRET"),
            get("AZ_SUBSCRIPTION_ID"),
        ) {
            (Some(tenant_id), Some(client_id), Some(client_secret), Some(subscription_id)) => {
                Some(BlobServicePrincipal {
                    tenant_id,
                    client_id,
                    client_secret,
                    subscription_id,
                })
            }
            _ => None,
        };

        Self {
            service_principal,
            authority_host: get("AZ_AUTHORITY_HOST")
                .unwrap_or_else(|| DEFAULT_AUTHORITY_HOST.to_owned()),
            endpoint: get("AZ_STORAGE_ENDPOINT"),
            ambient_credentials: AZURE_AMBIENT_VARS.iter().any(|key| get(key).is_some()),
        }
    }

    pub fn allow_http(&self) -> bool {
        self.endpoint
            .as_deref()
            .is_some_and(|endpoint| endpoint.starts_with("http://"))
    }
}

/// Raw `<hostname>-headers` values keyed by hostname. Parsed on use.
#[derive(Clone, Default)]
pub struct HttpConfig {
    pub host_headers: HashMap<String, String>,
}

impl std::fmt::Debug for HttpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Values usually carry tokens.
        f.debug_struct("HttpConfig")
            .field("hosts", &self.host_headers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl HttpConfig {
    fn from_vars(vars: &HashMap<String, String>) -> Self {
        let host_headers = vars
            .iter()
            .filter_map(|(key, value)| {
                key.strip_suffix(HEADERS_SUFFIX)
                    .filter(|host| !host.is_empty())
                    .map(|host| (host.to_owned(), value.clone()))
            })
            .collect();
        Self { host_headers }
    }

    pub fn with_host_headers(mut self, host: &str, headers_json: &str) -> Self {
        self.host_headers
            .insert(host.to_owned(), headers_json.to_owned());
        self
    }
}
