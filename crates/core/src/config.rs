//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into core services. Request
//! handling never reads process-wide environment variables; binaries collect the raw values into
//! [`ConfigSources`] and hand them to [`load_core_config`].

use crate::constants::{
    DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_QUERY_TOP_GENES, DEFAULT_REPLY_TOP_GENES,
    DEFAULT_SUPPORT_EMAIL, DEFAULT_SUPPORT_INSTITUTION, DEFAULT_SUPPORT_NAME,
};
use crate::{CoreError, CoreResult};
use mme::ContactInfo;
use mme_types::NonEmptyText;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// One partner server, as listed in the remote servers file.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct RemoteServerConfig {
    pub server_id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub base_url: String,
    /// Token we present when querying the partner.
    pub remote_auth_token: String,
    /// Token the partner presents when querying us.
    pub local_auth_token: String,
    /// Only accept the partner's queries from addresses its `base_url` host resolves to.
    #[serde(default)]
    pub limit_accepted_ips: bool,
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    default_contact: ContactInfo,
    reply_top_genes: usize,
    query_top_genes: usize,
    http_timeout: Duration,
    remote_servers: Vec<RemoteServerConfig>,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    pub fn new(
        default_contact: ContactInfo,
        reply_top_genes: usize,
        query_top_genes: usize,
        http_timeout: Duration,
        remote_servers: Vec<RemoteServerConfig>,
    ) -> CoreResult<Self> {
        if http_timeout.is_zero() {
            return Err(CoreError::InvalidInput(
                "http timeout must be greater than zero".into(),
            ));
        }
        validate_remote_servers(&remote_servers)?;

        Ok(Self {
            default_contact,
            reply_top_genes,
            query_top_genes,
            http_timeout,
            remote_servers,
        })
    }

    pub fn default_contact(&self) -> &ContactInfo {
        &self.default_contact
    }

    pub fn reply_top_genes(&self) -> usize {
        self.reply_top_genes
    }

    pub fn query_top_genes(&self) -> usize {
        self.query_top_genes
    }

    pub fn http_timeout(&self) -> Duration {
        self.http_timeout
    }

    pub fn remote_servers(&self) -> &[RemoteServerConfig] {
        &self.remote_servers
    }
}

/// Raw configuration values, typically read from the environment by a binary.
#[derive(Clone, Debug, Default)]
pub struct ConfigSources {
    pub remotes_file: Option<String>,
    pub support_name: Option<String>,
    pub support_institution: Option<String>,
    pub support_email: Option<String>,
    pub reply_top_genes: Option<String>,
    pub query_top_genes: Option<String>,
    pub http_timeout_secs: Option<String>,
}

impl ConfigSources {
    /// Collect sources with `lookup`, e.g. `|key| std::env::var(key).ok()`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            remotes_file: lookup("MME_REMOTES_FILE"),
            support_name: lookup("MME_SUPPORT_NAME"),
            support_institution: lookup("MME_SUPPORT_INSTITUTION"),
            support_email: lookup("MME_SUPPORT_EMAIL"),
            reply_top_genes: lookup("MME_REPLY_TOP_GENES"),
            query_top_genes: lookup("MME_QUERY_TOP_GENES"),
            http_timeout_secs: lookup("MME_HTTP_TIMEOUT_SECS"),
        }
    }
}

/// Resolve a [`CoreConfig`] from raw values, applying defaults for anything unset.
pub fn load_core_config(sources: ConfigSources) -> CoreResult<CoreConfig> {
    let default_contact = ContactInfo::support(
        text_or_default(sources.support_name, DEFAULT_SUPPORT_NAME)?,
        text_or_default(sources.support_institution, DEFAULT_SUPPORT_INSTITUTION)?,
        text_or_default(sources.support_email, DEFAULT_SUPPORT_EMAIL)?,
    );

    let remote_servers = match non_blank(sources.remotes_file) {
        Some(path) => load_remote_servers(Path::new(&path))?,
        None => {
            tracing::warn!("MME_REMOTES_FILE not set; no partner servers are configured");
            Vec::new()
        }
    };

    CoreConfig::new(
        default_contact,
        top_genes_from_env_value(sources.reply_top_genes, DEFAULT_REPLY_TOP_GENES)?,
        top_genes_from_env_value(sources.query_top_genes, DEFAULT_QUERY_TOP_GENES)?,
        timeout_from_env_value(sources.http_timeout_secs)?,
        remote_servers,
    )
}

/// Parse a top-genes count from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns `default`.
pub fn top_genes_from_env_value(value: Option<String>, default: usize) -> CoreResult<usize> {
    match non_blank(value) {
        None => Ok(default),
        Some(v) => v.parse::<usize>().map_err(|_| {
            CoreError::InvalidInput(format!("top genes must be a non-negative integer, got [{v}]"))
        }),
    }
}

/// Parse the outgoing HTTP timeout (whole seconds) from an optional string value.
pub fn timeout_from_env_value(value: Option<String>) -> CoreResult<Duration> {
    let secs = match non_blank(value) {
        None => DEFAULT_HTTP_TIMEOUT_SECS,
        Some(v) => v.parse::<u64>().map_err(|_| {
            CoreError::InvalidInput(format!("http timeout must be whole seconds, got [{v}]"))
        })?,
    };
    Ok(Duration::from_secs(secs))
}

/// Load and validate the remote servers YAML file.
pub fn load_remote_servers(path: &Path) -> CoreResult<Vec<RemoteServerConfig>> {
    let text = std::fs::read_to_string(path).map_err(CoreError::FileRead)?;
    let servers: Vec<RemoteServerConfig> =
        serde_yaml::from_str(&text).map_err(CoreError::YamlDeserialization)?;
    validate_remote_servers(&servers)?;
    tracing::info!(
        "loaded {} remote server(s) from {}",
        servers.len(),
        path.display()
    );
    Ok(servers)
}

fn validate_remote_servers(servers: &[RemoteServerConfig]) -> CoreResult<()> {
    let mut seen = HashSet::new();
    for server in servers {
        let id = server.server_id.trim();
        if id.is_empty() {
            return Err(CoreError::InvalidInput(
                "remote server_id cannot be empty".into(),
            ));
        }
        if !seen.insert(id) {
            return Err(CoreError::InvalidInput(format!(
                "duplicate remote server_id [{id}]"
            )));
        }
        let url = server.base_url.trim().to_ascii_lowercase();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(CoreError::InvalidInput(format!(
                "remote server [{id}] base_url must start with http:// or https://"
            )));
        }
        if server.local_auth_token.trim().is_empty() {
            return Err(CoreError::InvalidInput(format!(
                "remote server [{id}] local_auth_token cannot be empty"
            )));
        }
    }
    Ok(())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn text_or_default(value: Option<String>, default: &str) -> CoreResult<NonEmptyText> {
    let value = non_blank(value).unwrap_or_else(|| default.to_string());
    NonEmptyText::new(value).map_err(|e| CoreError::InvalidInput(e.to_string()))
}
