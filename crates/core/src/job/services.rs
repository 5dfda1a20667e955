//! Translation service catalog.
//!
//! Every service is reached through an OpenAI-compatible chat API. The
//! catalog captures credentials from the environment once, at startup.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// API family a service belongs to.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    OpenAi,
    Anthropic,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::OpenAi => f.write_str("OpenAI"),
            Provider::Anthropic => f.write_str("Anthropic"),
        }
    }
}

/// Static description of a built-in service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceDescriptor {
    /// Model name, also the service id in requests.
    pub name: &'static str,
    pub display_name: &'static str,
    pub provider: Provider,
    pub api_key_env: &'static str,
    pub base_url_env: &'static str,
    pub default_base_url: &'static str,
}

pub const DEFAULT_SERVICE: &str = "gpt-4o-mini";

pub const SERVICES: &[ServiceDescriptor] = &[
    ServiceDescriptor {
        name: "claude-sonnet-4-20250514",
        display_name: "Claude Sonnet 4",
        provider: Provider::Anthropic,
        api_key_env: "ANTHROPIC_API_KEY",
        base_url_env: "ANTHROPIC_BASE_URL",
        default_base_url: "https://api.anthropic.com/v1",
    },
    ServiceDescriptor {
        name: "gpt-4o-mini",
        display_name: "GPT-4o Mini",
        provider: Provider::OpenAi,
        api_key_env: "OPENAI_API_KEY",
        base_url_env: "OPENAI_BASE_URL",
        default_base_url: "https://api.openai.com/v1",
    },
    ServiceDescriptor {
        name: "claude-3-5-sonnet-20240620",
        display_name: "Claude 3.5 Sonnet",
        provider: Provider::Anthropic,
        api_key_env: "ANTHROPIC_API_KEY",
        base_url_env: "ANTHROPIC_BASE_URL",
        default_base_url: "https://api.anthropic.com/v1",
    },
];

/// A service with credentials resolved from the environment.
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceEntry {
    pub descriptor: ServiceDescriptor,
    pub base_url: String,
    api_key: Option<String>,
}

impl ServiceEntry {
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

impl fmt::Debug for ServiceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceEntry")
            .field("name", &self.descriptor.name)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Public view of a service for listing endpoints.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ServiceInfo {
    pub name: String,
    pub display_name: String,
    pub provider: Provider,
    pub credentials_configured: bool,
    /// Whether each relevant environment variable is set.
    pub env_status: BTreeMap<String, bool>,
}

/// The set of services requests may select.
#[derive(Debug, Clone)]
pub struct ServiceCatalog {
    entries: Vec<ServiceEntry>,
    env_status: BTreeMap<&'static str, bool>,
}

impl ServiceCatalog {
    /// Snapshot credentials from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the catalog using `lookup` to read variables.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut env_status = BTreeMap::new();
        let entries = SERVICES
            .iter()
            .map(|descriptor| {
                let api_key = read(descriptor.api_key_env);
                let base_url = read(descriptor.base_url_env);
                env_status.insert(descriptor.api_key_env, api_key.is_some());
                env_status.insert(descriptor.base_url_env, base_url.is_some());

                ServiceEntry {
                    descriptor: *descriptor,
                    base_url: base_url
                        .unwrap_or_else(|| descriptor.default_base_url.to_string()),
                    api_key,
                }
            })
            .collect();

        Self {
            entries,
            env_status,
        }
    }

    pub fn get(&self, name: &str) -> Option<&ServiceEntry> {
        self.entries
            .iter()
            .find(|entry| entry.descriptor.name == name.trim())
    }

    pub fn entries(&self) -> &[ServiceEntry] {
        &self.entries
    }

    pub fn infos(&self) -> Vec<ServiceInfo> {
        self.entries
            .iter()
            .map(|entry| {
                let d = &entry.descriptor;
                let env_status = [d.api_key_env, d.base_url_env]
                    .into_iter()
                    .map(|key| {
                        (
                            key.to_string(),
                            self.env_status.get(key).copied().unwrap_or(false),
                        )
                    })
                    .collect();
                ServiceInfo {
                    name: d.name.to_string(),
                    display_name: d.display_name.to_string(),
                    provider: d.provider,
                    credentials_configured: entry.has_api_key(),
                    env_status,
                }
            })
            .collect()
    }
}

impl Default for ServiceCatalog {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
