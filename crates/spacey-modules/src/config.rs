// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Resolver configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Default host namespace sentinel
pub const DEFAULT_HOST_NAMESPACE: &str = "host";

/// Location scripts read from standard input are registered under
pub const DEFAULT_STDIN_LOCATION: &str = "file:///-";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// TOML could not be parsed
    #[error("failed to parse resolver config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The base location is not a usable directory URL
    #[error("invalid base location {0:?}")]
    InvalidBase(String),
}

/// Configuration for the module resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Location relative specifiers resolve against when there is no referrer
    pub base: Url,

    /// Reserved host module name; `<namespace>:` prefixes the rest
    pub host_namespace: String,

    /// URL schemes modules may be loaded from
    pub allowed_schemes: Vec<String>,

    /// Location used for an entry script read from standard input
    pub stdin_location: Url,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            base: root_url(),
            host_namespace: DEFAULT_HOST_NAMESPACE.to_string(),
            allowed_schemes: vec!["file".to_string(), "https".to_string()],
            stdin_location: Url::parse(DEFAULT_STDIN_LOCATION).unwrap_or_else(|_| root_url()),
        }
    }
}

fn root_url() -> Url {
    Url::parse("file:///").unwrap_or_else(|_| unreachable!("file:/// is a valid URL"))
}

impl ResolverConfig {
    /// Configuration with `base` as the base location.
    pub fn with_base(base: Url) -> Self {
        Self {
            base: as_directory(base),
            ..Self::default()
        }
    }

    /// Parses a TOML document, e.g.
    ///
    /// ```toml
    /// base = "file:///srv/scripts/"
    /// host_namespace = "ext"
    /// ```
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let mut config: ResolverConfig = toml::from_str(source)?;
        if config.base.cannot_be_a_base() {
            return Err(ConfigError::InvalidBase(config.base.to_string()));
        }
        config.base = as_directory(config.base);
        Ok(config)
    }

    /// Whether `specifier` names a module in the host namespace.
    pub fn is_host_specifier(&self, specifier: &str) -> bool {
        specifier == self.host_namespace
            || specifier
                .strip_prefix(self.host_namespace.as_str())
                .is_some_and(|rest| rest.starts_with(':'))
    }

    /// Whether modules may be loaded from `url`.
    pub fn is_allowed_scheme(&self, url: &Url) -> bool {
        self.allowed_schemes.iter().any(|s| s == url.scheme())
    }
}

fn as_directory(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
