// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Specifier canonicalization.

use crate::config::ResolverConfig;
use crate::error::{ModuleError, Result};
use url::Url;

fn invalid(specifier: &str, reason: impl Into<String>) -> ModuleError {
    ModuleError::InvalidSpecifier {
        specifier: specifier.to_string(),
        reason: reason.into(),
    }
}

/// Turns `specifier`, written in the module at `referrer`, into a canonical
/// location.
///
/// Host namespace specifiers never reach this function.
pub fn canonicalize(config: &ResolverConfig, referrer: &Url, specifier: &str) -> Result<Url> {
    if specifier.is_empty() {
        return Err(invalid(specifier, "empty specifier"));
    }
    let referrer = if *referrer == config.stdin_location {
        &config.base
    } else {
        referrer
    };

    if specifier.starts_with('.') || specifier.starts_with('/') {
        return referrer
            .join(specifier)
            .map_err(|e| invalid(specifier, e.to_string()));
    }

    if specifier.contains("://") {
        let url = Url::parse(specifier).map_err(|e| invalid(specifier, e.to_string()))?;
        if !config.is_allowed_scheme(&url) {
            return Err(invalid(
                specifier,
                format!("only {} schemes are supported", config.allowed_schemes.join(", ")),
            ));
        }
        if referrer.scheme() == "https" && url.scheme() == "file" {
            return Err(invalid(
                specifier,
                format!("file: modules cannot be imported from {}", referrer),
            ));
        }
        return Ok(url);
    }

    Err(invalid(
        specifier,
        "bare specifiers must start with ./, ../, / or a URL scheme",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(referrer: &str, specifier: &str) -> Result<String> {
        let config = ResolverConfig::with_base(Url::parse("file:///home/user/").unwrap());
        canonicalize(&config, &Url::parse(referrer).unwrap(), specifier).map(String::from)
    }

    #[test]
    fn test_relative_specifiers() {
        assert_eq!(
            resolve("file:///proj/a/index.js", "./b.js").unwrap(),
            "file:///proj/a/b.js"
        );
        assert_eq!(
            resolve("file:///proj/a/index.js", "../lib/c.js").unwrap(),
            "file:///proj/lib/c.js"
        );
        assert_eq!(
            resolve("file:///proj/a/index.js", "/abs/d.js").unwrap(),
            "file:///abs/d.js"
        );
        assert_eq!(
            resolve("https://cdn.example.com/pkg/main.js", "./util.js").unwrap(),
            "https://cdn.example.com/pkg/util.js"
        );
    }

    #[test]
    fn test_stdin_referrer_uses_base() {
        assert_eq!(resolve("file:///-", "./x.js").unwrap(), "file:///home/user/x.js");
    }

    #[test]
    fn test_absolute_specifiers() {
        assert_eq!(
            resolve("file:///proj/index.js", "https://example.com/lib.js").unwrap(),
            "https://example.com/lib.js"
        );
        assert!(matches!(
            resolve("file:///proj/index.js", "ftp://example.com/lib.js"),
            Err(ModuleError::InvalidSpecifier { .. })
        ));
        assert!(matches!(
            resolve("https://example.com/index.js", "file:///etc/passwd"),
            Err(ModuleError::InvalidSpecifier { .. })
        ));
    }

    #[test]
    fn test_rejected_specifiers() {
        for specifier in ["", "lodash", "some/path.js"] {
            assert!(
                matches!(
                    resolve("file:///proj/index.js", specifier),
                    Err(ModuleError::InvalidSpecifier { .. })
                ),
                "{specifier:?} should be rejected"
            );
        }
    }
}
