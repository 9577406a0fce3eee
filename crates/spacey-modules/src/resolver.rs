// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module resolution.
//!
//! The resolver owns the write-once [`ModuleCache`], the host module
//! registry and the reverse index from record identity to location. It is
//! shared by every worker: before [`ModuleResolver::lock`] one worker
//! discovers the module graph, afterwards every worker reads it.

use crate::cache::ModuleCache;
use crate::compiler::Compiler;
use crate::config::ResolverConfig;
use crate::dynamic::DynamicModule;
use crate::error::{ModuleError, Result};
use crate::host::HostModule;
use crate::loader::Loader;
use crate::record::{ImportResolver, ModuleId, ModuleRef};
use crate::source_text::SourceTextModule;
use crate::specifier;
use dashmap::DashMap;
use rustc_hash::FxHashMap;
use std::sync::{Arc, Weak};
use url::Url;

/// Resolves specifiers to shared module records
pub struct ModuleResolver {
    config: ResolverConfig,
    host_modules: FxHashMap<String, HostModule>,
    loader: Arc<dyn Loader>,
    compiler: Arc<dyn Compiler>,
    cache: ModuleCache,
    locations: DashMap<ModuleId, Url>,
    this: Weak<ModuleResolver>,
}

impl ModuleResolver {
    /// Create a new resolver
    pub fn new<I>(
        config: ResolverConfig,
        host_modules: I,
        loader: Arc<dyn Loader>,
        compiler: Arc<dyn Compiler>,
    ) -> Arc<Self>
    where
        I: IntoIterator<Item = (String, HostModule)>,
    {
        Arc::new_cyclic(|this| Self {
            config,
            host_modules: host_modules.into_iter().collect(),
            loader,
            compiler,
            cache: ModuleCache::new(),
            locations: DashMap::new(),
            this: this.clone(),
        })
    }

    /// The configuration in use.
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Stops discovering modules. Cached entries keep resolving.
    pub fn lock(&self) {
        tracing::debug!("locking module resolution with {} entries", self.cache.len());
        self.cache.lock();
    }

    /// Whether [`ModuleResolver::lock`] was called
    pub fn is_locked(&self) -> bool {
        self.cache.is_locked()
    }

    /// Resolves `specifier` written in the module at `referrer`, or at the
    /// base location when there is no referrer.
    pub fn resolve(&self, referrer: Option<&Url>, specifier: &str) -> Result<ModuleRef> {
        if self.config.is_host_specifier(specifier) {
            return self.resolve_host(specifier);
        }
        let referrer = referrer.unwrap_or(&self.config.base);
        let location = specifier::canonicalize(&self.config, referrer, specifier)?;
        self.resolve_location(&location, specifier)
    }

    /// Resolves `specifier` on behalf of an already resolved module.
    pub fn resolve_imported(&self, referrer: Option<ModuleId>, specifier: &str) -> Result<ModuleRef> {
        if self.config.is_host_specifier(specifier) {
            return self.resolve_host(specifier);
        }
        match referrer {
            None => self.resolve(None, specifier),
            Some(id) => {
                let location = self.location_of(id).ok_or_else(|| {
                    ModuleError::defect(format!(
                        "module {} importing {:?} has no known location",
                        id, specifier
                    ))
                })?;
                self.resolve(Some(&location), specifier)
            }
        }
    }

    /// Registers source bytes obtained by the caller under `location`.
    ///
    /// Used for entry scripts, which are read before the resolver is
    /// involved.
    pub fn resolve_loaded(&self, location: &Url, source: &[u8]) -> Result<ModuleRef> {
        let key = location.as_str();
        if let Some(cached) = self.cache.get(key) {
            tracing::debug!("entry {} already resolved", key);
            return cached;
        }
        if self.is_locked() {
            tracing::warn!("refusing to resolve new entry {} after lock", key);
            return Err(ModuleError::ResolutionLocked(key.to_string()));
        }
        let outcome = self.classify(location, source);
        self.cache.insert(key, outcome)
    }

    /// Canonical location of a script module record.
    pub fn location_of(&self, id: ModuleId) -> Option<Url> {
        self.locations.get(&id).map(|entry| entry.value().clone())
    }

    /// Every cached key: canonical locations and host specifiers, sorted.
    pub fn imported(&self) -> Vec<String> {
        self.cache.keys()
    }

    /// A callback records use to resolve their own imports.
    pub fn import_resolver(&self) -> ImportResolver {
        let this = self.this.clone();
        Arc::new(move |referrer: ModuleId, specifier: &str| {
            let resolver = this
                .upgrade()
                .ok_or_else(|| ModuleError::defect("module resolver dropped while in use"))?;
            resolver.resolve_imported(Some(referrer), specifier)
        })
    }

    fn resolve_host(&self, specifier: &str) -> Result<ModuleRef> {
        if let Some(cached) = self.cache.get(specifier) {
            return cached;
        }
        if self.is_locked() {
            tracing::warn!("host module {} was not resolved before lock", specifier);
            return Err(ModuleError::ResolutionLocked(specifier.to_string()));
        }
        let outcome = match self.host_modules.get(specifier) {
            Some(module) => {
                tracing::debug!("resolved host module {}", specifier);
                Ok(module.clone().into_record(specifier))
            }
            None => Err(ModuleError::UnknownHostModule(specifier.to_string())),
        };
        self.cache.insert(specifier, outcome)
    }

    fn resolve_location(&self, location: &Url, specifier: &str) -> Result<ModuleRef> {
        let key = location.as_str();
        if let Some(cached) = self.cache.get(key) {
            match &cached {
                Ok(_) => tracing::debug!("cache hit for {}", key),
                Err(err) => tracing::warn!("serving memoized failure for {}: {}", key, err),
            }
            return cached;
        }
        if self.is_locked() {
            tracing::warn!("refusing to load {} ({:?}) after lock", key, specifier);
            return Err(ModuleError::ResolutionLocked(specifier.to_string()));
        }

        tracing::debug!("loading {} ({:?})", key, specifier);
        let outcome = self
            .loader
            .load(location, specifier)
            .map_err(|e| ModuleError::Load {
                location: key.to_string(),
                reason: e.to_string(),
            })
            .and_then(|source| self.classify(location, &source));
        self.cache.insert(key, outcome)
    }

    fn classify(&self, location: &Url, source: &[u8]) -> Result<ModuleRef> {
        let compile_failure = |message: String| ModuleError::CompileFailure {
            location: location.to_string(),
            message,
        };
        let text = std::str::from_utf8(source)
            .map_err(|e| compile_failure(format!("source is not valid UTF-8: {}", e)))?;
        let compiled = self
            .compiler
            .compile(text, location.as_str())
            .map_err(|e| compile_failure(e.message))?;

        let record: ModuleRef = match compiled.module {
            Some(declarations) => {
                tracing::debug!("{} is a static module", location);
                SourceTextModule::new(
                    location.clone(),
                    compiled.program,
                    declarations,
                    self.import_resolver(),
                )
            }
            None => {
                tracing::debug!("{} is a wrapper-style module", location);
                let program = self
                    .compiler
                    .compile_wrapper(text, location.as_str())
                    .map_err(|e| compile_failure(e.message))?;
                DynamicModule::new(location.clone(), program, self.import_resolver())
            }
        };
        self.locations.insert(record.id(), location.clone());
        Ok(record)
    }
}

impl std::fmt::Debug for ModuleResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleResolver")
            .field("config", &self.config)
            .field("cached", &self.cache.len())
            .field("locked", &self.is_locked())
            .finish()
    }
}
