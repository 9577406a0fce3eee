// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Per-worker module system

use crate::error::{ModuleError, Result};
use crate::evaluator::{self, Settlement};
use crate::realm::{Realm, WorkerId};
use crate::record::{ModuleKind, ModuleRef};
use crate::resolver::ModuleResolver;
use crate::value::Value;
use std::sync::Arc;
use tracing::instrument;
use url::Url;

/// One worker's view of the shared module graph.
///
/// Pairs the process-wide [`ModuleResolver`] with the worker's own
/// [`Realm`].
#[derive(Debug)]
pub struct ModuleSystem {
    resolver: Arc<ModuleResolver>,
    realm: Realm,
}

impl ModuleSystem {
    /// Create a module system for `worker`
    pub fn new(resolver: Arc<ModuleResolver>, worker: WorkerId) -> Self {
        Self {
            resolver,
            realm: Realm::new(worker),
        }
    }

    /// The realm modules are instantiated in
    pub fn realm(&self) -> &Realm {
        &self.realm
    }

    /// Mutable access to the realm
    pub fn realm_mut(&mut self) -> &mut Realm {
        &mut self.realm
    }

    /// The shared resolver
    pub fn resolver(&self) -> &Arc<ModuleResolver> {
        &self.resolver
    }

    /// Registers `source` under `location`, then links and evaluates it
    /// together with everything it imports.
    ///
    /// Running the same location again reuses the cached record; in the
    /// same realm the graph is not evaluated twice.
    #[instrument(skip(self, source), fields(worker = %self.realm.worker_id()))]
    pub fn run_entry_source(&mut self, location: &Url, source: &[u8]) -> Result<ModuleRef> {
        let record = self.resolver.resolve_loaded(location, source)?;
        evaluator::link(&record)?;
        if !record.is_cyclic() {
            tracing::debug!("{} has no evaluation phase", location);
            return Ok(record);
        }

        match evaluator::evaluate(&mut self.realm, &record) {
            Settlement::Fulfilled => Ok(record),
            Settlement::Rejected(err) => {
                if err.is_fatal() {
                    tracing::error!("evaluating {} failed: {}", location, err);
                }
                Err(err)
            }
            Settlement::Pending(module) => {
                tracing::error!("{} suspended at the top level while evaluating {}", module, location);
                Err(ModuleError::UnsupportedTopLevelSuspension(module))
            }
        }
    }

    /// Copies every own key of a native host module's default export onto
    /// the global object.
    ///
    /// Meant for bootstrapping the environment; every failure is a defect.
    pub fn expose_globally(&mut self, name: &str) -> Result<()> {
        let record = self.resolver.resolve(None, name)?;
        if record.kind() != ModuleKind::Native {
            return Err(ModuleError::defect(format!(
                "{} is a {:?} module, only native host modules can be exposed globally",
                name,
                record.kind()
            )));
        }
        let instance = self.realm.instantiate(&record)?;
        let default = instance.get_binding_value(&self.realm, "default");
        let Some(exports) = default.as_object() else {
            return Err(ModuleError::defect(format!(
                "default export of {} is a {}, not an object",
                name,
                default.type_of()
            )));
        };
        for key in exports.keys() {
            self.realm.set_global(key.as_str(), exports.get(&key));
        }
        tracing::debug!("exposed {} globally", name);
        Ok(())
    }

    /// Reads an exported binding of `record` in this worker's realm.
    pub fn get_binding_value(&self, record: &ModuleRef, name: &str) -> Value {
        self.realm
            .instance(record.id())
            .map(|instance| instance.get_binding_value(&self.realm, name))
            .unwrap_or_default()
    }

    /// Canonical locations and host specifiers resolved so far.
    pub fn imported(&self) -> Vec<String> {
        self.resolver.imported()
    }
}
