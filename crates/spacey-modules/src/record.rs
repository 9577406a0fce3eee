// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module record and module instance hooks.
//!
//! A [`ModuleRecord`] is created once during resolution and shared by every
//! worker. Each worker turns it into a [`ModuleInstance`] inside its own
//! [`Realm`], which owns the live exports for that worker.

use crate::error::Result;
use crate::memo::ExportNamesCallback;
use crate::realm::Realm;
use crate::value::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use url::Url;

/// Shared handle to a module record
pub type ModuleRef = Arc<dyn ModuleRecord>;

/// Callback a record uses to resolve the specifiers it imports.
///
/// The first argument identifies the importing record so relative
/// specifiers resolve against its own location.
pub type ImportResolver = Arc<dyn Fn(ModuleId, &str) -> Result<ModuleRef> + Send + Sync>;

/// Process-unique identity of a module record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(u64);

impl ModuleId {
    /// Allocates a fresh identity.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The concrete shape behind a module record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    /// Host module declaring named/default exports
    Native,
    /// Host value whose fields are reflected as exports
    Legacy,
    /// Wrapper-style script (`exports`, `module`, `require`)
    Dynamic,
    /// Script using static import/export declarations
    SourceText,
}

/// Result of resolving an export name to a concrete binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBinding {
    /// Module owning the binding
    pub module: ModuleId,
    /// Binding name inside that module
    pub binding_name: String,
}

/// Lifecycle hooks shared by every module shape.
pub trait ModuleRecord: Send + Sync + fmt::Debug {
    /// Identity used by caches and per-realm tables.
    fn id(&self) -> ModuleId;

    /// Which adapter implements this record.
    fn kind(&self) -> ModuleKind;

    /// Canonical location, for script modules.
    fn location(&self) -> Option<&Url> {
        None
    }

    /// Resolves and links everything this record statically requires.
    fn link(&self) -> Result<()> {
        Ok(())
    }

    /// Declares bindings ahead of instantiation.
    fn initialize_environment(&self) -> Result<()> {
        Ok(())
    }

    /// Records this one must be evaluated after, in request order.
    fn requested_modules(&self) -> Vec<ModuleRef> {
        Vec::new()
    }

    /// Creates the per-realm instance.
    fn instantiate(&self, realm: &Realm) -> Result<Arc<dyn ModuleInstance>>;

    /// Delivers the exported names to `callback` immediately and returns
    /// true, or registers it for later delivery and returns false when the
    /// names are not known yet.
    ///
    /// `export_star_set` holds the records already visited through
    /// `export *` chains.
    fn get_exported_names(
        &self,
        callback: ExportNamesCallback,
        export_star_set: &mut Vec<ModuleId>,
    ) -> bool;

    /// The exported names if they are known right now. Unlike
    /// [`get_exported_names`](Self::get_exported_names) this never queues
    /// anything.
    fn exported_names_if_known(&self, export_star_set: &mut Vec<ModuleId>)
        -> Option<Vec<String>>;

    /// Resolves an exported name to the binding providing it.
    fn resolve_export(
        &self,
        export_name: &str,
        _resolve_set: &mut Vec<(ModuleId, String)>,
    ) -> Option<ResolvedBinding> {
        Some(ResolvedBinding {
            module: self.id(),
            binding_name: export_name.to_string(),
        })
    }

    /// Whether the graph evaluator should drive this record.
    fn is_cyclic(&self) -> bool {
        true
    }
}

/// Per-realm state of one module record.
pub trait ModuleInstance: Send + Sync + fmt::Debug {
    /// Runs the module body.
    fn execute(&self, realm: &mut Realm) -> Result<()>;

    /// Whether evaluation would need to suspend at the top level.
    fn has_tla(&self) -> bool {
        false
    }

    /// Reads an exported binding. Missing names yield undefined.
    fn get_binding_value(&self, realm: &Realm, name: &str) -> Value;

    /// The value `require` hands back for this module.
    fn exports_value(&self, realm: &Realm) -> Value {
        self.get_binding_value(realm, "default")
    }

    /// Whether the exports were marked as coming from a static module
    /// (`__esModule`). Only wrapper-style modules can carry the marker.
    fn is_es_module_marked(&self) -> bool {
        false
    }
}

/// Collects the exported names of `record` if they are known right now.
pub fn exported_names_now(record: &dyn ModuleRecord) -> Option<Vec<String>> {
    record.exported_names_if_known(&mut Vec::new())
}
