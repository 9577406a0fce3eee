// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Host modules implemented by the embedding program.
//!
//! Two flavors are supported:
//! - [`NativeModule`]: declares named and default exports explicitly and
//!   gets one instance per realm, built with that realm in hand.
//! - legacy values: any host value, projected into the realm, whose own
//!   keys become the exports.

use crate::error::{ModuleError, Result};
use crate::memo::{ExportNamesCallback, ExportNamesMemo};
use crate::realm::Realm;
use crate::record::{ModuleId, ModuleInstance, ModuleKind, ModuleRecord};
use crate::value::{JsObject, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Exports declared by a native module instance
#[derive(Debug, Clone, Default)]
pub struct Exports {
    /// Named exports; `None` when the module only has a default export
    pub named: Option<BTreeMap<String, Value>>,
    /// Explicit default export
    pub default: Option<Value>,
}

impl Exports {
    /// Exports with only named bindings.
    pub fn named<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self {
            named: Some(entries.into_iter().map(|(k, v)| (k.into(), v)).collect()),
            default: None,
        }
    }

    /// Exports with only a default binding.
    pub fn default_only(value: impl Into<Value>) -> Self {
        Self {
            named: None,
            default: Some(value.into()),
        }
    }
}

/// A host module with structured exports.
pub trait NativeModule: Send + Sync {
    /// Creates the instance used by `realm`.
    fn new_instance(&self, realm: &Realm) -> Box<dyn NativeInstance>;
}

/// One realm's view of a [`NativeModule`].
pub trait NativeInstance: Send + Sync {
    /// The exports of this instance.
    fn exports(&self) -> Exports;
}

/// A host value projected into each realm that imports it.
pub trait HostValue: Send + Sync {
    /// Builds the value for `realm`.
    fn to_value(&self, realm: &Realm) -> Value;
}

impl HostValue for serde_json::Value {
    fn to_value(&self, _realm: &Realm) -> Value {
        Value::from_json(self)
    }
}

struct FnHostValue<F>(F);

impl<F> HostValue for FnHostValue<F>
where
    F: Fn(&Realm) -> Value + Send + Sync,
{
    fn to_value(&self, realm: &Realm) -> Value {
        (self.0)(realm)
    }
}

/// Registry entry for a host module
#[derive(Clone)]
pub enum HostModule {
    /// Module with declared named/default exports
    Native(Arc<dyn NativeModule>),
    /// Arbitrary value reflected as exports
    Legacy(Arc<dyn HostValue>),
}

impl HostModule {
    /// Wraps a [`NativeModule`].
    pub fn native(module: impl NativeModule + 'static) -> Self {
        HostModule::Native(Arc::new(module))
    }

    /// Wraps a JSON document as a legacy module.
    pub fn json(value: serde_json::Value) -> Self {
        HostModule::Legacy(Arc::new(value))
    }

    /// Wraps a per-realm value factory as a legacy module.
    pub fn legacy_fn<F>(build: F) -> Self
    where
        F: Fn(&Realm) -> Value + Send + Sync + 'static,
    {
        HostModule::Legacy(Arc::new(FnHostValue(build)))
    }

    pub(crate) fn into_record(self, name: &str) -> Arc<dyn ModuleRecord> {
        match self {
            HostModule::Native(module) => Arc::new(NativeModuleRecord {
                id: ModuleId::next(),
                name: name.to_string(),
                module,
                exported_names: ExportNamesMemo::new(),
            }),
            HostModule::Legacy(value) => Arc::new(LegacyModuleRecord {
                id: ModuleId::next(),
                name: name.to_string(),
                value,
                exported_names: ExportNamesMemo::new(),
            }),
        }
    }
}

impl fmt::Debug for HostModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostModule::Native(_) => write!(f, "HostModule::Native"),
            HostModule::Legacy(_) => write!(f, "HostModule::Legacy"),
        }
    }
}

/// Record wrapping a [`NativeModule`]
pub struct NativeModuleRecord {
    id: ModuleId,
    name: String,
    module: Arc<dyn NativeModule>,
    exported_names: ExportNamesMemo,
}

impl ModuleRecord for NativeModuleRecord {
    fn id(&self) -> ModuleId {
        self.id
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::Native
    }

    fn instantiate(&self, realm: &Realm) -> Result<Arc<dyn ModuleInstance>> {
        let native = self.module.new_instance(realm);
        let exports = native.exports();
        self.exported_names.populate_with(|| {
            exports
                .named
                .as_ref()
                .map(|named| named.keys().cloned().collect())
                .unwrap_or_default()
        });
        Ok(Arc::new(NativeModuleInstance {
            native,
            exports,
            default: OnceLock::new(),
        }))
    }

    fn get_exported_names(
        &self,
        callback: ExportNamesCallback,
        _export_star_set: &mut Vec<ModuleId>,
    ) -> bool {
        self.exported_names.get_or_register(callback)
    }

    fn exported_names_if_known(
        &self,
        _export_star_set: &mut Vec<ModuleId>,
    ) -> Option<Vec<String>> {
        self.exported_names.get().map(|names| names.to_vec())
    }
}

impl fmt::Debug for NativeModuleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeModuleRecord")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

/// Per-realm instance of a [`NativeModuleRecord`]
pub struct NativeModuleInstance {
    native: Box<dyn NativeInstance>,
    exports: Exports,
    default: OnceLock<Value>,
}

impl NativeModuleInstance {
    /// The host-side instance.
    pub fn native(&self) -> &dyn NativeInstance {
        self.native.as_ref()
    }

    /// The default export, synthesized from the named exports when the
    /// module declares none.
    pub fn default_export(&self) -> Value {
        self.default
            .get_or_init(|| {
                if let Some(default) = &self.exports.default {
                    return default.clone();
                }
                // Only named exports: a fresh object scripts may modify
                // as if the default had been an object all along
                let object = JsObject::new();
                for (name, value) in self.exports.named.iter().flatten() {
                    object.set(name.clone(), value.clone());
                }
                Value::Object(object)
            })
            .clone()
    }
}

impl ModuleInstance for NativeModuleInstance {
    fn execute(&self, _realm: &mut Realm) -> Result<()> {
        Ok(())
    }

    fn get_binding_value(&self, _realm: &Realm, name: &str) -> Value {
        if name == "default" {
            return self.default_export();
        }
        match &self.exports.named {
            Some(named) => named.get(name).cloned().unwrap_or_default(),
            None => self.default_export().get(name),
        }
    }
}

impl fmt::Debug for NativeModuleInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeModuleInstance")
            .field("exports", &self.exports)
            .finish()
    }
}

/// Record wrapping a legacy host value
pub struct LegacyModuleRecord {
    id: ModuleId,
    name: String,
    value: Arc<dyn HostValue>,
    exported_names: ExportNamesMemo,
}

impl ModuleRecord for LegacyModuleRecord {
    fn id(&self) -> ModuleId {
        self.id
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::Legacy
    }

    fn instantiate(&self, realm: &Realm) -> Result<Arc<dyn ModuleInstance>> {
        let value = self.value.to_value(realm);
        if value.is_nullish() {
            return Err(ModuleError::defect(format!(
                "host module {} projected to {}",
                self.name, value
            )));
        }
        let keys = value.keys();
        self.exported_names.populate_with(|| keys);
        Ok(Arc::new(LegacyModuleInstance { value }))
    }

    fn get_exported_names(
        &self,
        callback: ExportNamesCallback,
        _export_star_set: &mut Vec<ModuleId>,
    ) -> bool {
        self.exported_names.get_or_register(callback)
    }

    fn exported_names_if_known(
        &self,
        _export_star_set: &mut Vec<ModuleId>,
    ) -> Option<Vec<String>> {
        self.exported_names.get().map(|names| names.to_vec())
    }
}

impl fmt::Debug for LegacyModuleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LegacyModuleRecord")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

/// Per-realm instance of a [`LegacyModuleRecord`]
#[derive(Debug)]
pub struct LegacyModuleInstance {
    value: Value,
}

impl ModuleInstance for LegacyModuleInstance {
    fn execute(&self, _realm: &mut Realm) -> Result<()> {
        Ok(())
    }

    fn get_binding_value(&self, _realm: &Realm, name: &str) -> Value {
        if name == "default" {
            return self.value.clone();
        }
        self.value.get(name)
    }
}
