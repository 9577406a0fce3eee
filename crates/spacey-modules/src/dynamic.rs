// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Wrapper-style (CommonJS) module records.
//!
//! The compiled program evaluates to a function taking
//! `(exports, module, require)`. Nothing is known about the exports until
//! that function has run, so export names are published through a
//! process-wide memo by whichever worker finishes first.

use crate::compiler::ProgramRef;
use crate::error::{Exception, ModuleError, Result};
use crate::evaluator;
use crate::memo::{ExportNamesCallback, ExportNamesMemo};
use crate::realm::Realm;
use crate::record::{ImportResolver, ModuleId, ModuleInstance, ModuleKind, ModuleRecord};
use crate::source_text::ModuleEnvironment;
use crate::value::{JsFunction, JsObject, Value};
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use url::Url;

/// Property marking exports authored as if they were a static module
pub const ES_MODULE_MARKER: &str = "__esModule";

/// A module whose exports are only known after running it
pub struct DynamicModule {
    id: ModuleId,
    location: Url,
    program: ProgramRef,
    resolve: ImportResolver,
    exported_names: ExportNamesMemo,
    this: Weak<DynamicModule>,
}

impl DynamicModule {
    /// Creates a record around a wrapper-form program.
    pub fn new(location: Url, program: ProgramRef, resolve: ImportResolver) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            id: ModuleId::next(),
            location,
            program,
            resolve,
            exported_names: ExportNamesMemo::new(),
            this: this.clone(),
        })
    }

    fn require_function(&self) -> JsFunction {
        let resolve = Arc::clone(&self.resolve);
        let referrer = self.id;
        JsFunction::new("require", move |realm: &mut Realm, args: &[Value]| {
            let Some(specifier) = args.first().and_then(Value::as_str) else {
                return Err(Exception::type_error("the module specifier must be a string"));
            };
            let record = resolve(referrer, specifier)?;
            Ok(evaluator::require(realm, &record)?)
        })
    }
}

impl ModuleRecord for DynamicModule {
    fn id(&self) -> ModuleId {
        self.id
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::Dynamic
    }

    fn location(&self) -> Option<&Url> {
        Some(&self.location)
    }

    fn instantiate(&self, _realm: &Realm) -> Result<Arc<dyn ModuleInstance>> {
        let module = self
            .this
            .upgrade()
            .ok_or_else(|| ModuleError::defect("module record dropped while in use"))?;
        Ok(Arc::new(DynamicInstance {
            module,
            exports: RwLock::new(Value::Undefined),
            es_module_marked: AtomicBool::new(false),
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

impl fmt::Debug for DynamicModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicModule")
            .field("id", &self.id)
            .field("location", &self.location.as_str())
            .finish()
    }
}

/// Per-realm instance of a [`DynamicModule`]
#[derive(Debug)]
pub struct DynamicInstance {
    module: Arc<DynamicModule>,
    exports: RwLock<Value>,
    es_module_marked: AtomicBool,
}

impl ModuleInstance for DynamicInstance {
    fn execute(&self, realm: &mut Realm) -> Result<()> {
        let module = &self.module;
        let wrapper = module.program.run(realm, &ModuleEnvironment::empty())?;
        let Value::Function(wrapper) = wrapper else {
            return Err(ModuleError::defect(format!(
                "{} is not wrapped in a function",
                module.location
            )));
        };

        let exports = JsObject::new();
        let descriptor = JsObject::new();
        descriptor.set("exports", exports.clone());
        descriptor.set("id", module.location.as_str());
        // Importers running during this call (cycles) see the initial object
        *self.exports.write() = Value::Object(exports.clone());

        wrapper.call(
            realm,
            &[
                Value::Object(exports),
                Value::Object(descriptor.clone()),
                Value::Function(module.require_function()),
            ],
        )?;

        let exports = descriptor.get("exports");
        if exports.is_nullish() {
            return Err(ModuleError::InvalidExports(module.location.to_string()));
        }
        *self.exports.write() = exports.clone();

        let keys = exports.keys();
        if module.exported_names.populate_with(|| keys) {
            tracing::debug!("{} published exported names of {}", realm.worker_id(), module.location);
        }
        self.es_module_marked
            .store(exports.get(ES_MODULE_MARKER).to_boolean(), Ordering::Release);
        Ok(())
    }

    fn get_binding_value(&self, _realm: &Realm, name: &str) -> Value {
        let exports = self.exports.read();
        if name == "default" {
            if let Some(default) = exports.as_object().and_then(|o| o.get_own("default")) {
                return default;
            }
            return exports.clone();
        }
        exports.get(name)
    }

    fn exports_value(&self, _realm: &Realm) -> Value {
        self.exports.read().clone()
    }

    /// Recorded for interop; binding resolution does not consult it.
    fn is_es_module_marked(&self) -> bool {
        self.es_module_marked.load(Ordering::Acquire)
    }
}
