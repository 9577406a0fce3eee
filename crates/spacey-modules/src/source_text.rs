// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Static (`import`/`export`) module records.
//!
//! Construction only stores the compiled program and its declarations.
//! Requested specifiers are resolved while linking, through the resolver
//! callback handed in at construction, so a module can be discovered while
//! one of its importers is still being linked.

use crate::compiler::{ExportSpecifier, ImportSpecifier, ModuleDeclarations, ProgramRef};
use crate::error::{Exception, ModuleError, Result};
use crate::memo::ExportNamesCallback;
use crate::realm::Realm;
use crate::record::{
    ImportResolver, ModuleId, ModuleInstance, ModuleKind, ModuleRecord, ModuleRef, ResolvedBinding,
};
use crate::value::{JsObject, Value};
use parking_lot::{Mutex, ReentrantMutex};
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use url::Url;

#[derive(Debug, Clone, PartialEq)]
enum LinkStatus {
    Unlinked,
    Linking,
    Linked,
    Failed(ModuleError),
}

/// Held for the whole of a link walk. Records are shared between workers,
/// so a record seen in `Linking` under this guard belongs to the current
/// walk (a cycle), never to another thread.
static LINK_WALK: ReentrantMutex<()> = parking_lot::const_reentrant_mutex(());

struct LinkState {
    status: LinkStatus,
    /// Requested specifier -> resolved record, in request order
    requested: Vec<(String, ModuleRef)>,
}

/// A module written with static import/export declarations
pub struct SourceTextModule {
    id: ModuleId,
    location: Url,
    program: ProgramRef,
    declarations: ModuleDeclarations,
    resolve: ImportResolver,
    state: Mutex<LinkState>,
    this: Weak<SourceTextModule>,
}

impl SourceTextModule {
    /// Creates an unlinked module record.
    pub fn new(
        location: Url,
        program: ProgramRef,
        declarations: ModuleDeclarations,
        resolve: ImportResolver,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            id: ModuleId::next(),
            location,
            program,
            declarations,
            resolve,
            state: Mutex::new(LinkState {
                status: LinkStatus::Unlinked,
                requested: Vec::new(),
            }),
            this: this.clone(),
        })
    }

    /// Declarations reported by the compiler.
    pub fn declarations(&self) -> &ModuleDeclarations {
        &self.declarations
    }

    /// Whether linking completed.
    pub fn is_linked(&self) -> bool {
        self.state.lock().status == LinkStatus::Linked
    }

    fn requested(&self, specifier: &str) -> Option<ModuleRef> {
        self.state
            .lock()
            .requested
            .iter()
            .find(|(s, _)| s == specifier)
            .map(|(_, record)| Arc::clone(record))
    }

    fn star_exports(&self) -> Vec<ModuleRef> {
        self.declarations
            .exports
            .iter()
            .filter_map(|export| match export {
                ExportSpecifier::All(from) => self.requested(from),
                _ => None,
            })
            .collect()
    }

    /// The memoized outcome, once linking finished.
    fn link_outcome(&self) -> Option<Result<()>> {
        match &self.state.lock().status {
            LinkStatus::Linked => Some(Ok(())),
            LinkStatus::Failed(err) => Some(Err(err.clone())),
            LinkStatus::Unlinked | LinkStatus::Linking => None,
        }
    }

    fn inner_link(&self) -> Result<()> {
        self.state.lock().status = LinkStatus::Linking;

        let mut requested = Vec::new();
        for specifier in self.declarations.requested_specifiers() {
            let record = (self.resolve)(self.id, &specifier)?;
            requested.push((specifier, record));
        }
        self.state.lock().requested = requested.clone();

        for (_, record) in &requested {
            record.link()?;
        }

        for declaration in &self.declarations.imports {
            let Some(record) = self.requested(&declaration.specifier) else {
                continue;
            };
            for import in &declaration.imports {
                let name = match import {
                    ImportSpecifier::Named(imported, _) => imported.as_str(),
                    ImportSpecifier::Default(_) => "default",
                    ImportSpecifier::Namespace(_) => continue,
                };
                if record.kind() == ModuleKind::SourceText
                    && record.resolve_export(name, &mut Vec::new()).is_none()
                {
                    return Err(ModuleError::MissingExport {
                        module: record
                            .location()
                            .map(Url::to_string)
                            .unwrap_or_else(|| record.id().to_string()),
                        name: name.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl ModuleRecord for SourceTextModule {
    fn id(&self) -> ModuleId {
        self.id
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::SourceText
    }

    fn location(&self) -> Option<&Url> {
        Some(&self.location)
    }

    fn link(&self) -> Result<()> {
        if let Some(outcome) = self.link_outcome() {
            return outcome;
        }
        let _walk = LINK_WALK.lock();
        if let Some(outcome) = self.link_outcome() {
            return outcome;
        }
        if self.state.lock().status == LinkStatus::Linking {
            // An importer further up this walk
            return Ok(());
        }
        let result = self.inner_link();

        let mut state = self.state.lock();
        match &result {
            Ok(()) => {
                state.status = LinkStatus::Linked;
                tracing::debug!("linked {}", self.location);
            }
            Err(err) => {
                tracing::debug!("linking {} failed: {}", self.location, err);
                state.status = LinkStatus::Failed(err.clone());
            }
        }
        result
    }

    fn requested_modules(&self) -> Vec<ModuleRef> {
        self.state
            .lock()
            .requested
            .iter()
            .map(|(_, record)| Arc::clone(record))
            .collect()
    }

    fn instantiate(&self, _realm: &Realm) -> Result<Arc<dyn ModuleInstance>> {
        match &self.state.lock().status {
            LinkStatus::Linked => {}
            LinkStatus::Failed(err) => return Err(err.clone()),
            LinkStatus::Unlinked | LinkStatus::Linking => {
                return Err(ModuleError::defect(format!(
                    "{} was instantiated before it was linked",
                    self.location
                )));
            }
        }
        let module = self
            .this
            .upgrade()
            .ok_or_else(|| ModuleError::defect("module record dropped while in use"))?;

        let mut imports = FxHashMap::default();
        for declaration in &self.declarations.imports {
            let record = self.requested(&declaration.specifier).ok_or_else(|| {
                ModuleError::defect(format!("{} was not resolved", declaration.specifier))
            })?;
            for import in &declaration.imports {
                let binding = match import {
                    ImportSpecifier::Default(_) => ImportName::Binding("default".to_string()),
                    ImportSpecifier::Named(imported, _) => ImportName::Binding(imported.clone()),
                    ImportSpecifier::Namespace(_) => ImportName::Namespace,
                };
                imports.insert(
                    import.local_name().to_string(),
                    ImportTarget {
                        module: Arc::clone(&record),
                        binding,
                    },
                );
            }
        }

        Ok(Arc::new(SourceTextInstance {
            module,
            environment: ModuleEnvironment {
                bindings: JsObject::new(),
                imports,
            },
        }))
    }

    fn get_exported_names(
        &self,
        callback: ExportNamesCallback,
        export_star_set: &mut Vec<ModuleId>,
    ) -> bool {
        if export_star_set.contains(&self.id) {
            // Circular `export *`
            callback(&[]);
            return true;
        }
        export_star_set.push(self.id);

        let mut names = self.declarations.own_export_names();
        for star in self.star_exports() {
            match star.exported_names_if_known(export_star_set) {
                Some(star_names) => {
                    for name in star_names {
                        if name != "default" && !names.contains(&name) {
                            names.push(name);
                        }
                    }
                }
                None => {
                    // Ask again once the dependency knows its names
                    let this = self.this.clone();
                    star.get_exported_names(
                        Box::new(move |_: &[String]| {
                            if let Some(module) = this.upgrade() {
                                module.get_exported_names(callback, &mut Vec::new());
                            }
                        }),
                        &mut Vec::new(),
                    );
                    return false;
                }
            }
        }
        callback(&names);
        true
    }

    fn exported_names_if_known(
        &self,
        export_star_set: &mut Vec<ModuleId>,
    ) -> Option<Vec<String>> {
        if export_star_set.contains(&self.id) {
            return Some(Vec::new());
        }
        export_star_set.push(self.id);

        let mut names = self.declarations.own_export_names();
        for star in self.star_exports() {
            for name in star.exported_names_if_known(export_star_set)? {
                if name != "default" && !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        Some(names)
    }

    fn resolve_export(
        &self,
        export_name: &str,
        resolve_set: &mut Vec<(ModuleId, String)>,
    ) -> Option<ResolvedBinding> {
        let key = (self.id, export_name.to_string());
        if resolve_set.contains(&key) {
            return None;
        }
        resolve_set.push(key);

        if let Some(local) = self.declarations.local_export(export_name) {
            return Some(ResolvedBinding {
                module: self.id,
                binding_name: local.to_string(),
            });
        }
        let is_namespace_export = self.declarations.exports.iter().any(
            |export| matches!(export, ExportSpecifier::AllAs(name, _) if name == export_name),
        );
        if is_namespace_export {
            return Some(ResolvedBinding {
                module: self.id,
                binding_name: export_name.to_string(),
            });
        }
        if export_name == "default" {
            return None;
        }
        self.star_exports()
            .iter()
            .find_map(|star| star.resolve_export(export_name, resolve_set))
    }
}

impl fmt::Debug for SourceTextModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceTextModule")
            .field("id", &self.id)
            .field("location", &self.location.as_str())
            .finish()
    }
}

#[derive(Debug, Clone)]
enum ImportName {
    Binding(String),
    Namespace,
}

#[derive(Debug, Clone)]
struct ImportTarget {
    module: ModuleRef,
    binding: ImportName,
}

/// Bindings visible to a static module body.
///
/// Locals (including exported ones) live in a plain object. Imported names
/// are looked up in the exporting module's instance each time they are
/// read, so a dependency that has not run yet reads as undefined.
#[derive(Debug, Default)]
pub struct ModuleEnvironment {
    bindings: JsObject,
    imports: FxHashMap<String, ImportTarget>,
}

impl ModuleEnvironment {
    /// An environment with no bindings, used for wrapper-style programs.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Reads a local or imported binding.
    pub fn get(&self, realm: &Realm, name: &str) -> Value {
        match self.imports.get(name) {
            Some(ImportTarget {
                module,
                binding: ImportName::Binding(imported),
            }) => realm
                .instance(module.id())
                .map(|instance| instance.get_binding_value(realm, imported))
                .unwrap_or_default(),
            Some(ImportTarget {
                module,
                binding: ImportName::Namespace,
            }) => namespace_object(realm, module),
            None => self.bindings.get(name),
        }
    }

    /// Assigns a local binding. Imported bindings are read-only.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> std::result::Result<(), Exception> {
        if self.imports.contains_key(name) {
            return Err(Exception::type_error(format!(
                "Assignment to constant variable '{}'",
                name
            )));
        }
        self.bindings.set(name, value);
        Ok(())
    }

    /// Whether `name` is an imported binding.
    pub fn is_import(&self, name: &str) -> bool {
        self.imports.contains_key(name)
    }
}

/// Per-realm instance of a [`SourceTextModule`]
#[derive(Debug)]
pub struct SourceTextInstance {
    module: Arc<SourceTextModule>,
    environment: ModuleEnvironment,
}

impl ModuleInstance for SourceTextInstance {
    fn execute(&self, realm: &mut Realm) -> Result<()> {
        self.module.program.run(realm, &self.environment)?;
        Ok(())
    }

    fn has_tla(&self) -> bool {
        self.module.declarations.has_top_level_await
    }

    fn get_binding_value(&self, realm: &Realm, name: &str) -> Value {
        let declarations = &self.module.declarations;
        if let Some(local) = declarations.local_export(name) {
            return self.environment.get(realm, local);
        }
        for export in &declarations.exports {
            if let ExportSpecifier::AllAs(ns, from) = export {
                if ns == name {
                    return self
                        .module
                        .requested(from)
                        .map(|record| namespace_object(realm, &record))
                        .unwrap_or_default();
                }
            }
        }
        if name == "default" {
            return Value::Undefined;
        }
        for star in self.module.star_exports() {
            if let Some(instance) = realm.instance(star.id()) {
                let value = instance.get_binding_value(realm, name);
                if !value.is_undefined() {
                    return value;
                }
            }
        }
        Value::Undefined
    }

    fn exports_value(&self, realm: &Realm) -> Value {
        let record: ModuleRef = self.module.clone();
        namespace_object(realm, &record)
    }
}

/// Builds a namespace object snapshot for `record` in `realm`.
///
/// Only names known at this point are included; host and wrapper-style
/// modules always expose `default` as well.
pub fn namespace_object(realm: &Realm, record: &ModuleRef) -> Value {
    let Some(instance) = realm.instance(record.id()) else {
        return Value::Undefined;
    };
    let mut names = record
        .exported_names_if_known(&mut Vec::new())
        .unwrap_or_default();
    if record.kind() != ModuleKind::SourceText && !names.iter().any(|n| n == "default") {
        names.push("default".to_string());
    }
    let namespace = JsObject::new();
    for name in names {
        let value = instance.get_binding_value(realm, &name);
        namespace.set(name, value);
    }
    Value::Object(namespace)
}
