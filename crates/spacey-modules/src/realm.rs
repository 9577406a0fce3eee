// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Per-worker execution context.

use crate::error::{ModuleError, Result};
use crate::record::{ModuleId, ModuleInstance, ModuleRef};
use crate::value::{JsObject, Value};
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

/// Identity of the worker owning a realm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId(pub u64);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// Evaluation status of a module instance inside one realm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceStatus {
    /// Instance exists, body not run
    Instantiated,
    /// Body is running or waiting on its dependencies
    Evaluating,
    /// Body finished, successfully or not
    Evaluated,
}

pub(crate) struct ModuleSlot {
    pub(crate) instance: Arc<dyn ModuleInstance>,
    pub(crate) status: InstanceStatus,
    pub(crate) dfs_index: usize,
    pub(crate) dfs_ancestor_index: usize,
    pub(crate) error: Option<ModuleError>,
}

/// One worker's isolated scripting environment.
///
/// A realm owns the global object and one [`ModuleInstance`] per module
/// record it has instantiated. Realms are never shared between threads;
/// records are.
pub struct Realm {
    worker: WorkerId,
    global: JsObject,
    modules: FxHashMap<ModuleId, ModuleSlot>,
}

impl Realm {
    /// Creates an empty realm for `worker`.
    pub fn new(worker: WorkerId) -> Self {
        Self {
            worker,
            global: JsObject::new(),
            modules: FxHashMap::default(),
        }
    }

    /// The worker owning this realm.
    pub fn worker_id(&self) -> WorkerId {
        self.worker
    }

    /// The global object.
    pub fn global(&self) -> &JsObject {
        &self.global
    }

    /// Reads a global binding.
    pub fn get_global(&self, name: &str) -> Value {
        self.global.get(name)
    }

    /// Defines or overwrites a global binding.
    pub fn set_global(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.global.set(name, value);
    }

    /// Returns the instance of `record`, creating it on first use.
    pub fn instantiate(&mut self, record: &ModuleRef) -> Result<Arc<dyn ModuleInstance>> {
        let id = record.id();
        if let Some(slot) = self.modules.get(&id) {
            return Ok(Arc::clone(&slot.instance));
        }
        record.initialize_environment()?;
        let instance = record.instantiate(self)?;
        tracing::debug!("{} instantiated module {}", self.worker, id);
        self.modules.insert(
            id,
            ModuleSlot {
                instance: Arc::clone(&instance),
                status: InstanceStatus::Instantiated,
                dfs_index: 0,
                dfs_ancestor_index: 0,
                error: None,
            },
        );
        Ok(instance)
    }

    /// The instance of a record, if this realm created one.
    pub fn instance(&self, id: ModuleId) -> Option<Arc<dyn ModuleInstance>> {
        self.modules.get(&id).map(|slot| Arc::clone(&slot.instance))
    }

    /// Evaluation status of a record in this realm.
    pub fn status(&self, id: ModuleId) -> Option<InstanceStatus> {
        self.modules.get(&id).map(|slot| slot.status)
    }

    /// Number of instantiated modules.
    pub fn instance_count(&self) -> usize {
        self.modules.len()
    }

    pub(crate) fn slot(&self, id: ModuleId) -> Result<&ModuleSlot> {
        self.modules
            .get(&id)
            .ok_or_else(|| ModuleError::defect(format!("module {} was not instantiated", id)))
    }

    pub(crate) fn slot_mut(&mut self, id: ModuleId) -> Result<&mut ModuleSlot> {
        self.modules
            .get_mut(&id)
            .ok_or_else(|| ModuleError::defect(format!("module {} was not instantiated", id)))
    }
}

impl fmt::Debug for Realm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Realm")
            .field("worker", &self.worker)
            .field("modules", &self.modules.len())
            .finish()
    }
}
