// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Graph evaluation.
//!
//! Evaluation follows the single-pass strongly connected component walk
//! used for cyclic module records: each module gets a DFS index and an
//! ancestor index, dependencies are evaluated depth first, and a module
//! whose ancestor index equals its own index closes a component, marking
//! every module above it on the stack as evaluated.
//!
//! `require` starts a nested walk with its own stack. A module that is
//! still evaluating in an enclosing walk counts as already scheduled, so
//! requiring it hands back whatever it has exported so far.

use crate::error::{ModuleError, Result};
use crate::realm::{InstanceStatus, Realm};
use crate::record::{ModuleId, ModuleRef};
use rustc_hash::FxHashSet;
use std::sync::Arc;

/// Outcome of evaluating a module graph
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    /// Every module ran to completion
    Fulfilled,
    /// A module failed; the error is memoized on every module of its component
    Rejected(ModuleError),
    /// A module would have to suspend before the graph could settle
    Pending(String),
}

enum Interrupt {
    Thrown(ModuleError),
    Suspended(String),
}

impl From<ModuleError> for Interrupt {
    fn from(err: ModuleError) -> Self {
        Interrupt::Thrown(err)
    }
}

fn describe(record: &ModuleRef) -> String {
    record
        .location()
        .map(|url| url.to_string())
        .unwrap_or_else(|| record.id().to_string())
}

/// Links `record` and everything it statically requires.
pub fn link(record: &ModuleRef) -> Result<()> {
    record.link()
}

/// Instantiates every module reachable through static requests.
pub fn instantiate_graph(realm: &mut Realm, root: &ModuleRef) -> Result<()> {
    let mut seen = FxHashSet::default();
    let mut pending = vec![Arc::clone(root)];
    while let Some(record) = pending.pop() {
        if !seen.insert(record.id()) {
            continue;
        }
        realm.instantiate(&record)?;
        pending.extend(record.requested_modules());
    }
    Ok(())
}

/// Evaluates the graph rooted at `root` in `realm`.
///
/// The graph must be linked. Modules already evaluated in this realm are
/// not run again; a memoized failure settles the graph as rejected.
pub fn evaluate(realm: &mut Realm, root: &ModuleRef) -> Settlement {
    if let Err(err) = instantiate_graph(realm, root) {
        return Settlement::Rejected(err);
    }
    let mut stack = Vec::new();
    match inner_evaluate(realm, root, &mut stack, 0) {
        Ok(_) if stack.is_empty() => Settlement::Fulfilled,
        Ok(_) => Settlement::Rejected(ModuleError::defect(format!(
            "{} modules left on the evaluation stack",
            stack.len()
        ))),
        Err(Interrupt::Thrown(err)) => {
            abandon(realm, &mut stack, &err);
            Settlement::Rejected(err)
        }
        Err(Interrupt::Suspended(location)) => {
            let err = ModuleError::UnsupportedTopLevelSuspension(location.clone());
            abandon(realm, &mut stack, &err);
            Settlement::Pending(location)
        }
    }
}

/// Evaluates `record` from inside a running module and returns the value
/// `require` hands back.
pub(crate) fn require(realm: &mut Realm, record: &ModuleRef) -> Result<crate::value::Value> {
    record.link()?;
    instantiate_graph(realm, record)?;

    let mut stack = Vec::new();
    match inner_evaluate(realm, record, &mut stack, 0) {
        Ok(_) => {}
        Err(Interrupt::Thrown(err)) => {
            abandon(realm, &mut stack, &err);
            return Err(err);
        }
        Err(Interrupt::Suspended(location)) => {
            let err = ModuleError::UnsupportedTopLevelSuspension(location);
            abandon(realm, &mut stack, &err);
            return Err(err);
        }
    }

    let instance = realm.slot(record.id())?.instance.clone();
    Ok(instance.exports_value(realm))
}

fn abandon(realm: &mut Realm, stack: &mut Vec<ModuleId>, err: &ModuleError) {
    for id in stack.drain(..) {
        if let Ok(slot) = realm.slot_mut(id) {
            slot.status = InstanceStatus::Evaluated;
            slot.error = Some(err.clone());
        }
    }
}

fn inner_evaluate(
    realm: &mut Realm,
    record: &ModuleRef,
    stack: &mut Vec<ModuleId>,
    index: usize,
) -> std::result::Result<usize, Interrupt> {
    let id = record.id();
    let instance = realm.instantiate(record)?;

    if !record.is_cyclic() {
        let slot = realm.slot(id)?;
        if slot.status == InstanceStatus::Instantiated {
            let outcome = instance.execute(realm);
            let slot = realm.slot_mut(id)?;
            slot.status = InstanceStatus::Evaluated;
            slot.error = outcome.err();
        }
        return match &realm.slot(id)?.error {
            Some(err) => Err(Interrupt::Thrown(err.clone())),
            None => Ok(index),
        };
    }

    let slot = realm.slot_mut(id)?;
    match slot.status {
        InstanceStatus::Evaluated => {
            return match &slot.error {
                Some(err) => Err(Interrupt::Thrown(err.clone())),
                None => Ok(index),
            };
        }
        // Either further up this walk or in an enclosing one
        InstanceStatus::Evaluating => return Ok(index),
        InstanceStatus::Instantiated => {}
    }
    slot.status = InstanceStatus::Evaluating;
    slot.dfs_index = index;
    slot.dfs_ancestor_index = index;
    let mut index = index + 1;
    stack.push(id);

    for required in record.requested_modules() {
        index = inner_evaluate(realm, &required, stack, index)?;
        if !required.is_cyclic() {
            continue;
        }
        let required_slot = realm.slot(required.id())?;
        if required_slot.status == InstanceStatus::Evaluating && stack.contains(&required.id()) {
            let ancestor = required_slot.dfs_ancestor_index;
            let slot = realm.slot_mut(id)?;
            slot.dfs_ancestor_index = slot.dfs_ancestor_index.min(ancestor);
        }
    }

    if instance.has_tla() {
        return Err(Interrupt::Suspended(describe(record)));
    }
    tracing::debug!("{} executing {}", realm.worker_id(), describe(record));
    instance.execute(realm)?;

    let slot = realm.slot(id)?;
    if slot.dfs_ancestor_index == slot.dfs_index {
        loop {
            let done = stack
                .pop()
                .ok_or_else(|| ModuleError::defect("evaluation stack underflow"))?;
            realm.slot_mut(done)?.status = InstanceStatus::Evaluated;
            if done == id {
                break;
            }
        }
    }
    Ok(index)
}
