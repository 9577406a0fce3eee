// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # spacey-modules
//!
//! Module resolution and linking for embedded scripting workers.
//!
//! This crate turns `import` and `require` specifiers into one shared,
//! deduplicated module graph and evaluates it inside each worker's
//! [`Realm`]. It bridges four module shapes behind one record contract:
//!
//! - native host modules declaring named and default exports
//! - legacy host values whose keys become exports
//! - wrapper-style scripts (`exports`, `module`, `require`)
//! - static scripts using `import`/`export` declarations
//!
//! Parsing and loading stay with the embedder, through the [`Compiler`]
//! and [`Loader`] traits.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use spacey_modules::{FsLoader, HostModule, ModuleResolver, ModuleSystem, ResolverConfig, WorkerId};
//! use std::sync::Arc;
//!
//! let resolver = ModuleResolver::new(
//!     ResolverConfig::from_toml_str(r#"base = "file:///srv/scripts/""#)?,
//!     [("host".to_string(), HostModule::json(serde_json::json!({"version": "1.0"})))],
//!     Arc::new(FsLoader),
//!     Arc::new(MyCompiler::default()),
//! );
//!
//! // Initialization worker discovers the whole graph, then locks it
//! let mut init = ModuleSystem::new(Arc::clone(&resolver), WorkerId(0));
//! init.run_entry_source(&entry_url, &entry_source)?;
//! resolver.lock();
//!
//! // Every other worker evaluates the same records in its own realm
//! let mut worker = ModuleSystem::new(resolver, WorkerId(1));
//! let entry = worker.run_entry_source(&entry_url, &entry_source)?;
//! let default = worker.get_binding_value(&entry, "default");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod compiler;
pub mod config;
pub mod dynamic;
pub mod error;
pub mod evaluator;
pub mod host;
pub mod loader;
pub mod memo;
pub mod realm;
pub mod record;
pub mod resolver;
pub mod source_text;
pub mod specifier;
pub mod system;
pub mod value;

// Re-exports
pub use compiler::{
    CompileError, CompiledSource, Compiler, ExportSpecifier, ImportDeclaration, ImportSpecifier,
    ModuleDeclarations, Program, ProgramRef,
};
pub use config::{ConfigError, ResolverConfig};
pub use dynamic::{DynamicInstance, DynamicModule, ES_MODULE_MARKER};
pub use error::{Exception, ModuleError, Result};
pub use evaluator::Settlement;
pub use host::{Exports, HostModule, HostValue, NativeInstance, NativeModule};
pub use loader::{FsLoader, Loader};
pub use memo::{ExportNamesCallback, ExportNamesMemo};
pub use realm::{InstanceStatus, Realm, WorkerId};
pub use record::{ModuleId, ModuleInstance, ModuleKind, ModuleRecord, ModuleRef};
pub use resolver::ModuleResolver;
pub use source_text::{ModuleEnvironment, SourceTextModule};
pub use system::ModuleSystem;
pub use value::{JsFunction, JsObject, Value};
