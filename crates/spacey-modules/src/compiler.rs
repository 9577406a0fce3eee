// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Compiler contract and static module declarations.
//!
//! Parsing and code generation live outside this crate. A [`Compiler`]
//! turns source text into an immutable [`Program`] and, for sources using
//! `import`/`export` syntax, reports the declarations the linker needs.

use crate::error::Exception;
use crate::realm::Realm;
use crate::source_text::ModuleEnvironment;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A compiled program, shared read-only between workers.
pub trait Program: Send + Sync + fmt::Debug {
    /// Runs the program in `realm`.
    ///
    /// Static module bodies read and write bindings through `environment`.
    /// Wrapper-style programs receive an empty environment and complete with
    /// the wrapper function.
    fn run(&self, realm: &mut Realm, environment: &ModuleEnvironment) -> Result<Value, Exception>;
}

/// Shared handle to a compiled program
pub type ProgramRef = Arc<dyn Program>;

/// Compilation failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CompileError {
    /// Diagnostic message
    pub message: String,
}

impl CompileError {
    /// Create a new compile error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Import specifier types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportSpecifier {
    /// `import foo from 'module'`
    Default(String),
    /// `import { foo } from 'module'`
    Named(String, Option<String>), // (imported, local alias)
    /// `import * as foo from 'module'`
    Namespace(String),
}

impl ImportSpecifier {
    /// The local binding name this specifier introduces.
    pub fn local_name(&self) -> &str {
        match self {
            ImportSpecifier::Default(local) | ImportSpecifier::Namespace(local) => local,
            ImportSpecifier::Named(imported, alias) => alias.as_deref().unwrap_or(imported.as_str()),
        }
    }
}

/// Export specifier types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportSpecifier {
    /// `export default value`, bound locally as `default`
    Default,
    /// `export { foo }` or `export { foo as bar }`
    Named(String, Option<String>), // (local, exported alias)
    /// `export * from 'module'`
    All(String), // from module
    /// `export * as name from 'module'`
    AllAs(String, String), // (name, from module)
}

/// Parsed import statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDeclaration {
    /// The module specifier (e.g., './foo.js', 'host:random')
    pub specifier: String,
    /// Import specifiers; empty for side-effect only imports
    pub imports: Vec<ImportSpecifier>,
}

/// Everything the linker needs to know about a static module
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleDeclarations {
    /// Import declarations in source order
    pub imports: Vec<ImportDeclaration>,
    /// Export declarations in source order
    pub exports: Vec<ExportSpecifier>,
    /// Whether the body awaits at the top level
    pub has_top_level_await: bool,
}

impl ModuleDeclarations {
    /// Distinct specifiers requested by imports and re-exports, in order.
    pub fn requested_specifiers(&self) -> Vec<String> {
        let from_exports = self.exports.iter().filter_map(|export| match export {
            ExportSpecifier::All(from) | ExportSpecifier::AllAs(_, from) => Some(from),
            _ => None,
        });
        let mut specifiers: Vec<String> = Vec::new();
        for specifier in self.imports.iter().map(|i| &i.specifier).chain(from_exports) {
            if !specifiers.contains(specifier) {
                specifiers.push(specifier.clone());
            }
        }
        specifiers
    }

    /// Maps an exported name to the local binding holding it.
    pub fn local_export(&self, export_name: &str) -> Option<&str> {
        self.exports.iter().find_map(|export| match export {
            ExportSpecifier::Default if export_name == "default" => Some("default"),
            ExportSpecifier::Named(local, alias)
                if alias.as_deref().unwrap_or(local.as_str()) == export_name =>
            {
                Some(local.as_str())
            }
            _ => None,
        })
    }

    /// Names exported by the module itself, excluding `export *`.
    pub fn own_export_names(&self) -> Vec<String> {
        self.exports
            .iter()
            .filter_map(|export| match export {
                ExportSpecifier::Default => Some("default".to_string()),
                ExportSpecifier::Named(local, alias) => {
                    Some(alias.clone().unwrap_or_else(|| local.clone()))
                }
                ExportSpecifier::AllAs(name, _) => Some(name.clone()),
                ExportSpecifier::All(_) => None,
            })
            .collect()
    }
}

/// Output of [`Compiler::compile`]
#[derive(Debug, Clone)]
pub struct CompiledSource {
    /// The compiled program
    pub program: ProgramRef,
    /// Present when the source uses static module syntax
    pub module: Option<ModuleDeclarations>,
}

impl CompiledSource {
    /// Whether the source used `import`/`export` declarations.
    pub fn is_static_module(&self) -> bool {
        self.module.is_some()
    }
}

/// Source compiler supplied by the embedder.
pub trait Compiler: Send + Sync {
    /// Compiles `source` found at `location` and classifies it.
    fn compile(&self, source: &str, location: &str) -> Result<CompiledSource, CompileError>;

    /// Compiles `source` in wrapper form: running the program yields a
    /// function taking `(exports, module, require)`.
    fn compile_wrapper(&self, source: &str, location: &str) -> Result<ProgramRef, CompileError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declarations() -> ModuleDeclarations {
        ModuleDeclarations {
            imports: vec![
                ImportDeclaration {
                    specifier: "./a.js".into(),
                    imports: vec![ImportSpecifier::Named("x".into(), Some("y".into()))],
                },
                ImportDeclaration {
                    specifier: "./a.js".into(),
                    imports: vec![ImportSpecifier::Default("a".into())],
                },
            ],
            exports: vec![
                ExportSpecifier::Default,
                ExportSpecifier::Named("inner".into(), Some("outer".into())),
                ExportSpecifier::All("./b.js".into()),
                ExportSpecifier::AllAs("ns".into(), "./c.js".into()),
            ],
            has_top_level_await: false,
        }
    }

    #[test]
    fn test_requested_specifiers_are_distinct() {
        assert_eq!(
            declarations().requested_specifiers(),
            vec!["./a.js", "./b.js", "./c.js"]
        );
    }

    #[test]
    fn test_local_export_lookup() {
        let decls = declarations();
        assert_eq!(decls.local_export("outer"), Some("inner"));
        assert_eq!(decls.local_export("default"), Some("default"));
        assert_eq!(decls.local_export("inner"), None);
        assert_eq!(decls.own_export_names(), vec!["default", "outer", "ns"]);
    }

    #[test]
    fn test_import_local_name() {
        assert_eq!(ImportSpecifier::Named("x".into(), Some("y".into())).local_name(), "y");
        assert_eq!(ImportSpecifier::Named("x".into(), None).local_name(), "x");
        assert_eq!(ImportSpecifier::Namespace("ns".into()).local_name(), "ns");
    }
}
