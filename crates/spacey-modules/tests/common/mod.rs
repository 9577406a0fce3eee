// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! In-memory loader and compiler with scripted module bodies.
//!
//! Module "source" is never parsed: every registered location carries a
//! Rust closure standing in for its compiled body.

#![allow(dead_code)]

use parking_lot::Mutex;
use spacey_modules::{
    CompileError, CompiledSource, Compiler, Exception, HostModule, JsFunction, JsObject, Loader,
    ModuleDeclarations, ModuleEnvironment, ModuleResolver, Program, ProgramRef, Realm,
    ResolverConfig, Value,
};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::Arc;
use url::Url;

/// Base location of every fixture
pub const BASE: &str = "file:///proj/";

pub type WrapperBody = Arc<dyn Fn(&mut Realm, &WrapperArgs) -> Result<(), Exception> + Send + Sync>;
pub type StaticBody =
    Arc<dyn Fn(&mut Realm, &ModuleEnvironment) -> Result<(), Exception> + Send + Sync>;

/// The `(exports, module, require)` triple a wrapper body receives
pub struct WrapperArgs {
    pub exports: JsObject,
    pub module: JsObject,
    pub require: JsFunction,
}

impl WrapperArgs {
    pub fn require(&self, realm: &mut Realm, specifier: &str) -> Result<Value, Exception> {
        self.require.call(realm, &[Value::from(specifier)])
    }

    pub fn export(&self, name: &str, value: impl Into<Value>) {
        self.exports.set(name, value);
    }

    pub fn replace_exports(&self, value: impl Into<Value>) {
        self.module.set("exports", value);
    }
}

#[derive(Clone)]
enum Body {
    Wrapper(WrapperBody),
    Static(ModuleDeclarations, StaticBody),
    Broken(String),
}

struct ScriptProgram;

impl fmt::Debug for ScriptProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScriptProgram")
    }
}

impl Program for ScriptProgram {
    fn run(&self, _realm: &mut Realm, _env: &ModuleEnvironment) -> Result<Value, Exception> {
        Ok(Value::Undefined)
    }
}

struct WrapperProgram {
    body: WrapperBody,
}

impl fmt::Debug for WrapperProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WrapperProgram")
    }
}

impl Program for WrapperProgram {
    fn run(&self, _realm: &mut Realm, _env: &ModuleEnvironment) -> Result<Value, Exception> {
        let body = Arc::clone(&self.body);
        let wrapper = JsFunction::new("wrapper", move |realm: &mut Realm, args: &[Value]| {
            let object = |index: usize| {
                args.get(index)
                    .and_then(Value::as_object)
                    .cloned()
                    .ok_or_else(|| Exception::type_error("bad wrapper argument"))
            };
            let require = args
                .get(2)
                .and_then(Value::as_function)
                .cloned()
                .ok_or_else(|| Exception::type_error("require missing"))?;
            let call = WrapperArgs {
                exports: object(0)?,
                module: object(1)?,
                require,
            };
            body(realm, &call)?;
            Ok(Value::Undefined)
        });
        Ok(Value::Function(wrapper))
    }
}

struct StaticProgram {
    body: StaticBody,
}

impl fmt::Debug for StaticProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StaticProgram")
    }
}

impl Program for StaticProgram {
    fn run(&self, realm: &mut Realm, env: &ModuleEnvironment) -> Result<Value, Exception> {
        (self.body)(realm, env)?;
        Ok(Value::Undefined)
    }
}

/// Scripted module sources keyed by location, with call counters
#[derive(Default)]
pub struct Fixture {
    bodies: Mutex<HashMap<String, Body>>,
    loads: Mutex<HashMap<String, usize>>,
    compiles: Mutex<HashMap<String, usize>>,
}

impl Fixture {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers a wrapper-style module at `location`.
    pub fn wrapper<F>(&self, location: &str, body: F)
    where
        F: Fn(&mut Realm, &WrapperArgs) -> Result<(), Exception> + Send + Sync + 'static,
    {
        self.bodies
            .lock()
            .insert(location.to_string(), Body::Wrapper(Arc::new(body)));
    }

    /// Registers a static module at `location`.
    pub fn static_module<F>(&self, location: &str, declarations: ModuleDeclarations, body: F)
    where
        F: Fn(&mut Realm, &ModuleEnvironment) -> Result<(), Exception> + Send + Sync + 'static,
    {
        self.bodies.lock().insert(
            location.to_string(),
            Body::Static(declarations, Arc::new(body)),
        );
    }

    /// Registers a module that fails to compile.
    pub fn broken(&self, location: &str, message: &str) {
        self.bodies
            .lock()
            .insert(location.to_string(), Body::Broken(message.to_string()));
    }

    pub fn loads(&self, location: &str) -> usize {
        self.loads.lock().get(location).copied().unwrap_or(0)
    }

    pub fn compiles(&self, location: &str) -> usize {
        self.compiles.lock().get(location).copied().unwrap_or(0)
    }

    pub fn resolver(self: &Arc<Self>, host_modules: Vec<(&str, HostModule)>) -> Arc<ModuleResolver> {
        ModuleResolver::new(
            ResolverConfig::with_base(url(BASE)),
            host_modules
                .into_iter()
                .map(|(name, module)| (name.to_string(), module)),
            Arc::clone(self) as Arc<dyn Loader>,
            Arc::clone(self) as Arc<dyn Compiler>,
        )
    }

    fn body(&self, location: &str) -> Option<Body> {
        self.bodies.lock().get(location).cloned()
    }
}

impl Loader for Fixture {
    fn load(&self, location: &Url, specifier: &str) -> io::Result<Vec<u8>> {
        *self.loads.lock().entry(location.to_string()).or_default() += 1;
        if self.body(location.as_str()).is_none() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no module at {} ({})", location, specifier),
            ));
        }
        Ok(location.as_str().as_bytes().to_vec())
    }
}

impl Compiler for Fixture {
    fn compile(&self, _source: &str, location: &str) -> Result<CompiledSource, CompileError> {
        *self.compiles.lock().entry(location.to_string()).or_default() += 1;
        match self.body(location) {
            Some(Body::Wrapper(_)) => Ok(CompiledSource {
                program: Arc::new(ScriptProgram),
                module: None,
            }),
            Some(Body::Static(declarations, body)) => Ok(CompiledSource {
                program: Arc::new(StaticProgram { body }),
                module: Some(declarations),
            }),
            Some(Body::Broken(message)) => Err(CompileError::new(message)),
            None => Err(CompileError::new(format!("nothing registered at {}", location))),
        }
    }

    fn compile_wrapper(&self, _source: &str, location: &str) -> Result<ProgramRef, CompileError> {
        match self.body(location) {
            Some(Body::Wrapper(body)) => Ok(Arc::new(WrapperProgram { body })),
            _ => Err(CompileError::new(format!("{} is not wrapper-style", location))),
        }
    }
}

pub fn url(location: &str) -> Url {
    Url::parse(location).unwrap()
}

/// Absolute location of a fixture-relative path
pub fn at(path: &str) -> String {
    format!("{}{}", BASE, path)
}
