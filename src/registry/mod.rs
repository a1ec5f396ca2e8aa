//! # Binding registry
//!
//! The vocabulary scripts compile against: type names, standing registers,
//! constants, operations with their overloads, host functions and hook
//! signatures.
//!
//! A [`Registry`] is populated once through a [`RegistryBuilder`] during
//! host startup and is read-only afterwards; every compilation borrows it.
//!
//! ```ignore
//! let mut builder = RegistryBuilder::new()?;
//! builder.register_type::<Unit>("Unit")?;
//! builder.register_getter::<Unit, _>("getHealth", |u| u.health)?;
//! let registry = builder.build();
//! ```

pub mod native;

use std::any::{Any, TypeId};
use std::fmt::Write;
use std::sync::Arc;

use thiserror::Error;

use crate::bytecode::codec::layout_for;
use crate::bytecode::compile::{self, ParseFn};
use crate::bytecode::control;
use crate::bytecode::op::{BUILTINS, OPCODES, Ret};
use crate::hooks::HookSignature;
use crate::lang::names::{RefKind, SymbolTable, cmp_split};
use crate::lang::types::{Param, TypeTag, ValueType, version_count};
use crate::runtime::registers::MAX_REGISTERS;
pub use native::{NativeBinding, NativeCall, NativeFn, NativeId};

/// Hard upper bound on arguments per statement.
pub const MAX_ARGS: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Registers available to a script, at most [`MAX_REGISTERS`].
    pub registers: u8,
    /// Leading registers the host seeds with inputs.
    pub input_registers: u8,
    /// Arguments per statement, at most [`MAX_ARGS`].
    pub max_args: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            registers: MAX_REGISTERS as u8,
            input_registers: 2,
            max_args: MAX_ARGS,
        }
    }
}

impl RegistryConfig {
    pub fn with_registers(mut self, registers: u8) -> Self {
        self.registers = registers;
        self
    }

    pub fn with_input_registers(mut self, input_registers: u8) -> Self {
        self.input_registers = input_registers;
        self
    }

    pub fn with_max_args(mut self, max_args: usize) -> Self {
        self.max_args = max_args;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("name '{0}' is already registered")]
    Duplicate(String),
    #[error("type {0} is not registered")]
    UnknownType(String),
    #[error("register r{index} is outside the {capacity} configured registers")]
    RegisterOutOfRange { index: u8, capacity: u8 },
    #[error("invalid registry configuration: {0}")]
    Config(String),
    #[error("builtins need {0} opcodes, only 256 fit in a byte")]
    OpcodeSpace(usize),
    #[error("'{name}' takes {count} arguments, at most {max} are allowed")]
    TooManyParams {
        name: String,
        count: usize,
        max: usize,
    },
    #[error("parameter {index} of '{name}' is not available to host functions")]
    InvalidParam { name: String, index: usize },
    #[error("native function table is full")]
    NativeSpace,
    #[error("'{0}' has too many integer parameters to encode every version")]
    VersionSpace(String),
    #[error("hook '{name}': {reason}")]
    Hook { name: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    pub name: String,
    pub tag: TypeTag,
    rust: Option<TypeId>,
}

/// Where the instructions of one overload come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Builtin opcode; versions follow consecutively.
    Builtin { base: u8 },
    /// Host function; versions follow consecutively in the native table.
    Native { first: NativeId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overload {
    pub params: Vec<Param>,
    pub target: Target,
    pub doc: String,
}

/// Named operation with its overloads and the routine that compiles it.
pub struct Operation {
    pub name: String,
    pub overloads: Vec<Overload>,
    pub parse: ParseFn,
    /// Compiler keywords (`if`, `var`, ...) take no overloads.
    pub keyword: bool,
}

impl std::fmt::Debug for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name)
            .field("overloads", &self.overloads)
            .field("keyword", &self.keyword)
            .finish()
    }
}

#[derive(Debug)]
pub struct Registry {
    config: RegistryConfig,
    globals: SymbolTable,
    types: Vec<TypeInfo>,
    operations: Vec<Operation>,
    natives: Vec<NativeBinding>,
    hooks: Vec<HookSignature>,
}

impl Registry {
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn globals(&self) -> &SymbolTable {
        &self.globals
    }

    pub fn types(&self) -> &[TypeInfo] {
        &self.types
    }

    pub fn type_info(&self, tag: TypeTag) -> Option<&TypeInfo> {
        self.types.get(usize::from(tag.index()))
    }

    pub fn type_of<T: Any>(&self) -> Option<TypeTag> {
        let id = TypeId::of::<T>();
        self.types
            .iter()
            .find(|t| t.rust == Some(id))
            .map(|t| t.tag)
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn operation(&self, name: &str) -> Option<&Operation> {
        self.operation_split(name, "")
    }

    /// Looks up the operation named `prefix + suffix`.
    pub fn operation_split(&self, prefix: &str, suffix: &str) -> Option<&Operation> {
        self.operations
            .binary_search_by(|op| cmp_split(&op.name, prefix, suffix))
            .ok()
            .and_then(|i| self.operations.get(i))
    }

    pub fn native(&self, id: NativeId) -> Option<&NativeBinding> {
        self.natives.get(id.0 as usize)
    }

    pub fn hooks(&self) -> &[HookSignature] {
        &self.hooks
    }

    pub fn hook(&self, name: &str) -> Option<&HookSignature> {
        self.hooks.iter().find(|h| h.name == name)
    }

    pub fn param_name(&self, param: Param) -> String {
        let type_name = |tag: TypeTag| {
            self.type_info(tag)
                .map(|t| t.name.clone())
                .unwrap_or_else(|| format!("#{}", tag.index()))
        };
        match param {
            Param::Int => "int".to_string(),
            Param::IntVar => "var int".to_string(),
            Param::Label => "label".to_string(),
            Param::Ptr(tag) => format!("ptr {}", type_name(tag)),
            Param::PtrE(tag) => format!("ptre {}", type_name(tag)),
            Param::Native => "native".to_string(),
            Param::Raw => "raw".to_string(),
        }
    }

    pub fn value_type_name(&self, ty: ValueType) -> String {
        match ty {
            ValueType::Int => "int".to_string(),
            ValueType::Ptr(tag) => self.param_name(Param::Ptr(tag)),
            ValueType::PtrE(tag) => self.param_name(Param::PtrE(tag)),
        }
    }

    /// Human-readable listing of everything scripts can use.
    pub fn describe(&self) -> String {
        let mut out = String::new();

        out.push_str("types:\n");
        for ty in &self.types {
            let _ = writeln!(out, "  {}", ty.name);
        }

        out.push_str("registers:\n");
        for entry in self.globals.iter() {
            if let RefKind::Reg { index, ty, .. } = entry.kind {
                let _ = writeln!(
                    out,
                    "  {} = r{} ({})",
                    entry.name,
                    index,
                    self.value_type_name(ty)
                );
            }
        }

        out.push_str("constants:\n");
        for entry in self.globals.iter() {
            if let RefKind::Const(value) = entry.kind {
                let _ = writeln!(out, "  {} = {}", entry.name, value);
            }
        }

        out.push_str("operations:\n");
        for op in &self.operations {
            if op.keyword {
                let _ = writeln!(out, "  {} (keyword)", op.name);
                continue;
            }
            for overload in &op.overloads {
                let params: Vec<String> =
                    overload.params.iter().map(|&p| self.param_name(p)).collect();
                let mut line = format!("  {}", op.name);
                if !params.is_empty() {
                    let _ = write!(line, " [{}]", params.join(", "));
                }
                if !overload.doc.is_empty() {
                    let _ = write!(line, "  # {}", overload.doc);
                }
                out.push_str(&line);
                out.push('\n');
            }
        }

        if !self.hooks.is_empty() {
            out.push_str("hooks:\n");
            for hook in &self.hooks {
                let args: Vec<String> = hook
                    .args
                    .iter()
                    .map(|a| format!("{} {}", self.value_type_name(a.ty), a.name))
                    .collect();
                let _ = writeln!(out, "  {}({})", hook.name, args.join(", "));
            }
        }
        out
    }
}

/// Mutable registry used during host startup.
#[derive(Debug)]
pub struct RegistryBuilder {
    registry: Registry,
}

impl RegistryBuilder {
    /// Registry with the default configuration and every builtin operation.
    pub fn new() -> Result<Self, RegistryError> {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Result<Self, RegistryError> {
        if usize::from(config.registers) > MAX_REGISTERS || config.registers == 0 {
            return Err(RegistryError::Config(format!(
                "registers must be between 1 and {}",
                MAX_REGISTERS
            )));
        }
        if config.input_registers > config.registers {
            return Err(RegistryError::Config(
                "more input registers than registers".to_string(),
            ));
        }
        if config.max_args > MAX_ARGS {
            return Err(RegistryError::Config(format!(
                "max_args must be at most {}",
                MAX_ARGS
            )));
        }
        if !OPCODES.fits() {
            return Err(RegistryError::OpcodeSpace(OPCODES.len()));
        }

        let mut builder = RegistryBuilder {
            registry: Registry {
                config,
                globals: SymbolTable::new(),
                types: Vec::new(),
                operations: Vec::new(),
                natives: Vec::new(),
                hooks: Vec::new(),
            },
        };
        builder.insert_global("int", RefKind::Type(ValueType::Int))?;
        builder.registry.types.push(TypeInfo {
            name: "int".to_string(),
            tag: TypeTag::INT,
            rust: None,
        });
        builder.register_builtins()?;
        Ok(builder)
    }

    fn register_builtins(&mut self) -> Result<(), RegistryError> {
        for (index, builtin) in BUILTINS.iter().enumerate() {
            let base = OPCODES
                .base(index)
                .ok_or(RegistryError::OpcodeSpace(OPCODES.len()))?;
            let overload = Overload {
                params: builtin.params.to_vec(),
                target: Target::Builtin { base },
                doc: builtin.doc.to_string(),
            };
            self.add_overload(builtin.name, overload)?;
        }
        for (name, parse) in [
            ("if", control::parse_if as ParseFn),
            ("else", control::parse_else),
            ("end", control::parse_end),
            ("var", control::parse_var),
        ] {
            self.register_operation(name, parse)?;
        }
        Ok(())
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.registry.config
    }

    fn insert_global(&mut self, name: &str, kind: RefKind) -> Result<(), RegistryError> {
        if self.registry.operation(name).is_some() {
            return Err(RegistryError::Duplicate(name.to_string()));
        }
        self.registry
            .globals
            .insert(name, kind)
            .map_err(|_| RegistryError::Duplicate(name.to_string()))
    }

    fn insert_operation(&mut self, operation: Operation) -> Result<&mut Operation, RegistryError> {
        if self.registry.globals.get(&operation.name).is_some() {
            return Err(RegistryError::Duplicate(operation.name));
        }
        let ops = &mut self.registry.operations;
        match ops.binary_search_by(|op| op.name.as_str().cmp(&operation.name)) {
            Ok(_) => Err(RegistryError::Duplicate(operation.name)),
            Err(i) => {
                ops.insert(i, operation);
                Ok(&mut ops[i])
            }
        }
    }

    /// Adds an overload, creating the operation on first use.
    fn add_overload(&mut self, name: &str, overload: Overload) -> Result<(), RegistryError> {
        let ops = &mut self.registry.operations;
        if let Ok(i) = ops.binary_search_by(|op| op.name.as_str().cmp(name)) {
            let op = &mut ops[i];
            if op.keyword {
                return Err(RegistryError::Duplicate(name.to_string()));
            }
            op.overloads.push(overload);
            return Ok(());
        }
        let op = self.insert_operation(Operation {
            name: name.to_string(),
            overloads: Vec::new(),
            parse: compile::parse_call,
            keyword: false,
        })?;
        op.overloads.push(overload);
        Ok(())
    }

    /// Registers an operation with custom syntax; `parse` compiles each of
    /// its statements.
    pub fn register_operation(&mut self, name: &str, parse: ParseFn) -> Result<(), RegistryError> {
        self.insert_operation(Operation {
            name: name.to_string(),
            overloads: Vec::new(),
            parse,
            keyword: true,
        })
        .map(|_| ())
    }

    /// Registers host type `T` under `name` and returns its fresh tag.
    pub fn register_type<T: Any>(&mut self, name: &str) -> Result<TypeTag, RegistryError> {
        if self.registry.type_of::<T>().is_some() {
            return Err(RegistryError::Duplicate(name.to_string()));
        }
        let tag = u16::try_from(self.registry.types.len())
            .map(TypeTag)
            .map_err(|_| RegistryError::Duplicate(name.to_string()))?;
        self.insert_global(name, RefKind::Type(ValueType::Ptr(tag)))?;
        self.registry.types.push(TypeInfo {
            name: name.to_string(),
            tag,
            rust: Some(TypeId::of::<T>()),
        });
        Ok(tag)
    }

    /// Names a fixed, writable int register visible to every script.
    pub fn register_standing_register(&mut self, name: &str, index: u8) -> Result<(), RegistryError> {
        let capacity = self.registry.config.registers;
        if index >= capacity {
            return Err(RegistryError::RegisterOutOfRange { index, capacity });
        }
        self.insert_global(
            name,
            RefKind::Reg {
                index,
                ty: ValueType::Int,
                writable: true,
            },
        )
    }

    pub fn register_constant(&mut self, name: &str, value: i32) -> Result<(), RegistryError> {
        self.insert_global(name, RefKind::Const(value))
    }

    /// Registers a host function callable as `name arg...;`.
    ///
    /// Registering the same name again adds an overload.
    pub fn register_function<F>(
        &mut self,
        name: &str,
        params: &[Param],
        doc: &str,
        func: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn(&mut NativeCall<'_, '_>) -> Ret + Send + Sync + 'static,
    {
        let versions = self.check_params(name, params)?;
        let func: NativeFn = Arc::new(func);
        let first = u32::try_from(self.registry.natives.len())
            .map(NativeId)
            .map_err(|_| RegistryError::NativeSpace)?;

        let mut natives = Vec::new();
        for version in 0..versions {
            let id = first.0 + u32::from(version);
            natives.push(NativeBinding {
                id: NativeId(id),
                symbol: name.to_string(),
                layout: layout_for(params, version),
                func: Arc::clone(&func),
            });
        }

        self.add_overload(
            name,
            Overload {
                params: params.to_vec(),
                target: Target::Native { first },
                doc: doc.to_string(),
            },
        )?;
        self.registry.natives.extend(natives);
        Ok(())
    }

    /// Validates `params` and returns how many versions they expand to.
    fn check_params(&self, name: &str, params: &[Param]) -> Result<u16, RegistryError> {
        let max = self.registry.config.max_args;
        if params.len() > max {
            return Err(RegistryError::TooManyParams {
                name: name.to_string(),
                count: params.len(),
                max,
            });
        }
        for (index, param) in params.iter().enumerate() {
            let ok = match param {
                Param::Int | Param::IntVar => true,
                Param::Ptr(tag) | Param::PtrE(tag) => {
                    *tag != TypeTag::INT && self.registry.type_info(*tag).is_some()
                }
                Param::Label | Param::Native | Param::Raw => false,
            };
            if !ok {
                return Err(RegistryError::InvalidParam {
                    name: name.to_string(),
                    index,
                });
            }
        }
        version_count(params).ok_or_else(|| RegistryError::VersionSpace(name.to_string()))
    }

    fn tag_of<T: Any>(&self) -> Result<(TypeTag, String), RegistryError> {
        let tag = self
            .registry
            .type_of::<T>()
            .ok_or_else(|| RegistryError::UnknownType(std::any::type_name::<T>().to_string()))?;
        let name = self
            .registry
            .type_info(tag)
            .map(|t| t.name.clone())
            .unwrap_or_default();
        Ok((tag, name))
    }

    /// Registers `Type.name` taking a read-only handle followed by `params`.
    pub fn register_method<T, F>(
        &mut self,
        name: &str,
        params: &[Param],
        doc: &str,
        func: F,
    ) -> Result<(), RegistryError>
    where
        T: Any,
        F: Fn(&mut NativeCall<'_, '_>) -> Ret + Send + Sync + 'static,
    {
        let (tag, type_name) = self.tag_of::<T>()?;
        let mut full = vec![Param::Ptr(tag)];
        full.extend_from_slice(params);
        self.register_function(&format!("{}.{}", type_name, name), &full, doc, func)
    }

    /// Like [`register_method`](Self::register_method) but takes an
    /// editable handle.
    pub fn register_method_mut<T, F>(
        &mut self,
        name: &str,
        params: &[Param],
        doc: &str,
        func: F,
    ) -> Result<(), RegistryError>
    where
        T: Any,
        F: Fn(&mut NativeCall<'_, '_>) -> Ret + Send + Sync + 'static,
    {
        let (tag, type_name) = self.tag_of::<T>()?;
        let mut full = vec![Param::PtrE(tag)];
        full.extend_from_slice(params);
        self.register_function(&format!("{}.{}", type_name, name), &full, doc, func)
    }

    /// `Type.name obj out;` stores `get(obj)` into `out`, 0 for null.
    pub fn register_getter<T, F>(&mut self, name: &str, get: F) -> Result<(), RegistryError>
    where
        T: Any,
        F: Fn(&T) -> i32 + Send + Sync + 'static,
    {
        self.register_method::<T, _>(name, &[Param::IntVar], "", move |call| {
            let value = call.object::<T>(0).map(&get).unwrap_or(0);
            call.set(1, value);
            Ret::Continue
        })
    }

    /// `Type.name obj value;` calls `set(obj, value)`; null is ignored.
    pub fn register_setter<T, F>(&mut self, name: &str, set: F) -> Result<(), RegistryError>
    where
        T: Any,
        F: Fn(&mut T, i32) + Send + Sync + 'static,
    {
        self.register_method_mut::<T, _>(name, &[Param::Int], "", move |call| {
            let value = call.get(1);
            if let Some(object) = call.object_mut::<T>(0) {
                set(object, value);
            }
            Ret::Continue
        })
    }

    pub fn register_hook(&mut self, hook: HookSignature) -> Result<(), RegistryError> {
        let fail = |reason: &str| RegistryError::Hook {
            name: hook.name.clone(),
            reason: reason.to_string(),
        };
        if self.registry.hook(&hook.name).is_some() {
            return Err(RegistryError::Duplicate(hook.name));
        }
        if hook.args.len() > usize::from(self.registry.config.registers) {
            return Err(fail("more arguments than registers"));
        }
        for (i, arg) in hook.args.iter().enumerate() {
            if hook.args[..i].iter().any(|a| a.name == arg.name) {
                return Err(fail("argument names must be unique"));
            }
            if self.registry.type_info(arg.ty.tag()).is_none() {
                return Err(fail("argument type is not registered"));
            }
        }
        if hook.returns > 1 {
            return Err(fail("hooks return at most one value"));
        }
        if hook.returns == 1 {
            match hook.args.first() {
                Some(a) if a.ty.is_int() && a.writable => {}
                _ => return Err(fail("the result lives in a writable int first argument")),
            }
        }
        self.registry.hooks.push(hook);
        Ok(())
    }

    pub fn build(self) -> Registry {
        self.registry
    }
}
