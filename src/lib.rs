//! A small register-machine scripting language for game mods.
//!
//! Mod text is compiled against a [`Registry`] of host bindings into an
//! immutable [`Program`], which the [`Vm`] runs with a fresh register file
//! per invocation. [`hooks`] wraps both steps behind named extension points
//! that never fail at the call site.

pub mod bytecode;
pub mod frontend;
pub mod hooks;
pub mod lang;
pub mod registry;
pub mod runtime;

pub use bytecode::{CompileError, CompileErrorKind, Program, ProgramImage, compile, compile_hook};
pub use hooks::{BlitContext, BlitHook, HookSignature, ScalarHook, ScriptHook, ScriptOrigin};
pub use registry::{Registry, RegistryBuilder, RegistryConfig, RegistryError};
pub use runtime::{ExecConfig, HostObjects, RuntimeError, Vm, Worker};

/// Builder with the builtin operations and the standing registers `r0`
/// (result) and `r1`.
pub fn standard_builder(config: RegistryConfig) -> Result<RegistryBuilder, RegistryError> {
    let mut builder = RegistryBuilder::with_config(config)?;
    builder.register_standing_register("r0", 0)?;
    if builder.config().registers > 1 {
        builder.register_standing_register("r1", 1)?;
    }
    Ok(builder)
}

/// Builds the default registry. Hosts call this once at startup, before
/// any script compiles, and share the result.
pub fn init_registry() -> Result<Registry, RegistryError> {
    standard_builder(RegistryConfig::default()).map(RegistryBuilder::build)
}
