//! Invocation wrappers.
//!
//! A hook is a named extension point with a fixed argument list. Mods supply
//! script text for it; when that text is missing or broken the hook falls
//! back to its default script and finally to passing input 0 through.

pub mod blit;
pub mod scalar;

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{error, warn};

use crate::bytecode::compile::compile_hook;
use crate::bytecode::ir::Program;
use crate::lang::types::ValueType;
use crate::registry::Registry;
use crate::runtime::vm::{ExecConfig, Vm, Worker};

pub use blit::{BlitContext, BlitHook};
pub use scalar::ScalarHook;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookArg {
    pub name: String,
    pub ty: ValueType,
    pub writable: bool,
}

/// Ordered arguments of a hook; argument `i` is seeded into register `i`
/// and register 0 is the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookSignature {
    pub name: String,
    pub args: Vec<HookArg>,
    pub returns: u8,
    pub default_script: Option<String>,
}

impl HookSignature {
    pub fn new(name: impl Into<String>) -> Self {
        HookSignature {
            name: name.into(),
            args: Vec::new(),
            returns: 0,
            default_script: None,
        }
    }

    fn push(mut self, name: impl Into<String>, ty: ValueType, writable: bool) -> Self {
        self.args.push(HookArg {
            name: name.into(),
            ty,
            writable,
        });
        self
    }

    /// Appends a read-only argument.
    pub fn arg(self, name: impl Into<String>, ty: ValueType) -> Self {
        self.push(name, ty, false)
    }

    /// Appends an argument scripts may overwrite.
    pub fn arg_mut(self, name: impl Into<String>, ty: ValueType) -> Self {
        self.push(name, ty, true)
    }

    pub fn returns(mut self, count: u8) -> Self {
        self.returns = count;
        self
    }

    pub fn with_default_script(mut self, source: impl Into<String>) -> Self {
        self.default_script = Some(source.into());
        self
    }
}

/// Lets the first few reports through, then one in every 1024.
#[derive(Debug, Default)]
pub struct RateLimiter {
    seen: AtomicU64,
}

const FIRST_REPORTS: u64 = 8;
const REPORT_EVERY: u64 = 1024;

impl RateLimiter {
    pub const fn new() -> Self {
        RateLimiter {
            seen: AtomicU64::new(0),
        }
    }

    /// Counts one occurrence; returns the running count when it should be
    /// reported.
    pub fn allow(&self) -> Option<u64> {
        let n = self.seen.fetch_add(1, Ordering::Relaxed) + 1;
        (n <= FIRST_REPORTS || n % REPORT_EVERY == 0).then_some(n)
    }

    pub fn count(&self) -> u64 {
        self.seen.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptOrigin {
    /// Script text supplied by a mod.
    Mod,
    /// The hook's built-in default script.
    Default,
    /// No usable script; input 0 passes through.
    Identity,
}

/// A compiled hook script ready to be invoked.
#[derive(Debug)]
pub struct ScriptHook {
    name: String,
    program: Option<Program>,
    origin: ScriptOrigin,
    vm: Vm,
    faults: RateLimiter,
}

impl ScriptHook {
    /// Compiles `source` for `signature`, falling back to the default
    /// script and then to identity. `context` names the mod for logs.
    pub fn load(
        registry: &Registry,
        signature: &HookSignature,
        source: Option<&str>,
        context: &str,
    ) -> Self {
        if let Some(source) = source {
            match compile_hook(source, registry, signature) {
                Ok(program) => return Self::new(&signature.name, Some(program), ScriptOrigin::Mod),
                Err(err) => warn!(
                    hook = %signature.name,
                    context,
                    line = err.line,
                    statement = %err.statement,
                    %err,
                    "script rejected, using default"
                ),
            }
        }

        if let Some(default) = &signature.default_script {
            match compile_hook(default, registry, signature) {
                Ok(program) => {
                    return Self::new(&signature.name, Some(program), ScriptOrigin::Default);
                }
                Err(err) => warn!(
                    hook = %signature.name,
                    %err,
                    "default script rejected, using identity"
                ),
            }
        }

        Self::new(&signature.name, None, ScriptOrigin::Identity)
    }

    fn new(name: &str, program: Option<Program>, origin: ScriptOrigin) -> Self {
        ScriptHook {
            name: name.to_string(),
            program,
            origin,
            vm: Vm::new(),
            faults: RateLimiter::new(),
        }
    }

    /// Hook running an already compiled program.
    pub fn from_program(name: &str, program: Program) -> Self {
        Self::new(name, Some(program), ScriptOrigin::Mod)
    }

    pub fn with_exec_config(mut self, config: ExecConfig) -> Self {
        self.vm = Vm::with_config(config);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn origin(&self) -> ScriptOrigin {
        self.origin
    }

    pub fn program(&self) -> Option<&Program> {
        self.program.as_ref()
    }

    /// Runtime faults seen so far.
    pub fn fault_count(&self) -> u64 {
        self.faults.count()
    }

    /// Runs the hook; a runtime fault is logged and yields 0.
    pub fn invoke(&self, worker: &mut Worker<'_>, inputs: &[i32]) -> i32 {
        match &self.program {
            Some(program) => self.run(program, worker, inputs),
            None => inputs.first().copied().unwrap_or(0),
        }
    }

    pub(crate) fn run(&self, program: &Program, worker: &mut Worker<'_>, inputs: &[i32]) -> i32 {
        match self.vm.run(program, worker, inputs) {
            Ok(value) => value,
            Err(err) => {
                if let Some(occurrences) = self.faults.allow() {
                    error!(
                        hook = %self.name,
                        opcode = err.opcode,
                        pos = %err.pos,
                        fault = %err.fault,
                        occurrences,
                        "script fault"
                    );
                }
                0
            }
        }
    }
}
