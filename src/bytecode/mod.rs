pub mod codec;
pub mod compile;
pub mod compile_error;
pub mod control;
pub mod disasm;
pub mod ir;
pub mod op;
pub mod writer;

pub use compile::{Compiler, compile, compile_hook};
pub use compile_error::{CompileError, CompileErrorKind};
pub use ir::{LinkError, Program, ProgramImage, ProgramPos, VerifyError};
pub use op::{BUILTINS, OPCODES, Ret};
