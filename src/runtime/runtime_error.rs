use thiserror::Error;

use crate::bytecode::ir::ProgramPos;

/// Why an instruction stopped the script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Fault {
    #[error("division by zero")]
    DivisionByZero,
    #[error("wave period must be positive")]
    NonPositivePeriod,
    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),
    #[error("program ends inside an instruction")]
    Truncated,
    #[error("step budget of {0} instructions exhausted")]
    StepLimit(u32),
    #[error("native function failed: {0}")]
    Native(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{fault} in '{opcode}' at {pos}")]
pub struct RuntimeError {
    pub fault: Fault,
    /// Operation name of the failing instruction, `?` if it could not be
    /// decoded.
    pub opcode: &'static str,
    pub pos: ProgramPos,
}

impl RuntimeError {
    pub fn new(fault: Fault, opcode: &'static str, pos: ProgramPos) -> Self {
        RuntimeError { fault, opcode, pos }
    }
}
