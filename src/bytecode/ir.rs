use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bytecode::codec::Operand;
use crate::bytecode::op::OPCODES;
use crate::registry::Registry;
use crate::registry::native::{NativeBinding, NativeId};

/// Byte offset of an instruction inside a [`Program`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct ProgramPos(u32);

impl ProgramPos {
    pub const START: ProgramPos = ProgramPos(0);

    pub(crate) fn new(offset: u32) -> Self {
        ProgramPos(offset)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ProgramPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{:04}", self.0)
    }
}

/// A finalized script: immutable code plus the native functions it calls.
///
/// A program is only ever read after release, so one instance may be run
/// from many threads at once, each with its own register file.
pub struct Program {
    code: Box<[u8]>,
    registers: u8,
    natives: Box<[NativeBinding]>,
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field("code_len", &self.code.len())
            .field("registers", &self.registers)
            .field("natives", &self.natives.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("program is empty")]
    Empty,
    #[error("unknown opcode {opcode:#04x} at {pos}")]
    UnknownOpcode { opcode: u8, pos: ProgramPos },
    #[error("instruction at {pos} is truncated")]
    Truncated { pos: ProgramPos },
    #[error("register r{register} at {pos} exceeds the {registers} registers in use")]
    BadRegister {
        register: u8,
        registers: u8,
        pos: ProgramPos,
    },
    #[error("jump at {pos} targets {target}, which is not an instruction")]
    BadLabel { target: ProgramPos, pos: ProgramPos },
    #[error("native index {index} at {pos} is out of range")]
    BadNative { index: u16, pos: ProgramPos },
    #[error("operand block at {pos} does not match its native function")]
    BadOperandBlock { pos: ProgramPos },
}

impl Program {
    pub(crate) fn from_parts(code: Vec<u8>, registers: u8, natives: Vec<NativeBinding>) -> Self {
        Program {
            code: code.into_boxed_slice(),
            registers,
            natives: natives.into_boxed_slice(),
        }
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// Number of registers the program touches; the VM zeroes only these.
    pub fn registers_used(&self) -> u8 {
        self.registers
    }

    pub fn natives(&self) -> &[NativeBinding] {
        &self.natives
    }

    pub fn native(&self, index: u16) -> Option<&NativeBinding> {
        self.natives.get(usize::from(index))
    }

    /// Walks every instruction and checks it against the opcode table.
    pub fn verify(&self) -> Result<(), VerifyError> {
        if self.code.is_empty() {
            return Err(VerifyError::Empty);
        }

        let mut starts = Vec::new();
        let mut jumps = Vec::new();
        let mut at = 0;
        while at < self.code.len() {
            let pos = ProgramPos::new(at as u32);
            starts.push(at);
            let opcode = self.code[at];
            let entry = OPCODES
                .get(opcode)
                .ok_or(VerifyError::UnknownOpcode { opcode, pos })?;

            let mut cursor = at + 1;
            let mut native = None;
            for codec in &entry.layout {
                let (operand, width) = codec
                    .decode(&self.code, cursor)
                    .ok_or(VerifyError::Truncated { pos })?;
                match operand {
                    Operand::Native(index) => {
                        native = Some(
                            self.native(index)
                                .ok_or(VerifyError::BadNative { index, pos })?,
                        );
                    }
                    Operand::Raw { start, len } => {
                        let binding = native.ok_or(VerifyError::BadOperandBlock { pos })?;
                        self.verify_block(binding, start as usize, usize::from(len), pos)?;
                    }
                    Operand::Label(target) => jumps.push((pos, target)),
                    other => self.verify_operand(other, pos)?,
                }
                cursor += width;
            }
            at = cursor;
        }

        for (pos, target) in jumps {
            if starts.binary_search(&target.index()).is_err() {
                return Err(VerifyError::BadLabel { target, pos });
            }
        }
        Ok(())
    }

    fn verify_operand(&self, operand: Operand, pos: ProgramPos) -> Result<(), VerifyError> {
        match operand {
            Operand::Reg(register) if register >= self.registers => Err(VerifyError::BadRegister {
                register,
                registers: self.registers,
                pos,
            }),
            _ => Ok(()),
        }
    }

    fn verify_block(
        &self,
        binding: &NativeBinding,
        start: usize,
        len: usize,
        pos: ProgramPos,
    ) -> Result<(), VerifyError> {
        let block = self
            .code
            .get(..start + len)
            .ok_or(VerifyError::Truncated { pos })?;
        let mut cursor = start;
        for codec in &binding.layout {
            let (operand, width) = codec
                .decode(block, cursor)
                .ok_or(VerifyError::BadOperandBlock { pos })?;
            self.verify_operand(operand, pos)?;
            cursor += width;
        }
        if cursor == start + len {
            Ok(())
        } else {
            Err(VerifyError::BadOperandBlock { pos })
        }
    }

    /// Serializable form of this program.
    pub fn to_image(&self) -> ProgramImage {
        ProgramImage {
            format: IMAGE_FORMAT,
            registers: self.registers,
            code: self.code.to_vec(),
            natives: self
                .natives
                .iter()
                .map(|n| NativeRef {
                    id: n.id,
                    symbol: n.symbol.clone(),
                })
                .collect(),
        }
    }
}

pub const IMAGE_FORMAT: u32 = 1;

/// Native function reference stored in an image; resolved again on link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeRef {
    pub id: NativeId,
    pub symbol: String,
}

/// Program detached from its registry, for caching compiled scripts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramImage {
    pub format: u32,
    pub registers: u8,
    pub code: Vec<u8>,
    pub natives: Vec<NativeRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("cannot encode program image: {0}")]
    Encode(String),
    #[error("cannot decode program image: {0}")]
    Decode(String),
    #[error("image format {found} is not supported (expected {expected})")]
    Format { found: u32, expected: u32 },
    #[error("native function '{symbol}' is not registered")]
    UnknownNative { symbol: String },
    #[error("image uses {registers} registers but the registry provides {capacity}")]
    TooManyRegisters { registers: u8, capacity: u8 },
    #[error("image failed verification: {0}")]
    Verify(#[from] VerifyError),
}

impl ProgramImage {
    pub fn to_bytes(&self) -> Result<Vec<u8>, LinkError> {
        postcard::to_allocvec(self).map_err(|e| LinkError::Encode(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LinkError> {
        postcard::from_bytes(bytes).map_err(|e| LinkError::Decode(e.to_string()))
    }

    /// Re-binds native references against `registry` and verifies the code.
    pub fn link(self, registry: &Registry) -> Result<Program, LinkError> {
        if self.format != IMAGE_FORMAT {
            return Err(LinkError::Format {
                found: self.format,
                expected: IMAGE_FORMAT,
            });
        }
        let capacity = registry.config().registers;
        if self.registers > capacity {
            return Err(LinkError::TooManyRegisters {
                registers: self.registers,
                capacity,
            });
        }

        let natives = self
            .natives
            .iter()
            .map(|r| {
                registry
                    .native(r.id)
                    .filter(|n| n.symbol == r.symbol)
                    .cloned()
                    .ok_or_else(|| LinkError::UnknownNative {
                        symbol: r.symbol.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let program = Program::from_parts(self.code, self.registers, natives);
        program.verify()?;
        Ok(program)
    }
}
