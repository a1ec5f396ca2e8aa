//! Operand encodings.
//!
//! Every argument position of a concrete opcode version has one codec. The
//! compiler encodes resolved arguments through it and the VM decodes the
//! same bytes back into [`Operand`]s before calling the handler.

use std::fmt;

use crate::bytecode::ir::ProgramPos;
use crate::bytecode::writer::CodeWriter;
use crate::lang::names::LabelId;
use crate::lang::types::Param;

/// A decoded operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Reg(u8),
    Imm(i32),
    Label(ProgramPos),
    Native(u16),
    /// Operand block inside the program code.
    Raw { start: u32, len: u8 },
}

/// An argument ready to be encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitArg<'a> {
    Const(i32),
    Reg(u8),
    Label(LabelId),
    Native(u16),
    Raw(&'a [u8]),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeError {
    pub codec: &'static str,
    pub arg: String,
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} codec cannot encode {}", self.codec, self.arg)
    }
}

pub trait ArgCodec: Send + Sync {
    fn name(&self) -> &'static str;

    fn encode(&self, arg: &EmitArg<'_>, out: &mut CodeWriter) -> Result<(), EncodeError>;

    /// Decodes the operand at `at`, returning it with its encoded width.
    fn decode(&self, code: &[u8], at: usize) -> Option<(Operand, usize)>;

    fn mismatch(&self, arg: &EmitArg<'_>) -> EncodeError {
        EncodeError {
            codec: self.name(),
            arg: format!("{:?}", arg),
        }
    }
}

pub type Codec = &'static dyn ArgCodec;

impl fmt::Debug for dyn ArgCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn read_array<const N: usize>(code: &[u8], at: usize) -> Option<[u8; N]> {
    code.get(at..at.checked_add(N)?)?.try_into().ok()
}

/// One register index byte.
pub struct RegCodec;

/// 32-bit little-endian immediate.
pub struct ImmCodec;

/// 32-bit little-endian program position, back-filled once labels resolve.
pub struct LabelCodec;

/// 16-bit index into the program's native table.
pub struct NativeCodec;

/// Length byte followed by that many opaque bytes.
pub struct RawCodec;

pub static REG: RegCodec = RegCodec;
pub static IMM: ImmCodec = ImmCodec;
pub static LABEL: LabelCodec = LabelCodec;
pub static NATIVE: NativeCodec = NativeCodec;
pub static RAW: RawCodec = RawCodec;

impl ArgCodec for RegCodec {
    fn name(&self) -> &'static str {
        "register"
    }

    fn encode(&self, arg: &EmitArg<'_>, out: &mut CodeWriter) -> Result<(), EncodeError> {
        match arg {
            EmitArg::Reg(index) => {
                out.push_u8(*index);
                Ok(())
            }
            other => Err(self.mismatch(other)),
        }
    }

    fn decode(&self, code: &[u8], at: usize) -> Option<(Operand, usize)> {
        code.get(at).map(|&r| (Operand::Reg(r), 1))
    }
}

impl ArgCodec for ImmCodec {
    fn name(&self) -> &'static str {
        "immediate"
    }

    fn encode(&self, arg: &EmitArg<'_>, out: &mut CodeWriter) -> Result<(), EncodeError> {
        match arg {
            EmitArg::Const(value) => {
                out.push_i32(*value);
                Ok(())
            }
            other => Err(self.mismatch(other)),
        }
    }

    fn decode(&self, code: &[u8], at: usize) -> Option<(Operand, usize)> {
        read_array::<4>(code, at).map(|b| (Operand::Imm(i32::from_le_bytes(b)), 4))
    }
}

impl ArgCodec for LabelCodec {
    fn name(&self) -> &'static str {
        "label"
    }

    fn encode(&self, arg: &EmitArg<'_>, out: &mut CodeWriter) -> Result<(), EncodeError> {
        match arg {
            EmitArg::Label(label) => {
                out.push_label(*label);
                Ok(())
            }
            other => Err(self.mismatch(other)),
        }
    }

    fn decode(&self, code: &[u8], at: usize) -> Option<(Operand, usize)> {
        read_array::<4>(code, at)
            .map(|b| (Operand::Label(ProgramPos::new(u32::from_le_bytes(b))), 4))
    }
}

impl ArgCodec for NativeCodec {
    fn name(&self) -> &'static str {
        "native"
    }

    fn encode(&self, arg: &EmitArg<'_>, out: &mut CodeWriter) -> Result<(), EncodeError> {
        match arg {
            EmitArg::Native(index) => {
                out.push_bytes(&index.to_le_bytes());
                Ok(())
            }
            other => Err(self.mismatch(other)),
        }
    }

    fn decode(&self, code: &[u8], at: usize) -> Option<(Operand, usize)> {
        read_array::<2>(code, at).map(|b| (Operand::Native(u16::from_le_bytes(b)), 2))
    }
}

impl ArgCodec for RawCodec {
    fn name(&self) -> &'static str {
        "raw"
    }

    fn encode(&self, arg: &EmitArg<'_>, out: &mut CodeWriter) -> Result<(), EncodeError> {
        match arg {
            EmitArg::Raw(bytes) => {
                let len = u8::try_from(bytes.len()).map_err(|_| self.mismatch(arg))?;
                out.push_u8(len);
                out.push_bytes(bytes);
                Ok(())
            }
            other => Err(self.mismatch(other)),
        }
    }

    fn decode(&self, code: &[u8], at: usize) -> Option<(Operand, usize)> {
        let len = *code.get(at)?;
        let start = at + 1;
        code.get(start..start + usize::from(len))?;
        let start = u32::try_from(start).ok()?;
        Some((Operand::Raw { start, len }, 1 + usize::from(len)))
    }
}

/// Codec for `param` under the given encoding choice (see
/// [`Param::choices`]).
pub fn codec_for(param: Param, choice: u16) -> Codec {
    match param {
        Param::Int if choice == 0 => &IMM,
        Param::Int | Param::IntVar | Param::Ptr(_) | Param::PtrE(_) => &REG,
        Param::Label => &LABEL,
        Param::Native => &NATIVE,
        Param::Raw => &RAW,
    }
}

/// Concrete operand layout of one overload version.
pub fn layout_for(params: &[Param], version: u16) -> Vec<Codec> {
    let choices = crate::lang::types::choices_of(params, version);
    params
        .iter()
        .zip(choices)
        .map(|(&param, choice)| codec_for(param, choice))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_selection() {
        assert_eq!(codec_for(Param::Int, 0).name(), "immediate");
        assert_eq!(codec_for(Param::Int, 1).name(), "register");
        assert_eq!(codec_for(Param::IntVar, 0).name(), "register");
        assert_eq!(codec_for(Param::Label, 0).name(), "label");
    }

    #[test]
    fn test_layout_follows_version() {
        let params = [Param::IntVar, Param::Int];
        let names = |v| -> Vec<&str> { layout_for(&params, v).iter().map(|c| c.name()).collect() };
        assert_eq!(names(0), vec!["register", "immediate"]);
        assert_eq!(names(1), vec!["register", "register"]);
    }

    #[test]
    fn test_decode_immediate() {
        let code = [0xAA, 0xFE, 0xFF, 0xFF, 0xFF];
        assert_eq!(IMM.decode(&code, 1), Some((Operand::Imm(-2), 4)));
        assert_eq!(IMM.decode(&code, 2), None);
    }

    #[test]
    fn test_decode_raw() {
        let code = [2, 7, 9, 1];
        assert_eq!(RAW.decode(&code, 0), Some((Operand::Raw { start: 1, len: 2 }, 3)));
        assert_eq!(RAW.decode(&[5, 1], 0), None);
    }

    #[test]
    fn test_encode_mismatch() {
        let mut w = CodeWriter::new();
        let err = REG.encode(&EmitArg::Const(1), &mut w).unwrap_err();
        assert_eq!(err.codec, "register");
    }

    #[test]
    fn test_encode_label_reserves_placeholder() {
        let mut w = CodeWriter::new();
        let label = w.new_label();
        LABEL.encode(&EmitArg::Label(label), &mut w).unwrap();
        assert_eq!(w.len(), 4);
        assert!(w.bytes().iter().all(|&b| b == 0));
    }
}
