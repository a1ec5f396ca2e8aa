use std::sync::LazyLock;

use crate::bytecode::codec::{Codec, layout_for};
use crate::lang::types::{Param, version_count};
use crate::runtime::ops::{self, Exec};
use crate::runtime::runtime_error::Fault;

/// Outcome of one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ret {
    Continue,
    /// Stop; register 0 holds the result.
    End,
    Error(Fault),
}

pub type Handler = fn(&mut Exec<'_, '_>) -> Ret;

/// One builtin overload. Overloads sharing a name form one operation.
pub struct Builtin {
    pub name: &'static str,
    pub params: &'static [Param],
    pub handler: Handler,
    pub doc: &'static str,
}

use Param::{Int, IntVar, Label, Native, Raw};

macro_rules! builtin {
    ($name:literal, [$($param:expr),*], $handler:path, $doc:literal) => {
        Builtin {
            name: $name,
            params: &[$($param),*],
            handler: $handler,
            doc: $doc,
        }
    };
}

/// Every builtin instruction, in opcode order.
pub static BUILTINS: &[Builtin] = &[
    builtin!("exit", [], ops::exit, "end the script, result is r0"),
    builtin!("return", [], ops::exit, "end the script, result is r0"),
    builtin!("return", [Int], ops::return_value, "end the script with the given result"),
    builtin!("goto", [Label], ops::goto, "jump to label"),
    builtin!("set", [IntVar, Int], ops::set, "a = b"),
    builtin!("clear", [IntVar], ops::clear, "a = 0"),
    builtin!("swap", [IntVar, IntVar], ops::swap, "exchange a and b"),
    builtin!("add", [IntVar, Int], ops::add, "a = a + b"),
    builtin!("sub", [IntVar, Int], ops::sub, "a = a - b"),
    builtin!("mul", [IntVar, Int], ops::mul, "a = a * b"),
    builtin!("aggregate", [IntVar, Int, Int], ops::aggregate, "a = a + b * c"),
    builtin!("offset", [IntVar, Int, Int], ops::offset, "a = a * b + c"),
    builtin!(
        "offsetmod",
        [IntVar, Int, Int, Int],
        ops::offsetmod,
        "a = (a * b + c) modulo d, result in the sign of d"
    ),
    builtin!("div", [IntVar, Int], ops::div, "a = a / b, error if b is 0"),
    builtin!("mod", [IntVar, Int], ops::rem, "a = a % b, error if b is 0"),
    builtin!("shl", [IntVar, Int], ops::shl, "a = a << b"),
    builtin!("shr", [IntVar, Int], ops::shr, "a = a >> b (arithmetic)"),
    builtin!("abs", [IntVar], ops::abs, "a = |a|"),
    builtin!("limit", [IntVar, Int, Int], ops::limit, "clamp a into b..=c"),
    builtin!("limit_upper", [IntVar, Int], ops::limit_upper, "a = min(a, b)"),
    builtin!("limit_lower", [IntVar, Int], ops::limit_lower, "a = max(a, b)"),
    builtin!(
        "wavegen_rect",
        [IntVar, Int, Int, Int],
        ops::wavegen_rect,
        "rectangle wave: period b, width c, height d"
    ),
    builtin!(
        "wavegen_saw",
        [IntVar, Int, Int, Int],
        ops::wavegen_saw,
        "sawtooth wave: period b, width c, height d"
    ),
    builtin!(
        "wavegen_tri",
        [IntVar, Int, Int, Int],
        ops::wavegen_tri,
        "triangle wave: period b, width c, height d"
    ),
    builtin!("get_color", [IntVar, Int], ops::get_color, "a = color group of pixel b"),
    builtin!("set_color", [IntVar, Int], ops::set_color, "replace color group of a with b"),
    builtin!("get_shade", [IntVar, Int], ops::get_shade, "a = shade of pixel b"),
    builtin!("set_shade", [IntVar, Int], ops::set_shade, "replace shade of a with b"),
    builtin!("add_shade", [IntVar, Int], ops::add_shade, "darken a by b, saturating"),
    builtin!(
        "test_le",
        [Int, Int, Label, Label],
        ops::test_le,
        "jump to c if a <= b, else to d"
    ),
    builtin!(
        "test_eq",
        [Int, Int, Label, Label],
        ops::test_eq,
        "jump to c if a == b, else to d"
    ),
    builtin!("call", [Native, Raw], ops::call, "call a host function"),
    builtin!("debug_log", [Int], ops::debug_log, "log a value"),
    builtin!("debug_log", [Int, Int], ops::debug_log, "log two values"),
];

/// One concrete opcode: a builtin overload under one operand encoding.
pub struct OpcodeEntry {
    pub name: &'static str,
    pub builtin: usize,
    pub version: u16,
    pub layout: Vec<Codec>,
    pub handler: Handler,
}

/// Dispatch table, built once from [`BUILTINS`].
pub struct OpcodeTable {
    entries: Vec<OpcodeEntry>,
    bases: Vec<usize>,
}

pub static OPCODES: LazyLock<OpcodeTable> = LazyLock::new(OpcodeTable::build);

impl OpcodeTable {
    fn build() -> Self {
        let mut entries = Vec::new();
        let mut bases = Vec::with_capacity(BUILTINS.len());
        for (index, builtin) in BUILTINS.iter().enumerate() {
            bases.push(entries.len());
            for version in 0..version_count(builtin.params).unwrap_or(0) {
                entries.push(OpcodeEntry {
                    name: builtin.name,
                    builtin: index,
                    version,
                    layout: layout_for(builtin.params, version),
                    handler: builtin.handler,
                });
            }
        }
        OpcodeTable { entries, bases }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether every opcode fits in one byte.
    pub fn fits(&self) -> bool {
        self.entries.len() <= usize::from(u8::MAX) + 1
    }

    pub fn get(&self, opcode: u8) -> Option<&OpcodeEntry> {
        self.entries.get(usize::from(opcode))
    }

    /// First opcode of builtin number `builtin`.
    pub fn base(&self, builtin: usize) -> Option<u8> {
        self.bases
            .get(builtin)
            .and_then(|&base| u8::try_from(base).ok())
    }

    pub fn base_of(&self, name: &str, arity: usize) -> Option<u8> {
        BUILTINS
            .iter()
            .position(|b| b.name == name && b.params.len() == arity)
            .and_then(|index| self.base(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, &OpcodeEntry)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(opcode, entry)| (opcode as u8, entry))
    }
}
