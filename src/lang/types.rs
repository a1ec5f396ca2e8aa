use serde::{Deserialize, Serialize};

/// Identity of a value type known to scripts.
///
/// `int` is always tag 0; each host type registered in the
/// [`Registry`](crate::registry::Registry) receives the next free tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TypeTag(pub(crate) u16);

impl TypeTag {
    pub const INT: TypeTag = TypeTag(0);

    pub fn index(self) -> u16 {
        self.0
    }
}

/// Type of a script variable or register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Int,
    /// Read-only handle to a host object.
    Ptr(TypeTag),
    /// Handle to a host object that natives may modify.
    PtrE(TypeTag),
}

impl ValueType {
    pub fn is_int(self) -> bool {
        matches!(self, ValueType::Int)
    }

    pub fn tag(self) -> TypeTag {
        match self {
            ValueType::Int => TypeTag::INT,
            ValueType::Ptr(tag) | ValueType::PtrE(tag) => tag,
        }
    }
}

/// Static category of one argument in a statement, after name resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    None,
    /// Program counter of the running script.
    Prog,
    /// The executing worker.
    Context,
    /// Immediate integer constant.
    Const,
    /// Register holding a value of the given type.
    Reg(ValueType),
    Label,
    /// Opaque operand block consumed by native calls.
    Raw,
    /// Index into a program's native function table.
    Native,
    /// A type name (`int`, host types); only meaningful to `var`.
    Type(ValueType),
}

/// What one argument position of an overload accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Param {
    /// Integer read from an immediate or any int register.
    Int,
    /// Writable int register.
    IntVar,
    Label,
    /// Any handle to the given host type.
    Ptr(TypeTag),
    /// Editable handle to the given host type.
    PtrE(TypeTag),
    Native,
    Raw,
}

/// Match quality per argument; higher is more specific.
pub const SCORE_EXACT: u32 = 2;
pub const SCORE_COMPATIBLE: u32 = 1;

impl Param {
    /// Number of encodings this position has; `Int` may be an immediate or a
    /// register, every other position has one.
    pub fn choices(self) -> u16 {
        match self {
            Param::Int => 2,
            _ => 1,
        }
    }

    /// Scores `arg` against this position, `None` if incompatible.
    ///
    /// `writable` is only meaningful for registers.
    pub fn score(self, arg: ArgType, writable: bool) -> Option<u32> {
        match (self, arg) {
            (Param::Int, ArgType::Const) | (Param::Int, ArgType::Reg(ValueType::Int)) => {
                Some(SCORE_EXACT)
            }
            (Param::IntVar, ArgType::Reg(ValueType::Int)) if writable => Some(SCORE_EXACT),
            (Param::Label, ArgType::Label) => Some(SCORE_EXACT),
            (Param::Ptr(want), ArgType::Reg(ValueType::Ptr(have))) if want == have => {
                Some(SCORE_EXACT)
            }
            (Param::Ptr(want), ArgType::Reg(ValueType::PtrE(have))) if want == have => {
                Some(SCORE_COMPATIBLE)
            }
            (Param::PtrE(want), ArgType::Reg(ValueType::PtrE(have))) if want == have => {
                Some(SCORE_EXACT)
            }
            (Param::Native, ArgType::Native) | (Param::Raw, ArgType::Raw) => Some(SCORE_EXACT),
            _ => None,
        }
    }

    /// Whether a name that resolves to nothing may still fill this position
    /// (it becomes a forward label reference).
    pub fn accepts_forward_label(self) -> bool {
        matches!(self, Param::Label)
    }
}

/// Number of concrete versions of an overload with these parameters,
/// `None` if it does not fit the version space.
pub fn version_count(params: &[Param]) -> Option<u16> {
    params
        .iter()
        .try_fold(1u16, |count, p| count.checked_mul(p.choices()))
}

/// Mixed-radix version number from per-position choices, first position
/// most significant.
pub fn version_of(params: &[Param], choices: &[u16]) -> u16 {
    params
        .iter()
        .zip(choices)
        .fold(0, |acc, (param, choice)| acc * param.choices() + choice)
}

/// Inverse of [`version_of`].
pub fn choices_of(params: &[Param], mut version: u16) -> Vec<u16> {
    let mut choices = vec![0; params.len()];
    for (slot, param) in choices.iter_mut().zip(params).rev() {
        let radix = param.choices();
        *slot = version % radix;
        version /= radix;
    }
    choices
}
