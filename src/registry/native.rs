use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::bytecode::codec::{Codec, Operand};
use crate::bytecode::op::Ret;
use crate::runtime::host::HostObjects;
use crate::runtime::registers::RegisterFile;

/// Index of one native version in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NativeId(pub(crate) u32);

pub type NativeFn = Arc<dyn Fn(&mut NativeCall<'_, '_>) -> Ret + Send + Sync>;

/// A host function under one concrete operand layout.
#[derive(Clone)]
pub struct NativeBinding {
    pub id: NativeId,
    /// Operation name, e.g. `Unit.getHealth`.
    pub symbol: String,
    pub layout: Vec<Codec>,
    pub func: NativeFn,
}

impl fmt::Debug for NativeBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeBinding")
            .field("id", &self.id)
            .field("symbol", &self.symbol)
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

/// Arguments of one native call, as seen by the host function.
///
/// Argument positions follow the registered parameter list. Handle
/// arguments resolve through the invocation's [`HostObjects`].
pub struct NativeCall<'a, 'h> {
    operands: &'a [Operand],
    regs: &'a mut RegisterFile,
    host: &'a mut HostObjects<'h>,
}

impl<'a, 'h> NativeCall<'a, 'h> {
    pub(crate) fn new(
        operands: &'a [Operand],
        regs: &'a mut RegisterFile,
        host: &'a mut HostObjects<'h>,
    ) -> Self {
        NativeCall {
            operands,
            regs,
            host,
        }
    }

    pub fn arg_count(&self) -> usize {
        self.operands.len()
    }

    /// Integer value of argument `index`; 0 for positions that carry none.
    pub fn get(&self, index: usize) -> i32 {
        match self.operands.get(index) {
            Some(Operand::Reg(r)) => self.regs.get(*r),
            Some(Operand::Imm(v)) => *v,
            _ => 0,
        }
    }

    /// Stores into argument `index` if it is a register.
    pub fn set(&mut self, index: usize, value: i32) {
        if let Some(Operand::Reg(r)) = self.operands.get(index) {
            self.regs.set(*r, value);
        }
    }

    /// Host object behind the handle in argument `index`.
    pub fn object<T: Any>(&self, index: usize) -> Option<&T> {
        self.host.get::<T>(self.get(index))
    }

    /// Mutable host object behind the handle in argument `index`; `None`
    /// for null handles and objects passed read-only.
    pub fn object_mut<T: Any>(&mut self, index: usize) -> Option<&mut T> {
        let handle = self.get(index);
        self.host.get_mut::<T>(handle)
    }
}
