//! Builtin instruction handlers.
//!
//! Every handler receives its operands already decoded. Argument 0 is the
//! destination for arithmetic operations; all arithmetic wraps.

use tracing::debug;

use crate::bytecode::codec::Operand;
use crate::bytecode::ir::{Program, ProgramPos};
use crate::bytecode::op::Ret;
use crate::registry::native::NativeCall;
use crate::runtime::host::HostObjects;
use crate::runtime::registers::RegisterFile;
use crate::runtime::runtime_error::Fault;
use crate::runtime::vm::MAX_OPERANDS;

/// State a handler may touch while executing one instruction.
pub struct Exec<'a, 'h> {
    pub(crate) regs: &'a mut RegisterFile,
    pub(crate) host: &'a mut HostObjects<'h>,
    pub(crate) program: &'a Program,
    pub(crate) operands: &'a [Operand],
    /// Where execution continues; preset to the following instruction.
    pub(crate) next: ProgramPos,
}

impl Exec<'_, '_> {
    fn get(&self, index: usize) -> i32 {
        match self.operands.get(index) {
            Some(Operand::Reg(r)) => self.regs.get(*r),
            Some(Operand::Imm(v)) => *v,
            _ => 0,
        }
    }

    fn set(&mut self, index: usize, value: i32) {
        if let Some(Operand::Reg(r)) = self.operands.get(index) {
            self.regs.set(*r, value);
        }
    }

    fn jump(&mut self, index: usize) {
        if let Some(Operand::Label(target)) = self.operands.get(index) {
            self.next = *target;
        }
    }

    fn update(&mut self, f: impl FnOnce(i32, i32) -> i32) -> Ret {
        let value = f(self.get(0), self.get(1));
        self.set(0, value);
        Ret::Continue
    }
}

pub fn exit(_: &mut Exec<'_, '_>) -> Ret {
    Ret::End
}

pub fn return_value(exec: &mut Exec<'_, '_>) -> Ret {
    let value = exec.get(0);
    exec.regs.set(0, value);
    Ret::End
}

pub fn goto(exec: &mut Exec<'_, '_>) -> Ret {
    exec.jump(0);
    Ret::Continue
}

pub fn set(exec: &mut Exec<'_, '_>) -> Ret {
    exec.update(|_, b| b)
}

pub fn clear(exec: &mut Exec<'_, '_>) -> Ret {
    exec.set(0, 0);
    Ret::Continue
}

pub fn swap(exec: &mut Exec<'_, '_>) -> Ret {
    let (a, b) = (exec.get(0), exec.get(1));
    exec.set(0, b);
    exec.set(1, a);
    Ret::Continue
}

pub fn add(exec: &mut Exec<'_, '_>) -> Ret {
    exec.update(i32::wrapping_add)
}

pub fn sub(exec: &mut Exec<'_, '_>) -> Ret {
    exec.update(i32::wrapping_sub)
}

pub fn mul(exec: &mut Exec<'_, '_>) -> Ret {
    exec.update(i32::wrapping_mul)
}

pub fn aggregate(exec: &mut Exec<'_, '_>) -> Ret {
    let value = exec.get(0).wrapping_add(exec.get(1).wrapping_mul(exec.get(2)));
    exec.set(0, value);
    Ret::Continue
}

pub fn offset(exec: &mut Exec<'_, '_>) -> Ret {
    let value = exec.get(0).wrapping_mul(exec.get(1)).wrapping_add(exec.get(2));
    exec.set(0, value);
    Ret::Continue
}

pub fn offsetmod(exec: &mut Exec<'_, '_>) -> Ret {
    let modulus = exec.get(3);
    if modulus == 0 {
        return Ret::Error(Fault::DivisionByZero);
    }
    let a = i64::from(exec.get(0).wrapping_mul(exec.get(1)).wrapping_add(exec.get(2)));
    let m = i64::from(modulus);
    // result takes the sign of the modulus
    exec.set(0, ((a % m + m) % m) as i32);
    Ret::Continue
}

pub fn div(exec: &mut Exec<'_, '_>) -> Ret {
    if exec.get(1) == 0 {
        return Ret::Error(Fault::DivisionByZero);
    }
    exec.update(i32::wrapping_div)
}

pub fn rem(exec: &mut Exec<'_, '_>) -> Ret {
    if exec.get(1) == 0 {
        return Ret::Error(Fault::DivisionByZero);
    }
    exec.update(i32::wrapping_rem)
}

pub fn shl(exec: &mut Exec<'_, '_>) -> Ret {
    exec.update(|a, b| a.wrapping_shl(b as u32))
}

pub fn shr(exec: &mut Exec<'_, '_>) -> Ret {
    exec.update(|a, b| a.wrapping_shr(b as u32))
}

pub fn abs(exec: &mut Exec<'_, '_>) -> Ret {
    exec.update(|a, _| a.wrapping_abs())
}

pub fn limit(exec: &mut Exec<'_, '_>) -> Ret {
    let (lower, upper) = (exec.get(1), exec.get(2));
    let value = exec.get(0).min(upper).max(lower);
    exec.set(0, value);
    Ret::Continue
}

pub fn limit_upper(exec: &mut Exec<'_, '_>) -> Ret {
    exec.update(i32::min)
}

pub fn limit_lower(exec: &mut Exec<'_, '_>) -> Ret {
    exec.update(i32::max)
}

/// Reduces argument 0 into `0..period` and hands it to `shape` together
/// with the width and height arguments.
fn wavegen(exec: &mut Exec<'_, '_>, shape: fn(i32, i32, i32) -> i32) -> Ret {
    let period = exec.get(1);
    if period <= 0 {
        return Ret::Error(Fault::NonPositivePeriod);
    }
    let mut phase = exec.get(0) % period;
    if phase < 0 {
        phase += period;
    }
    let value = shape(phase, exec.get(2), exec.get(3));
    exec.set(0, value);
    Ret::Continue
}

pub fn wavegen_rect(exec: &mut Exec<'_, '_>) -> Ret {
    wavegen(exec, |phase, size, max| if phase > size { 0 } else { max })
}

pub fn wavegen_saw(exec: &mut Exec<'_, '_>) -> Ret {
    wavegen(exec, |phase, size, max| if phase > size { 0 } else { phase.min(max) })
}

pub fn wavegen_tri(exec: &mut Exec<'_, '_>) -> Ret {
    wavegen(exec, |phase, size, max| {
        if phase > size {
            return 0;
        }
        let phase = if phase > size / 2 { size - phase } else { phase };
        phase.min(max)
    })
}

pub fn get_color(exec: &mut Exec<'_, '_>) -> Ret {
    exec.update(|_, pixel| pixel >> 4)
}

pub fn set_color(exec: &mut Exec<'_, '_>) -> Ret {
    exec.update(|pixel, color| (pixel & 0xF) | (color << 4))
}

pub fn get_shade(exec: &mut Exec<'_, '_>) -> Ret {
    exec.update(|_, pixel| pixel & 0xF)
}

pub fn set_shade(exec: &mut Exec<'_, '_>) -> Ret {
    exec.update(|pixel, shade| (pixel & 0xF0) | (shade & 0xF))
}

pub fn add_shade(exec: &mut Exec<'_, '_>) -> Ret {
    exec.update(shade_pixel)
}

/// Darkens a palette pixel by `shade` steps within its color group.
pub fn shade_pixel(pixel: i32, shade: i32) -> i32 {
    let shaded = (pixel & 0xF).wrapping_add(shade);
    if shaded > 0xF {
        pixel | 0xF
    } else if shaded > 0 {
        (pixel & 0xF0) | shaded
    } else {
        pixel & 0xF0
    }
}

fn branch(exec: &mut Exec<'_, '_>, taken: bool) -> Ret {
    exec.jump(if taken { 2 } else { 3 });
    Ret::Continue
}

pub fn test_le(exec: &mut Exec<'_, '_>) -> Ret {
    let taken = exec.get(0) <= exec.get(1);
    branch(exec, taken)
}

pub fn test_eq(exec: &mut Exec<'_, '_>) -> Ret {
    let taken = exec.get(0) == exec.get(1);
    branch(exec, taken)
}

/// Decodes the operand block of a native function and invokes it.
pub fn call(exec: &mut Exec<'_, '_>) -> Ret {
    let program = exec.program;
    let (Some(&Operand::Native(index)), Some(&Operand::Raw { start, len })) =
        (exec.operands.first(), exec.operands.get(1))
    else {
        return Ret::Error(Fault::Native("malformed call"));
    };
    let Some(binding) = program.native(index) else {
        return Ret::Error(Fault::Native("unknown native index"));
    };

    let start = start as usize;
    let Some(block) = program.code().get(..start + usize::from(len)) else {
        return Ret::Error(Fault::Truncated);
    };
    let mut args = [Operand::Imm(0); MAX_OPERANDS];
    let mut cursor = start;
    for (slot, codec) in args.iter_mut().zip(&binding.layout) {
        let Some((operand, width)) = codec.decode(block, cursor) else {
            return Ret::Error(Fault::Truncated);
        };
        *slot = operand;
        cursor += width;
    }

    let arity = binding.layout.len().min(MAX_OPERANDS);
    let mut native = NativeCall::new(&args[..arity], exec.regs, exec.host);
    (binding.func)(&mut native)
}

pub fn debug_log(exec: &mut Exec<'_, '_>) -> Ret {
    if exec.operands.len() > 1 {
        debug!(target: "modscript::script", a = exec.get(0), b = exec.get(1), "debug_log");
    } else {
        debug!(target: "modscript::script", a = exec.get(0), "debug_log");
    }
    Ret::Continue
}
