use crate::bytecode::ir::Program;
use crate::hooks::{HookSignature, ScriptHook, ScriptOrigin};
use crate::lang::types::ValueType;
use crate::registry::Registry;
use crate::runtime::ops::shade_pixel;
use crate::runtime::vm::Worker;

/// Per-blit values shared by every pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlitContext {
    pub shade: i32,
    pub anim_frame: i32,
    pub blit_part: i32,
}

/// Sprite recoloring hook, invoked once per non-transparent source pixel.
///
/// Registers: `new_pixel` (seeded with the source pixel, result),
/// `old_pixel`, `shade`, `anim_frame`, `blit_part`, then any host handles
/// the signature adds.
#[derive(Debug)]
pub struct BlitHook {
    hook: ScriptHook,
}

const FIXED_ARGS: usize = 5;

impl BlitHook {
    pub fn signature(name: &str) -> HookSignature {
        HookSignature::new(name)
            .arg_mut("new_pixel", ValueType::Int)
            .arg("old_pixel", ValueType::Int)
            .arg("shade", ValueType::Int)
            .arg("anim_frame", ValueType::Int)
            .arg("blit_part", ValueType::Int)
            .returns(1)
    }

    pub fn load(
        registry: &Registry,
        signature: &HookSignature,
        source: Option<&str>,
        context: &str,
    ) -> Self {
        BlitHook {
            hook: ScriptHook::load(registry, signature, source, context),
        }
    }

    pub fn origin(&self) -> ScriptOrigin {
        self.hook.origin()
    }

    /// Composes `src` over `dst` pixel by pixel. Source pixel 0 is
    /// transparent; a result that wraps to 0 leaves the destination
    /// untouched.
    /// `handles` fill the registers after the fixed arguments.
    pub fn blit(
        &self,
        src: &[u8],
        dst: &mut [u8],
        context: BlitContext,
        handles: &[i32],
        worker: &mut Worker<'_>,
    ) {
        match self.hook.program() {
            Some(program) => {
                let mut inputs = Vec::with_capacity(FIXED_ARGS + handles.len());
                inputs.extend_from_slice(&[0, 0, context.shade, context.anim_frame, context.blit_part]);
                inputs.extend_from_slice(handles);
                compose(src, dst, |new, old| {
                    self.scripted(program, worker, &mut inputs, new, old)
                });
            }
            None => compose(src, dst, |new, _| shade_pixel(new, context.shade)),
        }
    }

    fn scripted(
        &self,
        program: &Program,
        worker: &mut Worker<'_>,
        inputs: &mut [i32],
        new: i32,
        old: i32,
    ) -> i32 {
        inputs[0] = new;
        inputs[1] = old;
        self.hook.run(program, worker, inputs)
    }
}

/// Results wrap to the 8-bit palette; index 0 is never written.
fn compose(src: &[u8], dst: &mut [u8], mut pixel: impl FnMut(i32, i32) -> i32) {
    for (&s, d) in src.iter().zip(dst.iter_mut()) {
        if s == 0 {
            continue;
        }
        let index = (pixel(i32::from(s), i32::from(*d)) & 0xFF) as u8;
        if index != 0 {
            *d = index;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryBuilder;

    struct Soldier {
        rank: i32,
    }

    #[test]
    fn test_fallback_applies_shade() {
        let registry = crate::init_registry().unwrap();
        let hook = BlitHook::load(&registry, &BlitHook::signature("recolor"), None, "");
        assert_eq!(hook.origin(), ScriptOrigin::Identity);

        let src = [0x00, 0x34, 0x3E];
        let mut dst = [0x11, 0x22, 0x33];
        let context = BlitContext {
            shade: 3,
            ..BlitContext::default()
        };
        hook.blit(&src, &mut dst, context, &[], &mut Worker::new());
        assert_eq!(dst, [0x11, 0x37, 0x3F]);
    }

    #[test]
    fn test_script_recolors_and_keeps_transparency() {
        let registry = crate::init_registry().unwrap();
        let source = "if eq blit_part 2; set_color new_pixel 5; else; clear new_pixel; end;";
        let hook = BlitHook::load(&registry, &BlitHook::signature("recolor"), Some(source), "mod");
        assert_eq!(hook.origin(), ScriptOrigin::Mod);

        let src = [0x00, 0x34, 0x47];
        let mut dst = [0x11, 0x22, 0x33];
        let torso = BlitContext {
            blit_part: 2,
            ..BlitContext::default()
        };
        hook.blit(&src, &mut dst, torso, &[], &mut Worker::new());
        assert_eq!(dst, [0x11, 0x54, 0x57]);

        // a zero result leaves the destination alone
        let mut dst = [0x11, 0x22, 0x33];
        hook.blit(&src, &mut dst, BlitContext::default(), &[], &mut Worker::new());
        assert_eq!(dst, [0x11, 0x22, 0x33]);
    }

    #[test]
    fn test_results_wrap_to_palette() {
        let registry = crate::init_registry().unwrap();
        let source = "set new_pixel old_pixel; add new_pixel 0x100; add new_pixel anim_frame;";
        let hook = BlitHook::load(&registry, &BlitHook::signature("wrap"), Some(source), "mod");

        let src = [0x10, 0x10, 0x10];
        let mut dst = [0x22, 0xFF, 0x00];
        let context = BlitContext {
            anim_frame: 1,
            ..BlitContext::default()
        };
        hook.blit(&src, &mut dst, context, &[], &mut Worker::new());
        // 0x123 -> 0x23, 0x200 -> 0x00 (skipped), 0x101 -> 0x01
        assert_eq!(dst, [0x23, 0xFF, 0x01]);
    }

    #[test]
    fn test_script_reads_old_pixel_and_host_handle() {
        let mut builder = RegistryBuilder::new().unwrap();
        let tag = builder.register_type::<Soldier>("Soldier").unwrap();
        builder.register_getter::<Soldier, _>("getRank", |s| s.rank).unwrap();
        let registry = builder.build();

        let signature = BlitHook::signature("soldier").arg("soldier", ValueType::Ptr(tag));
        let source = "var int rank; soldier.getRank rank; if ge rank 3; set new_pixel old_pixel; end;";
        let hook = BlitHook::load(&registry, &signature, Some(source), "mod");
        assert_eq!(hook.origin(), ScriptOrigin::Mod);

        let veteran = Soldier { rank: 4 };
        let mut worker = Worker::new();
        let handle = worker.host.share(&veteran);
        let src = [0x34, 0x35];
        let mut dst = [0x60, 0x70];
        hook.blit(&src, &mut dst, BlitContext::default(), &[handle], &mut worker);
        assert_eq!(dst, [0x60, 0x70]);

        let mut dst = [0x60, 0x70];
        hook.blit(&src, &mut dst, BlitContext::default(), &[0], &mut worker);
        assert_eq!(dst, [0x34, 0x35]);
    }
}
