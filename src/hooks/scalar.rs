use crate::hooks::{HookSignature, ScriptHook, ScriptOrigin};
use crate::lang::types::ValueType;
use crate::registry::Registry;
use crate::runtime::vm::Worker;

/// Formula hook: two integer inputs, one integer result.
///
/// The first input is writable and doubles as the result register, the
/// second is read-only.
#[derive(Debug)]
pub struct ScalarHook {
    hook: ScriptHook,
}

impl ScalarHook {
    pub fn signature(name: &str, result: &str, input: &str) -> HookSignature {
        HookSignature::new(name)
            .arg_mut(result, ValueType::Int)
            .arg(input, ValueType::Int)
            .returns(1)
    }

    pub fn load(
        registry: &Registry,
        signature: &HookSignature,
        source: Option<&str>,
        context: &str,
    ) -> Self {
        ScalarHook {
            hook: ScriptHook::load(registry, signature, source, context),
        }
    }

    pub fn origin(&self) -> ScriptOrigin {
        self.hook.origin()
    }

    pub fn call(&self, value: i32, input: i32) -> i32 {
        self.call_with(&mut Worker::new(), value, input)
    }

    /// Like [`call`](Self::call) with host objects in `worker`.
    pub fn call_with(&self, worker: &mut Worker<'_>, value: i32, input: i32) -> i32 {
        self.hook.invoke(worker, &[value, input])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn test_scalar_formula() {
        let registry = crate::init_registry().unwrap();
        let signature = ScalarHook::signature("accuracy", "accuracy", "distance");
        let source = indoc! {"
            # lose 2 points per tile after the tenth
            if gt distance 10;
                var int penalty;
                set penalty distance;
            end;
        "};
        // variables must be declared outside blocks
        let rejected = ScalarHook::load(&registry, &signature, Some(source), "mod");
        assert_eq!(rejected.origin(), ScriptOrigin::Identity);
        assert_eq!(rejected.call(70, 15), 70);

        let source = indoc! {"
            var int penalty;
            if gt distance 10;
                set penalty distance;
                sub penalty 10;
                mul penalty 2;
                sub accuracy penalty;
            end;
            limit_lower accuracy 0;
        "};
        let hook = ScalarHook::load(&registry, &signature, Some(source), "mod");
        assert_eq!(hook.origin(), ScriptOrigin::Mod);
        assert_eq!(hook.call(70, 5), 70);
        assert_eq!(hook.call(70, 15), 60);
        assert_eq!(hook.call(10, 40), 0);
    }
}
