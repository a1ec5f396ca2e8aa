use std::thread;

use modscript::bytecode::op::Ret;
use modscript::lang::types::{Param, ValueType};
use modscript::{
    BlitContext, BlitHook, HookSignature, Registry, RegistryBuilder, ScalarHook, ScriptHook,
    ScriptOrigin, Worker, compile, compile_hook,
};

struct Unit {
    health: i32,
    armor: i32,
}

fn registry() -> Registry {
    let mut builder = modscript::standard_builder(Default::default()).unwrap();
    builder.register_type::<Unit>("Unit").unwrap();
    builder.register_getter::<Unit, _>("getHealth", |u| u.health).unwrap();
    builder
        .register_setter::<Unit, _>("setHealth", |u, v| u.health = v)
        .unwrap();
    builder
        .register_method::<Unit, _>("absorb", &[Param::IntVar], "subtract armor", |call| {
            let armor = call.object::<Unit>(0).map(|u| u.armor).unwrap_or(0);
            let damage = call.get(1);
            call.set(1, (damage - armor).max(0));
            Ret::Continue
        })
        .unwrap();
    builder.register_constant("MIN_HEALTH", 1).unwrap();
    builder.build()
}

fn damage_hook(registry: &Registry) -> HookSignature {
    let unit = registry.type_of::<Unit>().unwrap();
    HookSignature::new("damage")
        .arg_mut("damage", ValueType::Int)
        .arg("target", ValueType::PtrE(unit))
        .returns(1)
}

#[test]
fn test_getter_setter_and_method_on_lent_object() {
    let registry = registry();
    let source = "
        var int hp;
        target.absorb damage;
        target.getHealth hp;
        sub hp damage;
        limit_lower hp MIN_HEALTH;
        target.setHealth hp;
    ";
    let hook = ScriptHook::load(&registry, &damage_hook(&registry), Some(source), "test");
    assert_eq!(hook.origin(), ScriptOrigin::Mod);

    let mut unit = Unit {
        health: 30,
        armor: 4,
    };
    {
        let mut worker = Worker::new();
        let handle = worker.host.lend(&mut unit);
        assert_eq!(hook.invoke(&mut worker, &[10, handle]), 6);
        assert_eq!(hook.invoke(&mut worker, &[100, handle]), 96);
    }
    assert_eq!(unit.health, 1);
}

#[test]
fn test_null_handle_is_harmless() {
    let registry = registry();
    let source = "target.setHealth 5; target.getHealth damage;";
    let hook = ScriptHook::load(&registry, &damage_hook(&registry), Some(source), "test");
    assert_eq!(hook.invoke(&mut Worker::new(), &[10, 0]), 0);
}

#[test]
fn test_read_only_handle_rejects_setter() {
    let registry = registry();
    let unit = registry.type_of::<Unit>().unwrap();
    let signature = HookSignature::new("inspect")
        .arg_mut("result", ValueType::Int)
        .arg("target", ValueType::Ptr(unit))
        .returns(1);
    assert!(compile_hook("target.getHealth result;", &registry, &signature).is_ok());
    assert!(compile_hook("target.setHealth 1;", &registry, &signature).is_err());
}

#[test]
fn test_program_image_round_trip() {
    let registry = registry();
    let program = compile_hook(
        "target.absorb damage; mul damage 2;",
        &registry,
        &damage_hook(&registry),
    )
    .unwrap();
    let bytes = program.to_image().to_bytes().unwrap();
    let image = modscript::ProgramImage::from_bytes(&bytes).unwrap();
    let linked = image.clone().link(&registry).unwrap();
    assert_eq!(linked.code(), program.code());

    let mut unit = Unit {
        health: 0,
        armor: 3,
    };
    let mut worker = Worker::new();
    let handle = worker.host.lend(&mut unit);
    let vm = modscript::Vm::new();
    assert_eq!(vm.run(&linked, &mut worker, &[10, handle]), Ok(14));

    // a registry without the binding cannot link the image
    let bare = modscript::init_registry().unwrap();
    assert!(image.link(&bare).is_err());
}

#[test]
fn test_program_is_shared_across_threads() {
    let registry = registry();
    let program = compile("var int i; top: add i 1; add r0 r1; if lt i 100; goto top; end;", &registry)
        .unwrap();

    thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|n| {
                let program = &program;
                scope.spawn(move || modscript::runtime::run(program, &[0, n]))
            })
            .collect();
        for (n, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().unwrap(), Ok(100 * n as i32));
        }
    });
}

#[test]
fn test_registry_lookup_by_rust_type() {
    let registry = registry();
    let mut builder = RegistryBuilder::new().unwrap();
    assert!(builder.register_type::<Unit>("Unit").is_ok());
    assert!(builder.register_type::<Unit>("Unit").is_err());
    assert!(registry.type_of::<Unit>().is_some());
    assert!(registry.describe().contains("Unit.getHealth"));
}

#[test]
fn test_scalar_and_blit_hooks() {
    let registry = registry();
    let signature = ScalarHook::signature("morale", "morale", "casualties")
        .with_default_script("sub morale casualties;");
    let default = ScalarHook::load(&registry, &signature, None, "");
    assert_eq!(default.origin(), ScriptOrigin::Default);
    assert_eq!(default.call(50, 8), 42);

    let broken = ScalarHook::load(&registry, &signature, Some("mul morale;"), "broken mod");
    assert_eq!(broken.origin(), ScriptOrigin::Default);

    let faulty = ScalarHook::load(&registry, &signature, Some("div morale casualties;"), "mod");
    assert_eq!(faulty.call(50, 0), 0);
    assert_eq!(faulty.call(50, 5), 10);

    let blit = BlitHook::load(
        &registry,
        &BlitHook::signature("flash"),
        Some("if eq anim_frame 1; set_shade new_pixel 0; end;"),
        "mod",
    );
    let src = [0x00, 0x27, 0x38];
    let mut dst = [0x01; 3];
    let context = BlitContext {
        anim_frame: 1,
        ..Default::default()
    };
    blit.blit(&src, &mut dst, context, &[], &mut Worker::new());
    assert_eq!(dst, [0x01, 0x20, 0x30]);
}
