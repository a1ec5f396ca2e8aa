use indoc::indoc;
use modscript::bytecode::disasm::disassemble;
use modscript::runtime::{Fault, run};
use modscript::{CompileErrorKind, ExecConfig, Program, Registry, Vm, Worker, compile, init_registry};

fn registry() -> Registry {
    init_registry().unwrap()
}

fn compile_ok(source: &str) -> Program {
    match compile(source, &registry()) {
        Ok(program) => program,
        Err(err) => panic!("compile failed: {}\n{}", err, err.statement),
    }
}

#[test]
fn test_counting_loop() {
    let source = indoc! {"
        var int i 0;
        var int sum;
        loop:
            add i 1;
            add sum i;
            if lt i 10;
                goto loop;
            end;
        return sum;
    "};
    let program = compile_ok(source);
    assert_eq!(run(&program, &[]), Ok(55));
}

#[test]
fn test_inputs_seed_registers() {
    let source = indoc! {"
        # r0 is the result, r1 a read-only input by convention
        if r1 ge 100;
            set r0 100;
        else gt r1 50;
            set r0 50;
        else;
            clear r0;
        end;
    "};
    let program = compile_ok(source);
    assert_eq!(run(&program, &[7, 150]), Ok(100));
    assert_eq!(run(&program, &[7, 60]), Ok(50));
    assert_eq!(run(&program, &[7, 50]), Ok(0));
}

#[test]
fn test_compilation_is_deterministic() {
    let source = "var int x 3; mul x r1; if le x 10; add r0 x; end; shl r0 2;";
    let first = compile_ok(source);
    let second = compile_ok(source);
    assert_eq!(first.code(), second.code());
    assert_eq!(disassemble(&first), disassemble(&second));
    assert_eq!(run(&first, &[1, 3]), Ok(40));
}

#[test]
fn test_palette_helpers() {
    let source = indoc! {"
        var int color;
        var int shade;
        get_color color r1;
        get_shade shade r1;
        set r0 color;
        mul r0 100;
        add r0 shade;
    "};
    assert_eq!(run(&compile_ok(source), &[0, 0x4B]), Ok(411));

    let program = compile_ok("set_shade r0 2; add_shade r0 r1;");
    assert_eq!(run(&program, &[0x37, 3]), Ok(0x35));
    assert_eq!(run(&program, &[0x37, 20]), Ok(0x3F));
}

#[test]
fn test_arithmetic_edges() {
    assert_eq!(run(&compile_ok("offsetmod r0 1 0 5;"), &[-7]), Ok(3));
    assert_eq!(run(&compile_ok("limit r0 0 10;"), &[-4]), Ok(0));
    assert_eq!(run(&compile_ok("limit r0 0 10;"), &[40]), Ok(10));
    assert_eq!(run(&compile_ok("wavegen_saw r0 10 8 6;"), &[17]), Ok(6));
    assert_eq!(run(&compile_ok("abs r0;"), &[i32::MIN]), Ok(i32::MIN));
}

#[test]
fn test_runtime_faults() {
    let err = run(&compile_ok("div r0 0;"), &[10]).unwrap_err();
    assert_eq!(err.fault, Fault::DivisionByZero);
    assert_eq!(err.opcode, "div");

    let err = run(&compile_ok("mod r0 r1;"), &[10, 0]).unwrap_err();
    assert_eq!(err.fault, Fault::DivisionByZero);

    let err = run(&compile_ok("wavegen_rect r0 0 5 1;"), &[3]).unwrap_err();
    assert_eq!(err.fault, Fault::NonPositivePeriod);
}

#[test]
fn test_step_budget_stops_endless_loop() {
    let program = compile_ok("spin: add r0 1; goto spin;");
    let vm = Vm::with_config(ExecConfig::default().with_max_steps(1000));
    let err = vm.run(&program, &mut Worker::new(), &[]).unwrap_err();
    assert_eq!(err.fault, Fault::StepLimit(1000));
}

#[test]
fn test_compile_errors_are_located() {
    let registry = registry();

    let err = compile("set r0 1;\nadd r0 speed;", &registry).unwrap_err();
    assert_eq!(err.kind, CompileErrorKind::UndeclaredSymbol("speed".to_string()));
    assert_eq!(err.line, 2);
    assert_eq!(err.statement, "add r0 speed;");

    let err = compile("if eq r1 1;\n  set r0 2;\n", &registry).unwrap_err();
    assert_eq!(err.kind, CompileErrorKind::UnterminatedBlock);
    assert_eq!(err.line, 1);

    let err = compile("end;", &registry).unwrap_err();
    assert_eq!(err.kind, CompileErrorKind::UnexpectedEnd);

    let err = compile("set 5 r0;", &registry).unwrap_err();
    assert!(matches!(err.kind, CompileErrorKind::NoMatchingOverload { .. }));
    assert!(err.hint().is_some());
}

#[test]
fn test_result_register_example() {
    assert_eq!(run(&compile_ok("set r0 5; add r0 3; return r0;"), &[]), Ok(8));
}

#[test]
fn test_runs_leave_program_bytes_untouched() {
    let source = indoc! {"
        var int left;
        set left r0;
        if le r0 r1;
            set r0 1;
        else;
            div left r1;
            set r0 left;
        end;
    "};
    let program = compile_ok(source);
    let before = program.code().to_vec();

    let vm = Vm::new();
    let mut worker = Worker::new();
    let mut faults = 0;
    for a in -50..50 {
        for b in [-3, 0, 7] {
            match vm.run(&program, &mut worker, &[a, b]) {
                Ok(_) => {}
                Err(err) => {
                    assert_eq!(err.fault, Fault::DivisionByZero);
                    faults += 1;
                }
            }
        }
    }
    // a > 0 with b == 0 takes the dividing branch
    assert_eq!(faults, 49);
    assert_eq!(program.code(), &before[..]);
    assert_eq!(program.verify(), Ok(()));
}
