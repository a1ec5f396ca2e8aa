use std::collections::HashSet;
use std::fmt::Write;

use crate::bytecode::codec::{Codec, Operand};
use crate::bytecode::ir::{Program, ProgramPos};
use crate::bytecode::op::OPCODES;

struct Line {
    pos: ProgramPos,
    text: String,
}

/// Return the disassembly of `program` as a String.
///
/// Jump targets are marked with `►`. Decoding stops at the first byte
/// that is not a valid instruction.
pub fn disassemble(program: &Program) -> String {
    let (lines, targets, broken) = decode_all(program);
    let mut output = String::new();

    for line in &lines {
        let target = targets.contains(&line.pos);
        if target {
            output.push_str("      ┌──────────────────────────────────\n");
        }
        let _ = write!(output, "{:04} ", line.pos.get());
        output.push_str(if target { "► " } else { "  " });
        output.push_str(&line.text);
        output.push('\n');
    }

    if let Some(pos) = broken {
        let _ = writeln!(output, "{:04}   <invalid code>", pos.get());
    }
    output
}

/// Print disassembly with a header.
pub fn print_program(program: &Program) {
    println!("=== BYTECODE ===\n");
    println!(
        "{} bytes, {} registers, {} natives\n",
        program.code().len(),
        program.registers_used(),
        program.natives().len()
    );
    print!("{}", disassemble(program));
}

fn decode_all(program: &Program) -> (Vec<Line>, HashSet<ProgramPos>, Option<ProgramPos>) {
    let code = program.code();
    let mut lines = Vec::new();
    let mut targets = HashSet::new();
    let mut at = 0;

    while at < code.len() {
        let pos = ProgramPos::new(at as u32);
        let Some(entry) = OPCODES.get(code[at]) else {
            return (lines, targets, Some(pos));
        };
        let Some((operands, next)) = decode_operands(code, at + 1, &entry.layout) else {
            return (lines, targets, Some(pos));
        };

        let mut rendered = Vec::with_capacity(operands.len());
        let mut native = None;
        for operand in &operands {
            match *operand {
                Operand::Label(target) => {
                    targets.insert(target);
                    rendered.push(format_operand(operand));
                }
                Operand::Native(index) => native = program.native(index),
                Operand::Raw { start, len } => {
                    let args = native.and_then(|binding| {
                        let end = start as usize + usize::from(len);
                        decode_operands(&code[..end], start as usize, &binding.layout)
                    });
                    match args {
                        Some((args, _)) => rendered.extend(args.iter().map(format_operand)),
                        None => rendered.push(format!("<{} bytes>", len)),
                    }
                }
                _ => rendered.push(format_operand(operand)),
            }
        }

        let name = match native {
            Some(binding) => binding.symbol.as_str(),
            None => entry.name,
        };
        let text = if rendered.is_empty() {
            name.to_string()
        } else {
            format!("{:<12}{}", name, rendered.join(", "))
        };
        lines.push(Line { pos, text });
        at = next;
    }

    (lines, targets, None)
}

fn decode_operands(code: &[u8], mut at: usize, layout: &[Codec]) -> Option<(Vec<Operand>, usize)> {
    let mut operands = Vec::with_capacity(layout.len());
    for codec in layout {
        let (operand, width) = codec.decode(code, at)?;
        operands.push(operand);
        at += width;
    }
    Some((operands, at))
}

fn format_operand(operand: &Operand) -> String {
    match operand {
        Operand::Reg(r) => format!("r{}", r),
        Operand::Imm(v) => v.to_string(),
        Operand::Label(target) => target.to_string(),
        Operand::Native(index) => format!("native#{}", index),
        Operand::Raw { len, .. } => format!("<{} bytes>", len),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::compile::compile;
    use crate::bytecode::op::Ret;
    use crate::lang::types::Param;
    use crate::registry::RegistryBuilder;

    #[test]
    fn test_straight_line() {
        let registry = crate::init_registry().unwrap();
        let program = compile("set r0 5; add r0 r1;", &registry).unwrap();
        let text = disassemble(&program);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "0000   set         r0, 5");
        assert_eq!(lines[1], "0006   add         r0, r1");
        assert_eq!(lines[2], "0009   exit");
    }

    #[test]
    fn test_jump_targets_are_marked() {
        let registry = crate::init_registry().unwrap();
        let program = compile("if eq r1 2; set r0 1; end;", &registry).unwrap();
        let text = disassemble(&program);
        assert!(text.starts_with("0000   test_eq"));
        assert!(text.contains("┌──"));
        assert!(text.lines().any(|l| l.contains("► exit")));
    }

    #[test]
    fn test_native_call_shows_symbol_and_args() {
        let mut builder = RegistryBuilder::new().unwrap();
        builder.register_standing_register("r0", 0).unwrap();
        builder
            .register_function("twice", &[Param::IntVar], "", |call| {
                let v = call.get(0);
                call.set(0, v * 2);
                Ret::Continue
            })
            .unwrap();
        let registry = builder.build();
        let program = compile("twice r0;", &registry).unwrap();
        let text = disassemble(&program);
        assert_eq!(text.lines().next(), Some("0000   twice       r0"));
    }
}
