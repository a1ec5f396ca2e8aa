//! Compiler keywords: `if`/`else`/`end` blocks and `var` declarations.
//!
//! Blocks are sugar over `test_eq`/`test_le` and `goto`. Every comparison
//! reduces to those two by swapping operands or branch targets:
//!
//! | condition | emitted                       |
//! |-----------|-------------------------------|
//! | `eq a b`  | `test_eq a b then else`       |
//! | `neq a b` | `test_eq a b else then`       |
//! | `le a b`  | `test_le a b then else`       |
//! | `gt a b`  | `test_le a b else then`       |
//! | `ge a b`  | `test_le b a then else`       |
//! | `lt a b`  | `test_le b a else then`       |

use crate::bytecode::compile::{Arg, Compiler};
use crate::bytecode::compile_error::CompileErrorKind;
use crate::frontend::parser::Statement;
use crate::frontend::token::{Span, Token, TokenKind};
use crate::lang::names::{LabelId, RefKind};
use crate::lang::types::ValueType;
use crate::registry::Operation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockKind {
    If,
    Else,
}

/// An open `if` block.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Block {
    pub(crate) kind: BlockKind,
    /// Target when the current condition fails.
    pub(crate) else_label: LabelId,
    pub(crate) end_label: LabelId,
    pub(crate) span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Neq,
    Le,
    Lt,
    Ge,
    Gt,
}

impl Comparison {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "eq" => Comparison::Eq,
            "neq" => Comparison::Neq,
            "le" => Comparison::Le,
            "lt" => Comparison::Lt,
            "ge" => Comparison::Ge,
            "gt" => Comparison::Gt,
            _ => return None,
        })
    }
}

/// Accepts `CMP a b` and `a CMP b`.
fn split_condition<'a, 's>(
    args: &'a [Token<'s>],
) -> Result<(Comparison, &'a Token<'s>, &'a Token<'s>), CompileErrorKind> {
    let [first, second, third] = args else {
        return Err(CompileErrorKind::InvalidCondition(format!(
            "expected three arguments, found {}",
            args.len()
        )));
    };
    if let Some(cmp) = Comparison::from_name(first.text) {
        return Ok((cmp, second, third));
    }
    if let Some(cmp) = Comparison::from_name(second.text) {
        return Ok((cmp, first, third));
    }
    Err(CompileErrorKind::InvalidCondition(format!(
        "no comparison in '{} {} {}'",
        first.text, second.text, third.text
    )))
}

fn emit_condition(
    compiler: &mut Compiler<'_>,
    args: &[Token<'_>],
    then_label: LabelId,
    else_label: LabelId,
) -> Result<(), CompileErrorKind> {
    let (cmp, a, b) = split_condition(args)?;
    let a = compiler.resolve(a)?;
    let b = compiler.resolve(b)?;
    let (t, f) = (Arg::Label(then_label), Arg::Label(else_label));
    let (op, args) = match cmp {
        Comparison::Eq => ("test_eq", [a, b, t, f]),
        Comparison::Neq => ("test_eq", [a, b, f, t]),
        Comparison::Le => ("test_le", [a, b, t, f]),
        Comparison::Gt => ("test_le", [a, b, f, t]),
        Comparison::Ge => ("test_le", [b, a, t, f]),
        Comparison::Lt => ("test_le", [b, a, f, t]),
    };
    compiler.emit_named(op, &args)
}

pub fn parse_if(
    compiler: &mut Compiler<'_>,
    statement: &Statement<'_>,
    _: &Operation,
) -> Result<(), CompileErrorKind> {
    let then_label = compiler.new_label()?;
    let else_label = compiler.new_label()?;
    let end_label = compiler.new_label()?;
    emit_condition(compiler, &statement.args, then_label, else_label)?;
    compiler.place_label(then_label)?;
    compiler.blocks.push(Block {
        kind: BlockKind::If,
        else_label,
        end_label,
        span: statement.span,
    });
    Ok(())
}

/// `else;` or `else CMP a b;`.
pub fn parse_else(
    compiler: &mut Compiler<'_>,
    statement: &Statement<'_>,
    _: &Operation,
) -> Result<(), CompileErrorKind> {
    let block = *compiler
        .blocks
        .last()
        .ok_or(CompileErrorKind::UnexpectedElse)?;
    if block.kind == BlockKind::Else {
        return Err(CompileErrorKind::DuplicateElse);
    }

    compiler.emit_named("goto", &[Arg::Label(block.end_label)])?;
    compiler.place_label(block.else_label)?;

    let (kind, else_label) = if statement.args.is_empty() {
        (BlockKind::Else, block.else_label)
    } else {
        let then_label = compiler.new_label()?;
        let else_label = compiler.new_label()?;
        emit_condition(compiler, &statement.args, then_label, else_label)?;
        compiler.place_label(then_label)?;
        (BlockKind::If, else_label)
    };
    if let Some(top) = compiler.blocks.last_mut() {
        top.kind = kind;
        top.else_label = else_label;
    }
    Ok(())
}

pub fn parse_end(
    compiler: &mut Compiler<'_>,
    statement: &Statement<'_>,
    _: &Operation,
) -> Result<(), CompileErrorKind> {
    if !statement.args.is_empty() {
        return Err(CompileErrorKind::Syntax("'end' takes no arguments".to_string()));
    }
    let block = compiler
        .blocks
        .pop()
        .ok_or(CompileErrorKind::UnexpectedEnd)?;
    if !compiler.is_placed(block.else_label) {
        compiler.place_label(block.else_label)?;
    }
    compiler.place_label(block.end_label)
}

/// `var [ptr|ptre] Type name [=] [value];`
pub fn parse_var(
    compiler: &mut Compiler<'_>,
    statement: &Statement<'_>,
    _: &Operation,
) -> Result<(), CompileErrorKind> {
    let invalid = |reason: &str| CompileErrorKind::InvalidVar(reason.to_string());
    let mut args = statement.args.iter();

    let mut type_token = args.next().ok_or_else(|| invalid("missing type and name"))?;
    let pointer = match type_token.text {
        "ptr" => Some(false),
        "ptre" => Some(true),
        _ => None,
    };
    if pointer.is_some() {
        type_token = args.next().ok_or_else(|| invalid("missing type after pointer kind"))?;
    }

    let base = match compiler.lookup(type_token.text) {
        Some(RefKind::Type(ty)) => ty,
        _ => {
            return Err(CompileErrorKind::InvalidVar(format!(
                "unknown type '{}'",
                type_token.text
            )));
        }
    };
    let ty = match (base, pointer) {
        (ValueType::Int, None) => ValueType::Int,
        (ValueType::Int, Some(_)) => return Err(invalid("'int' cannot be a pointer")),
        (_, None) => return Err(invalid("host types are declared with 'ptr' or 'ptre'")),
        (base, Some(false)) => ValueType::Ptr(base.tag()),
        (base, Some(true)) => ValueType::PtrE(base.tag()),
    };

    let name = args.next().ok_or_else(|| invalid("missing variable name"))?;
    if name.kind != TokenKind::Symbol || name.text.contains('.') {
        return Err(CompileErrorKind::InvalidVar(format!(
            "'{}' is not a valid variable name",
            name.text
        )));
    }
    if compiler.in_block() {
        return Err(CompileErrorKind::VariableInBlock(name.text.to_string()));
    }

    let mut init = args.next();
    if init.is_some_and(|t| t.text == "=") {
        init = Some(args.next().ok_or_else(|| invalid("missing value after '='"))?);
    }
    if args.next().is_some() {
        return Err(invalid("too many arguments"));
    }
    if init.is_some() && !ty.is_int() {
        return Err(invalid("pointer variables cannot be initialised"));
    }
    let init = init.map(|token| compiler.resolve(token)).transpose()?;

    let index = compiler.declare_var(name.text, ty)?;
    if let Some(value) = init {
        let target = Arg::Reg {
            index,
            ty,
            writable: true,
        };
        compiler.emit_named("set", &[target, value])?;
    }
    Ok(())
}
