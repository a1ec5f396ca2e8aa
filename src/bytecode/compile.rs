//! Statement compiler.
//!
//! Scripts are compiled one statement at a time: the operation name selects
//! an [`Operation`] from the registry, its parse routine resolves the
//! argument tokens and emits code through the [`Compiler`].

use tracing::debug;

use crate::bytecode::codec::{ArgCodec, EmitArg, NATIVE, RAW, layout_for};
use crate::bytecode::compile_error::{CompileError, CompileErrorKind};
use crate::bytecode::control::Block;
use crate::bytecode::ir::Program;
use crate::bytecode::op::OPCODES;
use crate::bytecode::writer::CodeWriter;
use crate::frontend::parser::{Parser, Statement};
use crate::frontend::token::{Span, Token, TokenKind};
use crate::hooks::HookSignature;
use crate::lang::names::{LabelId, RefKind, SymbolTable};
use crate::lang::types::{ArgType, Param, SCORE_EXACT, ValueType, version_of};
use crate::registry::native::{NativeBinding, NativeId};
use crate::registry::{Operation, Overload, Registry, Target};

/// Compiles one statement of an operation.
pub type ParseFn =
    fn(&mut Compiler<'_>, &Statement<'_>, &Operation) -> Result<(), CompileErrorKind>;

/// A resolved statement argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arg<'s> {
    Const(i32),
    Reg {
        index: u8,
        ty: ValueType,
        writable: bool,
    },
    Label(LabelId),
    Type(ValueType),
    /// Name with no declaration yet; only valid as a forward label.
    Unknown(&'s str),
}

impl From<RefKind> for Arg<'_> {
    fn from(kind: RefKind) -> Self {
        match kind {
            RefKind::Const(value) => Arg::Const(value),
            RefKind::Reg {
                index,
                ty,
                writable,
            } => Arg::Reg {
                index,
                ty,
                writable,
            },
            RefKind::Label(id) => Arg::Label(id),
            RefKind::Type(ty) => Arg::Type(ty),
        }
    }
}

impl Arg<'_> {
    pub fn arg_type(&self) -> ArgType {
        match *self {
            Arg::Const(_) => ArgType::Const,
            Arg::Reg { ty, .. } => ArgType::Reg(ty),
            Arg::Label(_) => ArgType::Label,
            Arg::Type(ty) => ArgType::Type(ty),
            Arg::Unknown(_) => ArgType::None,
        }
    }

    fn score(&self, param: Param) -> Option<u32> {
        match *self {
            Arg::Unknown(_) if param.accepts_forward_label() => Some(SCORE_EXACT),
            Arg::Reg { writable, .. } => param.score(self.arg_type(), writable),
            _ => param.score(self.arg_type(), false),
        }
    }
}

pub struct Compiler<'r> {
    registry: &'r Registry,
    locals: SymbolTable,
    writer: CodeWriter,
    pub(crate) blocks: Vec<Block>,
    /// Named labels used before their definition, with the first use.
    forward: Vec<(LabelId, String, Span)>,
    natives: Vec<NativeBinding>,
    next_register: u8,
    registers_used: u8,
    span: Span,
}

impl<'r> Compiler<'r> {
    /// Compiler for a script of `hook`, whose arguments become local names
    /// for the leading registers.
    pub fn new(registry: &'r Registry, hook: Option<&HookSignature>) -> Result<Self, CompileErrorKind> {
        let config = registry.config();
        let mut locals = SymbolTable::new();
        let mut first_free = config.input_registers;
        let mut used = config.input_registers;

        if let Some(hook) = hook {
            for (i, arg) in hook.args.iter().enumerate() {
                let index = u8::try_from(i)
                    .ok()
                    .filter(|&index| index < config.registers)
                    .ok_or_else(|| CompileErrorKind::TooManyRegisters(arg.name.clone()))?;
                locals
                    .insert(
                        &arg.name,
                        RefKind::Reg {
                            index,
                            ty: arg.ty,
                            writable: arg.writable,
                        },
                    )
                    .map_err(|_| CompileErrorKind::VariableRedefined(arg.name.clone()))?;
                first_free = first_free.max(index + 1);
                used = used.max(index + 1);
            }
        }
        for entry in registry.globals().iter() {
            if let RefKind::Reg { index, .. } = entry.kind {
                first_free = first_free.max(index + 1);
            }
        }

        Ok(Compiler {
            registry,
            locals,
            writer: CodeWriter::new(),
            blocks: Vec::new(),
            forward: Vec::new(),
            natives: Vec::new(),
            next_register: first_free,
            registers_used: used,
            span: Span::default(),
        })
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    pub fn in_block(&self) -> bool {
        !self.blocks.is_empty()
    }

    /// What `name` refers to; script locals shadow registry globals.
    pub fn lookup(&self, name: &str) -> Option<RefKind> {
        self.locals
            .get(name)
            .or_else(|| self.registry.globals().get(name))
            .map(|entry| entry.kind)
    }

    pub fn resolve<'s>(&self, token: &Token<'s>) -> Result<Arg<'s>, CompileErrorKind> {
        match token.kind {
            TokenKind::Number => token
                .number()
                .map(Arg::Const)
                .ok_or_else(|| CompileErrorKind::InvalidNumber(token.text.to_string())),
            TokenKind::Symbol => Ok(self
                .lookup(token.text)
                .map(Arg::from)
                .unwrap_or(Arg::Unknown(token.text))),
            kind => Err(CompileErrorKind::Syntax(format!("unexpected {}", kind))),
        }
    }

    pub fn resolve_all<'s>(&self, tokens: &[Token<'s>]) -> Result<Vec<Arg<'s>>, CompileErrorKind> {
        tokens.iter().map(|token| self.resolve(token)).collect()
    }

    fn touch(&mut self, register: u8) {
        self.registers_used = self.registers_used.max(register.saturating_add(1));
    }

    pub fn new_label(&mut self) -> Result<LabelId, CompileErrorKind> {
        if self.writer.label_count() >= usize::from(u16::MAX) {
            return Err(CompileErrorKind::CodeTooLarge);
        }
        Ok(self.writer.new_label())
    }

    /// Binds a compiler-created label to the current position.
    pub fn place_label(&mut self, label: LabelId) -> Result<(), CompileErrorKind> {
        self.writer
            .define_label(label)
            .map(|_| ())
            .map_err(|fault| CompileErrorKind::Internal(format!("{:?}", fault)))
    }

    pub fn is_placed(&self, label: LabelId) -> bool {
        self.writer.is_defined(label)
    }

    /// Handles a `name:` statement prefix.
    fn define_named_label(&mut self, name: &str) -> Result<(), CompileErrorKind> {
        let redefined = || CompileErrorKind::LabelRedefined(name.to_string());
        let label = match self.lookup(name) {
            Some(RefKind::Label(label)) => label,
            Some(_) => return Err(redefined()),
            None => {
                let label = self.new_label()?;
                self.locals
                    .insert(name, RefKind::Label(label))
                    .map_err(|_| redefined())?;
                label
            }
        };
        if self.writer.is_defined(label) {
            return Err(redefined());
        }
        self.place_label(label)
    }

    fn forward_label(&mut self, name: &str) -> Result<LabelId, CompileErrorKind> {
        let label = self.new_label()?;
        self.locals
            .insert(name, RefKind::Label(label))
            .map_err(|_| CompileErrorKind::LabelRedefined(name.to_string()))?;
        self.forward.push((label, name.to_string(), self.span));
        Ok(label)
    }

    /// Allocates the next free register for a script variable.
    pub fn declare_var(&mut self, name: &str, ty: ValueType) -> Result<u8, CompileErrorKind> {
        if self.lookup(name).is_some() {
            return Err(CompileErrorKind::VariableRedefined(name.to_string()));
        }
        let index = self.next_register;
        if index >= self.registry.config().registers {
            return Err(CompileErrorKind::TooManyRegisters(name.to_string()));
        }
        self.locals
            .insert(
                name,
                RefKind::Reg {
                    index,
                    ty,
                    writable: true,
                },
            )
            .map_err(|_| CompileErrorKind::VariableRedefined(name.to_string()))?;
        self.next_register += 1;
        self.touch(index);
        Ok(index)
    }

    fn describe_args(&self, args: &[Arg<'_>]) -> String {
        let names: Vec<String> = args
            .iter()
            .map(|arg| match *arg {
                Arg::Const(_) => "const".to_string(),
                Arg::Reg {
                    ty,
                    writable: false,
                    ..
                } => format!("{} (read-only)", self.registry.value_type_name(ty)),
                Arg::Reg { ty, .. } => format!("var {}", self.registry.value_type_name(ty)),
                Arg::Label(_) => "label".to_string(),
                Arg::Type(ty) => format!("type {}", self.registry.value_type_name(ty)),
                Arg::Unknown(name) => format!("unknown '{}'", name),
            })
            .collect();
        names.join(", ")
    }

    /// Picks the most specific overload of `op` for `args`.
    fn select<'o>(&self, op: &'o Operation, args: &[Arg<'_>]) -> Result<&'o Overload, CompileErrorKind> {
        let mut best: Option<(u32, &Overload)> = None;
        let mut tied = false;
        for overload in &op.overloads {
            if overload.params.len() != args.len() {
                continue;
            }
            let score = overload
                .params
                .iter()
                .zip(args)
                .map(|(&param, arg)| arg.score(param))
                .sum::<Option<u32>>();
            let Some(score) = score else { continue };
            match best {
                Some((top, _)) if score < top => {}
                Some((top, _)) if score == top => tied = true,
                _ => {
                    best = Some((score, overload));
                    tied = false;
                }
            }
        }

        match best {
            Some(_) if tied => Err(CompileErrorKind::ConflictingOverloads {
                name: op.name.clone(),
                args: self.describe_args(args),
            }),
            Some((_, overload)) => Ok(overload),
            None => match args.iter().find_map(|arg| match arg {
                Arg::Unknown(name) => Some(*name),
                _ => None,
            }) {
                Some(name) => Err(CompileErrorKind::UndeclaredSymbol(name.to_string())),
                None => Err(CompileErrorKind::NoMatchingOverload {
                    name: op.name.clone(),
                    args: self.describe_args(args),
                }),
            },
        }
    }

    /// Resolves the overload of `op` matching `args` and emits it.
    pub fn emit(&mut self, op: &Operation, args: &[Arg<'_>]) -> Result<(), CompileErrorKind> {
        let overload = self.select(op, args)?;

        let mut bound = Vec::with_capacity(args.len());
        for arg in args {
            bound.push(match *arg {
                Arg::Unknown(name) => Arg::Label(self.forward_label(name)?),
                other => other,
            });
        }

        let (version, operands) = self.encode_args(&overload.params, &bound)?;
        match overload.target {
            Target::Builtin { base } => self.emit_builtin(base, &overload.params, version, &operands),
            Target::Native { first } => self.emit_native(first, version, &operands),
        }
    }

    /// Emits the registry operation `name`.
    pub fn emit_named(&mut self, name: &str, args: &[Arg<'_>]) -> Result<(), CompileErrorKind> {
        let registry = self.registry;
        let op = registry
            .operation(name)
            .ok_or_else(|| CompileErrorKind::Internal(format!("operation '{}' is missing", name)))?;
        self.emit(op, args)
    }

    fn encode_args(
        &mut self,
        params: &[Param],
        args: &[Arg<'_>],
    ) -> Result<(u16, Vec<EmitArg<'static>>), CompileErrorKind> {
        let mut choices = Vec::with_capacity(params.len());
        let mut operands = Vec::with_capacity(params.len());
        for (&param, arg) in params.iter().zip(args) {
            let (choice, operand) = match (param, *arg) {
                (Param::Int, Arg::Const(value)) => (0, EmitArg::Const(value)),
                (Param::Int, Arg::Reg { index, .. }) => (1, EmitArg::Reg(index)),
                (_, Arg::Reg { index, .. }) => (0, EmitArg::Reg(index)),
                (_, Arg::Label(label)) => (0, EmitArg::Label(label)),
                (param, arg) => {
                    return Err(CompileErrorKind::Internal(format!(
                        "{:?} cannot be encoded as {:?}",
                        arg, param
                    )));
                }
            };
            if let EmitArg::Reg(index) = operand {
                self.touch(index);
            }
            choices.push(choice);
            operands.push(operand);
        }
        Ok((version_of(params, &choices), operands))
    }

    fn emit_builtin(
        &mut self,
        base: u8,
        params: &[Param],
        version: u16,
        operands: &[EmitArg<'_>],
    ) -> Result<(), CompileErrorKind> {
        let opcode = u8::try_from(u16::from(base) + version)
            .map_err(|_| CompileErrorKind::Internal("opcode out of range".to_string()))?;
        self.writer.push_u8(opcode);
        for (codec, operand) in layout_for(params, version).iter().zip(operands) {
            codec
                .encode(operand, &mut self.writer)
                .map_err(|e| CompileErrorKind::Internal(e.to_string()))?;
        }
        Ok(())
    }

    fn native_slot(&mut self, binding: &NativeBinding) -> Result<u16, CompileErrorKind> {
        let slot = match self.natives.iter().position(|n| n.id == binding.id) {
            Some(slot) => slot,
            None => {
                self.natives.push(binding.clone());
                self.natives.len() - 1
            }
        };
        u16::try_from(slot).map_err(|_| CompileErrorKind::CodeTooLarge)
    }

    /// Emits `call native [operands]` for one version of a host function.
    fn emit_native(
        &mut self,
        first: NativeId,
        version: u16,
        operands: &[EmitArg<'_>],
    ) -> Result<(), CompileErrorKind> {
        let registry = self.registry;
        let binding = registry
            .native(NativeId(first.0 + u32::from(version)))
            .ok_or_else(|| CompileErrorKind::Internal("native version is missing".to_string()))?;
        let slot = self.native_slot(binding)?;

        let mut block = CodeWriter::new();
        for (codec, operand) in binding.layout.iter().zip(operands) {
            codec
                .encode(operand, &mut block)
                .map_err(|e| CompileErrorKind::Internal(e.to_string()))?;
        }
        let block = block
            .finish()
            .map_err(|fault| CompileErrorKind::Internal(format!("{:?}", fault)))?;

        let call = OPCODES
            .base_of("call", 2)
            .ok_or_else(|| CompileErrorKind::Internal("call opcode is missing".to_string()))?;
        self.writer.push_u8(call);
        NATIVE
            .encode(&EmitArg::Native(slot), &mut self.writer)
            .and_then(|()| RAW.encode(&EmitArg::Raw(&block), &mut self.writer))
            .map_err(|e| CompileErrorKind::Internal(e.to_string()))?;
        Ok(())
    }

    /// Compiles one statement.
    pub fn statement(&mut self, statement: &Statement<'_>) -> Result<(), CompileErrorKind> {
        self.span = statement.span;
        if let Some(label) = &statement.label {
            self.define_named_label(label.text)?;
        }

        let registry = self.registry;
        let name = statement.name.text;
        if let Some(op) = registry.operation(name) {
            return (op.parse)(self, statement, op);
        }

        // `obj.member`: look up `Type.member` and pass `obj` first
        if let Some(dot) = name.find('.') {
            let (object, member) = name.split_at(dot);
            if let Some(object @ Arg::Reg {
                ty: ValueType::Ptr(tag) | ValueType::PtrE(tag),
                ..
            }) = self.lookup(object).map(Arg::from)
            {
                let type_name = registry.type_info(tag).map(|t| t.name.as_str()).unwrap_or("");
                if let Some(op) = registry.operation_split(type_name, member) {
                    let mut args = vec![object];
                    args.extend(self.resolve_all(&statement.args)?);
                    return self.emit(op, &args);
                }
            }
        }

        Err(CompileErrorKind::UnknownOperation(name.to_string()))
    }

    /// Closes the script: appends the final `exit`, checks labels and
    /// blocks, resolves jumps and verifies the result.
    pub fn finish(mut self, source: &str) -> Result<Program, CompileError> {
        let at = |kind, span: Span| {
            CompileError::new(kind, span, source.get(span.start..span.end).unwrap_or(""))
        };

        if let Some(block) = self.blocks.last() {
            return Err(at(CompileErrorKind::UnterminatedBlock, block.span));
        }
        for (label, name, span) in &self.forward {
            if !self.writer.is_defined(*label) {
                return Err(at(CompileErrorKind::LabelNotDeclared(name.clone()), *span));
            }
        }

        let span = self.span;
        self.emit_named("exit", &[]).map_err(|kind| at(kind, span))?;
        let code = self
            .writer
            .finish()
            .map_err(|fault| at(CompileErrorKind::Internal(format!("{:?}", fault)), span))?;
        let program = Program::from_parts(code, self.registers_used, self.natives);
        program
            .verify()
            .map_err(|e| at(CompileErrorKind::Internal(e.to_string()), span))?;

        debug!(
            bytes = program.code().len(),
            registers = program.registers_used(),
            natives = program.natives().len(),
            "script compiled"
        );
        Ok(program)
    }
}

/// Default parse routine: resolve every argument and pick an overload.
pub fn parse_call(
    compiler: &mut Compiler<'_>,
    statement: &Statement<'_>,
    op: &Operation,
) -> Result<(), CompileErrorKind> {
    let args = compiler.resolve_all(&statement.args)?;
    compiler.emit(op, &args)
}

/// Compiles a standalone script.
pub fn compile(source: &str, registry: &Registry) -> Result<Program, CompileError> {
    compile_with(source, registry, None)
}

/// Compiles a script for `hook`; its arguments are visible by name.
pub fn compile_hook(
    source: &str,
    registry: &Registry,
    hook: &HookSignature,
) -> Result<Program, CompileError> {
    compile_with(source, registry, Some(hook))
}

fn compile_with(
    source: &str,
    registry: &Registry,
    hook: Option<&HookSignature>,
) -> Result<Program, CompileError> {
    let mut compiler =
        Compiler::new(registry, hook).map_err(|kind| CompileError::new(kind, Span::default(), ""))?;
    let mut parser = Parser::new(source, registry.config().max_args);
    while let Some(statement) = parser.next_statement()? {
        compiler
            .statement(&statement)
            .map_err(|kind| CompileError::new(kind, statement.span, statement.text(source)))?;
    }
    compiler.finish(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::op::Ret;
    use crate::registry::RegistryBuilder;
    use crate::runtime::vm::run;
    use indoc::indoc;

    struct Unit {
        health: i32,
    }

    fn registry() -> Registry {
        crate::init_registry().unwrap()
    }

    fn compile_ok(source: &str) -> Program {
        match compile(source, &registry()) {
            Ok(program) => program,
            Err(err) => panic!("compile failed: {}", err),
        }
    }

    fn run_script(source: &str, inputs: &[i32]) -> i32 {
        run(&compile_ok(source), inputs).unwrap()
    }

    fn compile_error(registry: &Registry, source: &str) -> CompileError {
        compile(source, registry).unwrap_err()
    }

    #[test]
    fn test_end_to_end_example() {
        assert_eq!(run_script("set r0 5; add r0 3; return r0;", &[]), 8);
    }

    #[test]
    fn test_inputs_and_wrapping() {
        assert_eq!(run_script("add r0 r1;", &[i32::MAX, 1]), i32::MIN);
        assert_eq!(run_script("mul r0 r1; sub r0 1;", &[6, 7]), 41);
        assert_eq!(run_script("return 12;", &[3]), 12);
    }

    #[test]
    fn test_immediate_and_register_versions_differ() {
        let imm = compile_ok("add r0 1;");
        let reg = compile_ok("add r0 r1;");
        assert_eq!(imm.code()[0] + 1, reg.code()[0]);
        assert_eq!(imm.code().len(), 1 + 1 + 4 + 1);
        assert_eq!(reg.code().len(), 1 + 1 + 1 + 1);
    }

    #[test]
    fn test_variables() {
        let source = indoc! {"
            var int x 10;
            var int y = 3;
            var int z;
            add x y;
            add z x;
            return z;
        "};
        assert_eq!(run_script(source, &[]), 13);
        assert_eq!(compile_ok(source).registers_used(), 5);
    }

    #[test]
    fn test_forward_and_backward_labels() {
        let source = indoc! {"
            goto skip;
            set r0 1;
            skip: add r0 10;
            test_le r0 25 again done;
            again: goto skip;
            done: exit;
        "};
        assert_eq!(run_script(source, &[0]), 30);
    }

    #[test]
    fn test_forward_label_offset_matches_definition() {
        let program = compile_ok("goto target; target: exit; goto target;");
        let code = program.code();
        // goto op + 4 byte target, then `exit` at offset 5
        assert_eq!(&code[1..5], &5u32.to_le_bytes());
        assert_eq!(&code[7..11], &5u32.to_le_bytes());
    }

    #[test]
    fn test_label_errors() {
        let registry = registry();
        let err = compile_error(&registry, "goto nowhere;");
        assert_eq!(err.kind, CompileErrorKind::LabelNotDeclared("nowhere".to_string()));
        assert_eq!((err.line, err.col), (1, 1));

        let err = compile_error(&registry, "a: exit;\na: exit;");
        assert_eq!(err.kind, CompileErrorKind::LabelRedefined("a".to_string()));
        assert_eq!(err.line, 2);

        let err = compile_error(&registry, "r0: exit;");
        assert_eq!(err.kind, CompileErrorKind::LabelRedefined("r0".to_string()));
    }

    #[test]
    fn test_resolution_errors() {
        let registry = registry();
        assert_eq!(
            compile_error(&registry, "frobnicate r0;").kind,
            CompileErrorKind::UnknownOperation("frobnicate".to_string())
        );
        assert_eq!(
            compile_error(&registry, "add r0 missing;").kind,
            CompileErrorKind::UndeclaredSymbol("missing".to_string())
        );
        assert!(matches!(
            compile_error(&registry, "set 5 r0;").kind,
            CompileErrorKind::NoMatchingOverload { .. }
        ));
        assert!(matches!(
            compile_error(&registry, "add r0;").kind,
            CompileErrorKind::NoMatchingOverload { .. }
        ));
        assert_eq!(
            compile_error(&registry, "set r0 0x1FFFFFFFF;").kind,
            CompileErrorKind::InvalidNumber("0x1FFFFFFFF".to_string())
        );
    }

    #[test]
    fn test_error_reports_statement_text() {
        let err = compile_error(&registry(), "set r0 1;\n  bogus r0 2;\n");
        assert_eq!((err.line, err.col), (2, 3));
        assert_eq!(err.statement, "bogus r0 2;");
    }

    #[test]
    fn test_syntax_error() {
        let err = compile_error(&registry(), "set r0 1");
        assert!(matches!(err.kind, CompileErrorKind::Syntax(_)));
    }

    #[test]
    fn test_read_only_hook_argument() {
        let registry = registry();
        let hook = HookSignature::new("chance")
            .arg_mut("chance", ValueType::Int)
            .arg("power", ValueType::Int)
            .returns(1);
        assert!(compile_hook("add chance power;", &registry, &hook).is_ok());
        let err = compile_hook("set power 1;", &registry, &hook).unwrap_err();
        assert!(matches!(err.kind, CompileErrorKind::NoMatchingOverload { .. }));
    }

    fn pick_registry(conflict: bool) -> Registry {
        let mut builder = RegistryBuilder::new().unwrap();
        builder.register_standing_register("r0", 0).unwrap();
        let unit = builder.register_type::<Unit>("Unit").unwrap();
        builder
            .register_function("pick", &[Param::IntVar, Param::Int], "", |call| {
                call.set(0, 1);
                Ret::Continue
            })
            .unwrap();
        builder
            .register_function("pick", &[Param::IntVar, Param::Ptr(unit)], "", |call| {
                call.set(0, 2);
                Ret::Continue
            })
            .unwrap();
        if conflict {
            builder
                .register_function("pick", &[Param::IntVar, Param::Int], "", |call| {
                    call.set(0, 3);
                    Ret::Continue
                })
                .unwrap();
        }
        builder.build()
    }

    #[test]
    fn test_overloads_select_by_argument_type() {
        let registry = pick_registry(false);
        let by_int = compile("pick r0 5;", &registry).unwrap();
        assert_eq!(run(&by_int, &[]), Ok(1));

        let by_ptr = compile("var ptr Unit u; pick r0 u;", &registry).unwrap();
        assert_eq!(run(&by_ptr, &[]), Ok(2));
    }

    #[test]
    fn test_tied_overloads_are_rejected() {
        let registry = pick_registry(true);
        let err = compile("pick r0 5;", &registry).unwrap_err();
        assert!(matches!(err.kind, CompileErrorKind::ConflictingOverloads { .. }));
        // the pointer overload stays unambiguous
        assert!(compile("var ptr Unit u; pick r0 u;", &registry).is_ok());
    }

    #[test]
    fn test_more_specific_pointer_overload_wins() {
        let mut builder = RegistryBuilder::new().unwrap();
        builder.register_standing_register("r0", 0).unwrap();
        builder.register_type::<Unit>("Unit").unwrap();
        builder
            .register_method::<Unit, _>("kind", &[Param::IntVar], "", |call| {
                call.set(1, 10);
                Ret::Continue
            })
            .unwrap();
        builder
            .register_method_mut::<Unit, _>("kind", &[Param::IntVar], "", |call| {
                call.set(1, 20);
                Ret::Continue
            })
            .unwrap();
        let registry = builder.build();
        let shared = compile("var ptr Unit u; u.kind r0;", &registry).unwrap();
        let edit = compile("var ptre Unit u; u.kind r0;", &registry).unwrap();
        assert_eq!(run(&shared, &[]), Ok(10));
        assert_eq!(run(&edit, &[]), Ok(20));
    }

    #[test]
    fn test_method_syntax_on_host_object() {
        let mut builder = RegistryBuilder::new().unwrap();
        builder.register_standing_register("r0", 0).unwrap();
        builder.register_type::<Unit>("Unit").unwrap();
        builder.register_getter::<Unit, _>("getHealth", |u| u.health).unwrap();
        let registry = builder.build();
        let hook = HookSignature::new("test")
            .arg_mut("result", ValueType::Int)
            .arg("unit", ValueType::Ptr(registry.type_of::<Unit>().unwrap()))
            .returns(1);

        let program = compile_hook("unit.getHealth result; add result 1;", &registry, &hook).unwrap();
        let unit = Unit { health: 41 };
        let mut worker = crate::runtime::Worker::new();
        let handle = worker.host.share(&unit);
        let vm = crate::runtime::Vm::new();
        assert_eq!(vm.run(&program, &mut worker, &[0, handle]), Ok(42));
        // a null handle reads as 0
        assert_eq!(vm.run(&program, &mut worker, &[0, 0]), Ok(1));

        let err = compile_hook("result.getHealth result;", &registry, &hook).unwrap_err();
        assert_eq!(
            err.kind,
            CompileErrorKind::UnknownOperation("result.getHealth".to_string())
        );
    }

    #[test]
    fn test_native_table_is_deduplicated() {
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
        let program = compile("set r0 3; twice r0; twice r0;", &registry).unwrap();
        assert_eq!(program.natives().len(), 1);
        assert_eq!(run(&program, &[]), Ok(12));
    }
}
