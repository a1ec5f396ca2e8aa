use crate::bytecode::codec::Operand;
use crate::bytecode::ir::{Program, ProgramPos};
use crate::bytecode::op::{OPCODES, Ret};
use crate::registry::MAX_ARGS;
use crate::runtime::host::HostObjects;
use crate::runtime::ops::Exec;
use crate::runtime::registers::RegisterFile;
use crate::runtime::runtime_error::{Fault, RuntimeError};

/// Operands decoded per instruction, native calls included.
pub const MAX_OPERANDS: usize = MAX_ARGS;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecConfig {
    /// Instructions one run may execute; there is no unbounded mode.
    pub max_steps: u32,
}

impl Default for ExecConfig {
    fn default() -> Self {
        ExecConfig {
            max_steps: 65_536,
        }
    }
}

impl ExecConfig {
    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }
}

/// Mutable state of one invocation.
#[derive(Default)]
pub struct Worker<'h> {
    pub registers: RegisterFile,
    pub host: HostObjects<'h>,
}

impl<'h> Worker<'h> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(host: HostObjects<'h>) -> Self {
        Worker {
            registers: RegisterFile::new(),
            host,
        }
    }
}

/// Register-machine interpreter.
#[derive(Debug, Clone, Default)]
pub struct Vm {
    config: ExecConfig,
}

impl Vm {
    pub fn new() -> Self {
        Self::with_config(ExecConfig::default())
    }

    pub fn with_config(config: ExecConfig) -> Self {
        Vm { config }
    }

    pub fn config(&self) -> &ExecConfig {
        &self.config
    }

    /// Resets the worker's registers, seeds `inputs` from register 0 and
    /// runs `program` to completion. Returns register 0.
    pub fn run(
        &self,
        program: &Program,
        worker: &mut Worker<'_>,
        inputs: &[i32],
    ) -> Result<i32, RuntimeError> {
        worker
            .registers
            .reset(usize::from(program.registers_used()), inputs);
        self.execute(program, &mut worker.registers, &mut worker.host)
    }

    fn execute(
        &self,
        program: &Program,
        regs: &mut RegisterFile,
        host: &mut HostObjects<'_>,
    ) -> Result<i32, RuntimeError> {
        let code = program.code();
        let mut pc = ProgramPos::START;
        let mut operands = [Operand::Imm(0); MAX_OPERANDS];
        let mut steps: u32 = 0;

        loop {
            if steps >= self.config.max_steps {
                let max = self.config.max_steps;
                return Err(RuntimeError::new(Fault::StepLimit(max), "?", pc));
            }
            steps += 1;

            let at = pc.index();
            let opcode = *code
                .get(at)
                .ok_or(RuntimeError::new(Fault::Truncated, "?", pc))?;
            let entry = OPCODES
                .get(opcode)
                .ok_or(RuntimeError::new(Fault::UnknownOpcode(opcode), "?", pc))?;

            let mut cursor = at + 1;
            for (slot, codec) in operands.iter_mut().zip(&entry.layout) {
                let (operand, width) = codec
                    .decode(code, cursor)
                    .ok_or(RuntimeError::new(Fault::Truncated, entry.name, pc))?;
                *slot = operand;
                cursor += width;
            }

            let mut exec = Exec {
                regs: &mut *regs,
                host: &mut *host,
                program,
                operands: &operands[..entry.layout.len()],
                next: ProgramPos::new(cursor as u32),
            };
            match (entry.handler)(&mut exec) {
                Ret::Continue => pc = exec.next,
                Ret::End => return Ok(regs.get(0)),
                Ret::Error(fault) => return Err(RuntimeError::new(fault, entry.name, pc)),
            }
        }
    }
}

/// Runs `program` once on a fresh worker with no host objects.
pub fn run(program: &Program, inputs: &[i32]) -> Result<i32, RuntimeError> {
    Vm::new().run(program, &mut Worker::new(), inputs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opcode(name: &str, arity: usize, version: u8) -> u8 {
        OPCODES.base_of(name, arity).unwrap() + version
    }

    #[test]
    fn test_add_registers() {
        // add r0 r1; exit;
        let code = vec![opcode("add", 2, 1), 0, 1, opcode("exit", 0, 0)];
        let program = Program::from_parts(code, 2, Vec::new());
        assert_eq!(run(&program, &[40, 2]), Ok(42));
    }

    #[test]
    fn test_step_budget_stops_backward_loop() {
        // top: goto top;
        let mut code = vec![opcode("goto", 1, 0)];
        code.extend_from_slice(&0u32.to_le_bytes());
        let program = Program::from_parts(code, 1, Vec::new());
        let vm = Vm::with_config(ExecConfig::default().with_max_steps(100));
        let err = vm.run(&program, &mut Worker::new(), &[]).unwrap_err();
        assert_eq!(err.fault, Fault::StepLimit(100));

        // the default configuration is bounded too
        let err = Vm::new().run(&program, &mut Worker::new(), &[]).unwrap_err();
        assert_eq!(err.fault, Fault::StepLimit(65_536));
    }

    #[test]
    fn test_running_off_the_end() {
        let mut code = vec![opcode("set", 2, 0), 0];
        code.extend_from_slice(&1i32.to_le_bytes());
        let program = Program::from_parts(code, 1, Vec::new());
        let err = run(&program, &[]).unwrap_err();
        assert_eq!(err.fault, Fault::Truncated);
        assert_eq!(err.pos, ProgramPos::new(6));
    }

    #[test]
    fn test_unknown_opcode() {
        let program = Program::from_parts(vec![0xFE], 1, Vec::new());
        let err = run(&program, &[]).unwrap_err();
        assert_eq!(err.fault, Fault::UnknownOpcode(0xFE));
    }

    #[test]
    fn test_fault_reports_opcode_and_position() {
        // exit-less: set r0 1; div r0 0;
        let mut code = vec![opcode("set", 2, 0), 0];
        code.extend_from_slice(&1i32.to_le_bytes());
        code.extend_from_slice(&[opcode("div", 2, 0), 0]);
        code.extend_from_slice(&0i32.to_le_bytes());
        let program = Program::from_parts(code, 1, Vec::new());
        let err = run(&program, &[]).unwrap_err();
        assert_eq!(err.fault, Fault::DivisionByZero);
        assert_eq!(err.opcode, "div");
        assert_eq!(err.pos, ProgramPos::new(6));
    }

    #[test]
    fn test_registers_reset_between_runs() {
        let mut code = vec![opcode("add", 2, 0), 1];
        code.extend_from_slice(&5i32.to_le_bytes());
        code.extend_from_slice(&[opcode("add", 2, 1), 0, 1, opcode("exit", 0, 0)]);
        let program = Program::from_parts(code, 2, Vec::new());
        let vm = Vm::new();
        let mut worker = Worker::new();
        assert_eq!(vm.run(&program, &mut worker, &[1]), Ok(6));
        assert_eq!(vm.run(&program, &mut worker, &[1]), Ok(6));
    }
}
