pub mod host;
pub mod ops;
pub mod registers;
pub mod runtime_error;
pub mod vm;

pub use host::HostObjects;
pub use registers::{MAX_REGISTERS, RegisterFile};
pub use runtime_error::{Fault, RuntimeError};
pub use vm::{ExecConfig, Vm, Worker, run};
