//! # Language data model
//!
//! Types, argument categories and name tables shared by the registry, the
//! compiler and the VM.
//!
//! ## Conventions
//!
//! - Every value is a 32-bit signed integer; host objects travel as small
//!   integer handles, never addresses.
//! - Names may contain `.`; `obj.method` is resolved by substituting the type
//!   name of `obj`.

pub mod names;
pub mod types;

pub use names::{LabelId, NamedRef, RefKind, SymbolTable};
pub use types::{ArgType, Param, TypeTag, ValueType};
