//! Parameters of the target machine: x86-64 Linux with the System V
//! calling convention. Everything downstream of the type system reads
//! these constants rather than hard-coding widths.

pub const SIZEOF_CHAR: u64 = 1;
pub const SIZEOF_INT: u64 = 4;
pub const SIZEOF_LONG: u64 = 8;
pub const SIZEOF_PTR: u64 = 8;
pub const SIZEOF_REG: i64 = 8;

/// Every argument slot on the stack is eight bytes wide.
pub const SIZEOF_PARAM: i64 = 8;

/// The first six integer arguments travel in registers.
pub const NUM_PARAM_REGS: usize = 6;

pub const STACK_ALIGNMENT: i64 = 16;

/// Local (assembler-private) labels are spelled `.L0`, `.L1`, ...
pub const LABEL_PREFIX: &str = ".L";
