//! Inbound message reassembly.

pub mod assembler;
pub mod fragment;

pub use assembler::{Assembled, MessageAssembler};
pub use fragment::{FragmentHeader, Received};
