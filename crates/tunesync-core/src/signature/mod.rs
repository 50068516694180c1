//! Signature scanning over player code sections.

mod pattern;
pub mod pe;
mod resolve;
mod scanner;

pub use pattern::Signature;
pub use pe::{CodeSection, locate_code_section};
pub use resolve::{AnchorSignature, Operand};
pub use scanner::{CodeSectionSnapshot, SignatureScanner};
