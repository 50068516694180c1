use tracing::debug;

use crate::error::Result;
use crate::process::{ReadMemory, RemoteAddress};
use crate::signature::{Signature, SignatureScanner};

/// How the operand of an anchored instruction turns into an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// x64 `[rip + disp32]`: target = match + `instr_len` + disp32 read at `disp_offset`.
    RipRelative { disp_offset: u64, instr_len: u64 },
    /// x86 absolute `moffs32`: target is the u32 stored at `offset`.
    Absolute32 { offset: u64 },
}

/// A code signature that anchors one data address in a player module.
#[derive(Debug, Clone, Copy)]
pub struct AnchorSignature {
    pub name: &'static str,
    pub pattern: &'static str,
    pub operand: Operand,
}

impl AnchorSignature {
    /// Scan for the anchor and decode its operand.
    ///
    /// Only a malformed pattern is an error. A missing match or an unreadable
    /// operand yields `RemoteAddress::UNRESOLVED`.
    pub fn resolve<R: ReadMemory + ?Sized>(
        &self,
        scanner: &SignatureScanner,
        reader: &R,
        pid: u32,
        module_base: u64,
    ) -> Result<RemoteAddress> {
        let signature = Signature::parse(self.pattern)?;
        let Some(found) = scanner.find(reader, pid, module_base, &signature) else {
            debug!("Anchor '{}' not found", self.name);
            return Ok(RemoteAddress::UNRESOLVED);
        };

        let target = match self.operand {
            Operand::RipRelative {
                disp_offset,
                instr_len,
            } => reader
                .read_i32(found + disp_offset)
                .map(|disp| (found + instr_len).wrapping_add_signed(i64::from(disp))),
            Operand::Absolute32 { offset } => reader.read_u32(found + offset).map(u64::from),
        };

        match target {
            Ok(address) => {
                debug!("Anchor '{}' at {:#x} -> {:#x}", self.name, found, address);
                Ok(RemoteAddress::new(address))
            }
            Err(e) => {
                debug!("Anchor '{}' operand unreadable: {}", self.name, e);
                Ok(RemoteAddress::UNRESOLVED)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::MockMemoryBuilder;
    use std::time::Duration;

    fn scanner() -> SignatureScanner {
        SignatureScanner::new(10, Duration::from_secs(300))
    }

    #[test]
    fn test_rip_relative() {
        // lea rcx, [rip + 0x100] at 0x1400; next instruction at 0x1407.
        let mut code = vec![0x48, 0x8D, 0x0D];
        code.extend_from_slice(&0x100i32.to_le_bytes());
        code.push(0xC3);
        let reader = MockMemoryBuilder::new()
            .with_code_section(0x400, &code)
            .build();
        let anchor = AnchorSignature {
            name: "player",
            pattern: "48 8D 0D ? ? ? ? C3",
            operand: Operand::RipRelative {
                disp_offset: 3,
                instr_len: 7,
            },
        };

        let address = anchor.resolve(&scanner(), &reader, 1, 0x1000).unwrap();
        assert_eq!(address, RemoteAddress::new(0x1407 + 0x100));
    }

    #[test]
    fn test_rip_relative_negative_displacement() {
        let mut code = vec![0x66, 0x0F, 0x2E, 0x0D];
        code.extend_from_slice(&(-0x20i32).to_le_bytes());
        let reader = MockMemoryBuilder::new()
            .with_code_section(0x400, &code)
            .build();
        let anchor = AnchorSignature {
            name: "schedule",
            pattern: "66 0F 2E 0D ? ? ? ?",
            operand: Operand::RipRelative {
                disp_offset: 4,
                instr_len: 8,
            },
        };

        let address = anchor.resolve(&scanner(), &reader, 1, 0x1000).unwrap();
        assert_eq!(address.get(), 0x1408 - 0x20);
    }

    #[test]
    fn test_absolute32() {
        let mut code = vec![0xA2];
        code.extend_from_slice(&0x0567_8000u32.to_le_bytes());
        code.push(0xA3);
        let reader = MockMemoryBuilder::new()
            .with_code_section(0x400, &code)
            .build();
        let anchor = AnchorSignature {
            name: "song info",
            pattern: "A2 ? ? ? ? A3",
            operand: Operand::Absolute32 { offset: 1 },
        };

        let address = anchor.resolve(&scanner(), &reader, 1, 0x1000).unwrap();
        assert_eq!(address.get(), 0x0567_8000);
    }

    #[test]
    fn test_not_found_is_unresolved() {
        let reader = MockMemoryBuilder::new()
            .with_code_section(0x400, &[0x90; 16])
            .build();
        let anchor = AnchorSignature {
            name: "missing",
            pattern: "A2 ? ? ? ? A3",
            operand: Operand::Absolute32 { offset: 1 },
        };
        assert_eq!(
            anchor.resolve(&scanner(), &reader, 1, 0x1000).unwrap(),
            RemoteAddress::UNRESOLVED
        );
    }

    #[test]
    fn test_malformed_pattern_is_error() {
        let reader = MockMemoryBuilder::new().build();
        let anchor = AnchorSignature {
            name: "broken",
            pattern: "ZZ",
            operand: Operand::Absolute32 { offset: 1 },
        };
        assert!(anchor.resolve(&scanner(), &reader, 1, 0x1000).is_err());
    }
}
