use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use super::a12::A12Snapshot;
use super::error::StateError;
use super::irq::IrqSnapshot;
use super::mapper::Mirroring;

// Record layout: magic, version, SHA-1 of the payload, JSON payload.
const MAGIC: &[u8; 4] = b"A12S";
const VERSION: u8 = 1;
const DIGEST_LEN: usize = 20;
const HEADER_LEN: usize = MAGIC.len() + 1 + DIGEST_LEN;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapperState {
    pub chip: String,
    pub irq: IrqSnapshot,
    pub a12: A12Snapshot,
    pub bank_registers: Vec<u8>,
    // Bank select, RAM protect and similar latches.
    pub control: Vec<u8>,
    pub mirroring: Mirroring,
}

impl MapperState {
    pub fn encode(&self) -> Result<Vec<u8>, StateError> {
        let payload = serde_json::to_vec(self).map_err(StateError::Encode)?;
        let digest = Sha1::digest(&payload);

        let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
        out.extend_from_slice(MAGIC);
        out.push(VERSION);
        out.extend_from_slice(&digest);
        out.extend_from_slice(&payload);
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, StateError> {
        if bytes.len() < MAGIC.len() {
            return Err(StateError::Truncated { len: bytes.len() });
        }
        if &bytes[..MAGIC.len()] != MAGIC {
            return Err(StateError::BadMagic);
        }
        if bytes.len() < HEADER_LEN {
            return Err(StateError::Truncated { len: bytes.len() });
        }

        let version = bytes[MAGIC.len()];
        if version != VERSION {
            return Err(StateError::UnsupportedVersion(version));
        }

        let digest = &bytes[MAGIC.len() + 1..HEADER_LEN];
        let payload = &bytes[HEADER_LEN..];
        if Sha1::digest(payload).as_slice() != digest {
            return Err(StateError::ChecksumMismatch);
        }

        Ok(serde_json::from_slice(payload)?)
    }

    pub fn expect_layout(
        &self,
        chip: &'static str,
        banks: usize,
        control: usize,
    ) -> Result<(), StateError> {
        if self.chip != chip {
            return Err(StateError::ChipMismatch {
                expected: chip,
                found: self.chip.clone(),
            });
        }
        if self.bank_registers.len() != banks {
            return Err(StateError::BankCount {
                expected: banks,
                found: self.bank_registers.len(),
            });
        }
        if self.control.len() != control {
            return Err(StateError::ControlCount {
                expected: control,
                found: self.control.len(),
            });
        }
        Ok(())
    }
}
