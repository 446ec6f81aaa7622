//! The 48-byte inline LUKS1 keyslot record, embedded 8 times in the
//! binary header, plus the AF-split key material it points at.

use crate::error::{Error, Result};

pub const NUM_KEYSLOTS: usize = 8;
pub const KEYSLOT1_SIZE: usize = 48;
const SALT_SIZE: usize = 32;

/// The two legal values of a keyslot's `active` marker. Stored on disk as
/// the sentinels `0x00AC71F3` (active) / `0x0000DEAD` (disabled); every
/// other value is rejected at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyslotState {
    Disabled,
    Active,
}

const STATE_ACTIVE: u32 = 0x00AC71F3;
const STATE_DISABLED: u32 = 0x0000DEAD;

impl KeyslotState {
    fn to_u32(self) -> u32 {
        match self {
            KeyslotState::Active => STATE_ACTIVE,
            KeyslotState::Disabled => STATE_DISABLED,
        }
    }

    fn from_u32(v: u32) -> Result<Self> {
        match v {
            STATE_ACTIVE => Ok(KeyslotState::Active),
            STATE_DISABLED => Ok(KeyslotState::Disabled),
            _ => Err(Error::BadParameter("unrecognized keyslot state marker")),
        }
    }
}

/// One LUKS1 keyslot record: PBKDF2 parameters for stretching the
/// passphrase, and where the AF-split master-key material lives.
#[derive(Debug, Clone)]
pub struct Keyslot1 {
    pub active: bool,
    pub iterations: u32,
    pub salt: [u8; SALT_SIZE],
    pub key_material_offset_sectors: u32,
    pub stripes: u32,
}

impl Keyslot1 {
    pub(crate) fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < KEYSLOT1_SIZE {
            return Err(Error::BufferTooSmall);
        }
        let state = KeyslotState::from_u32(u32::from_be_bytes(buf[0..4].try_into().unwrap()))?;
        let iterations = u32::from_be_bytes(buf[4..8].try_into().unwrap());
        let mut salt = [0u8; SALT_SIZE];
        salt.copy_from_slice(&buf[8..8 + SALT_SIZE]);
        let key_material_offset_sectors =
            u32::from_be_bytes(buf[40..44].try_into().unwrap());
        let stripes = u32::from_be_bytes(buf[44..48].try_into().unwrap());

        if state == KeyslotState::Active && iterations == 0 {
            return Err(Error::BadParameter("active keyslot has zero iterations"));
        }

        Ok(Keyslot1 {
            active: state == KeyslotState::Active,
            iterations,
            salt,
            key_material_offset_sectors,
            stripes,
        })
    }

    pub(crate) fn write(&self) -> [u8; KEYSLOT1_SIZE] {
        let mut buf = [0u8; KEYSLOT1_SIZE];
        let state = if self.active {
            KeyslotState::Active
        } else {
            KeyslotState::Disabled
        };
        buf[0..4].copy_from_slice(&state.to_u32().to_be_bytes());
        buf[4..8].copy_from_slice(&self.iterations.to_be_bytes());
        buf[8..8 + SALT_SIZE].copy_from_slice(&self.salt);
        buf[40..44].copy_from_slice(&self.key_material_offset_sectors.to_be_bytes());
        buf[44..48].copy_from_slice(&self.stripes.to_be_bytes());
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Keyslot1 {
        Keyslot1 {
            active: true,
            iterations: 12_345,
            salt: [0x7A; SALT_SIZE],
            key_material_offset_sectors: 8,
            stripes: 4000,
        }
    }

    #[test]
    fn write_then_parse_round_trips() {
        let slot = sample();
        let buf = slot.write();
        let parsed = Keyslot1::parse(&buf).unwrap();
        assert!(parsed.active);
        assert_eq!(parsed.iterations, 12_345);
        assert_eq!(parsed.salt, [0x7A; SALT_SIZE]);
        assert_eq!(parsed.stripes, 4000);
    }

    #[test]
    fn disabled_slot_round_trips() {
        let mut slot = sample();
        slot.active = false;
        slot.iterations = 0;
        let buf = slot.write();
        let parsed = Keyslot1::parse(&buf).unwrap();
        assert!(!parsed.active);
    }

    #[test]
    fn rejects_garbage_state_marker() {
        let mut buf = sample().write();
        buf[0..4].copy_from_slice(&0xDEADBEEFu32.to_be_bytes());
        assert!(Keyslot1::parse(&buf).is_err());
    }

    #[test]
    fn rejects_active_with_zero_iterations() {
        let mut slot = sample();
        slot.iterations = 0;
        // force active state even though iterations is zero — build the
        // buffer by hand to bypass Keyslot1::write's consistency.
        let mut buf = slot.write();
        buf[0..4].copy_from_slice(&STATE_ACTIVE.to_be_bytes());
        buf[4..8].copy_from_slice(&0u32.to_be_bytes());
        assert!(Keyslot1::parse(&buf).is_err());
    }
}
