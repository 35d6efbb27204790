//! Account addresses and the per-address payout schedule.

use crate::{NetworkType, TypeError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of the bs58 payload: prefix + spend + view + override flag
/// (+ interval/offset when present) + checksum.
const CHECKSUM_LENGTH: usize = 4;

/// Optional per-address override of the batching schedule.
///
/// When absent, the payout offset is derived from the spend key so that
/// payouts spread uniformly across the batching interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PayoutSchedule {
    pub interval: u64,
    pub offset: u64,
}

/// An account address: network prefix, spend and view public keys, and an
/// optional payout-schedule override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountAddress {
    pub prefix: u8,
    pub spend: [u8; 32],
    pub view: [u8; 32],
    pub payout_override: Option<PayoutSchedule>,
}

impl AccountAddress {
    pub fn new(network: NetworkType, spend: [u8; 32], view: [u8; 32]) -> Self {
        Self { prefix: network.address_prefix(), spend, view, payout_override: None }
    }

    pub fn with_payout_override(mut self, interval: u64, offset: u64) -> Self {
        self.payout_override = Some(PayoutSchedule { interval, offset });
        self
    }

    /// The next height strictly after `last_height` at which this address is
    /// due its batched accruals: the smallest `h > last_height` with
    /// `h ≡ offset (mod interval)`.
    pub fn next_payout_height(&self, last_height: u64, default_interval: u64) -> u64 {
        let (interval, offset) = match self.payout_override {
            Some(sched) => {
                let interval = sched.interval.max(1);
                (interval, sched.offset % interval)
            }
            None => {
                let interval = default_interval.max(1);
                let derived =
                    u64::from_le_bytes(self.spend[..8].try_into().expect("8 bytes"));
                (interval, derived % interval)
            }
        };

        let next = last_height + 1;
        let rem = next % interval;
        if rem <= offset {
            next + (offset - rem)
        } else {
            next + interval - (rem - offset)
        }
    }

    /// Render as the canonical bs58 string stored in the rewards ledger.
    pub fn to_address_string(&self) -> String {
        let mut payload = Vec::with_capacity(1 + 32 + 32 + 17 + CHECKSUM_LENGTH);
        payload.push(self.prefix);
        payload.extend_from_slice(&self.spend);
        payload.extend_from_slice(&self.view);
        match self.payout_override {
            Some(sched) => {
                payload.push(1);
                payload.extend_from_slice(&sched.interval.to_le_bytes());
                payload.extend_from_slice(&sched.offset.to_le_bytes());
            }
            None => payload.push(0),
        }
        let checksum = blake3::hash(&payload);
        payload.extend_from_slice(&checksum.as_bytes()[..CHECKSUM_LENGTH]);
        bs58::encode(payload).into_string()
    }

    /// Parse a rendered address, verifying the checksum.
    pub fn from_address_string(s: &str) -> Result<Self, TypeError> {
        let payload = bs58::decode(s)
            .into_vec()
            .map_err(|e| TypeError::InvalidAddress(e.to_string()))?;
        // prefix + keys + flag + checksum is the minimum shape
        if payload.len() < 1 + 32 + 32 + 1 + CHECKSUM_LENGTH {
            return Err(TypeError::InvalidAddress(format!(
                "payload too short: {} bytes",
                payload.len()
            )));
        }
        let (body, checksum) = payload.split_at(payload.len() - CHECKSUM_LENGTH);
        if &blake3::hash(body).as_bytes()[..CHECKSUM_LENGTH] != checksum {
            return Err(TypeError::InvalidAddress("checksum mismatch".to_string()));
        }

        let prefix = body[0];
        let spend: [u8; 32] = body[1..33].try_into().expect("32 bytes");
        let view: [u8; 32] = body[33..65].try_into().expect("32 bytes");
        let payout_override = match body[65] {
            0 if body.len() == 66 => None,
            1 if body.len() == 66 + 16 => {
                let interval = u64::from_le_bytes(body[66..74].try_into().expect("8 bytes"));
                let offset = u64::from_le_bytes(body[74..82].try_into().expect("8 bytes"));
                Some(PayoutSchedule { interval, offset })
            }
            _ => {
                return Err(TypeError::InvalidAddress("malformed payout override".to_string()))
            }
        };

        Ok(Self { prefix, spend, view, payout_override })
    }

    /// Parse and require the address to belong to `network`.
    pub fn from_address_string_for(
        s: &str,
        network: NetworkType,
    ) -> Result<Self, TypeError> {
        let addr = Self::from_address_string(s)?;
        let expected = network.address_prefix();
        if addr.prefix != expected {
            return Err(TypeError::WrongAddressPrefix { expected, got: addr.prefix });
        }
        Ok(addr)
    }
}

impl fmt::Display for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_address_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(seed: u8) -> AccountAddress {
        AccountAddress::new(NetworkType::Fakechain, [seed; 32], [seed.wrapping_add(1); 32])
    }

    #[test]
    fn render_parse_round_trip() {
        let a = addr(9);
        let s = a.to_address_string();
        assert_eq!(AccountAddress::from_address_string(&s).unwrap(), a);

        let b = addr(4).with_payout_override(20, 7);
        let s = b.to_address_string();
        assert_eq!(AccountAddress::from_address_string(&s).unwrap(), b);
    }

    #[test]
    fn corrupt_string_is_rejected() {
        let mut s = addr(9).to_address_string();
        s.pop();
        s.push('1');
        assert!(AccountAddress::from_address_string(&s).is_err());
    }

    #[test]
    fn wrong_network_prefix_is_rejected() {
        let s = addr(9).to_address_string();
        assert!(AccountAddress::from_address_string_for(&s, NetworkType::Mainnet).is_err());
    }

    #[test]
    fn next_payout_height_lands_on_offset() {
        let a = addr(3).with_payout_override(10, 3);
        assert_eq!(a.next_payout_height(12, 999), 13);
        assert_eq!(a.next_payout_height(13, 999), 23);
        // Strictly after last_height even when last_height is itself due.
        assert_eq!(a.next_payout_height(23, 999), 33);
    }

    #[test]
    fn derived_offset_spreads_across_interval() {
        let interval = 2520;
        let a = addr(11);
        let h = a.next_payout_height(100_000, interval);
        assert!(h > 100_000);
        assert!(h <= 100_000 + interval);
        let derived = u64::from_le_bytes([11; 8]) % interval;
        assert_eq!(h % interval, derived);
    }
}
