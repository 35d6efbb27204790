//! 128-bit reward arithmetic.

use crate::{LedgerError, LedgerResult};
use oxen_config::rewards::STAKING_PORTIONS;
use oxen_types::{BatchPayment, HardFork, ServiceNodeInfo};

/// `floor(a * b / divisor)` with a 128-bit intermediate. The quotient
/// overflowing 64 bits means reward inputs are corrupt, which is fatal.
pub fn mul128_div64(a: u64, b: u64, divisor: u64, what: &'static str) -> LedgerResult<u64> {
    if divisor == 0 {
        return Err(LedgerError::ArithmeticOverflow(what));
    }
    let quotient = (a as u128) * (b as u128) / (divisor as u128);
    u64::try_from(quotient).map_err(|_| LedgerError::ArithmeticOverflow(what))
}

/// Split `distribution_amount` across a service node's stakers: first the
/// operator fee (`portions_for_operator / STAKING_PORTIONS` of the whole),
/// then the remainder pro rata over every contribution row, the operator's
/// own stake included. Zero shares produce no payment.
pub fn calculate_rewards(
    _hf: HardFork,
    distribution_amount: u64,
    sn_info: &ServiceNodeInfo,
) -> LedgerResult<Vec<BatchPayment>> {
    let operator_fee = mul128_div64(
        sn_info.portions_for_operator,
        distribution_amount,
        STAKING_PORTIONS,
        "sn operator fee",
    )?;

    let mut payments = Vec::with_capacity(1 + sn_info.contributors.len());
    if operator_fee > 0 {
        payments.push(BatchPayment::new(sn_info.operator_address, operator_fee));
    }

    let remainder = distribution_amount
        .checked_sub(operator_fee)
        .ok_or(LedgerError::ArithmeticOverflow("sn operator fee"))?;
    let total_contributed = sn_info.total_contributed();
    if total_contributed == 0 {
        return Ok(payments);
    }

    for contributor in &sn_info.contributors {
        let share = mul128_div64(
            contributor.amount,
            remainder,
            total_contributed,
            "sn contributor reward",
        )?;
        if share > 0 {
            payments.push(BatchPayment::new(contributor.address, share));
        }
    }

    Ok(payments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxen_types::{AccountAddress, Contributor, NetworkType};

    fn addr(seed: u8) -> AccountAddress {
        AccountAddress::new(NetworkType::Fakechain, [seed; 32], [seed; 32])
    }

    fn node(portions: u64, contributors: Vec<(u8, u64)>) -> ServiceNodeInfo {
        ServiceNodeInfo {
            operator_address: addr(1),
            portions_for_operator: portions,
            contributors: contributors
                .into_iter()
                .map(|(seed, amount)| Contributor { address: addr(seed), amount })
                .collect(),
            active: true,
            bls_pubkey: oxen_types::crypto::BlsKeypair::from_seed(&[1; 32])
                .unwrap()
                .public()
                .to_owned(),
        }
    }

    #[test]
    fn splits_pro_rata_after_operator_fee() {
        // Operator takes half, remainder splits 40/60.
        let info = node(STAKING_PORTIONS / 2, vec![(2, 40), (3, 60)]);
        let payments = calculate_rewards(19, 1000, &info).unwrap();
        assert_eq!(payments.len(), 3);
        assert_eq!(payments[0], BatchPayment::new(addr(1), 500));
        assert_eq!(payments[1], BatchPayment::new(addr(2), 200));
        assert_eq!(payments[2], BatchPayment::new(addr(3), 300));
    }

    #[test]
    fn zero_operator_fee_emits_no_operator_payment() {
        let info = node(0, vec![(2, 1)]);
        let payments = calculate_rewards(19, 700, &info).unwrap();
        assert_eq!(payments, vec![BatchPayment::new(addr(2), 700)]);
    }

    #[test]
    fn zero_shares_are_skipped() {
        // One contributor so small its floor share is zero.
        let info = node(0, vec![(2, 1), (3, 1_000_000)]);
        let payments = calculate_rewards(19, 10, &info).unwrap();
        assert_eq!(payments, vec![BatchPayment::new(addr(3), 9)]);
    }

    #[test]
    fn full_portions_hand_everything_to_the_operator() {
        let info = node(STAKING_PORTIONS, vec![(2, 100)]);
        let payments = calculate_rewards(19, 1_000_000, &info).unwrap();
        assert_eq!(payments[0].address, addr(1));
        assert_eq!(payments[0].amount, 1_000_000);
        // The remainder is 0, so contributors get nothing.
        assert_eq!(payments.len(), 1);
    }

    #[test]
    fn division_by_zero_portions_is_fatal() {
        assert!(matches!(
            mul128_div64(1, 1, 0, "test"),
            Err(LedgerError::ArithmeticOverflow(_))
        ));
    }
}
