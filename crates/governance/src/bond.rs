//! Bond and reserve bookkeeping

use turret_crypto::AccountId;
use turret_ledger::{AccountRecord, Amount, Asset, PaymentRecord};

use crate::{GovernanceError, GovernanceResult, Stage};

/// Entries every account carries reserve for regardless of content
pub const BASE_RESERVE_ENTRIES: u64 = 2;

/// Starting balance of a proposal account:
/// `(2 + signers + trustlines + data entries) * reserve_unit`
pub fn minimum_reserve(
    reserve_unit: Amount,
    signers: usize,
    trustlines: usize,
    data_entries: usize,
) -> GovernanceResult<Amount> {
    let entries = BASE_RESERVE_ENTRIES + (signers + trustlines + data_entries) as u64;
    reserve_unit
        .checked_mul(entries)
        .ok_or_else(|| GovernanceError::precondition(Stage::Create, "reserve exceeds the tradable maximum"))
}

/// Size of each option's sell order: what is left of the tradable maximum
/// after the bond, split evenly and truncated to stroops
pub fn offer_amount(max_tradable: Amount, bond: Amount, options: usize) -> GovernanceResult<Amount> {
    let available = max_tradable
        .checked_sub(bond)
        .ok_or_else(|| GovernanceError::precondition(Stage::Create, "bond exceeds the tradable maximum"))?;
    let parts = u32::try_from(options)
        .map_err(|_| GovernanceError::precondition(Stage::Create, format!("{} options is too many", options)))?;
    available
        .split_even(parts)
        .map_err(|e| GovernanceError::precondition(Stage::Create, e.to_string()))
}

/// Fail with `InsufficientFunds` unless `funder` holds at least `bond` of `token`
pub fn check_bond(funder: &AccountRecord, token: &Asset, bond: Amount) -> GovernanceResult<()> {
    let available = funder.balance_of(token);
    if available >= bond {
        Ok(())
    } else {
        Err(GovernanceError::InsufficientFunds {
            account: funder.id,
            asset: token.clone(),
            required: bond,
            available,
        })
    }
}

/// The bond the proposer paid into the proposal account, found in the
/// proposal account's payment history
pub fn bond_payment(
    payments: &[PaymentRecord],
    proposer: &AccountId,
    proposal: &AccountId,
    token: &Asset,
) -> Option<Amount> {
    payments.iter().find_map(|payment| match payment {
        PaymentRecord::Payment {
            from,
            to,
            asset,
            amount,
        } if from == proposer && to == proposal && asset == token => Some(*amount),
        _ => None,
    })
}

/// The account that created `account`, from its payment history
pub fn account_creator(payments: &[PaymentRecord], account: &AccountId) -> Option<AccountId> {
    payments.iter().find_map(|payment| match payment {
        PaymentRecord::CreateAccount {
            funder,
            account: created,
            ..
        } if created == account => Some(*funder),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use turret_crypto::KeyPair;
    use turret_ledger::Balance;

    fn id(seed: u8) -> AccountId {
        KeyPair::from_seed_bytes([seed; 32]).unwrap().account_id()
    }

    #[test]
    fn test_minimum_reserve() {
        let unit = Amount::parse("0.5").unwrap();
        assert_eq!(minimum_reserve(unit, 8, 1, 9).unwrap(), Amount::new(10));
        assert_eq!(minimum_reserve(unit, 0, 0, 0).unwrap(), Amount::new(1));
    }

    #[test]
    fn test_offer_amount_truncates() {
        let amount = offer_amount(Amount::max_tradable(), Amount::new(100), 3).unwrap();
        assert_eq!(amount.to_string(), "307445734528.4925269");
        assert!(offer_amount(Amount::new(10), Amount::new(11), 2).is_err());
    }

    #[test]
    fn test_check_bond() {
        let token = Asset::credit("VOTE", id(9)).unwrap();
        let mut funder = AccountRecord::new(id(1), 1);
        funder.balances.push(Balance {
            asset: token.clone(),
            amount: Amount::new(99),
        });

        match check_bond(&funder, &token, Amount::new(100)) {
            Err(GovernanceError::InsufficientFunds { required, available, .. }) => {
                assert_eq!(required, Amount::new(100));
                assert_eq!(available, Amount::new(99));
            }
            other => panic!("expected insufficient funds, got {:?}", other),
        }
        assert!(check_bond(&funder, &token, Amount::new(99)).is_ok());
    }

    #[test]
    fn test_history_lookups() {
        let token = Asset::credit("VOTE", id(9)).unwrap();
        let history = vec![
            PaymentRecord::CreateAccount {
                funder: id(5),
                account: id(2),
                starting_balance: Amount::new(10),
            },
            PaymentRecord::Payment {
                from: id(1),
                to: id(2),
                asset: Asset::Native,
                amount: Amount::new(3),
            },
            PaymentRecord::Payment {
                from: id(1),
                to: id(2),
                asset: token.clone(),
                amount: Amount::new(100),
            },
        ];

        assert_eq!(bond_payment(&history, &id(1), &id(2), &token), Some(Amount::new(100)));
        assert_eq!(bond_payment(&history, &id(3), &id(2), &token), None);
        assert_eq!(account_creator(&history, &id(2)), Some(id(5)));
        assert_eq!(account_creator(&history, &id(1)), None);
    }
}
