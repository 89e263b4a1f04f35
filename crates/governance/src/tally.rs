//! Tally engine
//!
//! Votes are the circulating supply of each `OPTION<n>` asset. The engine is
//! pure: it sees only `(option, amount)` pairs and a quorum.

use std::fmt::Debug;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use turret_ledger::{option_index, Amount, AssetRecord};

use crate::{GovernanceError, GovernanceResult};

/// Votes counted for one option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionTally {
    /// 1-based option index
    pub index: usize,
    /// Circulating amount of the option asset
    pub amount: Amount,
}

/// No option reached the quorum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no option reached the quorum of {quorum}")]
pub struct NoQuorum {
    pub quorum: Amount,
}

/// A rule deciding the winner from per-option tallies
pub trait TallyRule: Send + Sync + Debug {
    /// The winning option index, or `NoQuorum`
    fn decide(&self, tallies: &[OptionTally]) -> Result<usize, NoQuorum>;
}

/// A fixed quorum: options at or above it compete, the largest amount wins,
/// and among equal amounts the option listed last wins
#[derive(Debug, Clone, Copy)]
pub struct StaticQuorum {
    quorum: Amount,
}

impl StaticQuorum {
    pub fn new(quorum: Amount) -> Self {
        Self { quorum }
    }

    pub fn quorum(&self) -> Amount {
        self.quorum
    }
}

impl TallyRule for StaticQuorum {
    fn decide(&self, tallies: &[OptionTally]) -> Result<usize, NoQuorum> {
        let mut reached: Vec<&OptionTally> = tallies.iter().filter(|t| t.amount >= self.quorum).collect();
        // stable, so equal amounts keep input order
        reached.sort_by(|a, b| a.amount.cmp(&b.amount));

        let winner = reached.last().map(|t| t.index).ok_or(NoQuorum { quorum: self.quorum })?;
        debug!(
            "Option {} wins with {} of {} options reaching quorum {}",
            winner,
            reached.len(),
            tallies.len(),
            self.quorum
        );
        Ok(winner)
    }
}

/// Turn the assets issued by a proposal account into tallies. Every asset
/// must be `OPTION<n>` for an option the proposal actually has.
pub fn collect_tallies(assets: &[AssetRecord], option_count: usize) -> GovernanceResult<Vec<OptionTally>> {
    assets
        .iter()
        .map(|asset| match option_index(&asset.code) {
            Some(index) if (1..=option_count).contains(&index) => Ok(OptionTally {
                index,
                amount: asset.amount,
            }),
            _ => Err(GovernanceError::tally(format!(
                "malformed option asset {} (proposal has {} options)",
                asset.code, option_count
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use turret_crypto::KeyPair;

    fn tallies(pairs: &[(usize, i64)]) -> Vec<OptionTally> {
        pairs
            .iter()
            .map(|&(index, amount)| OptionTally {
                index,
                amount: Amount::new(amount),
            })
            .collect()
    }

    #[test]
    fn test_tie_goes_to_last_listed() {
        let rule = StaticQuorum::new(Amount::new(100));
        assert_eq!(rule.decide(&tallies(&[(1, 50), (2, 150), (3, 150)])), Ok(3));
        assert_eq!(rule.decide(&tallies(&[(1, 50), (3, 150), (2, 150)])), Ok(2));
    }

    #[test]
    fn test_largest_amount_wins() {
        let rule = StaticQuorum::new(Amount::new(100));
        assert_eq!(rule.decide(&tallies(&[(1, 400), (2, 150), (3, 399)])), Ok(1));
    }

    #[test]
    fn test_quorum_is_inclusive() {
        let rule = StaticQuorum::new(Amount::new(100));
        assert_eq!(rule.decide(&tallies(&[(1, 99), (2, 100)])), Ok(2));
    }

    #[test]
    fn test_no_quorum() {
        let rule = StaticQuorum::new(Amount::new(1000));
        assert_eq!(
            rule.decide(&tallies(&[(1, 999), (2, 10)])),
            Err(NoQuorum {
                quorum: Amount::new(1000)
            })
        );
        assert!(rule.decide(&[]).is_err());
    }

    #[test]
    fn test_collect_rejects_foreign_assets() {
        let issuer = KeyPair::from_seed_bytes([4; 32]).unwrap().account_id();
        let record = |code: &str| AssetRecord {
            code: code.to_string(),
            issuer,
            amount: Amount::new(5),
        };

        let ok = collect_tallies(&[record("OPTION1"), record("OPTION2")], 2).unwrap();
        assert_eq!(ok.iter().map(|t| t.index).collect::<Vec<_>>(), vec![1, 2]);

        for bad in ["OPTION3", "OPTION0", "VOTE", "OPTION"] {
            assert!(matches!(
                collect_tallies(&[record(bad)], 2),
                Err(GovernanceError::Tally { .. })
            ));
        }
    }
}
