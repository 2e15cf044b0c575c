//! Per-account, per-operation cooldowns
//!
//! Each `(account, kind)` pair is either `Ready` or `InCooldown { until }`.
//! Only the last-performed timestamp is stored; the window is applied when
//! the state is read, so an absent entry is the implicit first-ever `Ready`.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tierstake_core::{AccountId, LedgerError, OperationKind, Result, Timestamp};

use crate::config::CooldownWindows;

/// Cooldown state of one operation kind
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CooldownStatus {
    Ready,
    InCooldown { until: Timestamp },
}

/// Last-performed timestamps for one account
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownState {
    pub last_performed: BTreeMap<OperationKind, Timestamp>,
}

/// Cooldown timestamps for every account
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CooldownBook {
    accounts: HashMap<AccountId, CooldownState>,
}

impl CooldownBook {
    pub fn last_performed(&self, account: &AccountId, kind: OperationKind) -> Option<Timestamp> {
        self.accounts
            .get(account)
            .and_then(|s| s.last_performed.get(&kind).copied())
    }

    pub fn state(&self, account: &AccountId) -> CooldownState {
        self.accounts.get(account).cloned().unwrap_or_default()
    }

    fn record(&mut self, account: AccountId, kind: OperationKind, now: Timestamp) {
        self.accounts
            .entry(account)
            .or_default()
            .last_performed
            .insert(kind, now);
    }
}

/// Applies configured windows to a [`CooldownBook`]
#[derive(Clone, Copy, Debug)]
pub struct CooldownPolicy<'a> {
    windows: &'a CooldownWindows,
}

impl<'a> CooldownPolicy<'a> {
    pub fn new(windows: &'a CooldownWindows) -> Self {
        Self { windows }
    }

    pub fn status(
        &self,
        book: &CooldownBook,
        account: &AccountId,
        kind: OperationKind,
        now: Timestamp,
    ) -> CooldownStatus {
        match book.last_performed(account, kind) {
            Some(last) => {
                let until = last.saturating_add(self.windows.seconds(kind));
                if now < until {
                    CooldownStatus::InCooldown { until }
                } else {
                    CooldownStatus::Ready
                }
            }
            None => CooldownStatus::Ready,
        }
    }

    /// `CooldownActive` unless the operation is `Ready`
    pub fn check(
        &self,
        book: &CooldownBook,
        account: &AccountId,
        kind: OperationKind,
        now: Timestamp,
    ) -> Result<()> {
        match self.status(book, account, kind, now) {
            CooldownStatus::Ready => Ok(()),
            CooldownStatus::InCooldown { until } => {
                Err(LedgerError::CooldownActive { kind, until })
            }
        }
    }

    /// Transition to `InCooldown(now + window)` after a successful operation
    pub fn record(
        &self,
        book: &mut CooldownBook,
        account: AccountId,
        kind: OperationKind,
        now: Timestamp,
    ) {
        book.record(account, kind, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tierstake_core::constants::SECONDS_PER_DAY;

    #[test]
    fn test_first_use_is_ready() {
        let windows = CooldownWindows::default();
        let policy = CooldownPolicy::new(&windows);
        let book = CooldownBook::default();
        let alice = AccountId::from_label("alice");
        for kind in OperationKind::ALL {
            assert_eq!(policy.status(&book, &alice, kind, 0), CooldownStatus::Ready);
        }
    }

    #[test]
    fn test_window_boundaries() {
        let windows = CooldownWindows::default();
        let policy = CooldownPolicy::new(&windows);
        let mut book = CooldownBook::default();
        let alice = AccountId::from_label("alice");
        let start = 1_000;

        policy.record(&mut book, alice, OperationKind::ClaimReward, start);
        let until = start + 30 * SECONDS_PER_DAY;
        assert_eq!(
            policy.check(&book, &alice, OperationKind::ClaimReward, until - 1),
            Err(LedgerError::CooldownActive {
                kind: OperationKind::ClaimReward,
                until
            })
        );
        assert!(policy.check(&book, &alice, OperationKind::ClaimReward, until).is_ok());

        // other kinds are independent
        assert!(policy.check(&book, &alice, OperationKind::Reinvest, start).is_ok());
    }

    #[test]
    fn test_reinvest_window_is_shorter() {
        let windows = CooldownWindows::default();
        let policy = CooldownPolicy::new(&windows);
        let mut book = CooldownBook::default();
        let bob = AccountId::from_label("bob");
        policy.record(&mut book, bob, OperationKind::Reinvest, 0);
        assert_eq!(
            policy.status(&book, &bob, OperationKind::Reinvest, 6 * SECONDS_PER_DAY),
            CooldownStatus::InCooldown {
                until: 7 * SECONDS_PER_DAY
            }
        );
        assert_eq!(
            policy.status(&book, &bob, OperationKind::Reinvest, 7 * SECONDS_PER_DAY),
            CooldownStatus::Ready
        );
    }
}
