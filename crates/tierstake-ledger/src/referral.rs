//! # Referral Tree
//!
//! A forest of parent → children links kept as an adjacency map keyed by
//! account. Every edge insertion is preceded by an explicit ancestor walk,
//! so no account can ever become its own ancestor.
//!
//! ```text
//!        A            register(B, A)   ok
//!        │            register(C, B)   ok
//!        B            register(A, C)   CircularReference (C → B → A)
//!        │            unlink(B)        A loses child B; C stays under B
//!        C
//! ```

use hashbrown::HashMap;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use tierstake_core::{AccountId, LedgerError, Result};

/// Parent pointer and child set for one account
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralNode {
    pub parent: Option<AccountId>,
    pub children: IndexSet<AccountId>,
}

/// Adjacency map of referral edges
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ReferralTree {
    nodes: HashMap<AccountId, ReferralNode>,
}

impl ReferralTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, account: &AccountId) -> Option<&ReferralNode> {
        self.nodes.get(account)
    }

    pub fn parent(&self, account: &AccountId) -> Option<AccountId> {
        self.nodes.get(account).and_then(|n| n.parent)
    }

    pub fn children(&self, account: &AccountId) -> impl Iterator<Item = &AccountId> {
        self.nodes.get(account).into_iter().flat_map(|n| n.children.iter())
    }

    /// Does `candidate_child` appear among `candidate_parent` and its ancestors?
    pub fn is_circular(&self, candidate_parent: &AccountId, candidate_child: &AccountId) -> bool {
        let mut cursor = Some(*candidate_parent);
        // bounded by the node count even if the forest invariant were broken
        let mut budget = self.nodes.len() + 1;
        while let Some(current) = cursor {
            if current == *candidate_child {
                return true;
            }
            if budget == 0 {
                return true;
            }
            budget -= 1;
            cursor = self.parent(&current);
        }
        false
    }

    /// Validate a registration without applying it
    pub fn check_register(&self, account: &AccountId, referrer: &AccountId) -> Result<()> {
        if account.is_zero() {
            return Err(LedgerError::InvalidAccount(*account));
        }
        if referrer.is_zero() {
            return Err(LedgerError::InvalidAccount(*referrer));
        }
        if self.is_circular(referrer, account) {
            return Err(LedgerError::CircularReference {
                account: *account,
                referrer: *referrer,
            });
        }
        if self.parent(account).is_some() {
            return Err(LedgerError::AlreadyRegistered(*account));
        }
        Ok(())
    }

    /// Attach `account` under `referrer`
    pub fn register(&mut self, account: AccountId, referrer: AccountId) -> Result<()> {
        self.check_register(&account, &referrer)?;
        self.nodes.entry(account).or_default().parent = Some(referrer);
        self.nodes.entry(referrer).or_default().children.insert(account);
        Ok(())
    }

    /// Detach `account` from its parent and return the former parent.
    ///
    /// The child is swap-removed, so the order of the parent's remaining
    /// children changes. The account's own subtree stays attached to it.
    pub fn unlink(&mut self, account: &AccountId) -> Result<AccountId> {
        let parent = self
            .parent(account)
            .ok_or(LedgerError::NotRegistered(*account))?;
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.swap_remove(account);
        }
        if let Some(node) = self.nodes.get_mut(account) {
            node.parent = None;
        }
        Ok(parent)
    }

    /// Up to `limit` ancestors, nearest first
    pub fn ancestors(&self, account: &AccountId, limit: usize) -> Vec<AccountId> {
        let mut chain = Vec::with_capacity(limit);
        let mut cursor = self.parent(account);
        while let Some(ancestor) = cursor {
            if chain.len() >= limit || ancestor == *account || chain.contains(&ancestor) {
                break;
            }
            chain.push(ancestor);
            cursor = self.parent(&ancestor);
        }
        chain
    }

    /// Number of accounts that appear in any edge
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// True when no account reaches itself through parent edges
    pub fn is_forest(&self) -> bool {
        self.nodes.keys().all(|account| match self.parent(account) {
            Some(parent) => !self.is_circular(&parent, account),
            None => true,
        })
    }
}
