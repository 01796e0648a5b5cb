//! Collaborators the services consult but do not own: the clock, the signed-in
//! operator and the branch directory.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bloomledger_core::{BranchName, OperatorId};

/// Source of "now" for ledger timestamps and `recomputed_at`.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant (tests, reproducible reconciliation runs).
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

impl<C> Clock for Arc<C>
where
    C: Clock + ?Sized,
{
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// Identity of whoever is performing stock mutations right now.
pub trait OperatorIdentity: Send + Sync {
    /// `None` when nobody is signed in.
    fn current_operator(&self) -> Option<OperatorId>;
}

/// A fixed operator (batch jobs, CLI, tests).
#[derive(Debug, Clone)]
pub struct StaticOperator(pub OperatorId);

impl OperatorIdentity for StaticOperator {
    fn current_operator(&self) -> Option<OperatorId> {
        Some(self.0.clone())
    }
}

/// Nobody signed in; every mutation must carry an explicit operator.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl OperatorIdentity for Anonymous {
    fn current_operator(&self) -> Option<OperatorId> {
        None
    }
}

impl<I> OperatorIdentity for Arc<I>
where
    I: OperatorIdentity + ?Sized,
{
    fn current_operator(&self) -> Option<OperatorId> {
        (**self).current_operator()
    }
}

/// Branch metadata as kept by the branch directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchInfo {
    pub name: BranchName,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Lookup of the chain's branches.
pub trait BranchDirectory: Send + Sync {
    fn branch(&self, name: &BranchName) -> Option<BranchInfo>;

    fn is_known(&self, name: &BranchName) -> bool {
        self.branch(name).is_some()
    }
}

/// Accepts every branch name (used when no directory is configured).
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenBranchDirectory;

impl BranchDirectory for OpenBranchDirectory {
    fn branch(&self, name: &BranchName) -> Option<BranchInfo> {
        Some(BranchInfo {
            name: name.clone(),
            address: None,
            phone: None,
        })
    }
}

#[derive(Debug, Default)]
pub struct InMemoryBranchDirectory {
    branches: RwLock<BTreeMap<BranchName, BranchInfo>>,
}

impl InMemoryBranchDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_branches<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let directory = Self::new();
        for name in names {
            if let Ok(name) = BranchName::parse(name) {
                directory.register(BranchInfo {
                    name,
                    address: None,
                    phone: None,
                });
            }
        }
        directory
    }

    pub fn register(&self, info: BranchInfo) {
        if let Ok(mut branches) = self.branches.write() {
            branches.insert(info.name.clone(), info);
        } else {
            tracing::error!(branch = %info.name, "branch directory lock poisoned; registration dropped");
        }
    }
}

impl BranchDirectory for InMemoryBranchDirectory {
    fn branch(&self, name: &BranchName) -> Option<BranchInfo> {
        self.branches.read().ok()?.get(name).cloned()
    }
}

impl<D> BranchDirectory for Arc<D>
where
    D: BranchDirectory + ?Sized,
{
    fn branch(&self, name: &BranchName) -> Option<BranchInfo> {
        (**self).branch(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_directory_knows_only_registered_branches() {
        let directory = InMemoryBranchDirectory::with_branches(["Gangnam", "Mapo"]);
        assert!(directory.is_known(&BranchName::parse("Gangnam").unwrap()));
        assert!(!directory.is_known(&BranchName::parse("Busan").unwrap()));
    }

    #[test]
    fn open_directory_accepts_anything() {
        assert!(OpenBranchDirectory.is_known(&BranchName::parse("anywhere").unwrap()));
    }

    #[test]
    fn anonymous_has_no_operator() {
        assert_eq!(Anonymous.current_operator(), None);
        let op = OperatorId::parse("staff@florist.example").unwrap();
        assert_eq!(StaticOperator(op.clone()).current_operator(), Some(op));
    }
}
