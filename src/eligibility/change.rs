//! Per-change predicates evaluated before a disk update.

use thiserror::Error;

use super::{
    DiskFacts, DiskSku, InstanceCapabilities, can_resize_without_downtime,
    crosses_expansion_limit,
};

/// Mutable attributes of a disk at one point in time.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DiskRevision {
    /// Provisioned size in GiB.
    pub size_gib: u64,
    /// Storage tier.
    pub sku: Option<DiskSku>,
    /// Performance tier override.
    pub tier: Option<String>,
    /// Customer-managed encryption set.
    pub encryption_set: Option<String>,
    /// On-demand bursting.
    pub bursting: bool,
}

/// Errors raised when validating a [`DiskChange`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum DiskChangeError {
    /// Disks can only grow.
    #[error("disk cannot shrink from {old_size_gib} GiB to {new_size_gib} GiB")]
    Shrink {
        /// Current size.
        old_size_gib: u64,
        /// Requested size.
        new_size_gib: u64,
    },
}

/// Transition from the current disk revision to the requested one.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DiskChange {
    /// Revision currently applied.
    pub old: DiskRevision,
    /// Revision requested by the caller.
    pub new: DiskRevision,
}

impl DiskChange {
    /// Builds a change between two revisions.
    #[must_use]
    pub const fn new(old: DiskRevision, new: DiskRevision) -> Self {
        Self { old, new }
    }

    /// Rejects changes the provider can never apply.
    ///
    /// # Errors
    ///
    /// Returns [`DiskChangeError::Shrink`] when the size decreases.
    pub const fn validate(&self) -> Result<(), DiskChangeError> {
        if self.new.size_gib < self.old.size_gib {
            return Err(DiskChangeError::Shrink {
                old_size_gib: self.old.size_gib,
                new_size_gib: self.new.size_gib,
            });
        }
        Ok(())
    }

    /// Returns `true` when the size grows.
    #[must_use]
    pub const fn grows(&self) -> bool {
        self.new.size_gib > self.old.size_gib
    }

    /// Returns `true` when the disk has to be detached first because the
    /// growth crosses the online expansion limit.
    #[must_use]
    pub const fn requires_detach(&self) -> bool {
        crosses_expansion_limit(self.old.size_gib, self.new.size_gib)
    }

    fn changes_offline_attributes(&self) -> bool {
        self.old.sku != self.new.sku
            || self.old.tier != self.new.tier
            || self.old.encryption_set != self.new.encryption_set
            || self.old.bursting != self.new.bursting
    }

    /// Decides whether the attached instance must be taken offline before the
    /// change is applied.
    ///
    /// `attached` is `None` when the disk is not attached to any
    /// instance, in which case nothing needs to power down.
    /// `expand_without_downtime` lets operators opt out of online growth.
    #[must_use]
    pub fn requires_offline_transition(
        &self,
        facts: &DiskFacts,
        attached: Option<&InstanceCapabilities>,
        expand_without_downtime: bool,
    ) -> bool {
        let Some(capabilities) = attached else {
            return false;
        };
        if self.changes_offline_attributes() {
            return true;
        }
        if !self.grows() {
            return false;
        }
        !(expand_without_downtime
            && can_resize_without_downtime(
                facts,
                self.old.size_gib,
                self.new.size_gib,
                capabilities,
            ))
    }
}
