//! Decides when a disk grows without taking its instance offline.
//!
//! Everything here is pure: callers fetch disk and instance facts first and
//! evaluate them before deciding whether the mutation gate is needed at all.

mod change;

use std::fmt;
use std::str::FromStr;

pub use change::{DiskChange, DiskChangeError, DiskRevision};

/// Size at which online expansion stops being possible, in GiB.
pub const ONLINE_EXPANSION_LIMIT_GIB: u64 = 4096;

/// Storage tier of a managed disk.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum DiskSku {
    /// `Standard_LRS` (spinning disk).
    StandardLrs,
    /// `StandardSSD_LRS`.
    StandardSsdLrs,
    /// `StandardSSD_ZRS`.
    StandardSsdZrs,
    /// `Premium_LRS`.
    PremiumLrs,
    /// `Premium_ZRS`.
    PremiumZrs,
    /// `UltraSSD_LRS`.
    UltraSsdLrs,
    /// `PremiumV2_LRS`.
    PremiumV2Lrs,
    /// A tier this crate does not know about.
    Other(String),
}

impl DiskSku {
    /// Parses a wire name case-insensitively.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        let trimmed = name.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "standard_lrs" => Self::StandardLrs,
            "standardssd_lrs" => Self::StandardSsdLrs,
            "standardssd_zrs" => Self::StandardSsdZrs,
            "premium_lrs" => Self::PremiumLrs,
            "premium_zrs" => Self::PremiumZrs,
            "ultrassd_lrs" => Self::UltraSsdLrs,
            "premiumv2_lrs" => Self::PremiumV2Lrs,
            _ => Self::Other(trimmed.to_owned()),
        }
    }

    /// Wire name of the tier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::StandardLrs => "Standard_LRS",
            Self::StandardSsdLrs => "StandardSSD_LRS",
            Self::StandardSsdZrs => "StandardSSD_ZRS",
            Self::PremiumLrs => "Premium_LRS",
            Self::PremiumZrs => "Premium_ZRS",
            Self::UltraSsdLrs => "UltraSSD_LRS",
            Self::PremiumV2Lrs => "PremiumV2_LRS",
            Self::Other(raw) => raw.as_str(),
        }
    }

    /// Returns `true` for the SSD tiers that support online expansion.
    #[must_use]
    pub const fn supports_online_expansion(&self) -> bool {
        matches!(
            self,
            Self::PremiumLrs | Self::PremiumZrs | Self::StandardSsdLrs | Self::StandardSsdZrs
        )
    }
}

impl FromStr for DiskSku {
    type Err = std::convert::Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(value))
    }
}

impl fmt::Display for DiskSku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only facts about one disk.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DiskFacts {
    /// Operating system type; set only for boot disks.
    pub os_type: Option<String>,
    /// Number of instances that may attach the disk at once.
    pub max_shares: Option<u32>,
    /// Storage tier.
    pub sku: Option<DiskSku>,
}

impl DiskFacts {
    /// Returns `true` for boot disks.
    #[must_use]
    pub fn is_os_disk(&self) -> bool {
        self.os_type
            .as_deref()
            .is_some_and(|os| !os.trim().is_empty())
    }

    /// Returns `true` for multi-attach disks.
    #[must_use]
    pub fn is_shared(&self) -> bool {
        self.max_shares.is_some_and(|shares| shares >= 2)
    }
}

/// Capability flags advertised by the attached instance's size.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct InstanceCapabilities {
    /// The size supports ephemeral OS disks.
    pub ephemeral_os_disk: bool,
    /// The size supports generation 2 Hyper-V images.
    pub hyper_v_gen2: bool,
    /// The size supports premium storage.
    pub premium_io: bool,
}

impl InstanceCapabilities {
    /// Parses a size's capability list of name/value pairs.
    ///
    /// Unrecognised names are ignored.
    #[must_use]
    pub fn from_capability_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut capabilities = Self::default();
        for (name, raw_value) in pairs {
            let value = raw_value.as_ref().trim();
            match name.as_ref().trim().to_ascii_lowercase().as_str() {
                "ephemeralosdisksupported" => {
                    capabilities.ephemeral_os_disk = value.eq_ignore_ascii_case("true");
                }
                "hypervgenerations" => {
                    capabilities.hyper_v_gen2 = value
                        .split(',')
                        .any(|generation| generation.trim().eq_ignore_ascii_case("v2"));
                }
                "premiumio" => capabilities.premium_io = value.eq_ignore_ascii_case("true"),
                _ => {}
            }
        }
        capabilities
    }

    /// Returns `true` when any capability qualifies the instance for online
    /// disk expansion.
    #[must_use]
    pub const fn supports_online_expansion(&self) -> bool {
        self.ephemeral_os_disk || self.hyper_v_gen2 || self.premium_io
    }
}

/// Returns `true` when growing from `old_size_gib` to `new_size_gib` reaches
/// the online expansion limit from below.
#[must_use]
pub const fn crosses_expansion_limit(old_size_gib: u64, new_size_gib: u64) -> bool {
    old_size_gib < ONLINE_EXPANSION_LIMIT_GIB && new_size_gib >= ONLINE_EXPANSION_LIMIT_GIB
}

/// Decides whether a data disk can grow while its instance keeps running.
///
/// Boot disks, shared disks, growth across the expansion limit and tiers
/// other than the four SSD LRS/ZRS tiers all need the offline path. The
/// attached instance must then advertise at least one qualifying capability.
#[must_use]
pub fn can_resize_without_downtime(
    disk: &DiskFacts,
    old_size_gib: u64,
    new_size_gib: u64,
    capabilities: &InstanceCapabilities,
) -> bool {
    if disk.is_os_disk() || disk.is_shared() {
        return false;
    }
    if crosses_expansion_limit(old_size_gib, new_size_gib) {
        return false;
    }
    if !disk
        .sku
        .as_ref()
        .is_some_and(DiskSku::supports_online_expansion)
    {
        return false;
    }
    capabilities.supports_online_expansion()
}
