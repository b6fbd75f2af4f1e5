//! Donation allocation: fee adjustment, per-registry shares and per-package credits.
//!
//! Amounts are integer millicents. The fee-adjusted donation is held exactly in
//! units of 1/10,000 millicent, so `amount * 0.96 - 30` carries no floating
//! point error. Every split floors, so the credited total never exceeds the
//! fee-adjusted donation.

use common::domain::{
    InitialState, PackageCredit, PackageWeightMap, RegistryKey, RegistryWeights,
};

/// Share of a new donation left after the 3% processor fee and our 1% fee
pub const FEE_RETAINED_BASIS_POINTS: i64 = 9_600;

/// Basis points in a whole
pub const BASIS_POINTS_PER_UNIT: i64 = 10_000;

/// Fixed per-charge processing fee
pub const FIXED_PROCESSING_FEE_MILLICENTS: i64 = 30;

const SCALE: i128 = BASIS_POINTS_PER_UNIT as i128;

/// Package weights are rounded to this many parts per unit before splitting
const WEIGHT_PARTS_PER_UNIT: i128 = 1_000_000_000;

/// Donation amount available for distribution, in fixed-point 1/10,000 millicents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct DonationAmount(i128);

impl DonationAmount {
    pub const ZERO: DonationAmount = DonationAmount(0);

    /// An amount used verbatim, without fee deduction
    pub fn from_millicents(amount: i64) -> Self {
        Self(i128::from(amount.max(0)) * SCALE)
    }

    /// Deduct fees from a new donation. Non-positive donations, and donations too
    /// small to cover the fixed fee, adjust to zero.
    pub fn fee_adjusted(amount: i64) -> Self {
        if amount <= 0 {
            return Self::ZERO;
        }
        let retained = i128::from(amount) * i128::from(FEE_RETAINED_BASIS_POINTS);
        let fixed_fee = i128::from(FIXED_PROCESSING_FEE_MILLICENTS) * SCALE;
        Self((retained - fixed_fee).max(0))
    }

    /// Redistributed donations already had fees taken out by an earlier pass
    pub fn for_initial_state(state: &InitialState) -> Self {
        if state.redistributed_donation {
            Self::from_millicents(state.amount)
        } else {
            Self::fee_adjusted(state.amount)
        }
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Exact value in millicents, for logging
    pub fn as_millicents(&self) -> f64 {
        self.0 as f64 / SCALE as f64
    }

    /// `floor(self * numerator / denominator)` in whole millicents.
    /// A zero denominator yields zero.
    pub fn floor_share(&self, numerator: usize, denominator: usize) -> i64 {
        if denominator == 0 {
            return 0;
        }
        let scaled = self.0 * numerator as i128 / (denominator as i128 * SCALE);
        i64::try_from(scaled).unwrap_or(i64::MAX)
    }
}

/// Fee adjustment applied to new donations
pub fn fee_adjust(amount: i64) -> DonationAmount {
    DonationAmount::fee_adjusted(amount)
}

/// Whole-millicent share dedicated to one (language, registry) group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryShare {
    pub key: RegistryKey,
    pub package_count: usize,
    pub amount: i64,
}

/// A group share together with the per-package credits it splits into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryAllocation {
    pub key: RegistryKey,
    pub donation_amount: i64,
    pub credits: Vec<PackageCredit>,
}

impl RegistryAllocation {
    pub fn credited_total(&self) -> i64 {
        self.credits.iter().map(|c| c.amount).sum()
    }
}

/// Number of packages across all groups
pub fn total_packages(groups: &[RegistryWeights]) -> usize {
    groups.iter().map(|g| g.weights.len()).sum()
}

/// Split the donation across groups by each group's share of all packages.
///
/// Empty groups and groups whose share floors to zero are left out; the
/// flooring remainder is not redistributed.
pub fn allocate_across_registries(
    amount: DonationAmount,
    groups: &[RegistryWeights],
) -> Vec<RegistryShare> {
    let total = total_packages(groups);
    if total == 0 || amount.is_zero() {
        return Vec::new();
    }

    groups
        .iter()
        .filter(|group| !group.weights.is_empty())
        .filter_map(|group| {
            let package_count = group.weights.len();
            let share = amount.floor_share(package_count, total);
            (share > 0).then(|| RegistryShare {
                key: group.key.clone(),
                package_count,
                amount: share,
            })
        })
        .collect()
}

/// Split one group's share across its packages by weight.
///
/// Each credit is `floor(weight * share)` with the weight clamped to `[0, 1]`
/// and rounded to a billionth, so the floor is taken on an exact integer product
/// (a weight of `0.29` on 100 credits 29, not 28).
/// If the weights sum above 1 the running total is capped at `share`, so later
/// packages receive whatever remains.
pub fn allocate_within_registry(share: i64, weights: &PackageWeightMap) -> Vec<PackageCredit> {
    let mut remaining = share.max(0);

    weights
        .iter()
        .map(|(name, weight)| {
            let parts = weight_parts(weight);
            let exact = i128::from(share) * parts / WEIGHT_PARTS_PER_UNIT;
            let amount = i64::try_from(exact).unwrap_or(remaining).clamp(0, remaining);
            remaining -= amount;
            PackageCredit {
                name: name.to_string(),
                amount,
            }
        })
        .collect()
}

/// Weight in [`WEIGHT_PARTS_PER_UNIT`]ths; non-finite weights count as zero
fn weight_parts(weight: f64) -> i128 {
    if !weight.is_finite() {
        return 0;
    }
    (weight.clamp(0.0, 1.0) * WEIGHT_PARTS_PER_UNIT as f64).round() as i128
}

/// Full allocation for a work item: group shares and their package credits
pub fn allocate(amount: DonationAmount, groups: &[RegistryWeights]) -> Vec<RegistryAllocation> {
    allocate_across_registries(amount, groups)
        .into_iter()
        .filter_map(|share| {
            let group = groups.iter().find(|g| g.key == share.key)?;
            Some(RegistryAllocation {
                credits: allocate_within_registry(share.amount, &group.weights),
                key: share.key,
                donation_amount: share.amount,
            })
        })
        .collect()
}
