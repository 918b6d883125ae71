//! Quota resolution from role labels.
//!
//! The registry takes the quota as an input; resolving it from whatever the
//! chat platform reports about a member happens here.

/// Resolves how many numbers a participant may hold.
pub trait QuotaResolver: Send + Sync {
    /// Quota for a participant carrying `roles`. `0` means no entry allowed.
    fn quota(&self, roles: &[String]) -> u32;
}

/// Tiered roles: holding `{prefix}{n}` grants a quota of `n`.
///
/// The highest tier present wins, so a member with both `V2` and `V5`
/// gets 5.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleTierQuota {
    prefix: String,
    max_tier: u32,
}

impl RoleTierQuota {
    /// Tiers `{prefix}1` through `{prefix}{max_tier}`.
    #[must_use]
    pub fn new(prefix: impl Into<String>, max_tier: u32) -> Self {
        Self {
            prefix: prefix.into(),
            max_tier,
        }
    }

    /// Highest tier looked for.
    #[must_use]
    pub const fn max_tier(&self) -> u32 {
        self.max_tier
    }
}

impl Default for RoleTierQuota {
    fn default() -> Self {
        Self::new("V", 10)
    }
}

impl QuotaResolver for RoleTierQuota {
    fn quota(&self, roles: &[String]) -> u32 {
        (1..=self.max_tier)
            .rev()
            .find(|tier| {
                let label = format!("{}{tier}", self.prefix);
                roles.iter().any(|role| *role == label)
            })
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|l| (*l).to_string()).collect()
    }

    #[test]
    fn highest_tier_wins() {
        let resolver = RoleTierQuota::default();
        assert_eq!(resolver.quota(&roles(&["V2", "member", "V5"])), 5);
        assert_eq!(resolver.quota(&roles(&["V1"])), 1);
        assert_eq!(resolver.quota(&roles(&["V10"])), 10);
    }

    #[test]
    fn no_tier_means_zero() {
        let resolver = RoleTierQuota::default();
        assert_eq!(resolver.quota(&[]), 0);
        assert_eq!(resolver.quota(&roles(&["member", "v3", "V0", "V11"])), 0);
    }

    #[test]
    fn labels_must_match_exactly() {
        let resolver = RoleTierQuota::new("VIP", 3);
        assert_eq!(resolver.quota(&roles(&["VIP3 "])), 0);
        assert_eq!(resolver.quota(&roles(&["VIP2"])), 2);
        assert_eq!(resolver.quota(&roles(&["V2"])), 0);
    }
}
