//! Tiers and the immutable policy registry.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::PolicyError;

/// Rate limiting tier, one per class of endpoint sensitivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Cheap, idempotent reads.
    PublicRead,
    /// Mutating actions such as posting a comment or a rating.
    UserAction,
    /// High-volume, low-risk actions such as like toggles.
    ElevatedAction,
    /// Login, signup and credential issuance.
    Credential,
    /// Secret and credential reset flows.
    CredentialReset,
}

impl Tier {
    pub const ALL: [Tier; 5] = [
        Tier::PublicRead,
        Tier::UserAction,
        Tier::ElevatedAction,
        Tier::Credential,
        Tier::CredentialReset,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::PublicRead => "public-read",
            Tier::UserAction => "user-action",
            Tier::ElevatedAction => "elevated-action",
            Tier::Credential => "credential",
            Tier::CredentialReset => "credential-reset",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = PolicyError;

    /// Accepts the kebab-case name in any case, or its snake_case spelling.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Tier::ALL
            .into_iter()
            .find(|tier| tier.as_str() == normalized)
            .ok_or_else(|| PolicyError::UnknownTier(s.to_string()))
    }
}

impl From<Tier> for String {
    fn from(tier: Tier) -> Self {
        tier.as_str().to_string()
    }
}

/// Window length and quota for one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    pub tier: Tier,
    pub window: Duration,
    pub quota: u32,
}

impl Policy {
    /// Build a validated policy: at least one request per window, and a
    /// window of at least one second.
    pub fn new(tier: Tier, quota: u32, window: Duration) -> Result<Self, PolicyError> {
        if quota == 0 {
            return Err(PolicyError::InvalidPolicy {
                tier,
                reason: "quota must be at least 1".to_string(),
            });
        }
        if window < Duration::from_secs(1) {
            return Err(PolicyError::InvalidPolicy {
                tier,
                reason: "window must be at least one second".to_string(),
            });
        }
        Ok(Self {
            tier,
            window,
            quota,
        })
    }

    /// Whether `self` admits strictly fewer requests per unit of time than
    /// `other`.
    fn stricter_than(&self, other: &Policy) -> bool {
        // quota_a / window_a < quota_b / window_b, cross-multiplied
        let lhs = u128::from(self.quota) * other.window.as_millis();
        let rhs = u128::from(other.quota) * self.window.as_millis();
        lhs < rhs
    }

    const fn preset(tier: Tier, quota: u32, window_secs: u64) -> Self {
        Self {
            tier,
            window: Duration::from_secs(window_secs),
            quota,
        }
    }
}

/// Default policy table.
const DEFAULT_POLICIES: [Policy; 5] = [
    Policy::preset(Tier::PublicRead, 60, 60),
    Policy::preset(Tier::UserAction, 10, 60),
    Policy::preset(Tier::ElevatedAction, 30, 60),
    Policy::preset(Tier::Credential, 5, 15 * 60),
    Policy::preset(Tier::CredentialReset, 3, 60 * 60),
];

/// What the gate does with a tier name that is not in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownTierMode {
    /// Fail the request with [`crate::AdmissionError::UnknownTier`].
    /// Meant for development and test builds.
    Reject,
    /// Apply [`PolicyRegistry::most_conservative`] and log an error.
    MostConservative,
}

/// Immutable tier → policy table, built once at startup and shared.
///
/// Every [`Tier`] always has a policy, so [`PolicyRegistry::policy`] is total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRegistry {
    policies: [Policy; 5],
}

impl PolicyRegistry {
    /// Start from the default table and override individual tiers.
    pub fn builder() -> PolicyRegistryBuilder {
        PolicyRegistryBuilder {
            policies: DEFAULT_POLICIES,
            errors: Vec::new(),
        }
    }

    pub fn policy(&self, tier: Tier) -> &Policy {
        &self.policies[tier.index()]
    }

    /// Look a policy up by tier name.
    pub fn lookup(&self, name: &str) -> Result<&Policy, PolicyError> {
        name.parse::<Tier>().map(|tier| self.policy(tier))
    }

    /// The policy admitting the fewest requests per unit of time.
    pub fn most_conservative(&self) -> &Policy {
        self.policies
            .iter()
            .fold(&self.policies[0], |strictest, candidate| {
                if candidate.stricter_than(strictest) {
                    candidate
                } else {
                    strictest
                }
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Policy> {
        self.policies.iter()
    }
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self {
            policies: DEFAULT_POLICIES,
        }
    }
}

/// Builder for [`PolicyRegistry`]. Validation errors are collected and the
/// first one is reported by [`PolicyRegistryBuilder::build`].
#[derive(Debug)]
pub struct PolicyRegistryBuilder {
    policies: [Policy; 5],
    errors: Vec<PolicyError>,
}

impl PolicyRegistryBuilder {
    pub fn with_policy(mut self, tier: Tier, quota: u32, window: Duration) -> Self {
        match Policy::new(tier, quota, window) {
            Ok(policy) => self.policies[tier.index()] = policy,
            Err(e) => self.errors.push(e),
        }
        self
    }

    pub fn build(self) -> Result<PolicyRegistry, PolicyError> {
        match self.errors.into_iter().next() {
            Some(e) => Err(e),
            None => Ok(PolicyRegistry {
                policies: self.policies,
            }),
        }
    }
}
