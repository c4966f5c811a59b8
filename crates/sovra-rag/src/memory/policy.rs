//! Access policies and requester identities
//!
//! A record is readable when the requester is the owner, is on an allow-list,
//! or the policy is public, and the current time lies inside the policy's
//! validity window. Non-owners must additionally meet `min_trust_level` as
//! reported by the [`IdentityResolver`].

use crate::error::{SovraError, SovraResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Identity asking to read or modify memory
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Requester {
    /// An agent
    Agent(String),
    /// A human user
    User(String),
}

impl Requester {
    /// Agent requester
    pub fn agent(id: impl Into<String>) -> Self {
        Self::Agent(id.into())
    }

    /// User requester
    pub fn user(id: impl Into<String>) -> Self {
        Self::User(id.into())
    }

    /// Raw identifier
    pub fn id(&self) -> &str {
        match self {
            Self::Agent(id) | Self::User(id) => id,
        }
    }

    /// Whether this requester is the given agent
    pub fn is_agent(&self, agent_id: &str) -> bool {
        matches!(self, Self::Agent(id) if id == agent_id)
    }
}

impl fmt::Display for Requester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Agent(id) => write!(f, "agent:{}", id),
            Self::User(id) => write!(f, "user:{}", id),
        }
    }
}

/// Resolves an identity to the trust it has been granted
pub trait IdentityResolver: Send + Sync {
    /// Trust level in [0, 1], `None` when the identity is unknown
    fn trust_level(&self, requester: &Requester) -> Option<f64>;
}

/// Fixed table of trust levels
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityResolver {
    levels: HashMap<Requester, f64>,
}

impl StaticIdentityResolver {
    /// Empty resolver
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant a trust level
    pub fn with_trust(mut self, requester: Requester, level: f64) -> Self {
        self.levels.insert(requester, level.clamp(0.0, 1.0));
        self
    }
}

impl IdentityResolver for StaticIdentityResolver {
    fn trust_level(&self, requester: &Requester) -> Option<f64> {
        self.levels.get(requester).copied()
    }
}

/// Why access was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// Requester is neither owner, allow-listed, nor is the policy public
    NotGranted,
    /// Current time is outside `[valid_from, valid_until]`
    OutsideValidityWindow,
    /// Requester's trust is below `min_trust_level`
    InsufficientTrust,
}

/// Outcome of a policy evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    /// Requester may read
    Granted,
    /// Requester may not read
    Denied(DenyReason),
}

impl AccessDecision {
    /// Whether access was granted
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// Rule set deciding who may read a memory record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessPolicy {
    /// Unique identifier
    pub id: String,

    /// Agent that owns the policy
    pub owner_agent_id: String,

    /// Agents granted read access
    #[serde(default)]
    pub allowed_agents: Vec<String>,

    /// Users granted read access
    #[serde(default)]
    pub allowed_users: Vec<String>,

    /// Anyone may read
    #[serde(default)]
    pub public_access: bool,

    /// Start of the validity window
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<DateTime<Utc>>,

    /// End of the validity window
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,

    /// Minimum trust required of non-owners
    #[serde(default)]
    pub min_trust_level: f64,

    /// Records under this policy must be encrypted at rest by the backend
    #[serde(default)]
    pub requires_encryption: bool,

    /// When the policy was created
    pub created_at: DateTime<Utc>,
}

impl AccessPolicy {
    /// Owner-only policy
    pub fn private(owner_agent_id: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_agent_id: owner_agent_id.into(),
            allowed_agents: Vec::new(),
            allowed_users: Vec::new(),
            public_access: false,
            valid_from: None,
            valid_until: None,
            min_trust_level: 0.0,
            requires_encryption: false,
            created_at: Utc::now(),
        }
    }

    /// Policy readable by anyone
    pub fn public(owner_agent_id: impl Into<String>) -> Self {
        let mut policy = Self::private(owner_agent_id);
        policy.public_access = true;
        policy
    }

    /// Override the generated id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Grant read access to agents
    pub fn with_allowed_agents<I, S>(mut self, agents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_agents = agents.into_iter().map(Into::into).collect();
        self
    }

    /// Grant read access to users
    pub fn with_allowed_users<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_users = users.into_iter().map(Into::into).collect();
        self
    }

    /// Restrict the policy to a time window
    pub fn with_validity(
        mut self,
        valid_from: Option<DateTime<Utc>>,
        valid_until: Option<DateTime<Utc>>,
    ) -> Self {
        self.valid_from = valid_from;
        self.valid_until = valid_until;
        self
    }

    /// Require a minimum trust level of non-owners
    pub fn with_min_trust_level(mut self, level: f64) -> Self {
        self.min_trust_level = level;
        self
    }

    /// Require encryption at rest
    pub fn with_encryption_required(mut self, required: bool) -> Self {
        self.requires_encryption = required;
        self
    }

    /// Reject malformed policies
    pub fn validate(&self) -> SovraResult<()> {
        if self.owner_agent_id.trim().is_empty() {
            return Err(SovraError::validation("owner_agent_id", "must not be empty", ""));
        }
        if !self.min_trust_level.is_finite() || !(0.0..=1.0).contains(&self.min_trust_level) {
            return Err(SovraError::validation(
                "min_trust_level",
                "must be within [0, 1]",
                self.min_trust_level.to_string(),
            ));
        }
        if let (Some(from), Some(until)) = (self.valid_from, self.valid_until) {
            if from > until {
                return Err(SovraError::validation(
                    "valid_from",
                    "must not be after valid_until",
                    from.to_rfc3339(),
                ));
            }
        }
        Ok(())
    }

    /// Whether `now` lies inside the validity window
    pub fn is_within_window(&self, now: DateTime<Utc>) -> bool {
        self.valid_from.map_or(true, |from| now >= from)
            && self.valid_until.map_or(true, |until| now <= until)
    }

    /// Earliest validity boundary after `now`, where readability may flip
    pub fn next_window_change(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        [self.valid_from, self.valid_until]
            .into_iter()
            .flatten()
            .filter(|&boundary| boundary > now)
            .min()
    }

    /// Whether the requester is the owner, allow-listed, or the policy is public
    pub fn is_grantee(&self, requester: &Requester) -> bool {
        if self.public_access {
            return true;
        }
        match requester {
            Requester::Agent(id) => {
                id == &self.owner_agent_id || self.allowed_agents.iter().any(|a| a == id)
            }
            Requester::User(id) => self.allowed_users.iter().any(|u| u == id),
        }
    }

    /// Decide whether `requester` may read at `now`
    pub fn evaluate(
        &self,
        requester: &Requester,
        now: DateTime<Utc>,
        resolver: Option<&dyn IdentityResolver>,
    ) -> AccessDecision {
        if !self.is_grantee(requester) {
            return AccessDecision::Denied(DenyReason::NotGranted);
        }
        if !self.is_within_window(now) {
            return AccessDecision::Denied(DenyReason::OutsideValidityWindow);
        }
        let is_owner = requester.is_agent(&self.owner_agent_id);
        if !is_owner && self.min_trust_level > 0.0 {
            let trust = resolver
                .and_then(|r| r.trust_level(requester))
                .unwrap_or(0.0);
            if trust < self.min_trust_level {
                return AccessDecision::Denied(DenyReason::InsufficientTrust);
            }
        }
        AccessDecision::Granted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_owner_allow_list_and_public() {
        let now = Utc::now();
        let policy = AccessPolicy::private("alice")
            .with_allowed_agents(["bob"])
            .with_allowed_users(["carol"]);

        assert!(policy.evaluate(&Requester::agent("alice"), now, None).is_granted());
        assert!(policy.evaluate(&Requester::agent("bob"), now, None).is_granted());
        assert!(policy.evaluate(&Requester::user("carol"), now, None).is_granted());
        assert_eq!(
            policy.evaluate(&Requester::agent("mallory"), now, None),
            AccessDecision::Denied(DenyReason::NotGranted)
        );
        // a user named like the owner is not the owner
        assert!(!policy.evaluate(&Requester::user("alice"), now, None).is_granted());

        let public = AccessPolicy::public("alice");
        assert!(public.evaluate(&Requester::agent("anyone"), now, None).is_granted());
    }

    #[test]
    fn test_expired_window_denies_even_owner() {
        let now = Utc::now();
        let policy = AccessPolicy::private("alice")
            .with_validity(Some(now - Duration::days(2)), Some(now - Duration::days(1)));

        assert_eq!(
            policy.evaluate(&Requester::agent("alice"), now, None),
            AccessDecision::Denied(DenyReason::OutsideValidityWindow)
        );

        let future = AccessPolicy::public("alice").with_validity(Some(now + Duration::hours(1)), None);
        assert!(!future.evaluate(&Requester::agent("alice"), now, None).is_granted());
    }

    #[test]
    fn test_trust_level_applies_to_non_owners() {
        let now = Utc::now();
        let policy = AccessPolicy::public("alice").with_min_trust_level(0.6);
        let resolver = StaticIdentityResolver::new()
            .with_trust(Requester::agent("trusted"), 0.9)
            .with_trust(Requester::agent("shaky"), 0.2);

        assert!(policy
            .evaluate(&Requester::agent("trusted"), now, Some(&resolver))
            .is_granted());
        assert_eq!(
            policy.evaluate(&Requester::agent("shaky"), now, Some(&resolver)),
            AccessDecision::Denied(DenyReason::InsufficientTrust)
        );
        // unknown identities and missing resolvers count as zero trust
        assert!(!policy
            .evaluate(&Requester::agent("stranger"), now, Some(&resolver))
            .is_granted());
        assert!(!policy.evaluate(&Requester::agent("trusted"), now, None).is_granted());
        // the owner bypasses trust requirements
        assert!(policy.evaluate(&Requester::agent("alice"), now, None).is_granted());
    }

    #[test]
    fn test_next_window_change() {
        let now = Utc::now();
        let from = now + Duration::minutes(5);
        let until = now + Duration::hours(1);

        let upcoming = AccessPolicy::public("o").with_validity(Some(from), Some(until));
        assert_eq!(upcoming.next_window_change(now), Some(from));
        assert_eq!(upcoming.next_window_change(from), Some(until));
        assert_eq!(upcoming.next_window_change(until), None);
        assert_eq!(AccessPolicy::private("o").next_window_change(now), None);
    }

    #[test]
    fn test_validate() {
        let now = Utc::now();
        assert!(AccessPolicy::private("a").validate().is_ok());
        assert!(AccessPolicy::private("").validate().is_err());
        assert!(AccessPolicy::private("a")
            .with_min_trust_level(1.5)
            .validate()
            .is_err());
        assert!(AccessPolicy::private("a")
            .with_validity(Some(now), Some(now - Duration::seconds(1)))
            .validate()
            .is_err());
    }

    #[test]
    fn test_requester_display() {
        assert_eq!(Requester::agent("x").to_string(), "agent:x");
        assert_eq!(Requester::user("y").to_string(), "user:y");
    }
}
