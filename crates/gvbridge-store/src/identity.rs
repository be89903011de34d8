//! External identity codec.
//!
//! A linked external account is addressed by a composite identifier
//! (`user.agent:device`), but the `user` table only keeps the local part in
//! its `primary_did` column. Decoding fills the agent and device tags with
//! fixed defaults; encoding projects each field out of an optional identity
//! for parameter binding.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Agent tag assigned to every decoded identity.
pub const DEFAULT_AGENT: u8 = 1;

/// Device tag assigned to every decoded identity.
pub const DEFAULT_DEVICE: u8 = 1;

/// A linked external messaging identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalId {
    /// Local part (the account handle on the external network).
    pub user: String,
    /// Agent discriminator.
    pub agent: u8,
    /// Device discriminator.
    pub device: u8,
}

impl ExternalId {
    pub fn new(user: impl Into<String>, agent: u8, device: u8) -> Self {
        Self {
            user: user.into(),
            agent,
            device,
        }
    }

    /// Identity with the default agent and device tags.
    pub fn with_default_tags(user: impl Into<String>) -> Self {
        Self::new(user, DEFAULT_AGENT, DEFAULT_DEVICE)
    }

    /// An identity without a local part addresses nobody.
    pub fn is_empty(&self) -> bool {
        self.user.is_empty()
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}:{}", self.user, self.agent, self.device)
    }
}

/// Rebuild an identity from the stored `primary_did` column.
///
/// NULL and the empty string both mean "not linked". Anything else is taken
/// verbatim as the local part; the tags are not stored and come back as
/// [`DEFAULT_AGENT`] / [`DEFAULT_DEVICE`].
pub fn decode(stored: Option<&str>) -> Option<ExternalId> {
    match stored {
        Some(user) if !user.is_empty() => Some(ExternalId::with_default_tags(user)),
        _ => None,
    }
}

fn linked(id: Option<&ExternalId>) -> Option<&ExternalId> {
    id.filter(|id| !id.is_empty())
}

/// Local part to bind for `primary_did`, or NULL when not linked.
pub fn encode_local_part(id: Option<&ExternalId>) -> Option<&str> {
    linked(id).map(|id| id.user.as_str())
}

pub fn encode_agent_tag(id: Option<&ExternalId>) -> Option<u8> {
    linked(id).map(|id| id.agent)
}

pub fn encode_device_tag(id: Option<&ExternalId>) -> Option<u8> {
    linked(id).map(|id| id.device)
}
