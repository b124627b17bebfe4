//! Identifier codec: `user[.agent][:device]@server` <-> [`Jid`].
//!
//! The host only ever sees the canonical form (`user@server`, no device
//! qualifiers). The full form is what the protocol client works with.
//! Parsing is delegated to the protocol library's own identifier type so
//! that both sides agree on which strings are valid.

use std::fmt;
use std::str::FromStr;

use wacore_binary::{Jid as WireJid, Server};

/// Server of regular (phone-number) user identifiers.
pub const DEFAULT_USER_SERVER: &str = wacore_binary::DEFAULT_USER_SERVER;
/// Legacy user server, still seen in some stored records.
pub const LEGACY_USER_SERVER: &str = wacore_binary::LEGACY_USER_SERVER;
/// Server of group chats.
pub const GROUP_SERVER: &str = wacore_binary::GROUP_SERVER;
/// Server of broadcast lists and the status feed.
pub const BROADCAST_SERVER: &str = wacore_binary::BROADCAST_SERVER;
/// Alias ("hidden user") identifier space.
pub const HIDDEN_USER_SERVER: &str = wacore_binary::HIDDEN_USER_SERVER;
/// Server of channel/newsletter identifiers.
pub const NEWSLETTER_SERVER: &str = wacore_binary::NEWSLETTER_SERVER;
/// User part of the reserved status feed, `status@broadcast`.
pub const STATUS_BROADCAST_USER: &str = wacore_binary::STATUS_BROADCAST_USER;

/// Errors from [`Jid::from_str`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JidError {
    /// Empty input.
    #[error("empty identifier")]
    Empty,
    /// Rejected by the protocol library's parser.
    #[error("invalid identifier {input:?}: {reason}")]
    Invalid {
        /// The offending input.
        input: String,
        /// Parser message.
        reason: String,
    },
}

/// A protocol identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Jid {
    /// User part (phone number, alias, group id, ...). Empty for server-only ids.
    pub user: String,
    /// Raw agent qualifier of AD identifiers.
    pub raw_agent: u8,
    /// Device qualifier; 0 is the primary device.
    pub device: u16,
    /// Integrator qualifier.
    pub integrator: u16,
    /// Server part.
    pub server: String,
}

impl Jid {
    /// Build a device-less identifier.
    #[must_use]
    pub fn new(user: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            server: server.into(),
            ..Self::default()
        }
    }

    /// The reserved `status@broadcast` identifier.
    #[must_use]
    pub fn status_broadcast() -> Self {
        Self::new(STATUS_BROADCAST_USER, BROADCAST_SERVER)
    }

    /// Drop the agent and device qualifiers.
    #[must_use]
    pub fn to_non_ad(&self) -> Self {
        Self {
            user: self.user.clone(),
            integrator: self.integrator,
            server: self.server.clone(),
            ..Self::default()
        }
    }

    /// Canonical host-visible form: `user@server` (or `server` when there is no user).
    #[must_use]
    pub fn canonical(&self) -> String {
        if self.user.is_empty() {
            self.server.clone()
        } else {
            format!("{}@{}", self.user, self.server)
        }
    }

    /// Whether both fields are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.user.is_empty() && self.server.is_empty()
    }

    /// Group chat identifier.
    #[must_use]
    pub fn is_group(&self) -> bool {
        self.server == GROUP_SERVER
    }

    /// Broadcast list or the status feed.
    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        self.server == BROADCAST_SERVER
    }

    /// The reserved status feed.
    #[must_use]
    pub fn is_status_broadcast(&self) -> bool {
        self.is_broadcast() && self.user == STATUS_BROADCAST_USER
    }

    /// Whether this identifier lives in the alias space.
    #[must_use]
    pub fn is_hidden_user(&self) -> bool {
        self.server == HIDDEN_USER_SERVER
    }

    /// Same person, ignoring device qualifiers.
    #[must_use]
    pub fn same_user(&self, other: &Self) -> bool {
        self.user == other.user && self.server == other.server
    }
}

impl fmt::Display for Jid {
    /// Full form, including agent and device qualifiers when present.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match WireJid::try_from(self) {
            Ok(wire) => fmt::Display::fmt(&wire, f),
            Err(_) if self.device > 0 => write!(f, "{}:{}@{}", self.user, self.device, self.server),
            Err(_) => f.write_str(&self.canonical()),
        }
    }
}

impl FromStr for Jid {
    type Err = JidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(JidError::Empty);
        }
        s.parse::<WireJid>()
            .map(Self::from)
            .map_err(|e| JidError::Invalid {
                input: s.to_owned(),
                reason: e.to_string(),
            })
    }
}

impl From<WireJid> for Jid {
    fn from(jid: WireJid) -> Self {
        Self {
            user: jid.user.to_string(),
            raw_agent: jid.agent,
            device: jid.device,
            integrator: jid.integrator,
            server: jid.server.as_str().to_owned(),
        }
    }
}

impl From<&WireJid> for Jid {
    fn from(jid: &WireJid) -> Self {
        Self::from(jid.clone())
    }
}

impl TryFrom<&Jid> for WireJid {
    type Error = JidError;

    fn try_from(jid: &Jid) -> Result<Self, Self::Error> {
        let server = Server::try_from(jid.server.as_str()).map_err(|e| JidError::Invalid {
            input: jid.canonical(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            user: jid.user.as_str().into(),
            server,
            agent: jid.raw_agent,
            device: jid.device,
            integrator: jid.integrator,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_format_round_trip() {
        let jid: Jid = "15551234567@s.whatsapp.net".parse().unwrap();
        assert_eq!(jid.user, "15551234567");
        assert_eq!(jid.server, DEFAULT_USER_SERVER);
        assert_eq!(jid.canonical(), "15551234567@s.whatsapp.net");
        assert_eq!(jid.to_string(), "15551234567@s.whatsapp.net");
    }

    #[test]
    fn device_is_dropped_from_canonical_form() {
        let jid: Jid = "15551234567:12@s.whatsapp.net".parse().unwrap();
        assert_eq!(jid.device, 12);
        assert_eq!(jid.to_string(), "15551234567:12@s.whatsapp.net");
        assert_eq!(jid.canonical(), "15551234567@s.whatsapp.net");
        assert_eq!(jid.to_non_ad().device, 0);
    }

    #[test]
    fn agent_and_device() {
        let jid: Jid = "15551234567.1:3@msgr".parse().unwrap();
        assert_eq!(jid.user, "15551234567");
        assert_eq!(jid.raw_agent, 1);
        assert_eq!(jid.device, 3);
        assert_eq!(jid.to_string(), "15551234567.1:3@msgr");
    }

    #[test]
    fn alias_user_keeps_its_dots() {
        let jid: Jid = "1234.5678:9@lid".parse().unwrap();
        assert_eq!(jid.user, "1234.5678");
        assert_eq!(jid.raw_agent, 0);
        assert_eq!(jid.device, 9);
        assert!(jid.is_hidden_user());
    }

    #[test]
    fn server_only() {
        let jid: Jid = "s.whatsapp.net".parse().unwrap();
        assert!(jid.user.is_empty());
        assert_eq!(jid.canonical(), "s.whatsapp.net");
    }

    #[test]
    fn status_broadcast() {
        let jid: Jid = "status@broadcast".parse().unwrap();
        assert!(jid.is_status_broadcast());
        assert_eq!(jid, Jid::status_broadcast());
        let list: Jid = "12345@broadcast".parse().unwrap();
        assert!(list.is_broadcast());
        assert!(!list.is_status_broadcast());
    }

    #[test]
    fn malformed() {
        assert_eq!("".parse::<Jid>(), Err(JidError::Empty));
        assert!(matches!(
            "a@b@c".parse::<Jid>(),
            Err(JidError::Invalid { .. })
        ));
        assert!(matches!(
            "123@example.com".parse::<Jid>(),
            Err(JidError::Invalid { .. })
        ));
    }

    #[test]
    fn converts_to_and_from_the_wire_type() {
        let jid: Jid = "15551234567:12@s.whatsapp.net".parse().unwrap();
        let wire = WireJid::try_from(&jid).unwrap();
        assert_eq!(wire.server, Server::Pn);
        assert_eq!(wire.device, 12);
        assert_eq!(wire.to_string(), jid.to_string());
        assert_eq!(Jid::from(wire), jid);

        let group = Jid::new("120363", GROUP_SERVER);
        assert_eq!(WireJid::try_from(&group).unwrap().server, Server::Group);
        let foreign = Jid::new("x", "example.com");
        assert!(WireJid::try_from(&foreign).is_err());
        assert_eq!(foreign.to_string(), "x@example.com");
    }
}
