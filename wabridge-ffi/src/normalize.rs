//! Identity normalization: one canonical identifier per person and per chat.
//!
//! The protocol addresses a person either by primary number or by alias
//! (hidden-user space). Broadcast lists arrive with the list id as chat.
//! The rules below decide what the host sees.

use crate::backend::{ContactInfo, WaClient};
use crate::jid::Jid;

/// Normalizer bound to the local identity and an alias lookup.
pub struct Normalizer<F> {
    own: Option<Jid>,
    own_lid: Option<Jid>,
    pn_for_lid: F,
}

impl<F> std::fmt::Debug for Normalizer<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Normalizer")
            .field("own", &self.own)
            .field("own_lid", &self.own_lid)
            .finish_non_exhaustive()
    }
}

impl<'a> Normalizer<Box<dyn Fn(&Jid) -> Option<Jid> + 'a>> {
    /// Normalizer backed by the client's own id and alias table.
    #[must_use]
    pub fn for_client(client: &'a dyn WaClient) -> Self {
        let own = client.own_id().map(|j| j.to_non_ad());
        let own_lid = own.as_ref().and_then(|j| client.lid_for_pn(j));
        Self::new(own, own_lid, Box::new(move |lid: &Jid| client.pn_for_lid(lid)))
    }
}

impl<F: Fn(&Jid) -> Option<Jid>> Normalizer<F> {
    /// Build with the local identities and a lid-to-phone lookup.
    pub fn new(own: Option<Jid>, own_lid: Option<Jid>, pn_for_lid: F) -> Self {
        Self {
            own,
            own_lid,
            pn_for_lid,
        }
    }

    /// Canonical own identifier, if paired.
    #[must_use]
    pub fn own(&self) -> Option<&Jid> {
        self.own.as_ref()
    }

    /// Whether `jid` is the local user under either addressing scheme.
    #[must_use]
    pub fn is_own(&self, jid: &Jid) -> bool {
        [&self.own, &self.own_lid]
            .into_iter()
            .flatten()
            .any(|own| own.same_user(jid))
    }

    /// Resolve an alias to its primary number when the mapping is known.
    fn resolve(&self, jid: &Jid) -> Option<Jid> {
        if jid.is_hidden_user() {
            (self.pn_for_lid)(&jid.to_non_ad()).map(|pn| pn.to_non_ad())
        } else {
            None
        }
    }

    /// Host-visible chat id for a message in `chat` sent by `sender`.
    #[must_use]
    pub fn chat(&self, chat: &Jid, sender: &Jid) -> Jid {
        if chat.is_status_broadcast() {
            return chat.to_non_ad();
        }
        if chat.is_broadcast() {
            // The local side of a broadcast stays grouped under the list itself.
            if self.is_own(sender) {
                return chat.to_non_ad();
            }
            return self.sender(chat, sender);
        }
        self.resolve(chat).unwrap_or_else(|| chat.to_non_ad())
    }

    /// Host-visible sender id. Group participants are kept as-is.
    #[must_use]
    pub fn sender(&self, chat: &Jid, sender: &Jid) -> Jid {
        if chat.is_group() {
            return sender.clone();
        }
        self.resolve(sender).unwrap_or_else(|| sender.to_non_ad())
    }
}

/// Display name of a contact: full name, first name, `~ push name`,
/// `+ business name`, or empty.
#[must_use]
pub fn display_name(contact: &ContactInfo) -> String {
    if !contact.full_name.is_empty() {
        contact.full_name.clone()
    } else if !contact.first_name.is_empty() {
        contact.first_name.clone()
    } else if !contact.push_name.is_empty() {
        format!("~ {}", contact.push_name)
    } else if !contact.business_name.is_empty() {
        format!("+ {}", contact.business_name)
    } else {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jid(s: &str) -> Jid {
        s.parse().unwrap()
    }

    fn normalizer() -> Normalizer<impl Fn(&Jid) -> Option<Jid>> {
        Normalizer::new(
            Some(jid("10000@s.whatsapp.net")),
            Some(jid("900@lid")),
            |lid: &Jid| (lid.user == "555").then(|| jid("67890@s.whatsapp.net")),
        )
    }

    #[test]
    fn status_broadcast_kept() {
        let n = normalizer();
        let chat = jid("status@broadcast");
        assert_eq!(n.chat(&chat, &jid("67890@s.whatsapp.net")), chat);
    }

    #[test]
    fn broadcast_from_peer_maps_to_sender() {
        let n = normalizer();
        let chat = jid("12345@broadcast");
        let got = n.chat(&chat, &jid("67890:3@s.whatsapp.net"));
        assert_eq!(got.canonical(), "67890@s.whatsapp.net");
    }

    #[test]
    fn broadcast_from_alias_sender_resolves() {
        let n = normalizer();
        let got = n.chat(&jid("12345@broadcast"), &jid("555@lid"));
        assert_eq!(got.canonical(), "67890@s.whatsapp.net");
    }

    #[test]
    fn broadcast_from_self_keeps_list() {
        let n = normalizer();
        let chat = jid("12345@broadcast");
        assert_eq!(n.chat(&chat, &jid("10000:7@s.whatsapp.net")), chat);
        assert_eq!(n.chat(&chat, &jid("900@lid")), chat);
    }

    #[test]
    fn alias_chat_resolves_or_falls_through() {
        let n = normalizer();
        let sender = jid("555@lid");
        assert_eq!(n.chat(&sender, &sender).canonical(), "67890@s.whatsapp.net");
        let unknown = jid("777@lid");
        assert_eq!(n.chat(&unknown, &unknown), unknown);
    }

    #[test]
    fn group_sender_untouched() {
        let n = normalizer();
        let group = jid("120363000000@g.us");
        let sender = jid("555@lid");
        assert_eq!(n.sender(&group, &sender), sender);
        assert_eq!(n.chat(&group, &sender), group);
    }

    #[test]
    fn direct_sender_alias_resolved() {
        let n = normalizer();
        let chat = jid("555@lid");
        assert_eq!(
            n.sender(&chat, &jid("555@lid")).canonical(),
            "67890@s.whatsapp.net"
        );
        let plain = jid("42@s.whatsapp.net");
        assert_eq!(n.sender(&plain, &plain), plain);
    }

    #[test]
    fn display_name_priority() {
        let c = |full: &str, first: &str, push: &str, biz: &str| ContactInfo {
            found: true,
            first_name: first.into(),
            full_name: full.into(),
            push_name: push.into(),
            business_name: biz.into(),
        };
        assert_eq!(display_name(&c("Alice Q", "Alice", "al", "")), "Alice Q");
        assert_eq!(display_name(&c("", "Alice", "al", "")), "Alice");
        assert_eq!(display_name(&c("", "", "al", "")), "~ al");
        assert_eq!(display_name(&c("", "", "", "ACME")), "+ ACME");
        assert_eq!(display_name(&c("", "", "", "")), "");
    }
}
