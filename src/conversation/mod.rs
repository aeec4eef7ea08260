//! The `Conversation` data model (spec §3 "Conversation"): the durable,
//! per-peer and per-group record that a `ConversationConnection` attaches to.
//!
//! Cyclic references between a conversation, its group variant, and its
//! member conversations are expressed as non-owning back-references rather
//! than owned pointers (spec §9 "each object is owned by a single registry
//! keyed by local id"): every `Conversation`/`GroupMemberConversation` here
//! stores only the `local_id`s of related objects, and [`ConversationRegistry`]
//! is the single owner that resolves them.

use std::collections::HashMap;

use bitflags::bitflags;
use uuid::Uuid;

bitflags! {
    /// Group-state flags (spec §3 "group-state flags JOINED/LEAVING/DELETED").
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GroupFlags: u32 {
        const JOINED = 1 << 0;
        const LEAVING = 1 << 1;
        const DELETED = 1 << 2;
    }
}

/// A direct, one-to-one conversation (spec §3 "Conversation"). Attributes
/// not needed outside this crate's scope (subject reference, UI-facing
/// display fields) are left to the host application; only what the
/// connection and operation layers read or write is modelled here.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    pub local_id: i64,
    pub conversation_id: Uuid,
    pub resource_id: Uuid,
    pub peer_resource_id: Uuid,
    pub permissions: u32,
    pub last_connect: i64,
    pub last_retry: i64,
    pub flags: GroupFlags,
}

impl Conversation {
    pub fn new(local_id: i64, conversation_id: Uuid, resource_id: Uuid, peer_resource_id: Uuid) -> Self {
        Self {
            local_id,
            conversation_id,
            resource_id,
            peer_resource_id,
            permissions: 0,
            last_connect: 0,
            last_retry: 0,
            flags: GroupFlags::empty(),
        }
    }
}

/// One member of a group, itself a conversation targeting a single member
/// twincode (spec §3 "GroupMemberConversation ... each one itself a
/// conversation targeting a single member twincode").
#[derive(Debug, Clone, PartialEq)]
pub struct GroupMemberConversation {
    pub conversation: Conversation,
    pub member_twincode_id: Uuid,
}

impl GroupMemberConversation {
    /// spec §3 "A member whose permissions == 0 is deemed *leaving* and is
    /// excluded from sends and member listings unless explicitly requested."
    pub fn is_leaving(&self) -> bool {
        self.conversation.permissions == 0
    }
}

/// A group conversation (spec §3 "GroupConversation ... adds
/// groupTwincodeId, the set of GroupMemberConversations ... plus
/// joinPermissions, group-state flags, and an incomingConversation used to
/// receive from any member"). Member conversations are referenced by local
/// id, not owned directly; resolve them through [`ConversationRegistry`].
#[derive(Debug, Clone, PartialEq)]
pub struct GroupConversation {
    pub conversation: Conversation,
    pub group_twincode_id: Uuid,
    pub join_permissions: u32,
    pub group_flags: GroupFlags,
    pub member_local_ids: Vec<i64>,
    pub incoming_conversation_local_id: i64,
}

impl GroupConversation {
    /// Members currently eligible for sends and listings (spec §3, excludes
    /// anyone with `permissions == 0` unless explicitly requested — that
    /// opt-in is the caller's to make by inspecting `is_leaving` directly on
    /// members resolved from `member_local_ids`).
    pub fn active_member_ids<'a>(&'a self, registry: &'a ConversationRegistry) -> impl Iterator<Item = i64> + 'a {
        self.member_local_ids.iter().copied().filter(move |id| {
            registry
                .get_member(*id)
                .map(|m| !m.is_leaving())
                .unwrap_or(false)
        })
    }
}

/// The sole owner of every [`Conversation`], [`GroupConversation`] and
/// [`GroupMemberConversation`] in the process, keyed by local id (spec §9
/// "express as non-owning back-references; each object is owned by a single
/// registry keyed by local id").
#[derive(Debug, Default)]
pub struct ConversationRegistry {
    direct: HashMap<i64, Conversation>,
    groups: HashMap<i64, GroupConversation>,
    members: HashMap<i64, GroupMemberConversation>,
}

impl ConversationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_direct(&mut self, conversation: Conversation) {
        self.direct.insert(conversation.local_id, conversation);
    }

    pub fn insert_group(&mut self, group: GroupConversation) {
        self.groups.insert(group.conversation.local_id, group);
    }

    pub fn insert_member(&mut self, member_local_id: i64, member: GroupMemberConversation) {
        self.members.insert(member_local_id, member);
    }

    pub fn get_direct(&self, local_id: i64) -> Option<&Conversation> {
        self.direct.get(&local_id)
    }

    pub fn get_group(&self, local_id: i64) -> Option<&GroupConversation> {
        self.groups.get(&local_id)
    }

    pub fn get_member(&self, local_id: i64) -> Option<&GroupMemberConversation> {
        self.members.get(&local_id)
    }

    pub fn remove(&mut self, local_id: i64) {
        self.direct.remove(&local_id);
        self.groups.remove(&local_id);
        self.members.remove(&local_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(local_id: i64, permissions: u32) -> GroupMemberConversation {
        GroupMemberConversation {
            conversation: {
                let mut c = Conversation::new(local_id, Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
                c.permissions = permissions;
                c
            },
            member_twincode_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn member_with_zero_permissions_is_leaving() {
        assert!(member(1, 0).is_leaving());
        assert!(!member(1, 0b0001).is_leaving());
    }

    #[test]
    fn active_member_ids_excludes_leaving_members() {
        let mut registry = ConversationRegistry::new();
        registry.insert_member(1, member(1, 1));
        registry.insert_member(2, member(2, 0));

        let group = GroupConversation {
            conversation: Conversation::new(100, Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()),
            group_twincode_id: Uuid::new_v4(),
            join_permissions: 1,
            group_flags: GroupFlags::JOINED,
            member_local_ids: vec![1, 2],
            incoming_conversation_local_id: 100,
        };

        let active: Vec<i64> = group.active_member_ids(&registry).collect();
        assert_eq!(active, vec![1]);
    }

    #[test]
    fn registry_lookup_by_local_id() {
        let mut registry = ConversationRegistry::new();
        registry.insert_direct(Conversation::new(5, Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()));
        assert!(registry.get_direct(5).is_some());
        registry.remove(5);
        assert!(registry.get_direct(5).is_none());
    }
}
