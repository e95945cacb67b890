use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

bitflags! {
    /// Permission bitfield for roles and channel overwrites, using the
    /// platform's own bit positions so values round-trip through its API.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Permissions: u64 {
        // ── General ──
        const CREATE_INSTANT_INVITE = 1 << 0;
        const KICK_MEMBERS          = 1 << 1;
        const BAN_MEMBERS           = 1 << 2;
        const ADMINISTRATOR         = 1 << 3;
        const MANAGE_CHANNELS       = 1 << 4;
        const MANAGE_GUILD          = 1 << 5;
        const ADD_REACTIONS         = 1 << 6;
        const VIEW_AUDIT_LOG        = 1 << 7;

        // ── Channel text ──
        const VIEW_CHANNEL          = 1 << 10;
        const SEND_MESSAGES         = 1 << 11;
        const MANAGE_MESSAGES       = 1 << 13;
        const EMBED_LINKS           = 1 << 14;
        const ATTACH_FILES          = 1 << 15;
        const READ_MESSAGE_HISTORY  = 1 << 16;
        const MENTION_EVERYONE      = 1 << 17;

        // ── Voice ──
        const CONNECT               = 1 << 20;
        const SPEAK                 = 1 << 21;
        const MUTE_MEMBERS          = 1 << 22;
        const DEAFEN_MEMBERS        = 1 << 23;
        const MOVE_MEMBERS          = 1 << 24;

        // ── Moderation ──
        const MANAGE_ROLES          = 1 << 28;
        const MANAGE_WEBHOOKS       = 1 << 29;
        const MODERATE_MEMBERS      = 1 << 40;
    }
}

/// Snapshots carry the raw integer so bits this crate doesn't name survive.
impl Serialize for Permissions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.bits())
    }
}

impl<'de> Deserialize<'de> for Permissions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bits = u64::deserialize(deserializer)?;
        Ok(Permissions::from_bits_retain(bits))
    }
}

/// What a channel permission overwrite applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwriteTarget {
    Role,
    Member,
}

impl OverwriteTarget {
    /// Wire code used by the platform (0 = role, 1 = member).
    pub fn code(self) -> u8 {
        match self {
            Self::Role => 0,
            Self::Member => 1,
        }
    }

    pub fn from_code(code: u8) -> Self {
        if code == 1 { Self::Member } else { Self::Role }
    }
}

/// A channel permission overwrite (allow/deny pair) for one role or member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionOverwrite {
    pub target_id: String,
    pub target_type: OverwriteTarget,
    pub allow: Permissions,
    pub deny: Permissions,
}

impl PermissionOverwrite {
    /// An overwrite for a role that neither allows nor denies anything.
    pub fn empty_for_role(role_id: &str) -> Self {
        Self {
            target_id: role_id.to_string(),
            target_type: OverwriteTarget::Role,
            allow: Permissions::empty(),
            deny: Permissions::empty(),
        }
    }

    /// Tri-state edit of the given flags: `true` moves them into `allow`,
    /// `false` moves them into `deny`. Other bits are left untouched.
    pub fn edited(&self, flags: Permissions, granted: bool) -> Self {
        let mut next = self.clone();
        if granted {
            next.allow |= flags;
            next.deny &= !flags;
        } else {
            next.deny |= flags;
            next.allow &= !flags;
        }
        next
    }
}

/// Build the overwrite that sets VIEW_CHANNEL for `role_id` on a channel,
/// merging with whatever overwrite the role already has there.
pub fn view_overwrite(
    existing: &[PermissionOverwrite],
    role_id: &str,
    visible: bool,
) -> PermissionOverwrite {
    existing
        .iter()
        .find(|ov| ov.target_type == OverwriteTarget::Role && ov.target_id == role_id)
        .cloned()
        .unwrap_or_else(|| PermissionOverwrite::empty_for_role(role_id))
        .edited(Permissions::VIEW_CHANNEL, visible)
}

/// Compute what the default role may do in a channel.
///
/// ADMINISTRATOR on the base bypasses overwrites; otherwise the default
/// role's overwrite is applied allow-first, then deny.
pub fn default_role_channel_permissions(
    base: Permissions,
    overwrites: &[PermissionOverwrite],
    default_role_id: &str,
) -> Permissions {
    if base.contains(Permissions::ADMINISTRATOR) {
        return Permissions::all();
    }

    let mut perms = base;
    for ov in overwrites {
        if ov.target_type == OverwriteTarget::Role && ov.target_id == default_role_id {
            perms |= ov.allow;
            perms &= !ov.deny;
        }
    }
    perms
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVERYONE: &str = "guild-1";

    #[test]
    fn test_bits_match_platform_layout() {
        assert_eq!(Permissions::VIEW_CHANNEL.bits(), 1024);
        assert_eq!(Permissions::ADMINISTRATOR.bits(), 8);
        assert_eq!(Permissions::MODERATE_MEMBERS.bits(), 1 << 40);
    }

    #[test]
    fn test_serde_keeps_unknown_bits() {
        let raw = (1u64 << 45) | Permissions::SEND_MESSAGES.bits();
        let perms: Permissions = serde_json::from_str(&raw.to_string()).unwrap();
        assert!(perms.contains(Permissions::SEND_MESSAGES));
        assert_eq!(serde_json::to_string(&perms).unwrap(), raw.to_string());
    }

    #[test]
    fn test_edit_deny_moves_bit_out_of_allow() {
        let ov = PermissionOverwrite {
            allow: Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES,
            ..PermissionOverwrite::empty_for_role(EVERYONE)
        };
        let edited = ov.edited(Permissions::VIEW_CHANNEL, false);
        assert_eq!(edited.allow, Permissions::SEND_MESSAGES);
        assert_eq!(edited.deny, Permissions::VIEW_CHANNEL);
    }

    #[test]
    fn test_view_overwrite_merges_existing() {
        let existing = vec![
            PermissionOverwrite {
                deny: Permissions::SEND_MESSAGES,
                ..PermissionOverwrite::empty_for_role(EVERYONE)
            },
            PermissionOverwrite {
                target_id: EVERYONE.to_string(),
                target_type: OverwriteTarget::Member,
                allow: Permissions::all(),
                deny: Permissions::empty(),
            },
        ];
        let hidden = view_overwrite(&existing, EVERYONE, false);
        assert_eq!(hidden.target_type, OverwriteTarget::Role);
        assert_eq!(hidden.deny, Permissions::SEND_MESSAGES | Permissions::VIEW_CHANNEL);

        let shown = view_overwrite(&[hidden], EVERYONE, true);
        assert_eq!(shown.allow, Permissions::VIEW_CHANNEL);
        assert_eq!(shown.deny, Permissions::SEND_MESSAGES);
    }

    #[test]
    fn test_view_overwrite_without_existing() {
        let ov = view_overwrite(&[], EVERYONE, true);
        assert_eq!(ov.allow, Permissions::VIEW_CHANNEL);
        assert!(ov.deny.is_empty());
    }

    #[test]
    fn test_default_role_permissions_apply_deny() {
        let base = Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES;
        let perms = default_role_channel_permissions(
            base,
            &[view_overwrite(&[], EVERYONE, false)],
            EVERYONE,
        );
        assert!(!perms.contains(Permissions::VIEW_CHANNEL));
        assert!(perms.contains(Permissions::SEND_MESSAGES));
    }

    #[test]
    fn test_overwrite_for_other_role_is_ignored() {
        let perms = default_role_channel_permissions(
            Permissions::VIEW_CHANNEL,
            &[view_overwrite(&[], "some-role", false)],
            EVERYONE,
        );
        assert!(perms.contains(Permissions::VIEW_CHANNEL));
    }

    #[test]
    fn test_administrator_bypasses_overwrites() {
        let perms = default_role_channel_permissions(
            Permissions::ADMINISTRATOR,
            &[view_overwrite(&[], EVERYONE, false)],
            EVERYONE,
        );
        assert_eq!(perms, Permissions::all());
    }

    #[test]
    fn test_overwrite_target_codes() {
        assert_eq!(OverwriteTarget::from_code(OverwriteTarget::Role.code()), OverwriteTarget::Role);
        assert_eq!(OverwriteTarget::from_code(1), OverwriteTarget::Member);
    }
}
