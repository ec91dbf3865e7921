use crate::directory::DirectoryEntry;
use crate::router::RosterKey;
use crate::state::{now_millis, ChatMessage, ContactProfile, RosterEntry};

/// Known contacts and channels, most recent first.
///
/// Rows are unique per `(kind, target_id)` and are only ever updated in place
/// or moved; nothing the router does removes one.
#[derive(Debug, Default)]
pub struct RosterStore {
    entries: Vec<RosterEntry>,
}

fn matches(entry: &RosterEntry, key: &RosterKey) -> bool {
    entry.kind == key.kind && entry.target_id == key.target_id
}

fn apply_profile(entry: &mut RosterEntry, profile: &ContactProfile) {
    entry.display_name = profile.display_name();
    if profile.image.is_some() {
        entry.image = profile.image.clone();
    }
    if profile.color.is_some() {
        entry.color = profile.color;
    }
}

impl RosterStore {
    fn position(&self, key: &RosterKey) -> Option<usize> {
        self.entries.iter().position(|e| matches(e, key))
    }

    pub fn get(&self, key: &RosterKey) -> Option<&RosterEntry> {
        self.entries.iter().find(|e| matches(e, key))
    }

    pub fn list_all(&self) -> Vec<RosterEntry> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Record `msg` as the latest activity for `key` and move the row to the
    /// front, creating it if needed.
    pub fn upsert_activity(
        &mut self,
        key: &RosterKey,
        profile: Option<&ContactProfile>,
        msg: &ChatMessage,
    ) {
        let mut entry = match self.position(key) {
            Some(idx) => self.entries.remove(idx),
            None => RosterEntry {
                kind: key.kind,
                target_id: key.target_id.clone(),
                display_name: key.target_id.clone(),
                image: None,
                color: None,
                last_activity: None,
                last_activity_at: None,
                unread_count: 0,
            },
        };
        if let Some(profile) = profile.filter(|p| p.user_id == key.target_id) {
            apply_profile(&mut entry, profile);
        }
        entry.last_activity = Some(msg.clone());
        entry.last_activity_at = Some(msg.timestamp_ms);
        self.entries.insert(0, entry);
    }

    /// Fold a directory listing in. Known rows get fresh metadata and keep
    /// newer live activity; afterwards rows are ordered by last activity,
    /// newest first, with undated rows last. Ties keep their current order.
    pub fn merge_directory(&mut self, listing: Vec<DirectoryEntry>) {
        for item in listing {
            let key = RosterKey::new(item.kind, item.target_id.clone());
            match self.position(&key) {
                Some(idx) => {
                    let entry = &mut self.entries[idx];
                    entry.display_name = item.display_name;
                    entry.image = item.image.or(entry.image.take());
                    entry.color = item.color.or(entry.color);
                    entry.last_activity_at = match (entry.last_activity_at, item.last_activity_at) {
                        (Some(a), Some(b)) => Some(a.max(b)),
                        (a, b) => a.or(b),
                    };
                }
                None => self.entries.push(entry_from_directory(item)),
            }
        }
        self.entries.sort_by_key(|e| std::cmp::Reverse(e.last_activity_at));
    }

    /// Put a freshly created channel at the front. An undated channel is
    /// stamped with the creation time so later merges keep it near the top.
    pub fn insert_channel(&mut self, created: DirectoryEntry) {
        let key = RosterKey::new(created.kind, created.target_id.clone());
        let created_at = created.last_activity_at.unwrap_or_else(now_millis);
        let mut entry = match self.position(&key) {
            Some(idx) => {
                let mut entry = self.entries.remove(idx);
                entry.display_name = created.display_name;
                entry
            }
            None => entry_from_directory(created),
        };
        entry.last_activity_at = Some(
            entry
                .last_activity_at
                .map_or(created_at, |t| t.max(created_at)),
        );
        self.entries.insert(0, entry);
    }

    pub fn mark_unread(&mut self, key: &RosterKey) {
        if let Some(idx) = self.position(key) {
            let entry = &mut self.entries[idx];
            entry.unread_count = entry.unread_count.saturating_add(1);
        }
    }

    /// Returns whether anything changed.
    pub fn mark_read(&mut self, key: &RosterKey) -> bool {
        match self.position(key) {
            Some(idx) if self.entries[idx].unread_count > 0 => {
                self.entries[idx].unread_count = 0;
                true
            }
            _ => false,
        }
    }
}

fn entry_from_directory(item: DirectoryEntry) -> RosterEntry {
    RosterEntry {
        kind: item.kind,
        target_id: item.target_id,
        display_name: item.display_name,
        image: item.image,
        color: item.color,
        last_activity: None,
        last_activity_at: item.last_activity_at,
        unread_count: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ConversationKind, MessageBody, MessageScope};

    fn channel_msg(id: &str, channel: &str, ts: i64) -> ChatMessage {
        ChatMessage {
            id: id.into(),
            sender_id: "u9".into(),
            sender: None,
            scope: MessageScope::Channel {
                channel_id: channel.into(),
            },
            body: MessageBody::Text {
                content: id.into(),
            },
            timestamp_ms: ts,
        }
    }

    fn keys(store: &RosterStore) -> Vec<String> {
        store
            .list_all()
            .into_iter()
            .map(|e| e.target_id)
            .collect()
    }

    fn channel_key(id: &str) -> RosterKey {
        RosterKey::new(ConversationKind::Channel, id)
    }

    #[test]
    fn activity_moves_row_to_front_without_duplicating() {
        let mut roster = RosterStore::default();
        roster.upsert_activity(&channel_key("a"), None, &channel_msg("1", "a", 1));
        roster.upsert_activity(&channel_key("b"), None, &channel_msg("2", "b", 2));
        assert_eq!(keys(&roster), vec!["b", "a"]);

        roster.upsert_activity(&channel_key("a"), None, &channel_msg("3", "a", 3));
        assert_eq!(keys(&roster), vec!["a", "b"]);
        assert_eq!(roster.len(), 2);

        let a = roster.get(&channel_key("a")).unwrap();
        assert_eq!(a.last_activity.as_ref().map(|m| m.id.as_str()), Some("3"));
        assert_eq!(a.last_activity_at, Some(3));
    }

    #[test]
    fn unknown_channel_falls_back_to_id_for_name() {
        let mut roster = RosterStore::default();
        roster.upsert_activity(&channel_key("c77"), None, &channel_msg("1", "c77", 1));
        assert_eq!(roster.get(&channel_key("c77")).unwrap().display_name, "c77");
    }

    #[test]
    fn same_id_different_kind_are_distinct_rows() {
        let mut roster = RosterStore::default();
        let msg = channel_msg("1", "x", 1);
        roster.upsert_activity(&channel_key("x"), None, &msg);
        roster.upsert_activity(&RosterKey::new(ConversationKind::Direct, "x"), None, &msg);
        assert_eq!(roster.len(), 2);
    }

    #[test]
    fn profile_refreshes_display_metadata() {
        let mut roster = RosterStore::default();
        let key = RosterKey::new(ConversationKind::Direct, "u2");
        let profile = ContactProfile {
            first_name: Some("Grace".into()),
            color: Some(3),
            ..ContactProfile::bare("u2")
        };
        roster.upsert_activity(&key, Some(&profile), &channel_msg("1", "c", 1));
        let entry = roster.get(&key).unwrap();
        assert_eq!(entry.display_name, "Grace");
        assert_eq!(entry.color, Some(3));
    }

    #[test]
    fn directory_merge_keeps_live_activity_and_orders_by_recency() {
        let mut roster = RosterStore::default();
        roster.upsert_activity(&channel_key("a"), None, &channel_msg("1", "a", 500));

        roster.merge_directory(vec![
            DirectoryEntry {
                kind: ConversationKind::Channel,
                target_id: "z".into(),
                display_name: "zeta".into(),
                image: None,
                color: None,
                last_activity_at: Some(900),
            },
            DirectoryEntry {
                kind: ConversationKind::Channel,
                target_id: "a".into(),
                display_name: "alpha".into(),
                image: None,
                color: None,
                last_activity_at: Some(100),
            },
        ]);

        assert_eq!(keys(&roster), vec!["z", "a"]);
        let a = roster.get(&channel_key("a")).unwrap();
        assert_eq!(a.display_name, "alpha");
        assert_eq!(a.last_activity_at, Some(500));
        assert!(a.last_activity.is_some());
    }

    fn listed(kind: ConversationKind, id: &str, at: Option<i64>) -> DirectoryEntry {
        DirectoryEntry {
            kind,
            target_id: id.into(),
            display_name: id.into(),
            image: None,
            color: None,
            last_activity_at: at,
        }
    }

    #[test]
    fn later_listing_with_newer_rows_sorts_ahead_of_earlier_one() {
        let mut roster = RosterStore::default();
        roster.merge_directory(vec![
            listed(ConversationKind::Direct, "u2", Some(100)),
            listed(ConversationKind::Direct, "u3", None),
        ]);
        roster.merge_directory(vec![
            listed(ConversationKind::Channel, "c1", Some(900)),
            listed(ConversationKind::Channel, "c2", Some(50)),
        ]);
        assert_eq!(keys(&roster), vec!["c1", "u2", "c2", "u3"]);
    }

    #[test]
    fn equal_timestamps_keep_existing_order() {
        let mut roster = RosterStore::default();
        roster.upsert_activity(&channel_key("a"), None, &channel_msg("1", "a", 7));
        roster.upsert_activity(&channel_key("b"), None, &channel_msg("2", "b", 7));
        roster.merge_directory(vec![listed(ConversationKind::Channel, "c", Some(7))]);
        assert_eq!(keys(&roster), vec!["b", "a", "c"]);
    }

    #[test]
    fn created_channel_stays_ahead_of_older_rows_after_a_merge() {
        let mut roster = RosterStore::default();
        roster.insert_channel(listed(ConversationKind::Channel, "new", None));
        roster.merge_directory(vec![listed(ConversationKind::Direct, "u2", Some(1_000))]);
        assert_eq!(keys(&roster), vec!["new", "u2"]);
        assert!(roster.get(&channel_key("new")).unwrap().last_activity_at.is_some());
    }

    #[test]
    fn created_channel_goes_first() {
        let mut roster = RosterStore::default();
        roster.upsert_activity(&channel_key("a"), None, &channel_msg("1", "a", 1));
        roster.insert_channel(DirectoryEntry {
            kind: ConversationKind::Channel,
            target_id: "new".into(),
            display_name: "design".into(),
            image: None,
            color: None,
            last_activity_at: None,
        });
        assert_eq!(keys(&roster), vec!["new", "a"]);
    }

    #[test]
    fn unread_counts_rise_and_reset() {
        let mut roster = RosterStore::default();
        let key = channel_key("a");
        roster.mark_unread(&key);
        assert!(roster.is_empty());

        roster.upsert_activity(&key, None, &channel_msg("1", "a", 1));
        roster.mark_unread(&key);
        roster.mark_unread(&key);
        assert_eq!(roster.get(&key).unwrap().unread_count, 2);
        assert!(roster.mark_read(&key));
        assert!(!roster.mark_read(&key));
        assert_eq!(roster.get(&key).unwrap().unread_count, 0);
    }
}
