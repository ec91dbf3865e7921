// Receive path: parse, decide, then the two store mutations.

use super::AppCore;
use crate::router;
use crate::transport::InboundKind;
use crate::wire;

impl AppCore {
    pub(super) fn handle_channel_event(&mut self, kind: InboundKind, payload: serde_json::Value) {
        let Some(local_user_id) = self.local_user_id().map(str::to_string) else {
            return;
        };
        let msg = match wire::parse_message(kind.conversation_kind(), payload) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(%e, event = kind.event_name(), "malformed event dropped");
                return;
            }
        };

        // Selection is read here, at handling time, never captured earlier.
        let decision = router::route(&local_user_id, self.state.selection.as_ref(), &msg);
        tracing::debug!(
            id = %msg.id,
            event = kind.event_name(),
            in_scope = decision.append_to_conversation,
            target = %decision.roster_key.target_id,
            "routed"
        );

        if decision.append_to_conversation && self.conversation.append(msg.clone()) {
            self.emit_conversation();
        }

        self.roster
            .upsert_activity(&decision.roster_key, decision.counterpart.as_ref(), &msg);
        if decision.counts_as_unread {
            self.roster.mark_unread(&decision.roster_key);
        }
        self.emit_roster();
    }
}
