mod conversation;
mod roster;

pub use conversation::ConversationStore;
pub use roster::RosterStore;
