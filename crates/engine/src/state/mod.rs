pub mod chat;
pub mod selection;
pub mod settings;

pub use chat::{extract_json_block, ChatContext, ChatManager, ChatSession, TurnOutcome};
pub use selection::SelectionState;
pub use settings::{BackendKind, ForgeSettings, SettingsError};
