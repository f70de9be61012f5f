pub mod capability;
pub mod chat;
pub mod config;
pub mod error;
pub mod mode;
pub mod stream;
pub mod tool;
pub mod trace;

pub use capability::{Capabilities, ToolCapabilities};
pub use chat::{
    estimate_tokens, is_cjk, layer_hash, Chat, ChatKey, ContentItem, ErrorMeta, MessageMetadata,
    MessageRole, RuntimeMessage, SystemLayer, ToolCallEnvelope, TurnEvent, DEFAULT_CHAT_ID,
};
pub use error::{Error, ErrorBody, ErrorEnvelope, Result};
pub use mode::{CollaborationEvent, CollaborationMode, PromptMode};
pub use stream::Usage;
pub use trace::TraceEvent;
