use serde::Serialize;

/// Shared error type used across the gateway workspace.
///
/// Every variant maps to exactly one stable error code from the core's
/// taxonomy (see [`Error::code`]) and one HTTP status (see [`Error::status`]).
/// Components never encode an HTTP status themselves — only the transport
/// boundary (`api::error::into_response`) reads [`Error::status`].
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("the default chat cannot be deleted")]
    DefaultChatProtected,

    #[error("the default cron job cannot be deleted")]
    DefaultCronProtected,

    #[error("cron job {0} is at max concurrency")]
    CronBusy(String),

    #[error("chat id in path does not match body")]
    ChatIdMismatch,

    #[error("job id in path does not match body")]
    JobIdMismatch,

    #[error("store error: {0}")]
    StoreError(String),

    #[error("channel not supported: {0}")]
    ChannelNotSupported(String),

    #[error("channel disabled: {0}")]
    ChannelDisabled(String),

    #[error("channel dispatch failed: {0}")]
    ChannelDispatchFailed(String),

    #[error("no provider configured")]
    ProviderNotConfigured,

    #[error("provider does not support: {0}")]
    ProviderNotSupported(String),

    #[error("provider disabled: {0}")]
    ProviderDisabled(String),

    #[error("provider request failed: {0}")]
    ProviderRequestFailed(String),

    #[error("provider returned an invalid reply: {message}")]
    ProviderInvalidReply {
        message: String,
        #[source]
        cause: Option<Box<Error>>,
    },

    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("invalid provider id: {0}")]
    InvalidProviderId(String),

    #[error("invalid provider config: {0}")]
    InvalidProviderConfig(String),

    #[error("invalid model slot: {0}")]
    InvalidModelSlot(String),

    #[error("invalid tool input: {0}")]
    InvalidToolInput(String),

    #[error("tool path forbidden: {0}")]
    ToolForbiddenPath(String),

    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("tool conflict: {0}")]
    ToolConflict(String),

    #[error("tool error: {0}")]
    ToolError(String),

    #[error("tool disabled: {0}")]
    ToolDisabled(String),

    #[error("tool returned an invalid result: {0}")]
    ToolInvalidResult(String),

    #[error("invalid cron workflow: {0}")]
    InvalidCronWorkflow(String),

    #[error("codex prompt unavailable: {0}")]
    CodexPromptUnavailable(String),

    #[error("claude prompt unavailable: {0}")]
    ClaudePromptUnavailable(String),

    #[error("ai tool guide unavailable: {0}")]
    AiToolGuideUnavailable(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Stable, machine-readable error code (spec §7 taxonomy).
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidJson(_) => "invalid_json",
            Error::InvalidRequest(_) => "invalid_request",
            Error::Unauthorized => "unauthorized",
            Error::NotFound(_) => "not_found",
            Error::DefaultChatProtected => "default_chat_protected",
            Error::DefaultCronProtected => "default_cron_protected",
            Error::CronBusy(_) => "cron_busy",
            Error::ChatIdMismatch => "chat_id_mismatch",
            Error::JobIdMismatch => "job_id_mismatch",
            Error::StoreError(_) => "store_error",
            Error::ChannelNotSupported(_) => "channel_not_supported",
            Error::ChannelDisabled(_) => "channel_disabled",
            Error::ChannelDispatchFailed(_) => "channel_dispatch_failed",
            Error::ProviderNotConfigured => "provider_not_configured",
            Error::ProviderNotSupported(_) => "provider_not_supported",
            Error::ProviderDisabled(_) => "provider_disabled",
            Error::ProviderRequestFailed(_) => "provider_request_failed",
            Error::ProviderInvalidReply { .. } => "provider_invalid_reply",
            Error::ModelNotFound(_) => "model_not_found",
            Error::InvalidProviderId(_) => "invalid_provider_id",
            Error::InvalidProviderConfig(_) => "invalid_provider_config",
            Error::InvalidModelSlot(_) => "invalid_model_slot",
            Error::InvalidToolInput(_) => "invalid_tool_input",
            Error::ToolForbiddenPath(_) => "tool_forbidden_path",
            Error::ToolNotFound(_) => "tool_not_found",
            Error::ToolConflict(_) => "tool_conflict",
            Error::ToolError(_) => "tool_error",
            Error::ToolDisabled(_) => "tool_disabled",
            Error::ToolInvalidResult(_) => "tool_invalid_result",
            Error::InvalidCronWorkflow(_) => "invalid_cron_workflow",
            Error::CodexPromptUnavailable(_) => "codex_prompt_unavailable",
            Error::ClaudePromptUnavailable(_) => "claude_prompt_unavailable",
            Error::AiToolGuideUnavailable(_) => "ai_tool_guide_unavailable",
            Error::Io(_) | Error::Json(_) => "store_error",
        }
    }

    /// HTTP status this error maps to at the transport boundary.
    pub fn status(&self) -> u16 {
        match self {
            Error::Unauthorized => 401,
            Error::NotFound(_) | Error::ToolNotFound(_) | Error::ModelNotFound(_) => 404,
            Error::DefaultChatProtected
            | Error::DefaultCronProtected
            | Error::InvalidRequest(_)
            | Error::InvalidJson(_)
            | Error::ChatIdMismatch
            | Error::JobIdMismatch
            | Error::InvalidProviderId(_)
            | Error::InvalidProviderConfig(_)
            | Error::InvalidModelSlot(_)
            | Error::InvalidToolInput(_)
            | Error::InvalidCronWorkflow(_)
            | Error::ChannelNotSupported(_)
            | Error::ProviderNotSupported(_) => 400,
            Error::CronBusy(_) => 409,
            Error::ToolConflict(_) => 409,
            Error::ChannelDisabled(_) | Error::ProviderDisabled(_) | Error::ToolDisabled(_) => 403,
            Error::ToolForbiddenPath(_) => 403,
            Error::ProviderNotConfigured
            | Error::ProviderRequestFailed(_)
            | Error::ProviderInvalidReply { .. }
            | Error::ChannelDispatchFailed(_)
            | Error::ToolError(_)
            | Error::ToolInvalidResult(_)
            | Error::CodexPromptUnavailable(_)
            | Error::ClaudePromptUnavailable(_)
            | Error::AiToolGuideUnavailable(_)
            | Error::StoreError(_)
            | Error::Io(_)
            | Error::Json(_) => 500,
        }
    }

    /// JSON-serializable envelope body: `{"error": {code, message, details}}`.
    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            error: ErrorBody {
                code: self.code().to_string(),
                message: self.to_string(),
                details: None,
            },
        }
    }

    pub fn with_details(self, details: serde_json::Value) -> ErrorEnvelope {
        let mut envelope = self.envelope();
        envelope.error.details = Some(details);
        envelope
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cron_busy_maps_to_409() {
        let e = Error::CronBusy("j1".into());
        assert_eq!(e.code(), "cron_busy");
        assert_eq!(e.status(), 409);
    }

    #[test]
    fn default_chat_protected_maps_to_400() {
        let e = Error::DefaultChatProtected;
        assert_eq!(e.code(), "default_chat_protected");
        assert_eq!(e.status(), 400);
    }

    #[test]
    fn envelope_omits_details_when_none() {
        let e = Error::Unauthorized;
        let json = serde_json::to_value(e.envelope()).unwrap();
        assert!(json["error"].get("details").is_none());
    }

    #[test]
    fn with_details_attaches_payload() {
        let e = Error::ProviderInvalidReply {
            message: "bad frame".into(),
            cause: None,
        };
        let env = e.with_details(serde_json::json!({"raw": "xyz"}));
        assert_eq!(env.error.details.unwrap()["raw"], "xyz");
    }
}
