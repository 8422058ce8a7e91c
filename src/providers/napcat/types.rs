use serde::{Deserialize, Serialize};

/// Body of the `set_self_longnick` action.
#[derive(Debug, Serialize)]
pub struct SetLongNickRequest<'a> {
    #[serde(rename = "longNick")]
    pub long_nick: &'a str,
}

/// Body of the `send_private_msg` action.
#[derive(Debug, Serialize)]
pub struct SendPrivateMessageRequest<'a> {
    pub user_id: u64,
    pub message: &'a str,
}

/// OneBot action response envelope.
#[derive(Debug, Default, Deserialize)]
pub struct ActionResponse {
    /// "ok", "async" or "failed"
    pub status: Option<String>,
    pub retcode: Option<i64>,
    pub message: Option<String>,
    pub wording: Option<String>,
}

impl ActionResponse {
    pub fn is_ok(&self) -> bool {
        self.status.as_deref() != Some("failed") && self.retcode.unwrap_or(0) == 0
    }

    pub fn reason(&self) -> String {
        self.wording
            .clone()
            .or_else(|| self.message.clone())
            .filter(|reason| !reason.is_empty())
            .unwrap_or_else(|| format!("retcode {}", self.retcode.unwrap_or(-1)))
    }
}
