use crate::difficulty::Difficulty;
use serde::{Deserialize, Serialize};

/// 客户端与服务器之间的消息信封
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameMessage {
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// 客户端可以发起的操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientAction {
    Guess(char),
    Hint,
    ChangeDifficulty(Difficulty),
    Reset,
    PlayAgain,
    Sync,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum ErrorCode {
    ParseError,
    UnknownMessage,
    InvalidAction,
    InternalError,
}

impl GameMessage {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        GameMessage {
            type_: "error".to_string(),
            data: serde_json::json!({
                "code": code,
                "message": message.into()
            }),
        }
    }
}

impl TryFrom<&GameMessage> for ClientAction {
    type Error = crate::Error;

    fn try_from(message: &GameMessage) -> crate::Result<Self> {
        match message.type_.as_str() {
            "guess" => {
                let letter = message.data["letter"]
                    .as_str()
                    .ok_or_else(|| crate::Error::Message("无效的字母".to_string()))?;
                let mut chars = letter.trim().chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(ClientAction::Guess(c)),
                    _ => Err(crate::Error::Message(format!("只能猜一个字母: {}", letter))),
                }
            }
            "hint" => Ok(ClientAction::Hint),
            "difficulty" => {
                let tier = message.data["difficulty"]
                    .as_str()
                    .ok_or_else(|| crate::Error::Message("无效的难度".to_string()))?;
                Ok(ClientAction::ChangeDifficulty(Difficulty::from_str(tier)))
            }
            "reset" => Ok(ClientAction::Reset),
            "play_again" => Ok(ClientAction::PlayAgain),
            "sync" => Ok(ClientAction::Sync),
            other => Err(crate::Error::Message(format!("未知的消息类型: {}", other))),
        }
    }
}
