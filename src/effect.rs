use crate::difficulty::Difficulty;
use crate::message::GameMessage;
use serde::Serialize;

/// 控制器发给展示层的效果事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Effect {
    BoardInitialized {
        word_length: usize,
        max_incorrect: usize,
        hints_remaining: usize,
        difficulty: Difficulty,
    },
    LetterRevealed {
        positions: Vec<usize>,
        letter: char,
    },
    LetterMarkedIncorrect {
        letter: char,
        remaining_guesses: usize,
    },
    HintApplied {
        letter: char,
        hints_remaining: usize,
    },
    HintUnavailable {
        hints_remaining: usize,
    },
    RoundWon {
        secret_word: String,
    },
    RoundLost {
        secret_word: String,
    },
    InputLockChanged {
        locked: bool,
    },
    /// 无法获得单词，提示玩家重新开始
    WordUnavailable,
    DifficultyChanged {
        difficulty: Difficulty,
    },
    /// 玩家重新开始或再来一局
    RoundReset,
}

impl Effect {
    pub fn kind(&self) -> &'static str {
        match self {
            Effect::BoardInitialized { .. } => "board_initialized",
            Effect::LetterRevealed { .. } => "letter_revealed",
            Effect::LetterMarkedIncorrect { .. } => "letter_marked_incorrect",
            Effect::HintApplied { .. } => "hint_applied",
            Effect::HintUnavailable { .. } => "hint_unavailable",
            Effect::RoundWon { .. } => "round_won",
            Effect::RoundLost { .. } => "round_lost",
            Effect::InputLockChanged { .. } => "input_lock_changed",
            Effect::WordUnavailable => "word_unavailable",
            Effect::DifficultyChanged { .. } => "difficulty_changed",
            Effect::RoundReset => "round_reset",
        }
    }

    /// 转换成发往客户端的消息
    pub fn to_message(&self) -> GameMessage {
        let data = match serde_json::to_value(self) {
            Ok(mut value) => value
                .get_mut("data")
                .map(serde_json::Value::take)
                .unwrap_or_else(|| serde_json::json!({})),
            Err(_) => serde_json::json!({}),
        };
        GameMessage {
            type_: self.kind().to_string(),
            data,
        }
    }
}
