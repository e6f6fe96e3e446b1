use serde::{Deserialize, Serialize};
use std::fmt;

/// 难度等级
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Moderate,
    Hard,
    /// 未知难度，使用降级策略
    #[serde(other)]
    Unrecognized,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Moderate, Difficulty::Hard];

    pub fn from_str(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "easy" => Difficulty::Easy,
            "moderate" => Difficulty::Moderate,
            "hard" => Difficulty::Hard,
            _ => Difficulty::Unrecognized,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Moderate => "moderate",
            Difficulty::Hard => "hard",
            Difficulty::Unrecognized => "unrecognized",
        }
    }

    pub fn policy(&self) -> DifficultyPolicy {
        policy_for(*self)
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Difficulty::Moderate
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 难度对应的单词长度范围和提示次数
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct DifficultyPolicy {
    pub min_len: usize,
    pub max_len: usize,
    pub hint_budget: usize,
}

/// 查表获取难度策略，未知难度使用中等长度范围但只给1次提示
pub fn policy_for(difficulty: Difficulty) -> DifficultyPolicy {
    let (min_len, max_len, hint_budget) = match difficulty {
        Difficulty::Easy => (3, 5, 2),
        Difficulty::Moderate => (6, 8, 3),
        Difficulty::Hard => (9, 12, 4),
        Difficulty::Unrecognized => (6, 8, 1),
    };
    DifficultyPolicy {
        min_len,
        max_len,
        hint_budget,
    }
}
