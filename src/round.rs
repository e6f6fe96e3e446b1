use crate::difficulty::Difficulty;
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// 每局允许的最大错误次数
pub const MAX_INCORRECT: usize = 6;

/// 回合阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    /// 正在获取单词
    Loading,
    Active,
    Won,
    Lost,
}

/// 被忽略的操作原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    InvalidLetter,
    NotStarted,
    RoundOver,
    AlreadyGuessed,
    NoHintsLeft,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoundError {
    #[error("单词为空")]
    EmptyWord,
    #[error("单词包含非字母字符: {0}")]
    InvalidWord(String),
    #[error("回合已经开始")]
    AlreadyStarted,
}

/// 猜字母的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuessOutcome {
    Correct {
        letter: char,
        positions: Vec<usize>,
        won: bool,
    },
    Incorrect {
        letter: char,
        remaining_guesses: usize,
        lost: bool,
    },
    Rejected(Rejection),
}

/// 使用提示的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HintOutcome {
    Applied {
        letter: char,
        positions: Vec<usize>,
        hints_remaining: usize,
        won: bool,
    },
    Rejected(Rejection),
}

/// 一局游戏的权威状态
///
/// 胜负判定在每次修改后同步完成，结束后的回合不再接受任何修改。
#[derive(Debug, Clone)]
pub struct Round {
    difficulty: Difficulty,
    secret_word: Option<Vec<char>>,
    guessed_letters: BTreeSet<char>,
    incorrect_count: usize,
    hints_remaining: usize,
    phase: RoundPhase,
}

/// 提供给展示层的只读快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundSnapshot {
    pub difficulty: Difficulty,
    pub phase: RoundPhase,
    /// 已揭示的字母，未揭示的位置为None
    pub masked_word: Vec<Option<char>>,
    pub guessed_letters: Vec<char>,
    pub incorrect_count: usize,
    pub max_incorrect: usize,
    pub guesses_left: usize,
    pub hints_remaining: usize,
    pub can_use_hint: bool,
    pub is_round_over: bool,
    pub input_locked: bool,
    pub word_unavailable: bool,
    /// 只在回合结束后公开
    pub secret_word: Option<String>,
}

impl Round {
    /// 创建处于加载状态的新回合
    pub fn new(difficulty: Difficulty) -> Self {
        Round {
            difficulty,
            secret_word: None,
            guessed_letters: BTreeSet::new(),
            incorrect_count: 0,
            hints_remaining: difficulty.policy().hint_budget,
            phase: RoundPhase::Loading,
        }
    }

    /// 设置目标单词，进入进行中状态
    pub fn start(&mut self, word: &str) -> Result<(), RoundError> {
        if self.phase != RoundPhase::Loading {
            return Err(RoundError::AlreadyStarted);
        }
        let word = word.trim();
        if word.is_empty() {
            return Err(RoundError::EmptyWord);
        }
        if !word.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(RoundError::InvalidWord(word.to_string()));
        }

        self.secret_word = Some(word.chars().map(|c| c.to_ascii_uppercase()).collect());
        self.phase = RoundPhase::Active;
        Ok(())
    }

    /// 猜一个字母
    pub fn guess_letter(&mut self, letter: char) -> GuessOutcome {
        let letter = letter.to_ascii_uppercase();
        if !letter.is_ascii_uppercase() {
            return GuessOutcome::Rejected(Rejection::InvalidLetter);
        }
        if let Err(rejection) = self.ensure_active() {
            return GuessOutcome::Rejected(rejection);
        }
        if self.guessed_letters.contains(&letter) {
            return GuessOutcome::Rejected(Rejection::AlreadyGuessed);
        }

        self.guessed_letters.insert(letter);
        let positions = self.positions_of(letter);

        if positions.is_empty() {
            self.incorrect_count += 1;
            let lost = self.check_lose();
            GuessOutcome::Incorrect {
                letter,
                remaining_guesses: self.guesses_left(),
                lost,
            }
        } else {
            let won = self.check_win();
            GuessOutcome::Correct {
                letter,
                positions,
                won,
            }
        }
    }

    /// 使用一次提示
    pub fn use_hint(&mut self) -> HintOutcome {
        let mut rng = rand::rng();
        self.use_hint_with(&mut rng)
    }

    /// 使用一次提示，从未揭示的不同字母中均匀随机选择
    pub fn use_hint_with<R: Rng + ?Sized>(&mut self, rng: &mut R) -> HintOutcome {
        if let Err(rejection) = self.ensure_active() {
            return HintOutcome::Rejected(rejection);
        }
        if self.hints_remaining == 0 {
            return HintOutcome::Rejected(Rejection::NoHintsLeft);
        }

        let unrevealed: BTreeSet<char> = self
            .word()
            .iter()
            .copied()
            .filter(|c| !self.guessed_letters.contains(c))
            .collect();
        let candidates: Vec<char> = unrevealed.into_iter().collect();
        let Some(&letter) = candidates.choose(rng) else {
            // 进行中的回合总有未揭示的字母
            return HintOutcome::Rejected(Rejection::RoundOver);
        };

        self.guessed_letters.insert(letter);
        let positions = self.positions_of(letter);
        let won = self.check_win();
        self.hints_remaining -= 1;

        HintOutcome::Applied {
            letter,
            positions,
            hints_remaining: self.hints_remaining,
            won,
        }
    }

    fn ensure_active(&self) -> Result<(), Rejection> {
        match self.phase {
            RoundPhase::Active => Ok(()),
            RoundPhase::Loading => Err(Rejection::NotStarted),
            RoundPhase::Won | RoundPhase::Lost => Err(Rejection::RoundOver),
        }
    }

    fn check_win(&mut self) -> bool {
        let won = self
            .word()
            .iter()
            .all(|c| self.guessed_letters.contains(c));
        if won {
            self.phase = RoundPhase::Won;
        }
        won
    }

    fn check_lose(&mut self) -> bool {
        let lost = self.incorrect_count >= MAX_INCORRECT;
        if lost {
            self.phase = RoundPhase::Lost;
        }
        lost
    }

    fn word(&self) -> &[char] {
        self.secret_word.as_deref().unwrap_or(&[])
    }

    fn positions_of(&self, letter: char) -> Vec<usize> {
        self.word()
            .iter()
            .enumerate()
            .filter(|(_, c)| **c == letter)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn secret_word(&self) -> Option<String> {
        self.secret_word.as_ref().map(|w| w.iter().collect())
    }

    pub fn word_length(&self) -> usize {
        self.word().len()
    }

    pub fn guessed_letters(&self) -> &BTreeSet<char> {
        &self.guessed_letters
    }

    pub fn incorrect_count(&self) -> usize {
        self.incorrect_count
    }

    pub fn guesses_left(&self) -> usize {
        MAX_INCORRECT - self.incorrect_count
    }

    pub fn hints_remaining(&self) -> usize {
        self.hints_remaining
    }

    pub fn is_active(&self) -> bool {
        self.phase == RoundPhase::Active
    }

    /// 回合是否已分出胜负
    pub fn is_round_over(&self) -> bool {
        matches!(self.phase, RoundPhase::Won | RoundPhase::Lost)
    }

    pub fn can_use_hint(&self) -> bool {
        self.hints_remaining > 0 && self.is_active()
    }

    pub fn masked_word(&self) -> Vec<Option<char>> {
        self.word()
            .iter()
            .map(|c| self.guessed_letters.contains(c).then_some(*c))
            .collect()
    }

    pub fn snapshot(&self, input_locked: bool, word_unavailable: bool) -> RoundSnapshot {
        RoundSnapshot {
            difficulty: self.difficulty,
            phase: self.phase,
            masked_word: self.masked_word(),
            guessed_letters: self.guessed_letters.iter().copied().collect(),
            incorrect_count: self.incorrect_count,
            max_incorrect: MAX_INCORRECT,
            guesses_left: self.guesses_left(),
            hints_remaining: self.hints_remaining,
            can_use_hint: !input_locked && self.can_use_hint(),
            is_round_over: self.is_round_over(),
            input_locked,
            word_unavailable,
            secret_word: if self.is_round_over() {
                self.secret_word()
            } else {
                None
            },
        }
    }
}
