use crate::difficulty::Difficulty;
use crate::effect::Effect;
use crate::message::ClientAction;
use crate::round::{GuessOutcome, HintOutcome, MAX_INCORRECT, Round, RoundSnapshot};
use crate::word_source::WordSource;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// 一次开局请求，只有最新一代的请求可以提交单词
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundTicket {
    generation: u64,
    difficulty: Difficulty,
}

impl RoundTicket {
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }
}

/// 游戏控制器，独占当前回合并向展示层发送效果事件
pub struct GameController {
    difficulty: Difficulty,
    round: Round,
    generation: u64,
    input_locked: bool,
    word_unavailable: bool,
    rounds_started: u64,
    source: Arc<WordSource>,
    effects: mpsc::UnboundedSender<Effect>,
}

impl GameController {
    pub fn new(
        difficulty: Difficulty,
        source: Arc<WordSource>,
        effects: mpsc::UnboundedSender<Effect>,
    ) -> Self {
        GameController {
            difficulty,
            round: Round::new(difficulty),
            generation: 0,
            input_locked: false,
            word_unavailable: false,
            rounds_started: 0,
            source,
            effects,
        }
    }

    fn emit(&self, effect: Effect) {
        debug!("发送效果: {:?}", effect);
        if let Err(e) = self.effects.send(effect) {
            debug!("效果接收端已关闭: {}", e);
        }
    }

    fn set_input_locked(&mut self, locked: bool) {
        if self.input_locked != locked {
            self.input_locked = locked;
            self.emit(Effect::InputLockChanged { locked });
        }
    }

    /// 处理一个客户端操作并等待新回合取词完成
    pub async fn handle_action(&mut self, action: ClientAction) {
        if let Some(ticket) = self.apply_action(action) {
            self.finish_round(ticket).await;
        }
    }

    /// 同步处理一个客户端操作
    ///
    /// 需要开新回合时返回开局请求，由调用方取词后交给 `commit_word`。
    pub fn apply_action(&mut self, action: ClientAction) -> Option<RoundTicket> {
        match action {
            ClientAction::Guess(letter) => {
                self.guess_letter(letter);
                None
            }
            ClientAction::Hint => {
                self.use_hint();
                None
            }
            ClientAction::ChangeDifficulty(difficulty) => Some(self.switch_difficulty(difficulty)),
            ClientAction::Reset | ClientAction::PlayAgain => Some(self.reset_round()),
            ClientAction::Sync => None,
        }
    }

    /// 开始新回合：锁定输入、取词、初始化棋盘、解锁输入
    pub async fn start_round(&mut self) {
        let ticket = self.begin_round();
        self.finish_round(ticket).await;
    }

    async fn finish_round(&mut self, ticket: RoundTicket) {
        let word = self.source.fetch_word(ticket.difficulty).await;
        self.commit_word(ticket, &word);
    }

    /// 玩家重新开始，丢弃当前回合
    pub fn reset_round(&mut self) -> RoundTicket {
        info!("玩家重新开始，难度: {}", self.difficulty);
        self.emit(Effect::RoundReset);
        self.begin_round()
    }

    /// 丢弃当前回合并创建处于加载状态的新回合
    pub fn begin_round(&mut self) -> RoundTicket {
        self.generation += 1;
        self.rounds_started += 1;
        self.round = Round::new(self.difficulty);
        self.word_unavailable = false;
        self.set_input_locked(true);
        debug!("开始第{}代回合，难度: {}", self.generation, self.difficulty);
        RoundTicket {
            generation: self.generation,
            difficulty: self.difficulty,
        }
    }

    /// 提交取到的单词，过期的请求会被丢弃
    pub fn commit_word(&mut self, ticket: RoundTicket, word: &str) -> bool {
        if ticket.generation != self.generation {
            debug!(
                "丢弃过期单词，请求代数 {}，当前代数 {}",
                ticket.generation, self.generation
            );
            return false;
        }

        match self.round.start(word) {
            Ok(()) => {
                info!("新回合开始，难度: {}，单词长度: {}", self.difficulty, self.round.word_length());
                self.emit(Effect::BoardInitialized {
                    word_length: self.round.word_length(),
                    max_incorrect: MAX_INCORRECT,
                    hints_remaining: self.round.hints_remaining(),
                    difficulty: self.difficulty,
                });
            }
            Err(e) => {
                warn!("无法开始回合: {}", e);
                self.word_unavailable = true;
                self.emit(Effect::WordUnavailable);
            }
        }
        self.set_input_locked(false);
        true
    }

    /// 玩家选择字母
    pub fn guess_letter(&mut self, letter: char) {
        if self.input_locked {
            debug!("输入已锁定，忽略字母: {}", letter);
            return;
        }

        match self.round.guess_letter(letter) {
            GuessOutcome::Correct {
                letter,
                positions,
                won,
            } => {
                self.emit(Effect::LetterRevealed { positions, letter });
                if won {
                    self.emit_round_won();
                }
            }
            GuessOutcome::Incorrect {
                letter,
                remaining_guesses,
                lost,
            } => {
                self.emit(Effect::LetterMarkedIncorrect {
                    letter,
                    remaining_guesses,
                });
                if lost {
                    info!("回合失败，单词: {:?}", self.round.secret_word());
                    self.emit(Effect::RoundLost {
                        secret_word: self.round.secret_word().unwrap_or_default(),
                    });
                }
            }
            GuessOutcome::Rejected(reason) => {
                debug!("忽略字母 {}: {:?}", letter, reason);
            }
        }
    }

    /// 玩家请求提示
    pub fn use_hint(&mut self) {
        if self.input_locked {
            debug!("输入已锁定，忽略提示请求");
            return;
        }

        match self.round.use_hint() {
            HintOutcome::Applied {
                letter,
                positions,
                hints_remaining,
                won,
            } => {
                self.emit(Effect::LetterRevealed { positions, letter });
                self.emit(Effect::HintApplied {
                    letter,
                    hints_remaining,
                });
                if won {
                    self.emit_round_won();
                }
            }
            HintOutcome::Rejected(reason) => {
                debug!("提示不可用: {:?}", reason);
                self.emit(Effect::HintUnavailable {
                    hints_remaining: self.round.hints_remaining(),
                });
            }
        }
    }

    /// 切换难度并开始新回合
    pub async fn change_difficulty(&mut self, difficulty: Difficulty) {
        let ticket = self.switch_difficulty(difficulty);
        self.finish_round(ticket).await;
    }

    fn switch_difficulty(&mut self, difficulty: Difficulty) -> RoundTicket {
        if difficulty != self.difficulty {
            info!("难度从 {} 切换为 {}", self.difficulty, difficulty);
            self.difficulty = difficulty;
            self.emit(Effect::DifficultyChanged { difficulty });
        }
        self.begin_round()
    }

    fn emit_round_won(&self) {
        info!("回合胜利，单词: {:?}", self.round.secret_word());
        self.emit(Effect::RoundWon {
            secret_word: self.round.secret_word().unwrap_or_default(),
        });
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn word_source(&self) -> Arc<WordSource> {
        self.source.clone()
    }

    pub fn round(&self) -> &Round {
        &self.round
    }

    pub fn input_locked(&self) -> bool {
        self.input_locked
    }

    pub fn word_unavailable(&self) -> bool {
        self.word_unavailable
    }

    pub fn rounds_started(&self) -> u64 {
        self.rounds_started
    }

    pub fn can_use_hint(&self) -> bool {
        !self.input_locked && self.round.can_use_hint()
    }

    pub fn is_round_over(&self) -> bool {
        self.round.is_round_over()
    }

    pub fn snapshot(&self) -> RoundSnapshot {
        self.round.snapshot(self.input_locked, self.word_unavailable)
    }
}
