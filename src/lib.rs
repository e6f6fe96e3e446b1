pub mod config;
pub mod controller;
pub mod difficulty;
pub mod effect;
pub mod message;
pub mod network;
pub mod round;
pub mod word_bank;
pub mod word_source;

pub use config::Config;
pub use controller::GameController;
pub use difficulty::{Difficulty, DifficultyPolicy};
pub use effect::Effect;
pub use message::{ClientAction, GameMessage};
pub use network::WebSocketServer;
pub use round::{Round, RoundPhase, RoundSnapshot};
pub use word_bank::WordBank;
pub use word_source::{HttpWordProvider, WordProvider, WordSource};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("网络错误: {0}")]
    Network(#[from] anyhow::Error),
    #[error("游戏错误: {0}")]
    Game(String),
    #[error("词库错误: {0}")]
    WordBank(String),
    #[error("词源错误: {0}")]
    Provider(String),
    #[error("配置错误: {0}")]
    Config(String),
    #[error("消息错误: {0}")]
    Message(String),
}

pub type Result<T> = std::result::Result<T, Error>;
