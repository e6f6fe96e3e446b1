//! 单词来源：向外部随机单词接口取词，失败时重试并退回备用词库。
//!
//! 取词流程不会向调用方返回错误，所有失败都只记录日志。
use crate::Result;
use crate::config::WordProviderConfig;
use crate::difficulty::Difficulty;
use crate::word_bank::WordBank;
use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, error, warn};
use url::Url;

/// 外层尝试次数，每次重新随机单词长度
pub const MAX_LENGTH_ROUNDS: usize = 5;
/// 每个长度的请求次数
pub const ATTEMPTS_PER_LENGTH: usize = 3;

/// 外部单词接口
#[async_trait]
pub trait WordProvider: Send + Sync {
    /// 获取候选单词列表，`length` 为 None 时不限制长度
    async fn fetch_words(&self, length: Option<usize>) -> Result<Vec<String>>;
}

/// 基于HTTP的随机单词接口
pub struct HttpWordProvider {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpWordProvider {
    pub fn new(config: &WordProviderConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| crate::Error::Config(format!("无效的单词接口地址: {}", e)))?;

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .build()
            .map_err(|e| crate::Error::Network(anyhow::anyhow!(e)))?;

        Ok(HttpWordProvider { client, base_url })
    }

    fn request_url(&self, length: Option<usize>) -> Url {
        let mut url = self.base_url.clone();
        if let Some(length) = length {
            url.query_pairs_mut()
                .append_pair("length", &length.to_string());
        }
        url
    }
}

#[async_trait]
impl WordProvider for HttpWordProvider {
    async fn fetch_words(&self, length: Option<usize>) -> Result<Vec<String>> {
        let url = self.request_url(length);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| crate::Error::Network(anyhow::anyhow!(e)))?;

        if !response.status().is_success() {
            return Err(crate::Error::Provider(format!(
                "请求失败，状态码: {}",
                response.status()
            )));
        }

        response
            .json::<Vec<String>>()
            .await
            .map_err(|e| crate::Error::Provider(format!("响应格式错误: {}", e)))
    }
}

/// 带重试和备用词的取词器
pub struct WordSource {
    provider: Arc<dyn WordProvider>,
    word_bank: Arc<WordBank>,
}

impl WordSource {
    pub fn new(provider: Arc<dyn WordProvider>, word_bank: Arc<WordBank>) -> Self {
        WordSource {
            provider,
            word_bank,
        }
    }

    pub fn word_bank(&self) -> &WordBank {
        &self.word_bank
    }

    /// 为指定难度获取一个大写单词
    ///
    /// 先按随机长度请求接口（5轮，每轮3次），再不限长度请求一次，
    /// 最后从备用词库随机选择。词库保证每个难度至少有一个合法的词。
    pub async fn fetch_word(&self, difficulty: Difficulty) -> String {
        let policy = difficulty.policy();

        for round in 0..MAX_LENGTH_ROUNDS {
            let target_length = rand::rng().random_range(policy.min_len..=policy.max_len);
            for attempt in 0..ATTEMPTS_PER_LENGTH {
                match self.provider.fetch_words(Some(target_length)).await {
                    Ok(words) => match accept_candidate(&words, Some(target_length)) {
                        Some(word) => return word,
                        None => debug!(
                            "无效单词 (长度 {}): {:?}，第{}轮第{}次",
                            target_length,
                            words.first(),
                            round + 1,
                            attempt + 1
                        ),
                    },
                    Err(e) => warn!(
                        "单词接口失败 (长度 {}): {}，第{}轮第{}次",
                        target_length,
                        e,
                        round + 1,
                        attempt + 1
                    ),
                }
            }
        }

        warn!("按长度取词失败，尝试不限长度取词");
        match self.provider.fetch_words(None).await {
            Ok(words) => {
                if let Some(word) = accept_candidate(&words, None) {
                    return word;
                }
                warn!("不限长度取词返回无效单词: {:?}", words.first());
            }
            Err(e) => warn!("不限长度取词失败: {}", e),
        }

        error!("使用内置备用词，难度: {}", difficulty);
        self.word_bank
            .random_fallback(difficulty)
            .unwrap_or_default()
    }
}

/// 检查接口返回的第一个单词是否可用，可用时返回大写形式
fn accept_candidate(words: &[String], length: Option<usize>) -> Option<String> {
    let word = words.first()?.trim();
    if word.is_empty() || !word.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    if length.is_some_and(|length| word.len() != length) {
        return None;
    }
    Some(word.to_ascii_uppercase())
}
