use crate::Result;
use crate::config::WordBankConfig;
use crate::difficulty::Difficulty;
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// 每个难度内置的备用词
const DEFAULT_WORDS: [(Difficulty, [&str; 5]); 3] = [
    (Difficulty::Easy, ["CAT", "SUN", "DOG", "RUN", "FLY"]),
    (
        Difficulty::Moderate,
        ["PLANET", "ORANGE", "ACTIVE", "SILVER", "PYTHON"],
    ),
    (
        Difficulty::Hard,
        ["CHAMPION", "KEYBOARD", "LANGUAGE", "WONDERFUL", "MYSTERY"],
    ),
];

/// 词库文件格式，键为难度名称
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordBankData {
    pub words: BTreeMap<String, Vec<String>>,
}

/// 备用词库：词源不可用时从这里取词
#[derive(Debug, Clone)]
pub struct WordBank {
    words: HashMap<Difficulty, Vec<String>>,
    file_path: Option<String>,
}

impl WordBank {
    /// 只包含内置词的词库
    pub fn new() -> Self {
        let mut word_bank = WordBank {
            words: HashMap::new(),
            file_path: None,
        };
        word_bank.load_default_words();
        word_bank
    }

    /// 按配置加载词库，文件加载失败时退回内置词
    pub fn from_config(config: &WordBankConfig) -> Self {
        let mut word_bank = Self::new();
        if let Some(path) = &config.file_path {
            word_bank.file_path = Some(path.clone());
            if let Err(e) = word_bank.load_from_file(path) {
                warn!("无法加载词库文件: {}, 使用内置词库", e);
            }
        }
        word_bank
    }

    /// 从文件加载词库
    ///
    /// 文件只覆盖它列出的难度，其余难度保留当前的词。
    /// 任何一个难度的词不合法时整个文件都不生效。
    pub fn load_from_file(&mut self, path: &str) -> Result<()> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::WordBank(format!("无法读取词库文件 {}: {}", path, e)))?;

        let data: WordBankData = serde_json::from_str(&content)
            .map_err(|e| crate::Error::WordBank(format!("无法解析词库文件格式: {}", e)))?;

        let mut words = self.words.clone();
        for (name, list) in data.words {
            let difficulty = Difficulty::from_str(&name);
            if difficulty == Difficulty::Unrecognized {
                return Err(crate::Error::WordBank(format!("未知难度: {}", name)));
            }

            let mut normalized: Vec<String> = Vec::with_capacity(list.len());
            for raw in &list {
                let word = normalize_word(raw).ok_or_else(|| {
                    crate::Error::WordBank(format!("难度 '{}' 包含无效词: {:?}", name, raw))
                })?;
                if !normalized.contains(&word) {
                    normalized.push(word);
                }
            }
            if normalized.is_empty() {
                return Err(crate::Error::WordBank(format!("难度 '{}' 没有备用词", name)));
            }
            words.insert(difficulty, normalized);
        }

        self.words = words;
        Ok(())
    }

    /// 保存词库到文件
    pub fn save_to_file(&self, path: &str) -> Result<()> {
        let data = WordBankData {
            words: self
                .words
                .iter()
                .map(|(difficulty, list)| (difficulty.as_str().to_string(), list.clone()))
                .collect(),
        };

        let content = serde_json::to_string_pretty(&data)
            .map_err(|e| crate::Error::WordBank(format!("无法序列化词库: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| crate::Error::WordBank(format!("无法写入词库文件 {}: {}", path, e)))?;

        Ok(())
    }

    /// 加载内置词库
    fn load_default_words(&mut self) {
        self.words = DEFAULT_WORDS
            .iter()
            .map(|(difficulty, list)| {
                (*difficulty, list.iter().map(|w| w.to_string()).collect())
            })
            .collect();
    }

    /// 获取某个难度的备用词，未知难度使用中等难度的词
    pub fn fallback_words(&self, difficulty: Difficulty) -> &[String] {
        let difficulty = match difficulty {
            Difficulty::Unrecognized => Difficulty::Moderate,
            other => other,
        };
        self.words
            .get(&difficulty)
            .map(|list| list.as_slice())
            .unwrap_or(&[])
    }

    /// 随机取一个备用词
    pub fn random_fallback(&self, difficulty: Difficulty) -> Option<String> {
        let mut rng = rand::rng();
        self.random_fallback_with(difficulty, &mut rng)
    }

    pub fn random_fallback_with<R: Rng + ?Sized>(
        &self,
        difficulty: Difficulty,
        rng: &mut R,
    ) -> Option<String> {
        self.fallback_words(difficulty).choose(rng).cloned()
    }

    /// 添加备用词
    pub fn add_word(&mut self, difficulty: Difficulty, word: &str) -> Result<()> {
        if difficulty == Difficulty::Unrecognized {
            return Err(crate::Error::WordBank("请指定 easy/moderate/hard".to_string()));
        }
        let word = normalize_word(word)
            .ok_or_else(|| crate::Error::WordBank(format!("词语只能包含字母: {}", word.trim())))?;
        let list = self.words.entry(difficulty).or_default();
        if list.contains(&word) {
            return Err(crate::Error::WordBank(format!("词语已存在: {}", word)));
        }
        list.push(word);
        Ok(())
    }

    /// 删除备用词，返回是否删除成功
    ///
    /// 每个难度至少保留一个词，删除最后一个词会返回错误。
    pub fn remove_word(&mut self, difficulty: Difficulty, word: &str) -> Result<bool> {
        let word = word.trim().to_ascii_uppercase();
        let Some(list) = self.words.get_mut(&difficulty) else {
            return Ok(false);
        };
        let Some(index) = list.iter().position(|w| *w == word) else {
            return Ok(false);
        };
        if list.len() == 1 {
            return Err(crate::Error::WordBank(format!(
                "难度 '{}' 至少需要保留一个备用词",
                difficulty
            )));
        }
        list.remove(index);
        Ok(true)
    }

    /// 获取词库统计信息
    pub fn get_stats(&self) -> WordBankStats {
        let mut difficulty_stats = BTreeMap::new();
        for difficulty in Difficulty::ALL {
            difficulty_stats.insert(difficulty, self.fallback_words(difficulty).len());
        }
        WordBankStats {
            total_words: difficulty_stats.values().sum(),
            difficulty_stats,
        }
    }

    /// 验证词库完整性
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for difficulty in Difficulty::ALL {
            let words = self.fallback_words(difficulty);
            if words.is_empty() {
                errors.push(format!("难度 '{}' 没有备用词", difficulty));
            }

            for (i, word) in words.iter().enumerate() {
                if word.is_empty() {
                    errors.push(format!("难度 '{}' 第{}个词为空", difficulty, i + 1));
                } else if !word.chars().all(|c| c.is_ascii_uppercase()) {
                    errors.push(format!(
                        "难度 '{}' 第{}个词包含非字母字符: {}",
                        difficulty,
                        i + 1,
                        word
                    ));
                }
                if words[..i].contains(word) {
                    errors.push(format!("难度 '{}' 存在重复词: {}", difficulty, word));
                }
            }
        }

        errors
    }

    /// 配置的词库文件路径
    pub fn file_path(&self) -> Option<&str> {
        self.file_path.as_deref()
    }
}

#[derive(Debug, Clone)]
pub struct WordBankStats {
    pub total_words: usize,
    pub difficulty_stats: BTreeMap<Difficulty, usize>,
}

/// 规范化备用词：去掉首尾空白并转成大写，只接受 A-Z
fn normalize_word(word: &str) -> Option<String> {
    let word = word.trim().to_ascii_uppercase();
    if word.is_empty() || !word.chars().all(|c| c.is_ascii_uppercase()) {
        return None;
    }
    Some(word)
}

impl Default for WordBank {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn temp_path(name: &str) -> String {
        std::env::temp_dir()
            .join(format!("hangman-{}-{}.json", name, uuid::Uuid::new_v4()))
            .to_string_lossy()
            .into_owned()
    }

    #[test]
    fn test_builtin_words() {
        let bank = WordBank::new();
        assert_eq!(bank.fallback_words(Difficulty::Easy), ["CAT", "SUN", "DOG", "RUN", "FLY"]);
        assert_eq!(bank.fallback_words(Difficulty::Hard).len(), 5);
        assert!(bank.validate().is_empty());
    }

    #[test]
    fn test_unrecognized_uses_moderate_list() {
        let bank = WordBank::new();
        assert_eq!(
            bank.fallback_words(Difficulty::Unrecognized),
            bank.fallback_words(Difficulty::Moderate)
        );
    }

    #[test]
    fn test_random_fallback_comes_from_tier() {
        let bank = WordBank::new();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let word = bank.random_fallback_with(Difficulty::Hard, &mut rng).unwrap();
            assert!(bank.fallback_words(Difficulty::Hard).contains(&word));
        }
    }

    #[test]
    fn test_add_and_remove_word() {
        let mut bank = WordBank::new();
        bank.add_word(Difficulty::Easy, "owl").unwrap();
        assert!(bank.fallback_words(Difficulty::Easy).contains(&"OWL".to_string()));
        assert!(bank.add_word(Difficulty::Easy, "OWL").is_err());
        assert!(bank.add_word(Difficulty::Easy, "o-l").is_err());
        assert!(bank.add_word(Difficulty::Unrecognized, "BAT").is_err());
        assert!(bank.remove_word(Difficulty::Easy, "owl").unwrap());
        assert!(!bank.remove_word(Difficulty::Easy, "owl").unwrap());
    }

    #[test]
    fn test_last_word_of_tier_cannot_be_removed() {
        let mut bank = WordBank::new();
        for word in ["CAT", "SUN", "DOG", "RUN"] {
            assert!(bank.remove_word(Difficulty::Easy, word).unwrap());
        }
        assert!(matches!(
            bank.remove_word(Difficulty::Easy, "FLY"),
            Err(crate::Error::WordBank(_))
        ));
        assert_eq!(bank.fallback_words(Difficulty::Easy), ["FLY"]);
        assert_eq!(bank.random_fallback(Difficulty::Easy), Some("FLY".to_string()));
        assert!(bank.validate().is_empty());
    }

    #[test]
    fn test_save_and_load_file() {
        let path = temp_path("roundtrip");
        let mut bank = WordBank::new();
        bank.add_word(Difficulty::Moderate, "GARDEN").unwrap();
        bank.save_to_file(&path).unwrap();

        let loaded = WordBank::from_config(&WordBankConfig {
            file_path: Some(path.clone()),
        });
        assert_eq!(loaded.file_path(), Some(path.as_str()));
        assert_eq!(loaded.fallback_words(Difficulty::Moderate).len(), 6);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_unknown_tier_in_file_is_rejected() {
        let path = temp_path("unknown");
        std::fs::write(&path, r#"{"words": {"nightmare": ["ABYSS"]}}"#).unwrap();
        let mut bank = WordBank::new();
        assert!(bank.load_from_file(&path).is_err());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_partial_file_keeps_other_tiers() {
        let path = temp_path("partial");
        std::fs::write(&path, r#"{"words": {"easy": [" owl ", "CAT", "cat"]}}"#).unwrap();
        let mut bank = WordBank::new();
        bank.load_from_file(&path).unwrap();

        assert_eq!(bank.fallback_words(Difficulty::Easy), ["OWL", "CAT"]);
        assert_eq!(bank.fallback_words(Difficulty::Hard).len(), 5);
        assert_eq!(bank.fallback_words(Difficulty::Moderate).len(), 5);
        assert!(bank.validate().is_empty());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_non_letter_entry_rejects_whole_file() {
        let path = temp_path("non-letter");
        std::fs::write(
            &path,
            r#"{"words": {"easy": ["CAT"], "moderate": ["NEW YORK"]}}"#,
        )
        .unwrap();

        let mut bank = WordBank::new();
        assert!(matches!(
            bank.load_from_file(&path),
            Err(crate::Error::WordBank(_))
        ));
        assert_eq!(bank.get_stats().total_words, 15);

        let bank = WordBank::from_config(&WordBankConfig {
            file_path: Some(path.clone()),
        });
        assert!(
            !bank
                .fallback_words(Difficulty::Moderate)
                .contains(&"NEW YORK".to_string())
        );
        assert_eq!(bank.fallback_words(Difficulty::Easy).len(), 5);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_empty_tier_in_file_is_rejected() {
        let path = temp_path("empty-tier");
        std::fs::write(&path, r#"{"words": {"hard": []}}"#).unwrap();
        let mut bank = WordBank::new();
        assert!(bank.load_from_file(&path).is_err());
        assert_eq!(bank.fallback_words(Difficulty::Hard).len(), 5);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_file_falls_back_to_builtin() {
        let config = WordBankConfig {
            file_path: Some("/nonexistent/hangman-words.json".to_string()),
        };
        let bank = WordBank::from_config(&config);
        assert_eq!(bank.get_stats().total_words, 15);

        let mut bank = WordBank::new();
        let err = bank.load_from_file("/nonexistent/hangman-words.json").unwrap_err();
        assert!(matches!(err, crate::Error::WordBank(_)), "{err}");
    }
}
