use anyhow::Result;
use once_cell::sync::OnceCell;
use serde::Deserialize;
use std::time::Duration;

static CONFIG: OnceCell<Config> = OnceCell::new();

#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub websocket: WebSocketConfig,
    pub word_provider: WordProviderConfig,
    #[serde(default)]
    pub word_bank: WordBankConfig,
    pub log: LogConfig,
    pub cors: CorsConfig,
    pub static_files: StaticFilesConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub http_port: Option<u16>, // HTTP服务器端口，如果为None则使用port
    pub ws_port: Option<u16>,   // WebSocket服务器端口，如果为None则使用port
}

#[derive(Debug, Deserialize)]
pub struct WebSocketConfig {
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WordProviderConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct WordBankConfig {
    /// 备用词库文件，不配置则只使用内置词
    pub file_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LogConfig {
    pub level: String,
}

#[derive(Debug, Deserialize)]
pub struct CorsConfig {
    pub allow_all_origins: Option<bool>,
    pub allowed_origins: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct StaticFilesConfig {
    pub index_path: String,
}

impl WordProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.ws_port", 8081)?
            .set_default("websocket.path", "/ws")?
            .set_default(
                "word_provider.base_url",
                "https://random-word-api.herokuapp.com/word",
            )?
            .set_default("word_provider.timeout_secs", 5)?
            .set_default("word_provider.user_agent", "hangman-server/0.1")?
            .set_default("log.level", "info")?
            .set_default("cors.allow_all_origins", true)?
            .set_default("static_files.index_path", "static/index.html")?
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("HANGMAN").separator("__"))
            .build()?;

        Ok(config.try_deserialize::<Config>()?)
    }

    /// 初始化全局配置
    pub fn init() -> Result<()> {
        let config = Self::load()?;
        CONFIG
            .set(config)
            .map_err(|_| anyhow::anyhow!("配置已经初始化"))?;
        Ok(())
    }

    /// 获取全局配置实例
    pub fn get() -> &'static Config {
        CONFIG.get().expect("配置未初始化，请先调用 Config::init()")
    }

    pub fn http_addr(&self) -> String {
        let port = self.server.http_port.unwrap_or(self.server.port);
        format!("{}:{}", self.server.host, port)
    }

    pub fn ws_addr(&self) -> String {
        let port = self.server.ws_port.unwrap_or(self.server.port);
        format!("{}:{}", self.server.host, port)
    }

    pub fn log_filter(&self) -> String {
        format!("hangman_server={}", self.log.level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_defaults() {
        let config = Config::load().unwrap();
        assert_eq!(config.websocket.path, "/ws");
        assert_eq!(config.word_provider.timeout(), Duration::from_secs(5));
        assert!(config.word_provider.base_url.starts_with("https://"));
        assert_eq!(config.log_filter(), format!("hangman_server={}", config.log.level));
    }

    #[test]
    fn test_addr_falls_back_to_port() {
        let mut config = Config::load().unwrap();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 9000;
        config.server.http_port = None;
        config.server.ws_port = Some(9001);
        assert_eq!(config.http_addr(), "127.0.0.1:9000");
        assert_eq!(config.ws_addr(), "127.0.0.1:9001");
    }
}
