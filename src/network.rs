use crate::{
    Result,
    controller::{GameController, RoundTicket},
    difficulty::Difficulty,
    effect::Effect,
    message::{ClientAction, ErrorCode, GameMessage},
    round::RoundPhase,
    word_bank::WordBank,
    word_source::{HttpWordProvider, WordSource},
};
use axum::{
    Router,
    extract::Query,
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::Html,
    response::Json,
    routing::get,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures_util::{SinkExt, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct ConnectQuery {
    difficulty: Option<String>,
}

/// 会话状态，用于状态查询接口
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub difficulty: Difficulty,
    pub phase: RoundPhase,
    pub rounds_started: u64,
    pub connected_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

/// 在线会话登记表，每个WebSocket连接一个会话
pub struct SessionRegistry {
    sessions: DashMap<Uuid, SessionInfo>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// 登记新会话
    pub fn register(&self, difficulty: Difficulty) -> Uuid {
        let session_id = Uuid::new_v4();
        let now = Utc::now();
        self.sessions.insert(
            session_id,
            SessionInfo {
                difficulty,
                phase: RoundPhase::Loading,
                rounds_started: 0,
                connected_at: now,
                last_active: now,
            },
        );
        session_id
    }

    /// 用控制器的最新状态更新会话
    pub fn update(&self, session_id: &Uuid, controller: &GameController) {
        if let Some(mut info) = self.sessions.get_mut(session_id) {
            info.difficulty = controller.difficulty();
            info.phase = controller.round().phase();
            info.rounds_started = controller.rounds_started();
            info.last_active = Utc::now();
        }
    }

    pub fn remove(&self, session_id: &Uuid) {
        self.sessions.remove(session_id);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn list(&self) -> Vec<(Uuid, SessionInfo)> {
        self.sessions
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// 服务器，负责HTTP接口和WebSocket游戏连接
pub struct WebSocketServer {
    word_source: Arc<WordSource>,
    sessions: Arc<SessionRegistry>,
}

impl WebSocketServer {
    pub fn new() -> Result<Self> {
        let config = crate::config::Config::get();
        let provider = HttpWordProvider::new(&config.word_provider)?;
        let word_bank = WordBank::from_config(&config.word_bank);

        Ok(Self::with_source(WordSource::new(
            Arc::new(provider),
            Arc::new(word_bank),
        )))
    }

    pub fn with_source(word_source: WordSource) -> Self {
        WebSocketServer {
            word_source: Arc::new(word_source),
            sessions: Arc::new(SessionRegistry::new()),
        }
    }

    pub fn sessions(&self) -> Arc<SessionRegistry> {
        self.sessions.clone()
    }

    /// 启动HTTP服务器（静态页面和查询接口）
    pub async fn start_http_server(&self, http_addr: &str) -> Result<()> {
        let config = crate::config::Config::get();

        // 根据配置文件设置CORS
        let cors = match (&config.cors.allow_all_origins, &config.cors.allowed_origins) {
            (Some(false), Some(allowed_origins)) if !allowed_origins.is_empty() => {
                debug!("CORS配置: 限制特定来源 {:?}", allowed_origins);
                let origins = allowed_origins
                    .iter()
                    .filter_map(|origin| origin.parse::<axum::http::HeaderValue>().ok())
                    .collect::<Vec<_>>();
                CorsLayer::new()
                    .allow_origin(origins)
                    .allow_methods([axum::http::Method::GET, axum::http::Method::OPTIONS])
            }
            _ => {
                debug!("CORS配置: 允许所有来源");
                CorsLayer::new().allow_origin(Any).allow_methods(Any)
            }
        };

        let index_path = config.static_files.index_path.clone();
        let http_app = Router::new()
            .route(
                "/",
                get({
                    let index_path = index_path.clone();
                    move || async move { serve_index(&index_path) }
                }),
            )
            .route(
                "/index.html",
                get(move || async move { serve_index(&index_path) }),
            )
            .route("/api/difficulties", get(handle_difficulties))
            .route(
                "/sessions/status",
                get({
                    let sessions = self.sessions.clone();
                    move || async move { handle_sessions_status(sessions.clone()) }
                }),
            )
            .layer(cors);

        let http_listener = tokio::net::TcpListener::bind(http_addr)
            .await
            .map_err(|e| crate::Error::Network(anyhow::anyhow!(e)))?;

        // 启动HTTP服务器
        tokio::spawn(async move {
            if let Err(e) = axum::serve(http_listener, http_app).await {
                error!("HTTP服务器错误: {}", e);
            }
        });

        Ok(())
    }

    /// 启动WebSocket服务器
    pub async fn start_ws_server(&self, ws_addr: &str) -> Result<()> {
        let config = crate::config::Config::get();
        let word_source = self.word_source.clone();
        let sessions = self.sessions.clone();

        let ws_app = Router::new().route(
            &config.websocket.path,
            get(
                move |ws: WebSocketUpgrade, Query(query): Query<ConnectQuery>| async move {
                    let difficulty = query
                        .difficulty
                        .as_deref()
                        .map(Difficulty::from_str)
                        .unwrap_or_default();
                    debug!("WebSocket连接请求，难度: {}", difficulty);

                    ws.on_upgrade(move |socket| async move {
                        handle_game_connection(socket, difficulty, word_source, sessions).await;
                    })
                },
            ),
        );

        let ws_listener = tokio::net::TcpListener::bind(ws_addr)
            .await
            .map_err(|e| {
                error!("绑定WebSocket地址失败: {} - {}", ws_addr, e);
                crate::Error::Network(anyhow::anyhow!(e))
            })?;

        axum::serve(ws_listener, ws_app).await.map_err(|e| {
            error!("WebSocket服务器运行错误: {}", e);
            crate::Error::Network(anyhow::anyhow!(e))
        })?;
        Ok(())
    }
}

/// 提供index.html文件
fn serve_index(index_path: &str) -> Html<String> {
    match fs::read_to_string(Path::new(index_path)) {
        Ok(content) => Html(content),
        Err(e) => {
            error!("读取{}失败: {}", index_path, e);
            Html("<h1>404 Not Found</h1><p>找不到index.html文件</p>".to_string())
        }
    }
}

/// 难度策略表
async fn handle_difficulties() -> Json<serde_json::Value> {
    let policies: Vec<serde_json::Value> = Difficulty::ALL
        .iter()
        .map(|difficulty| {
            let policy = difficulty.policy();
            serde_json::json!({
                "difficulty": difficulty,
                "min_length": policy.min_len,
                "max_length": policy.max_len,
                "hints": policy.hint_budget,
            })
        })
        .collect();

    Json(serde_json::json!({
        "success": true,
        "difficulties": policies,
        "max_incorrect": crate::round::MAX_INCORRECT,
    }))
}

/// 在线会话状态
fn handle_sessions_status(sessions: Arc<SessionRegistry>) -> Json<serde_json::Value> {
    let list: Vec<serde_json::Value> = sessions
        .list()
        .into_iter()
        .map(|(session_id, info)| {
            serde_json::json!({
                "session_id": session_id,
                "difficulty": info.difficulty,
                "phase": info.phase,
                "rounds_started": info.rounds_started,
                "connected_at": info.connected_at,
                "last_active": info.last_active,
            })
        })
        .collect();

    Json(serde_json::json!({
        "success": true,
        "total_sessions": list.len(),
        "sessions": list,
    }))
}

/// 会话的出站消息，效果事件和状态、错误消息共用一个有序通道
struct Outbox {
    messages: mpsc::UnboundedSender<Message>,
    effects: mpsc::UnboundedReceiver<Effect>,
}

impl Outbox {
    fn push(&self, message: Message) {
        if self.messages.send(message).is_err() {
            debug!("发送通道已关闭");
        }
    }

    /// 把控制器已经产生的效果事件依次放进发送通道
    fn flush_effects(&mut self) {
        while let Ok(effect) = self.effects.try_recv() {
            self.send(&effect.to_message());
        }
    }

    fn send(&self, message: &GameMessage) {
        match serde_json::to_string(message) {
            Ok(text) => self.push(Message::Text(text)),
            Err(e) => error!("消息序列化失败: {}", e),
        }
    }

    fn send_state(&mut self, controller: &GameController) {
        self.flush_effects();
        match serde_json::to_value(controller.snapshot()) {
            Ok(data) => self.send(&GameMessage {
                type_: "state".to_string(),
                data,
            }),
            Err(e) => error!("状态序列化失败: {}", e),
        }
    }

    fn send_error(&mut self, error: &GameMessage) {
        self.flush_effects();
        self.send(error);
    }
}

/// 在独立任务中取词，结果通过通道交回会话循环
fn spawn_fetch(
    word_source: &Arc<WordSource>,
    ticket: RoundTicket,
    words: &mpsc::UnboundedSender<(RoundTicket, String)>,
) -> JoinHandle<()> {
    let word_source = word_source.clone();
    let words = words.clone();
    tokio::spawn(async move {
        let word = word_source.fetch_word(ticket.difficulty()).await;
        if words.send((ticket, word)).is_err() {
            debug!("会话已结束，丢弃取到的单词");
        }
    })
}

fn parse_action(text: &str) -> std::result::Result<ClientAction, GameMessage> {
    let message = serde_json::from_str::<GameMessage>(text).map_err(|e| {
        debug!("解析消息失败: {}", e);
        GameMessage::error(ErrorCode::ParseError, "消息格式错误")
    })?;
    ClientAction::try_from(&message).map_err(|e| {
        debug!("无效的操作: {}", e);
        GameMessage::error(ErrorCode::InvalidAction, e.to_string())
    })
}

/// 处理一个游戏连接，连接独占自己的控制器
async fn handle_game_connection(
    socket: WebSocket,
    difficulty: Difficulty,
    word_source: Arc<WordSource>,
    sessions: Arc<SessionRegistry>,
) {
    let (mut ws_sender, ws_receiver) = socket.split();

    // 消息发送任务
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
    let send_task = tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            if let Err(e) = ws_sender.send(message).await {
                error!("发送消息失败: {}", e);
                break;
            }
        }
    });

    run_session(ws_receiver, out_tx, difficulty, word_source, &sessions).await;

    if let Err(e) = send_task.await {
        error!("消息发送任务异常结束: {}", e);
    }
}

/// 会话主循环
///
/// 取词在后台任务中进行，期间继续读取客户端消息，
/// 输入锁定时收到的猜字母和提示会被控制器忽略。
async fn run_session<S, E>(
    mut incoming: S,
    outgoing: mpsc::UnboundedSender<Message>,
    difficulty: Difficulty,
    word_source: Arc<WordSource>,
    sessions: &SessionRegistry,
) where
    S: Stream<Item = std::result::Result<Message, E>> + Unpin,
    E: std::fmt::Display,
{
    let session_id = sessions.register(difficulty);
    info!("新会话 {}，难度: {}", session_id, difficulty);

    let (effect_tx, effect_rx) = mpsc::unbounded_channel::<Effect>();
    let mut outbox = Outbox {
        messages: outgoing,
        effects: effect_rx,
    };
    let (word_tx, mut word_rx) = mpsc::unbounded_channel::<(RoundTicket, String)>();

    let mut controller = GameController::new(difficulty, word_source.clone(), effect_tx);
    let mut pending = spawn_fetch(&word_source, controller.begin_round(), &word_tx);
    outbox.flush_effects();

    loop {
        tokio::select! {
            Some((ticket, word)) = word_rx.recv() => {
                if controller.commit_word(ticket, &word) {
                    sessions.update(&session_id, &controller);
                    outbox.send_state(&controller);
                }
            }
            msg = incoming.next() => {
                let Some(msg) = msg else {
                    debug!("客户端连接已断开");
                    break;
                };
                match msg {
                    Ok(Message::Text(text)) => {
                        debug!("收到消息: {}", text);
                        match parse_action(&text) {
                            Ok(ClientAction::Sync) => outbox.send_state(&controller),
                            Ok(action) => {
                                if let Some(ticket) = controller.apply_action(action) {
                                    pending.abort();
                                    pending = spawn_fetch(&word_source, ticket, &word_tx);
                                }
                                sessions.update(&session_id, &controller);
                                outbox.flush_effects();
                            }
                            Err(error) => outbox.send_error(&error),
                        }
                    }
                    Ok(Message::Close(_)) => {
                        debug!("收到关闭消息");
                        break;
                    }
                    Ok(Message::Ping(data)) => outbox.push(Message::Pong(data)),
                    Ok(_) => {
                        debug!("忽略非文本消息");
                    }
                    Err(e) => {
                        error!("WebSocket错误: {}", e);
                        break;
                    }
                }
            }
        }
    }

    pending.abort();
    sessions.remove(&session_id);
    info!("会话 {} 已关闭", session_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::word_source::WordProvider;
    use async_trait::async_trait;
    use futures_util::stream;
    use serde_json::json;
    use std::convert::Infallible;
    use std::time::Duration;
    use tokio::sync::Semaphore;

    struct FixedProvider;

    #[async_trait]
    impl WordProvider for FixedProvider {
        async fn fetch_words(&self, _length: Option<usize>) -> Result<Vec<String>> {
            Ok(vec!["GARDEN".to_string()])
        }
    }

    #[tokio::test]
    async fn test_session_registry_tracks_controller() {
        let registry = SessionRegistry::new();
        let session_id = registry.register(Difficulty::Moderate);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.list()[0].1.phase, RoundPhase::Loading);

        let source = Arc::new(WordSource::new(
            Arc::new(FixedProvider),
            Arc::new(WordBank::new()),
        ));
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut controller = GameController::new(Difficulty::Moderate, source, tx);
        controller.start_round().await;
        registry.update(&session_id, &controller);

        let list = registry.list();
        assert_eq!(list[0].1.phase, RoundPhase::Active);
        assert_eq!(list[0].1.rounds_started, 1);

        registry.remove(&session_id);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_difficulties_table() {
        let Json(value) = handle_difficulties().await;
        assert_eq!(value["difficulties"].as_array().unwrap().len(), 3);
        assert_eq!(value["difficulties"][2]["difficulty"], "hard");
        assert_eq!(value["difficulties"][2]["hints"], 4);
        assert_eq!(value["max_incorrect"], 6);
    }

    #[test]
    fn test_sessions_status_payload() {
        let registry = Arc::new(SessionRegistry::new());
        registry.register(Difficulty::Easy);
        let Json(value) = handle_sessions_status(registry);
        assert_eq!(value["total_sessions"], 1);
        assert_eq!(value["sessions"][0]["difficulty"], "easy");
        assert_eq!(value["sessions"][0]["phase"], "loading");
    }

    #[test]
    fn test_missing_index_returns_not_found_page() {
        let Html(body) = serve_index("/nonexistent/index.html");
        assert!(body.contains("404"));
    }

    /// 每次取词消耗一个许可，没有许可时一直等待
    struct GatedProvider {
        gate: Arc<Semaphore>,
    }

    #[async_trait]
    impl WordProvider for GatedProvider {
        async fn fetch_words(&self, length: Option<usize>) -> Result<Vec<String>> {
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| crate::Error::Provider(e.to_string()))?;
            permit.forget();
            Ok(vec!["CATERPILLAR"[..length.unwrap_or(3)].to_string()])
        }
    }

    struct TestSession {
        client: mpsc::UnboundedSender<Message>,
        server: mpsc::UnboundedReceiver<Message>,
        task: JoinHandle<()>,
        sessions: Arc<SessionRegistry>,
    }

    fn spawn_session(gate: Arc<Semaphore>) -> TestSession {
        let source = Arc::new(WordSource::new(
            Arc::new(GatedProvider { gate }),
            Arc::new(WordBank::new()),
        ));
        let sessions = Arc::new(SessionRegistry::new());
        let (client, client_rx) = mpsc::unbounded_channel::<Message>();
        let (server_tx, server) = mpsc::unbounded_channel();

        let incoming = Box::pin(stream::unfold(client_rx, |mut rx| async move {
            rx.recv().await.map(|m| (Ok::<_, Infallible>(m), rx))
        }));
        let task = tokio::spawn({
            let sessions = sessions.clone();
            async move {
                run_session(incoming, server_tx, Difficulty::Easy, source, &sessions).await;
            }
        });

        TestSession {
            client,
            server,
            task,
            sessions,
        }
    }

    fn text(value: serde_json::Value) -> Message {
        Message::Text(value.to_string())
    }

    async fn next_message(server: &mut mpsc::UnboundedReceiver<Message>) -> Message {
        tokio::time::timeout(Duration::from_secs(5), server.recv())
            .await
            .expect("等待服务器消息超时")
            .expect("服务器通道已关闭")
    }

    async fn next_game_message(server: &mut mpsc::UnboundedReceiver<Message>) -> GameMessage {
        match next_message(server).await {
            Message::Text(text) => serde_json::from_str(&text).unwrap(),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_actions_during_fetch_do_not_touch_new_round() {
        let gate = Arc::new(Semaphore::new(1));
        let mut session = spawn_session(gate.clone());

        let mut kinds = Vec::new();
        loop {
            let message = next_game_message(&mut session.server).await;
            if message.type_ == "state" {
                assert_eq!(message.data["phase"], "active");
                break;
            }
            kinds.push(message.type_);
        }
        assert_eq!(
            kinds,
            ["input_lock_changed", "board_initialized", "input_lock_changed"]
        );

        // 新回合取词被挡住时继续发送操作
        session.client.send(text(json!({"type": "reset"}))).unwrap();
        session
            .client
            .send(text(json!({"type": "guess", "data": {"letter": "C"}})))
            .unwrap();
        session.client.send(text(json!({"type": "hint"}))).unwrap();
        session.client.send(Message::Ping(vec![1])).unwrap();
        session.client.send(text(json!({"type": "sync"}))).unwrap();

        assert_eq!(next_game_message(&mut session.server).await.type_, "round_reset");
        let lock = next_game_message(&mut session.server).await;
        assert_eq!(lock.type_, "input_lock_changed");
        assert_eq!(lock.data["locked"], true);
        assert_eq!(next_message(&mut session.server).await, Message::Pong(vec![1]));

        let loading = next_game_message(&mut session.server).await;
        assert_eq!(loading.type_, "state");
        assert_eq!(loading.data["phase"], "loading");
        assert_eq!(loading.data["input_locked"], true);

        gate.add_permits(1);
        let mut kinds = Vec::new();
        let state = loop {
            let message = next_game_message(&mut session.server).await;
            if message.type_ == "state" {
                break message;
            }
            kinds.push(message.type_);
        };
        assert_eq!(kinds, ["board_initialized", "input_lock_changed"]);
        assert_eq!(state.data["phase"], "active");
        assert_eq!(state.data["input_locked"], false);
        assert_eq!(state.data["guessed_letters"], json!([]));
        assert_eq!(state.data["hints_remaining"], 2);

        // 解锁后的操作正常生效
        session
            .client
            .send(text(json!({"type": "guess", "data": {"letter": "c"}})))
            .unwrap();
        let revealed = next_game_message(&mut session.server).await;
        assert_eq!(revealed.type_, "letter_revealed");
        assert_eq!(revealed.data, json!({"positions": [0], "letter": "C"}));

        drop(session.client);
        session.task.await.unwrap();
        assert!(session.sessions.is_empty());
    }

    #[tokio::test]
    async fn test_bad_message_error_follows_earlier_effects() {
        let gate = Arc::new(Semaphore::new(1));
        let mut session = spawn_session(gate);
        while next_game_message(&mut session.server).await.type_ != "state" {}

        session
            .client
            .send(text(json!({"type": "guess", "data": {"letter": "Z"}})))
            .unwrap();
        session.client.send(Message::Text("not json".to_string())).unwrap();
        session
            .client
            .send(text(json!({"type": "guess", "data": {"letter": "AB"}})))
            .unwrap();

        let missed = next_game_message(&mut session.server).await;
        assert_eq!(missed.type_, "letter_marked_incorrect");
        assert_eq!(missed.data["remaining_guesses"], 5);

        let parse_error = next_game_message(&mut session.server).await;
        assert_eq!(parse_error.type_, "error");
        assert_eq!(parse_error.data["code"], "ParseError");

        let invalid = next_game_message(&mut session.server).await;
        assert_eq!(invalid.data["code"], "InvalidAction");

        session.client.send(Message::Close(None)).unwrap();
        session.task.await.unwrap();
        assert!(session.sessions.is_empty());
    }
}
