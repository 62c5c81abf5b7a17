//! サーバ設定
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// WebSocketサーバのバインド先
    pub ws_bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ws_bind_addr: "127.0.0.1:5001".to_string(),
        }
    }
}
