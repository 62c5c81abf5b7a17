//! リアルタイム文字起こしモジュール
//!
//! `SessionManager` が接続ごとのセッションを生成し、レジストリ・専用
//! ワーカー・結果リレーを束ねます。
//!
//! - セッションは `SessionRegistry`（並行マップ）で管理
//! - フレーム処理はセッション内では直列、セッション間では独立
//! - 順序保証はセッション単位（グローバルではない）
mod error;
pub mod events;
mod manager;
mod registry;
mod session;

pub use error::StreamingError;
pub use events::{ClientEvent, ServerEvent};
pub use manager::SessionManager;
pub use registry::SessionRegistry;
pub use session::{SessionState, StreamingSession};
