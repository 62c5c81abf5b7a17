//! セッションレジストリ
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::session::StreamingSession;

/// 接続ID→セッションの並行マップ
///
/// セッション内部の変更は所有ワーカー側に限定され、レジストリは
/// 参照の登録・取得・破棄のみを担当します。
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<StreamingSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登録。同じIDが既に存在すれば false
    pub fn insert(&self, session: Arc<StreamingSession>) -> bool {
        let mut sessions = self.sessions.write();
        match sessions.entry(session.id().to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(session);
                true
            }
        }
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<StreamingSession>> {
        self.sessions.read().get(session_id).cloned()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().contains_key(session_id)
    }

    pub fn remove(&self, session_id: &str) -> Option<Arc<StreamingSession>> {
        self.sessions.write().remove(session_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
