//! 엔드포인트 레지스트리.
//!
//! 논리적 이름과 살아있는 세션의 매핑. 모든 연결 태스크가 공유하므로
//! 변경은 하나의 RwLock을 거쳐 직렬화됩니다.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::session::Session;

/// 이름 -> 세션 매핑.
///
/// 이름당 살아있는 세션은 최대 하나입니다. 같은 이름으로 다시
/// 등록하면 이전 매핑이 교체되며, 교체된 세션은 호출자(라우터)가
/// 명시적으로 닫습니다.
#[derive(Default)]
pub struct Registry {
    endpoints: RwLock<HashMap<String, Arc<Session>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 이름에 대한 매핑을 삽입하거나 교체합니다.
    ///
    /// 다른 세션이 그 이름을 쓰고 있었다면 교체된 세션을 반환합니다.
    /// 같은 세션이 같은 이름으로 재등록하는 경우에는 `None`입니다.
    pub async fn register(&self, name: &str, session: Arc<Session>) -> Option<Arc<Session>> {
        let mut endpoints = self.endpoints.write().await;
        let displaced = endpoints.insert(name.to_string(), Arc::clone(&session));
        displaced.filter(|prev| prev.id() != session.id())
    }

    /// 이름으로 세션을 조회합니다.
    pub async fn lookup(&self, name: &str) -> Option<Arc<Session>> {
        self.endpoints.read().await.get(name).cloned()
    }

    /// 세션이 소유한 모든 항목을 제거합니다.
    ///
    /// 세션 식별자로 비교하므로 교체된 옛 세션의 정리가 후임 세션의
    /// 항목을 지우지 못합니다. 등록된 적 없거나 이미 제거된 세션에
    /// 대해서는 no-op이며 여러 번 호출해도 안전합니다.
    pub async fn remove(&self, session: &Session) {
        let mut endpoints = self.endpoints.write().await;
        endpoints.retain(|_, s| s.id() != session.id());
    }

    /// 등록된 엔드포인트 수.
    pub async fn len(&self) -> usize {
        self.endpoints.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.endpoints.read().await.is_empty()
    }
}
