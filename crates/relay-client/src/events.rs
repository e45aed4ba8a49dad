//! 인프로세스 publish/subscribe 팬아웃.
//!
//! 수신 envelope은 `type` 태그를 키로 구독자에게 전달되고, 태그와
//! 무관하게 모든 envelope을 받는 `"message"` 키도 제공됩니다.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use relay_core::Envelope;

/// 모든 수신 envelope이 전달되는 catch-all 이벤트 이름.
pub const MESSAGE_EVENT: &str = "message";

type Handler = Arc<dyn Fn(&Envelope) + Send + Sync>;

/// 구독 해제에 사용하는 핸들러 식별자.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerId(u64);

/// 이벤트 이름별 구독자 목록.
///
/// 이벤트당 여러 핸들러를 허용하며 등록 순서대로 호출합니다.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<EventBusInner>,
}

#[derive(Default)]
struct EventBusInner {
    handlers: RwLock<HashMap<String, Vec<(HandlerId, Handler)>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// 이벤트 구독. 해제에 쓸 수 있는 식별자를 반환합니다.
    pub async fn on(
        &self,
        event: &str,
        handler: impl Fn(&Envelope) + Send + Sync + 'static,
    ) -> HandlerId {
        let id = HandlerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let mut handlers = self.inner.handlers.write().await;
        handlers
            .entry(event.to_string())
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// 구독 해제. 등록된 적 없는 핸들러에 대해서는 no-op입니다.
    pub async fn off(&self, event: &str, id: HandlerId) {
        let mut handlers = self.inner.handlers.write().await;
        if let Some(list) = handlers.get_mut(event) {
            list.retain(|(hid, _)| *hid != id);
            if list.is_empty() {
                handlers.remove(event);
            }
        }
    }

    /// 이벤트의 모든 구독자에게 envelope을 전달합니다.
    pub async fn emit(&self, event: &str, envelope: &Envelope) {
        // 핸들러 호출 중에는 락을 잡지 않음
        let snapshot: Vec<Handler> = {
            let handlers = self.inner.handlers.read().await;
            match handlers.get(event) {
                Some(list) => list.iter().map(|(_, h)| Arc::clone(h)).collect(),
                None => return,
            }
        };

        for handler in snapshot {
            handler(envelope);
        }
    }

    /// 이벤트의 구독자 수.
    pub async fn handler_count(&self, event: &str) -> usize {
        self.inner
            .handlers
            .read()
            .await
            .get(event)
            .map(|list| list.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    fn envelope(kind: &str) -> Envelope {
        Envelope::new("A", "B", kind, json!(null))
    }

    #[tokio::test]
    async fn test_fanout_to_multiple_handlers_in_order() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen1 = Arc::clone(&seen);
        bus.on("tick", move |_| seen1.lock().unwrap().push("first"))
            .await;
        let seen2 = Arc::clone(&seen);
        bus.on("tick", move |_| seen2.lock().unwrap().push("second"))
            .await;

        bus.emit("tick", &envelope("tick")).await;

        assert_eq!(*seen.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_is_noop() {
        let bus = EventBus::new();
        bus.emit("tick", &envelope("tick")).await;
    }

    #[tokio::test]
    async fn test_off_removes_only_target_handler() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen1 = Arc::clone(&seen);
        let id = bus
            .on("tick", move |_| seen1.lock().unwrap().push("removed"))
            .await;
        let seen2 = Arc::clone(&seen);
        bus.on("tick", move |_| seen2.lock().unwrap().push("kept"))
            .await;

        bus.off("tick", id).await;
        bus.emit("tick", &envelope("tick")).await;

        assert_eq!(*seen.lock().unwrap(), vec!["kept"]);
        assert_eq!(bus.handler_count("tick").await, 1);
    }

    #[tokio::test]
    async fn test_off_of_unknown_handler_is_noop() {
        let bus = EventBus::new();
        let id = bus.on("tick", |_| {}).await;

        // 다른 이벤트 이름으로 해제 시도
        bus.off("other", id).await;
        assert_eq!(bus.handler_count("tick").await, 1);

        // 두 번 해제해도 안전
        bus.off("tick", id).await;
        bus.off("tick", id).await;
        assert_eq!(bus.handler_count("tick").await, 0);
    }

    #[tokio::test]
    async fn test_handlers_see_envelope_fields() {
        let bus = EventBus::new();
        let captured = Arc::new(Mutex::new(None));

        let captured2 = Arc::clone(&captured);
        bus.on("get-indicator", move |e: &Envelope| {
            *captured2.lock().unwrap() = Some(e.clone());
        })
        .await;

        let envelope = Envelope::new("Frontend", "Backtester", "get-indicator", json!({"n": 1}));
        bus.emit("get-indicator", &envelope).await;

        assert_eq!(captured.lock().unwrap().clone().unwrap(), envelope);
    }
}
