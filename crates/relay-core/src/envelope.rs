//! 주소가 지정된 envelope 타입 및 JSON 코덱.
//!
//! 릴레이를 거치는 모든 메시지는 동일한 와이어 형식을 사용합니다:
//!
//! ```json
//! { "sender": "Frontend", "receiver": "Backtester", "type": "get-indicator", "data": {...} }
//! ```
//!
//! `data`는 릴레이가 해석하지 않는 불투명한 값입니다. 수신자가
//! `type` 태그를 보고 직접 디코딩합니다.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RelayError, RelayResult};

/// 등록(login) envelope의 예약된 `type` 태그.
pub const LOGIN_KIND: &str = "Login";

/// 릴레이 자신에게 전달되는 메시지의 기본 수신자 이름.
pub const DEFAULT_BROKER_NAME: &str = "Broker";

/// 전달 실패 알림 envelope의 `type` 태그 (프로토콜 확장, 기본 비활성).
pub const DELIVERY_FAILURE_KIND: &str = "DeliveryFailure";

/// 릴레이 연결로 교환되는 메시지 단위.
///
/// 생성 후 변경되지 않으며, 릴레이는 `data`를 포워딩 외에는
/// 해석하지 않습니다. 필드 누락은 디코딩 에러가 아니라 라우팅
/// 시점의 문제로 처리하므로 모든 필드에 기본값을 허용합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// 발신 엔드포인트의 논리적 이름
    #[serde(default)]
    pub sender: String,
    /// 수신 엔드포인트의 논리적 이름, 또는 예약된 브로커 이름
    #[serde(default)]
    pub receiver: String,
    /// 페이로드 용도를 구분하는 태그
    #[serde(rename = "type", default)]
    pub kind: String,
    /// 애플리케이션 정의 페이로드
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    /// 새로운 envelope 생성.
    pub fn new(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        kind: impl Into<String>,
        data: Value,
    ) -> Self {
        Self {
            sender: sender.into(),
            receiver: receiver.into(),
            kind: kind.into(),
            data,
        }
    }

    /// 이름 등록을 위한 login envelope 생성.
    ///
    /// 연결 직후 어떤 트래픽보다 먼저 전송되어야 합니다.
    pub fn login(name: impl Into<String>) -> Self {
        Self::new(name, DEFAULT_BROKER_NAME, LOGIN_KIND, Value::Null)
    }

    /// 등록 envelope인지 확인.
    pub fn is_login(&self) -> bool {
        self.kind == LOGIN_KIND
    }

    /// JSON 문자열로 직렬화.
    pub fn to_json(&self) -> RelayResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// JSON 문자열에서 파싱.
    ///
    /// 잘못된 JSON은 `RelayError::Decode`를 반환합니다. 호출자는
    /// 이를 로깅하고 메시지를 버려야 하며, 연결을 끊어서는 안 됩니다.
    pub fn from_json(json: &str) -> RelayResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
