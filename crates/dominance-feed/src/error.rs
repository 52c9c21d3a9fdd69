//! 데이터 제공자 에러 타입.

use std::time::Duration;
use thiserror::Error;

/// 데이터 제공자 관련 에러.
#[derive(Debug, Error)]
pub enum FeedError {
    /// 네트워크/연결 에러
    #[error("Network error: {0}")]
    NetworkError(String),

    /// WebSocket 에러
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// 서버가 연결을 닫음
    #[error("Connection closed before series completed")]
    Closed,

    /// 응답 대기 시간 초과
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// 제공자가 보고한 프로토콜/세션 에러
    #[error("Provider error: {0}")]
    Provider(String),

    /// 심볼을 해석할 수 없음
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// 파싱/역직렬화 에러
    #[error("Parse error: {0}")]
    ParseError(String),
}

impl FeedError {
    /// 같은 요청을 다시 보내면 성공할 수 있는 에러인지 확인합니다.
    pub fn is_transient(&self) -> bool {
        !matches!(self, FeedError::SymbolNotFound(_))
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::ParseError(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for FeedError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::Io(e) => FeedError::NetworkError(e.to_string()),
            WsError::ConnectionClosed | WsError::AlreadyClosed => FeedError::Closed,
            other => FeedError::WebSocket(other.to_string()),
        }
    }
}

/// 데이터 제공자 작업을 위한 Result 타입.
pub type FeedResult<T> = Result<T, FeedError>;
