//! # Dominance Notification
//!
//! 수집기 알림 서비스.
//!
//! - Telegram Bot API 전송기
//! - 데이터 신선도 모니터: 실시간 기록 후 `check_and_notify`로 호출되며,
//!   일정 시간 이상 갱신이 없으면 경고하고 재개되면 복구 알림을 보냅니다.

pub mod monitor;
pub mod telegram;
pub mod types;

pub use monitor::*;
pub use telegram::*;
pub use types::*;
