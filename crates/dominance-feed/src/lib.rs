//! 시장 데이터 제공자 경계.
//!
//! - `BarSource` trait: `fetch(symbol, exchange, interval, count, before)`
//! - `TradingViewClient`: TradingView 데이터 서버 웹소켓 클라이언트
//! - `fetch_bars`: 고정 대기 시간을 둔 제한 횟수 재시도

pub mod error;
pub mod retry;
pub mod source;
pub mod tradingview;

pub use error::{FeedError, FeedResult};
pub use retry::{fetch_bars, FetchOutcome, RetryPolicy};
pub use source::{BarRequest, BarSource};
pub use tradingview::{TradingViewClient, TradingViewConfig};
