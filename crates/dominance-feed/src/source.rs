//! 바 조회 요청과 데이터 제공자 trait.

use crate::error::FeedResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dominance_core::{Bar, Interval};

/// 바 조회 요청.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarRequest {
    pub symbol: String,
    pub exchange: String,
    pub interval: Interval,
    /// 요청할 바 개수 (가장 최근부터)
    pub count: usize,
    /// 이 시각 이전(미포함)의 바만 반환
    pub before: Option<DateTime<Utc>>,
}

impl BarRequest {
    /// 새 요청을 생성합니다.
    pub fn new(
        symbol: impl Into<String>,
        exchange: impl Into<String>,
        interval: Interval,
        count: usize,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            exchange: exchange.into(),
            interval,
            count,
            before: None,
        }
    }

    /// 종료 시각을 설정합니다.
    pub fn before(mut self, before: DateTime<Utc>) -> Self {
        self.before = Some(before);
        self
    }

    /// 거래소 접두사가 붙은 심볼 (`CRYPTOCAP:BTC.D`).
    pub fn qualified_symbol(&self) -> String {
        if self.exchange.is_empty() {
            self.symbol.clone()
        } else {
            format!("{}:{}", self.exchange, self.symbol)
        }
    }
}

/// 외부 시장 데이터 제공자.
///
/// 부분 결과나 빈 결과를 돌려줄 수 있고, 일시적으로 실패할 수 있습니다.
#[async_trait]
pub trait BarSource: Send + Sync {
    /// 시간순으로 정렬된 바를 조회합니다.
    async fn fetch(&self, request: &BarRequest) -> FeedResult<Vec<Bar>>;

    /// 제공자 이름을 반환합니다.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_symbol() {
        let req = BarRequest::new("BTC.D", "CRYPTOCAP", Interval::D1, 2);
        assert_eq!(req.qualified_symbol(), "CRYPTOCAP:BTC.D");
        assert_eq!(req.before, None);

        let bare = BarRequest::new("BTC.D", "", Interval::D1, 2);
        assert_eq!(bare.qualified_symbol(), "BTC.D");
    }
}
