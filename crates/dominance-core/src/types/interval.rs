//! 데이터 제공자 바 간격 정의.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 바 샘플링 간격.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    /// 1분봉
    M1,
    /// 3분봉
    M3,
    /// 5분봉
    M5,
    /// 15분봉
    M15,
    /// 30분봉
    M30,
    /// 45분봉
    M45,
    /// 1시간봉
    H1,
    /// 2시간봉
    H2,
    /// 3시간봉
    H3,
    /// 4시간봉
    H4,
    /// 일봉
    D1,
    /// 주봉
    W1,
    /// 월봉
    MN1,
}

impl Interval {
    /// TradingView 해상도 코드로 변환합니다.
    pub fn as_provider_code(&self) -> &'static str {
        match self {
            Interval::M1 => "1",
            Interval::M3 => "3",
            Interval::M5 => "5",
            Interval::M15 => "15",
            Interval::M30 => "30",
            Interval::M45 => "45",
            Interval::H1 => "1H",
            Interval::H2 => "2H",
            Interval::H3 => "3H",
            Interval::H4 => "4H",
            Interval::D1 => "1D",
            Interval::W1 => "1W",
            Interval::MN1 => "1M",
        }
    }

    /// TradingView 해상도 코드에서 파싱합니다.
    ///
    /// 시간봉은 `60`, `120` 같은 분 단위 표기도 허용합니다.
    pub fn from_provider_code(s: &str) -> Option<Self> {
        match s {
            "1" => Some(Interval::M1),
            "3" => Some(Interval::M3),
            "5" => Some(Interval::M5),
            "15" => Some(Interval::M15),
            "30" => Some(Interval::M30),
            "45" => Some(Interval::M45),
            "1H" | "60" => Some(Interval::H1),
            "2H" | "120" => Some(Interval::H2),
            "3H" | "180" => Some(Interval::H3),
            "4H" | "240" => Some(Interval::H4),
            "1D" | "D" => Some(Interval::D1),
            "1W" | "W" => Some(Interval::W1),
            "1M" | "M" => Some(Interval::MN1),
            _ => None,
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_provider_code())
    }
}

impl FromStr for Interval {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_provider_code(s.trim()).ok_or_else(|| CoreError::InvalidInterval(s.to_string()))
    }
}
