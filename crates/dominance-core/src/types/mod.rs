//! 수집기 전반에서 사용되는 공통 타입.

mod bar;
mod day;
mod interval;

pub use bar::*;
pub use day::*;
pub use interval::*;
