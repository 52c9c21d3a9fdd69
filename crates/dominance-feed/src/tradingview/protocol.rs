//! TradingView 데이터 서버 메시지 형식.
//!
//! 각 프레임은 `~m~{길이}~m~{페이로드}` 형식이며 하나의 웹소켓 메시지에
//! 여러 프레임이 이어 붙을 수 있습니다. `~h~N` 페이로드는 하트비트로,
//! 받은 프레임을 그대로 돌려보내야 합니다.

use crate::error::{FeedError, FeedResult};
use chrono::DateTime;
use dominance_core::{finite, Bar};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::{json, Value};

/// 디코딩된 프레임.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// 하트비트 (`~h~N`). 원본 페이로드를 보관합니다.
    Heartbeat(String),
    /// `{"m": ..., "p": [...]}` 메시지
    Message { method: String, params: Vec<Value> },
    /// 세션 정보 등 메서드가 없는 페이로드
    Other(Value),
}

/// 페이로드에 길이 접두사를 붙입니다.
pub fn frame(payload: &str) -> String {
    format!("~m~{}~m~{}", payload.chars().count(), payload)
}

/// 메서드 호출 메시지를 프레임으로 만듭니다.
pub fn encode_message(method: &str, params: Value) -> String {
    let payload = json!({ "m": method, "p": params }).to_string();
    frame(&payload)
}

/// 웹소켓 메시지 하나에 담긴 프레임들을 디코딩합니다.
pub fn decode_frames(raw: &str) -> FeedResult<Vec<Frame>> {
    let mut frames = Vec::new();
    let mut rest = raw;

    while !rest.is_empty() {
        let body = rest
            .strip_prefix("~m~")
            .ok_or_else(|| FeedError::ParseError(format!("missing frame prefix: {rest:.32}")))?;
        let (len, body) = body
            .split_once("~m~")
            .ok_or_else(|| FeedError::ParseError("missing frame length".to_string()))?;
        let len: usize = len
            .parse()
            .map_err(|_| FeedError::ParseError(format!("bad frame length: {len}")))?;

        let end = body
            .char_indices()
            .nth(len)
            .map(|(idx, _)| idx)
            .unwrap_or(body.len());
        let (payload, tail) = body.split_at(end);
        frames.push(parse_payload(payload)?);
        rest = tail;
    }

    Ok(frames)
}

fn parse_payload(payload: &str) -> FeedResult<Frame> {
    if payload.starts_with("~h~") {
        return Ok(Frame::Heartbeat(payload.to_string()));
    }

    let value: Value = serde_json::from_str(payload)?;
    match value.get("m").and_then(Value::as_str) {
        Some(method) => {
            let params = value
                .get("p")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            Ok(Frame::Message {
                method: method.to_string(),
                params,
            })
        }
        None => Ok(Frame::Other(value)),
    }
}

/// `prefix_` 뒤에 소문자 12자를 붙인 세션 ID를 생성합니다.
pub fn session_id(prefix: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .filter(|c| c.is_ascii_lowercase())
        .take(12)
        .map(char::from)
        .collect();
    format!("{prefix}_{suffix}")
}

/// `timescale_update`/`du` 메시지에서 시리즈 바를 추출합니다.
///
/// 형식: `p[1][series_id]["s"] = [{"i": n, "v": [ts, o, h, l, c, vol?]}, ...]`
pub fn parse_series_bars(params: &[Value], series_id: &str) -> Vec<Bar> {
    let points = params
        .get(1)
        .and_then(|p| p.get(series_id))
        .and_then(|s| s.get("s"))
        .and_then(Value::as_array);

    let Some(points) = points else {
        return Vec::new();
    };

    points
        .iter()
        .filter_map(|point| point.get("v").and_then(Value::as_array))
        .filter_map(|v| {
            let secs = v.first().and_then(Value::as_f64)?;
            let timestamp = DateTime::from_timestamp(secs as i64, 0)?;
            let num = |idx: usize| finite(v.get(idx).and_then(Value::as_f64));
            Some(Bar {
                timestamp,
                open: num(1),
                high: num(2),
                low: num(3),
                close: num(4),
                volume: num(5),
            })
        })
        .collect()
}
