//! TradingView 데이터 서버 클라이언트.
//!
//! 요청마다 익명 웹소켓 세션을 열고 다음 순서로 메시지를 보냅니다:
//! 1. `set_auth_token` (익명 토큰)
//! 2. `chart_create_session`
//! 3. `resolve_symbol` (`EXCHANGE:SYMBOL`)
//! 4. `create_series` (간격, 바 개수)
//!
//! 이후 `timescale_update`로 바를 받고 `series_completed`에서 종료합니다.

pub mod protocol;

use crate::error::{FeedError, FeedResult};
use crate::source::{BarRequest, BarSource};
use async_trait::async_trait;
use dominance_core::Bar;
use futures::{SinkExt, StreamExt};
use protocol::{decode_frames, encode_message, frame, session_id, Frame};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const SERIES_ID: &str = "s1";
const SYMBOL_ID: &str = "symbol_1";

/// TradingView 클라이언트 설정.
#[derive(Debug, Clone)]
pub struct TradingViewConfig {
    /// 데이터 서버 웹소켓 URL
    pub ws_url: String,
    /// 핸드셰이크 Origin 헤더
    pub origin: String,
    /// 인증 토큰 (없으면 익명)
    pub auth_token: String,
    /// 요청 하나의 전체 제한 시간
    pub request_timeout: Duration,
}

impl Default for TradingViewConfig {
    fn default() -> Self {
        Self {
            ws_url: "wss://data.tradingview.com/socket.io/websocket".to_string(),
            origin: "https://data.tradingview.com".to_string(),
            auth_token: "unauthorized_user_token".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// TradingView 기반 `BarSource`.
#[derive(Debug, Clone, Default)]
pub struct TradingViewClient {
    config: TradingViewConfig,
}

impl TradingViewClient {
    /// 새 클라이언트를 생성합니다.
    pub fn new(config: TradingViewConfig) -> Self {
        Self { config }
    }

    async fn connect(&self) -> FeedResult<Socket> {
        let mut request = self.config.ws_url.as_str().into_client_request()?;
        let origin = HeaderValue::from_str(&self.config.origin)
            .map_err(|e| FeedError::WebSocket(format!("invalid origin header: {e}")))?;
        request.headers_mut().insert("Origin", origin);

        let (socket, response) = connect_async(request).await?;
        debug!(status = %response.status(), "TradingView websocket connected");
        Ok(socket)
    }

    async fn send(socket: &mut Socket, method: &str, params: Value) -> FeedResult<()> {
        socket
            .send(Message::Text(encode_message(method, params).into()))
            .await?;
        Ok(())
    }

    async fn fetch_series(&self, request: &BarRequest) -> FeedResult<Vec<Bar>> {
        let mut socket = self.connect().await?;
        let chart_session = session_id("cs");
        let symbol = request.qualified_symbol();
        let symbol_spec = json!({ "symbol": symbol, "adjustment": "splits" }).to_string();

        Self::send(&mut socket, "set_auth_token", json!([self.config.auth_token])).await?;
        Self::send(&mut socket, "chart_create_session", json!([chart_session, ""])).await?;
        Self::send(
            &mut socket,
            "resolve_symbol",
            json!([chart_session, SYMBOL_ID, format!("={symbol_spec}")]),
        )
        .await?;
        Self::send(
            &mut socket,
            "create_series",
            json!([
                chart_session,
                SERIES_ID,
                SERIES_ID,
                SYMBOL_ID,
                request.interval.as_provider_code(),
                request.count
            ]),
        )
        .await?;

        let mut bars = Vec::new();
        while let Some(message) = socket.next().await {
            let text = match message? {
                Message::Text(text) => text,
                Message::Close(_) => return Err(FeedError::Closed),
                _ => continue,
            };

            for frame_ in decode_frames(text.as_str())? {
                match frame_ {
                    Frame::Heartbeat(payload) => {
                        socket.send(Message::Text(frame(&payload).into())).await?;
                    }
                    Frame::Message { method, params } => match method.as_str() {
                        "timescale_update" | "du" => {
                            bars.extend(protocol::parse_series_bars(&params, SERIES_ID));
                        }
                        "series_completed" => {
                            let _ = socket.close(None).await;
                            return Ok(bars);
                        }
                        "symbol_error" => return Err(FeedError::SymbolNotFound(symbol)),
                        "critical_error" | "protocol_error" | "series_error" => {
                            return Err(FeedError::Provider(format!("{method}: {params:?}")));
                        }
                        _ => {}
                    },
                    Frame::Other(_) => {}
                }
            }
        }

        Err(FeedError::Closed)
    }
}

/// 종료 시각 이전 바만 남기고 가장 최근 `count`개로 자릅니다.
fn trim_to_request(mut bars: Vec<Bar>, request: &BarRequest) -> Vec<Bar> {
    if let Some(before) = request.before {
        bars.retain(|bar| bar.timestamp < before);
    }
    bars.sort_by_key(|bar| bar.timestamp);
    if bars.len() > request.count {
        bars.drain(..bars.len() - request.count);
    }
    bars
}

#[async_trait]
impl BarSource for TradingViewClient {
    async fn fetch(&self, request: &BarRequest) -> FeedResult<Vec<Bar>> {
        let timeout = self.config.request_timeout;
        let bars = match tokio::time::timeout(timeout, self.fetch_series(request)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(symbol = %request.qualified_symbol(), "TradingView request timed out");
                return Err(FeedError::Timeout(timeout));
            }
        };

        let bars = trim_to_request(bars, request);
        info!(
            symbol = %request.qualified_symbol(),
            interval = %request.interval,
            bars = bars.len(),
            "TradingView bars received"
        );
        Ok(bars)
    }

    fn name(&self) -> &str {
        "tradingview"
    }
}
