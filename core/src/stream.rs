// Live update channel: server-sent events with reconnection.
//
// One driver task owns the transport for the lifetime of a dashboard
// session. The loop below is the only place a reconnect is armed, so at
// most one retry can ever be pending, and a previous stream is always
// shut down before a new one opens.

use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use crate::config::DeskConfig;
use crate::model::{de_id, ItemPatch, Role, WorkItem};
use crate::telemetry::ChannelMetrics;
use crate::{DeskError, Result};

const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Connection state of the live channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// Deliberately torn down. No further attempts follow.
    Closed,
}

/// Typed push event after wire decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    ItemCreated(WorkItem),
    StatusChanged { id: String, patch: ItemPatch },
    Assigned { id: String, patch: ItemPatch },
    KeepAlive,
}

/// One parsed SSE frame: the event name and its joined data payload.
#[derive(Debug, Clone, PartialEq)]
pub struct SseFrame {
    pub event: String,
    pub data: String,
}

/// Incremental server-sent-events parser, independent of the transport.
///
/// Feed it raw bytes as they arrive; complete frames come out. Handles
/// `event:` and `data:` fields, comment lines, multi-line data, CRLF
/// endings and frames split across chunk boundaries.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    event_name: Option<String>,
    data: Vec<String>,
}

impl SseParser {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line_bytes: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line_bytes);
            let line = line.trim_end_matches(&['\n', '\r'][..]);
            self.take_line(line, &mut frames);
        }
        frames
    }

    fn take_line(&mut self, line: &str, frames: &mut Vec<SseFrame>) {
        if line.is_empty() {
            // Blank line dispatches the accumulated frame.
            if self.event_name.is_some() || !self.data.is_empty() {
                let event = self
                    .event_name
                    .take()
                    .unwrap_or_else(|| "message".to_string());
                let data = std::mem::take(&mut self.data).join("\n");
                frames.push(SseFrame { event, data });
            }
            return;
        }
        if line.starts_with(':') {
            // Comment, typically keep-alive padding.
            return;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event_name = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            // id and retry are legal fields but unused by this client
            _ => {}
        }
    }
}

#[derive(Debug, Deserialize)]
struct PatchPayload {
    #[serde(deserialize_with = "de_id")]
    id: String,
    #[serde(flatten)]
    patch: ItemPatch,
}

/// Decode a frame into a typed event. `Ok(None)` means the event name is
/// not one this client understands; an `Err` means the payload was
/// unreadable. Neither terminates the connection.
pub fn decode_frame(frame: &SseFrame) -> Result<Option<ChannelEvent>> {
    match frame.event.as_str() {
        "keep-alive" => Ok(Some(ChannelEvent::KeepAlive)),
        "item-created" => {
            let item: WorkItem = serde_json::from_str(&frame.data)
                .map_err(|e| DeskError::MalformedEvent(format!("item-created: {e}")))?;
            Ok(Some(ChannelEvent::ItemCreated(item)))
        }
        "item-status-changed" => {
            let payload: PatchPayload = serde_json::from_str(&frame.data)
                .map_err(|e| DeskError::MalformedEvent(format!("item-status-changed: {e}")))?;
            Ok(Some(ChannelEvent::StatusChanged {
                id: payload.id,
                patch: payload.patch,
            }))
        }
        "item-assigned" => {
            let payload: PatchPayload = serde_json::from_str(&frame.data)
                .map_err(|e| DeskError::MalformedEvent(format!("item-assigned: {e}")))?;
            Ok(Some(ChannelEvent::Assigned {
                id: payload.id,
                patch: payload.patch,
            }))
        }
        _ => Ok(None),
    }
}

struct DriverHandle {
    handle: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

/// SSE client for `GET /{role}/dashboard-stream`.
///
/// The credential travels as a query parameter: the SSE transport cannot
/// carry custom headers, so this endpoint deviates from the gateway's
/// header auth on purpose.
pub struct LiveChannel {
    http: Client,
    base_url: String,
    retry_delay: Duration,
    state: Arc<watch::Sender<ChannelState>>,
    events: broadcast::Sender<ChannelEvent>,
    metrics: ChannelMetrics,
    driver: Mutex<Option<DriverHandle>>,
}

impl LiveChannel {
    pub fn new(config: &DeskConfig) -> Result<Self> {
        // No overall timeout here: a healthy stream stays open for hours.
        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| DeskError::Config(format!("failed to build HTTP client: {e}")))?;
        let (state, _) = watch::channel(ChannelState::Disconnected);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            http,
            base_url: config.base_url_trimmed().to_string(),
            retry_delay: config.stream_retry_delay,
            state: Arc::new(state),
            events,
            metrics: ChannelMetrics::new(),
            driver: Mutex::new(None),
        })
    }

    /// Open the role-scoped stream. An already-running stream is shut
    /// down first; two parallel streams can never exist.
    pub async fn connect(&self, role: Role, token: &str) -> Result<()> {
        let mut driver = self.driver.lock().await;
        if let Some(old) = driver.take() {
            info!(target: "live_channel", "closing previous stream before reopening");
            let _ = old.shutdown.send(true);
            old.handle.abort();
        }

        let ctx = DriverContext {
            http: self.http.clone(),
            url: format!("{}/{}/dashboard-stream", self.base_url, role.api_prefix()),
            token: token.to_string(),
            retry_delay: self.retry_delay,
            state: Arc::clone(&self.state),
            events: self.events.clone(),
            metrics: self.metrics.clone(),
        };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(drive(ctx, shutdown_rx));
        *driver = Some(DriverHandle {
            handle,
            shutdown: shutdown_tx,
        });
        Ok(())
    }

    /// Tear the channel down. Idempotent; suppresses any pending retry.
    pub async fn close(&self) {
        let mut driver = self.driver.lock().await;
        if let Some(old) = driver.take() {
            let _ = old.shutdown.send(true);
            old.handle.abort();
            info!(target: "live_channel", "live channel closed");
        }
        self.state.send_replace(ChannelState::Closed);
    }

    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ChannelState> {
        self.state.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ChannelEvent> {
        self.events.subscribe()
    }

    pub fn metrics(&self) -> &ChannelMetrics {
        &self.metrics
    }
}

struct DriverContext {
    http: Client,
    url: String,
    token: String,
    retry_delay: Duration,
    state: Arc<watch::Sender<ChannelState>>,
    events: broadcast::Sender<ChannelEvent>,
    metrics: ChannelMetrics,
}

async fn drive(ctx: DriverContext, mut shutdown: watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            break;
        }
        ctx.state.send_replace(ChannelState::Connecting);
        match open_stream(&ctx.http, &ctx.url, &ctx.token).await {
            Ok(resp) => {
                info!(target: "live_channel", url = %ctx.url, "stream connected");
                ctx.state.send_replace(ChannelState::Connected);
                read_stream(resp, &ctx.events, &ctx.metrics, &mut shutdown).await;
            }
            Err(e) => {
                warn!(target: "live_channel", error = %e, "stream connect failed");
            }
        }
        if *shutdown.borrow() {
            break;
        }
        ctx.state.send_replace(ChannelState::Reconnecting);
        ctx.metrics.record_reconnect().await;
        tokio::select! {
            _ = tokio::time::sleep(ctx.retry_delay) => {}
            _ = shutdown.changed() => {}
        }
    }
    ctx.state.send_replace(ChannelState::Closed);
}

async fn open_stream(
    http: &Client,
    url: &str,
    token: &str,
) -> std::result::Result<reqwest::Response, reqwest::Error> {
    let resp = http
        .get(url)
        .query(&[("token", token)])
        .header(ACCEPT, "text/event-stream")
        .send()
        .await?;
    resp.error_for_status()
}

async fn read_stream(
    resp: reqwest::Response,
    events: &broadcast::Sender<ChannelEvent>,
    metrics: &ChannelMetrics,
    shutdown: &mut watch::Receiver<bool>,
) {
    let mut parser = SseParser::default();
    let byte_stream = resp.bytes_stream();
    tokio::pin!(byte_stream);

    loop {
        tokio::select! {
            chunk = byte_stream.next() => match chunk {
                Some(Ok(bytes)) => {
                    for frame in parser.push(&bytes) {
                        match decode_frame(&frame) {
                            Ok(Some(event)) => {
                                metrics.record_event().await;
                                let _ = events.send(event);
                            }
                            Ok(None) => {
                                debug!(target: "live_channel", event = %frame.event, "ignoring unknown event");
                            }
                            Err(e) => {
                                // Bad payloads are dropped; the stream stays up.
                                metrics.record_dropped().await;
                                warn!(target: "live_channel", error = %e, "dropping malformed event");
                            }
                        }
                    }
                }
                Some(Err(e)) => {
                    warn!(target: "live_channel", error = %e, "stream broke");
                    return;
                }
                None => {
                    info!(target: "live_channel", "stream ended by server");
                    return;
                }
            },
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
        }
    }
}
