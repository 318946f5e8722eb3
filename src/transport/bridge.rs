//! WebSocket connection to an external bot bridge.
//!
//! The bridge process hosts the real game client. This transport opens one
//! WebSocket per session, asks the bridge to log in, and then runs an event
//! loop task that:
//!
//! - Forwards outbound [`BridgeRequest`]s from the synchronous API
//! - Converts inbound [`BridgeMessage`]s into [`TransportEvent`]s
//! - Caches position and inventory snapshots for the read methods
//!
//! The stream always ends with a terminal event: `Terminated` when the
//! socket closes, `FatalError` when it breaks.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{from_str, to_string};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, connect_async};
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::protocol::message::{block_position, slots_from_bridge};
use crate::protocol::{BridgeMessage, BridgeRequest, TransportEvent};
use crate::session::{ItemStack, Position, SessionIdentity};

use super::{EventStream, SessionTransport};

// ============================================================================
// Constants
// ============================================================================

/// Bridge address used when none is configured.
pub const DEFAULT_BRIDGE_URL: &str = "ws://localhost:3000";

// ============================================================================
// Types
// ============================================================================

/// Outbound request sender; `None` while no session is open.
type RequestSlot = Arc<Mutex<Option<mpsc::UnboundedSender<BridgeRequest>>>>;

/// Last readings reported by the bridge.
#[derive(Debug, Default)]
struct BridgeCache {
    position: Option<Position>,
    slots: Vec<Option<ItemStack>>,
}

// ============================================================================
// BridgeTransport
// ============================================================================

/// [`SessionTransport`] backed by a WebSocket bot bridge.
pub struct BridgeTransport {
    url: Url,
    /// Requests to the event loop, cleared when the loop exits.
    request_tx: RequestSlot,
    cache: Arc<Mutex<BridgeCache>>,
}

impl fmt::Debug for BridgeTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeTransport")
            .field("url", &self.url.as_str())
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

impl BridgeTransport {
    /// Creates a transport for the bridge at `url`.
    ///
    /// # Errors
    ///
    /// - [`Error::Url`] if `url` does not parse
    /// - [`Error::Config`] if the scheme is not `ws` or `wss`
    pub fn new(url: &str) -> Result<Self> {
        let url = Url::parse(url)?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::config(format!(
                "Bridge URL must use ws or wss, got {}",
                url.scheme()
            )));
        }

        Ok(Self {
            url,
            request_tx: Arc::new(Mutex::new(None)),
            cache: Arc::new(Mutex::new(BridgeCache::default())),
        })
    }

    /// Creates a transport for [`DEFAULT_BRIDGE_URL`].
    pub fn local() -> Result<Self> {
        Self::new(DEFAULT_BRIDGE_URL)
    }

    /// Returns the bridge URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns `true` while a session's event loop is running.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.request_tx.lock().is_some()
    }

    fn send(&self, request: BridgeRequest) -> Result<()> {
        let guard = self.request_tx.lock();
        let tx = guard.as_ref().ok_or(Error::ConnectionClosed)?;
        tx.send(request).map_err(|_| Error::ConnectionClosed)
    }

    /// Event loop that handles WebSocket I/O.
    async fn run_event_loop<S>(
        ws_stream: WebSocketStream<S>,
        mut request_rx: mpsc::UnboundedReceiver<BridgeRequest>,
        request_slot: RequestSlot,
        events: mpsc::UnboundedSender<TransportEvent>,
        cache: Arc<Mutex<BridgeCache>>,
    ) where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut ws_write, mut ws_read) = ws_stream.split();
        let mut exit = None;

        loop {
            tokio::select! {
                // Incoming messages from the bridge
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            let Some(event) = Self::handle_incoming_message(&text, &cache) else {
                                continue;
                            };
                            let terminal = event.is_terminal();
                            if events.send(event).is_err() {
                                debug!("Event stream dropped");
                                break;
                            }
                            if terminal {
                                break;
                            }
                        }

                        Some(Ok(Message::Close(frame))) => {
                            let reason = frame
                                .map(|f| f.reason.as_str().to_string())
                                .filter(|r| !r.is_empty())
                                .unwrap_or_else(|| "bridge closed connection".to_string());
                            debug!(%reason, "WebSocket closed by bridge");
                            exit = Some(TransportEvent::Terminated { reason });
                            break;
                        }

                        Some(Err(e)) => {
                            error!(error = %e, "WebSocket error");
                            exit = Some(TransportEvent::FatalError {
                                descriptor: e.to_string(),
                            });
                            break;
                        }

                        None => {
                            debug!("WebSocket stream ended");
                            exit = Some(TransportEvent::Terminated {
                                reason: "bridge stream ended".to_string(),
                            });
                            break;
                        }

                        // Ignore Binary, Ping, Pong
                        _ => {}
                    }
                }

                // Requests from the client
                request = request_rx.recv() => {
                    match request {
                        Some(request) => {
                            let json = match to_string(&request) {
                                Ok(json) => json,
                                Err(e) => {
                                    warn!(error = %e, "Failed to encode bridge request");
                                    continue;
                                }
                            };
                            trace!(%json, "Sending bridge request");
                            if let Err(e) = ws_write.send(Message::Text(json.into())).await {
                                error!(error = %e, "Failed to send bridge request");
                                exit = Some(TransportEvent::FatalError {
                                    descriptor: e.to_string(),
                                });
                                break;
                            }
                        }

                        None => {
                            debug!("Request channel closed");
                            let _ = ws_write.close().await;
                            exit = Some(TransportEvent::Terminated {
                                reason: "connection closed".to_string(),
                            });
                            break;
                        }
                    }
                }
            }
        }

        // Clear the sender unless a newer session already replaced it.
        drop(request_rx);
        {
            let mut slot = request_slot.lock();
            if slot.as_ref().is_some_and(|tx| tx.is_closed()) {
                *slot = None;
            }
        }

        if let Some(event) = exit {
            let _ = events.send(event);
        }

        debug!("Bridge event loop terminated");
    }

    /// Decodes one bridge frame.
    fn parse_message(text: &str) -> Result<BridgeMessage> {
        from_str(text).map_err(|e| Error::protocol(format!("malformed bridge frame: {e}")))
    }

    /// Parses one bridge frame, caching snapshots.
    fn handle_incoming_message(
        text: &str,
        cache: &Arc<Mutex<BridgeCache>>,
    ) -> Option<TransportEvent> {
        match Self::parse_message(text) {
            Ok(BridgeMessage::Position { x, y, z }) => {
                cache.lock().position = Some(block_position(x, y, z));
                None
            }
            Ok(BridgeMessage::Inventory { slots }) => {
                cache.lock().slots = slots_from_bridge(slots);
                None
            }
            Ok(message) => message.into_transport_event(),
            Err(e) => {
                warn!(error = %e, text = %text, "Ignoring bridge message");
                None
            }
        }
    }
}

// ============================================================================
// SessionTransport
// ============================================================================

#[async_trait]
impl SessionTransport for BridgeTransport {
    async fn open(&self, identity: &SessionIdentity) -> Result<EventStream> {
        if self.request_tx.lock().is_some() {
            return Err(Error::connection("Bridge session already open"));
        }

        debug!(url = %self.url, %identity, "Connecting to bridge");
        let (mut ws_stream, _) = connect_async(self.url.as_str()).await?;

        let open = to_string(&BridgeRequest::open(identity))?;
        ws_stream.send(Message::Text(open.into())).await?;

        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        *self.request_tx.lock() = Some(request_tx);

        tokio::spawn(Self::run_event_loop(
            ws_stream,
            request_rx,
            Arc::clone(&self.request_tx),
            event_tx,
            Arc::clone(&self.cache),
        ));

        info!(url = %self.url, %identity, "Bridge session opened");
        Ok(event_rx)
    }

    fn send_chat(&self, text: &str) -> Result<()> {
        self.send(BridgeRequest::Chat {
            text: text.to_string(),
        })
    }

    async fn navigate_to(&self, target: Position) -> Result<()> {
        self.send(BridgeRequest::Navigate {
            x: target.x,
            y: target.y,
            z: target.z,
        })
    }

    fn read_position(&self) -> Option<Position> {
        self.cache.lock().position
    }

    fn read_inventory_slots(&self) -> Vec<Option<ItemStack>> {
        self.cache.lock().slots.clone()
    }

    fn close(&self, reason: &str) {
        // Dropping the sender after the close request ends the loop.
        if let Some(tx) = self.request_tx.lock().take() {
            let _ = tx.send(BridgeRequest::Close {
                reason: reason.to_string(),
            });
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::{Value, json};
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    fn text(value: Value) -> Message {
        Message::Text(value.to_string().into())
    }

    #[test]
    fn test_rejects_non_websocket_scheme() {
        let err = BridgeTransport::new("http://localhost:3000").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(matches!(
            BridgeTransport::new("not a url"),
            Err(Error::Url(_))
        ));
    }

    #[test]
    fn test_local_default() {
        let transport = BridgeTransport::local().unwrap();
        assert_eq!(transport.url().as_str(), "ws://localhost:3000/");
    }

    #[test]
    fn test_send_before_open() {
        let transport = BridgeTransport::local().unwrap();
        assert!(matches!(
            transport.send_chat("/help"),
            Err(Error::ConnectionClosed)
        ));
        assert_eq!(transport.read_position(), None);
        assert!(transport.read_inventory_slots().is_empty());
    }

    #[test]
    fn test_snapshots_are_cached() {
        let cache = Arc::new(Mutex::new(BridgeCache::default()));

        let event = BridgeTransport::handle_incoming_message(
            r#"{"event":"inventory","slots":[{"slot":45,"name":"dragon_egg","count":1}]}"#,
            &cache,
        );
        assert!(event.is_none());
        assert_eq!(
            cache.lock().slots[45].as_ref().map(|s| s.item_type.as_str()),
            Some("dragon_egg")
        );

        let event = BridgeTransport::handle_incoming_message(r#"{"event":"garbage"}"#, &cache);
        assert!(event.is_none());
    }

    #[test]
    fn test_malformed_frame_is_protocol_error() {
        for frame in [r#"{"event":"garbage"}"#, "not json", r#"{"event":"chat"}"#] {
            assert!(
                matches!(
                    BridgeTransport::parse_message(frame),
                    Err(Error::Protocol { .. })
                ),
                "accepted {frame:?}"
            );
        }
        assert!(matches!(
            BridgeTransport::parse_message(r#"{"event":"login"}"#),
            Ok(BridgeMessage::Login)
        ));
    }

    #[tokio::test]
    async fn test_session_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let bridge = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();

            let open = ws.next().await.unwrap().unwrap().into_text().unwrap();
            let open: Value = from_str(open.as_str()).unwrap();
            assert_eq!(open["op"], "open");
            assert_eq!(open["username"], "pilaf_test_player");

            ws.send(text(json!({"event": "login"}))).await.unwrap();
            ws.send(text(json!({"event": "position", "x": 1.5, "y": 64.0, "z": -2.2})))
                .await
                .unwrap();
            ws.send(text(json!({"event": "chat", "username": "Server", "message": "hi"})))
                .await
                .unwrap();

            let chat = ws.next().await.unwrap().unwrap().into_text().unwrap();
            let chat: Value = from_str(chat.as_str()).unwrap();
            assert_eq!(chat, json!({"op": "chat", "text": "/ability 1"}));

            ws.send(text(json!({"event": "end", "reason": "kicked"})))
                .await
                .unwrap();
        });

        let transport = BridgeTransport::new(&format!("ws://{addr}")).unwrap();
        let identity = SessionIdentity::new("localhost", 25565, "pilaf_test_player");
        let mut events = transport.open(&identity).await.unwrap();
        assert!(transport.is_open());

        assert_eq!(events.recv().await, Some(TransportEvent::Established));
        assert_eq!(
            events.recv().await,
            Some(TransportEvent::Chat {
                sender: "Server".into(),
                message: "hi".into()
            })
        );
        assert_eq!(transport.read_position(), Some(Position::new(1, 64, -3)));

        transport.send_chat("/ability 1").unwrap();
        assert_eq!(
            events.recv().await,
            Some(TransportEvent::Terminated {
                reason: "kicked".into()
            })
        );
        assert_eq!(events.recv().await, None);
        assert!(!transport.is_open());
        assert!(matches!(
            transport.send_chat("/ability 2"),
            Err(Error::ConnectionClosed)
        ));

        bridge.await.unwrap();
    }
}
