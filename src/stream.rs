//! Outbound observer stream: pushes moderation signals to a websocket
//! connection, one per agent instance.

use futures::SinkExt;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{error, info};

use crate::bus::ModerationSignal;

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("failed to connect to observer stream at {uri}: {source}")]
    Connect {
        uri: String,
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },
    #[error("failed to send frame: {0}")]
    Send(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Push-only outbound channel to an observer. Inbound frames are not read;
/// the observer connection exists solely to mirror moderation signals.
pub struct StreamAdapter {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl StreamAdapter {
    /// Open the websocket connection. A failure here is fatal at startup
    /// (§7 Fatal errors), since an agent with no observer channel cannot
    /// report its debate activity.
    pub async fn connect(uri: &str) -> Result<Self, StreamError> {
        let (socket, _response) =
            connect_async(uri)
                .await
                .map_err(|source| StreamError::Connect {
                    uri: uri.to_string(),
                    source,
                })?;
        info!(uri, "observer stream connected");
        Ok(Self { socket })
    }

    pub async fn send_signal(&mut self, signal: &ModerationSignal) -> Result<(), StreamError> {
        let json = serde_json::to_string(signal).expect("ModerationSignal always serializes");
        self.socket
            .send(tokio_tungstenite::tungstenite::Message::Text(json.into()))
            .await?;
        Ok(())
    }
}

impl std::fmt::Debug for StreamAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamAdapter").finish_non_exhaustive()
    }
}

/// No-op stand-in used in tests and whenever an observer connection isn't
/// wired up, so agent logic doesn't need to special-case its absence.
#[derive(Debug, Default)]
pub struct NullStream {
    pub sent: Vec<ModerationSignal>,
}

impl NullStream {
    pub fn send_signal(&mut self, signal: ModerationSignal) {
        error!(state = %signal.state, "no observer stream attached, dropping signal on the floor");
        self.sent.push(signal);
    }
}

/// The observer channel an agent runtime pushes moderation signals through.
/// `Live` is the real websocket connection; `Null` is used in tests.
pub enum ObserverStream {
    Live(Box<StreamAdapter>),
    Null(NullStream),
}

impl ObserverStream {
    /// Send with one retry on failure, per the transport error policy:
    /// 1-second backoff, then log and drop rather than abort the agent.
    pub async fn send(&mut self, signal: &ModerationSignal) {
        match self {
            ObserverStream::Live(adapter) => {
                if let Err(e) = adapter.send_signal(signal).await {
                    error!(error = %e, "observer stream send failed, retrying once");
                    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                    if let Err(e) = adapter.send_signal(signal).await {
                        error!(error = %e, "observer stream send failed again, dropping signal");
                    }
                }
            }
            ObserverStream::Null(null) => null.send_signal(signal.clone()),
        }
    }
}
