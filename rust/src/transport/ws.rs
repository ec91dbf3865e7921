// WebSocket implementation of the duplex channel (JSON envelope frames).

use futures_util::{SinkExt, StreamExt};
use reqwest::Url;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;

use super::{
    ConnectParams, DuplexHandle, DuplexTransport, Envelope, EventCallback, Listeners,
    TransportError, CONNECT_ERROR_EVENT, CONNECT_EVENT, DISCONNECT_EVENT,
};

#[derive(Debug, Clone, Default)]
pub struct WsTransport;

impl DuplexTransport for WsTransport {
    fn connect(
        &self,
        runtime: &tokio::runtime::Runtime,
        params: &ConnectParams,
    ) -> Result<Box<dyn DuplexHandle>, TransportError> {
        let url = channel_url(params)?;
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<String>();
        let (close_tx, close_rx) = oneshot::channel::<()>();

        Ok(Box::new(WsHandle {
            listeners: Listeners::default(),
            outbound_tx,
            close_tx: Some(close_tx),
            pending: Some(PendingSocket {
                runtime: runtime.handle().clone(),
                url,
                outbound_rx,
                close_rx,
            }),
        }))
    }
}

/// Socket task inputs held until `start`.
struct PendingSocket {
    runtime: tokio::runtime::Handle,
    url: Url,
    outbound_rx: mpsc::UnboundedReceiver<String>,
    close_rx: oneshot::Receiver<()>,
}

struct WsHandle {
    listeners: Listeners,
    outbound_tx: mpsc::UnboundedSender<String>,
    close_tx: Option<oneshot::Sender<()>>,
    pending: Option<PendingSocket>,
}

impl DuplexHandle for WsHandle {
    fn on(&mut self, event: &str, callback: EventCallback) {
        self.listeners.register(event, callback);
    }

    fn start(&mut self) {
        // Taken once; a closed handle has already dropped it.
        let Some(pending) = self.pending.take() else {
            return;
        };
        tracing::debug!(url = %redacted(&pending.url), "ws connect scheduled");
        pending.runtime.spawn(run_socket(
            pending.url,
            self.listeners.clone(),
            pending.outbound_rx,
            pending.close_rx,
        ));
    }

    fn emit(&self, event: &str, payload: serde_json::Value) -> Result<(), TransportError> {
        if self.close_tx.is_none() {
            return Err(TransportError::Closed);
        }
        let frame = serde_json::to_string(&Envelope {
            event: event.to_string(),
            data: payload,
        })
        .map_err(|e| TransportError::Encode(e.to_string()))?;
        self.outbound_tx
            .send(frame)
            .map_err(|_| TransportError::Closed)
    }

    fn disconnect(&mut self) {
        // Listeners first: nothing may fire once the close is requested.
        self.listeners.clear();
        self.pending = None;
        if let Some(close) = self.close_tx.take() {
            let _ = close.send(());
        }
    }
}

impl Drop for WsHandle {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Map the configured server URL onto a ws(s) URL carrying the query params.
pub(crate) fn channel_url(params: &ConnectParams) -> Result<Url, TransportError> {
    let invalid = |reason: String| TransportError::InvalidUrl {
        url: params.server_url.clone(),
        reason,
    };
    let mut url = Url::parse(&params.server_url).map_err(|e| invalid(e.to_string()))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(invalid(format!("unsupported scheme {other}"))),
    };
    url.set_scheme(scheme)
        .map_err(|_| invalid("cannot switch scheme".to_string()))?;
    if !params.query.is_empty() {
        url.query_pairs_mut().extend_pairs(params.query.iter());
    }
    Ok(url)
}

fn redacted(url: &Url) -> String {
    let mut shown = url.clone();
    shown.set_query(None);
    shown.to_string()
}

async fn run_socket(
    url: Url,
    listeners: Listeners,
    mut outbound: mpsc::UnboundedReceiver<String>,
    mut close: oneshot::Receiver<()>,
) {
    let stream = tokio::select! {
        _ = &mut close => return,
        res = tokio_tungstenite::connect_async(url.as_str()) => match res {
            Ok((stream, _)) => stream,
            Err(e) => {
                tracing::warn!(%e, "ws connect failed");
                listeners.dispatch(
                    CONNECT_ERROR_EVENT,
                    serde_json::json!({ "message": e.to_string() }),
                );
                return;
            }
        },
    };

    listeners.dispatch(CONNECT_EVENT, serde_json::Value::Null);
    let (mut sink, mut frames) = stream.split();

    loop {
        tokio::select! {
            _ = &mut close => {
                let _ = sink.send(Message::Close(None)).await;
                return;
            }
            out = outbound.recv() => {
                let Some(text) = out else {
                    let _ = sink.send(Message::Close(None)).await;
                    return;
                };
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    tracing::warn!(%e, "ws send failed");
                    break;
                }
            }
            frame = frames.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<Envelope>(text.as_str()) {
                        Ok(env) => {
                            if !listeners.dispatch(&env.event, env.data) {
                                tracing::trace!(event = %env.event, "ws frame without listener");
                            }
                        }
                        Err(e) => tracing::warn!(%e, "ws frame is not an envelope"),
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(%e, "ws receive failed");
                    break;
                }
            },
        }
    }

    listeners.dispatch(DISCONNECT_EVENT, serde_json::Value::Null);
}
