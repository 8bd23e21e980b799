//! Client for the parley chat service: unary HTTP calls plus a subscription
//! stream adapter that republishes delivered messages onto a local channel,
//! decoupling network receipt from application consumption.

use futures_util::StreamExt;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsFrame;
use tracing::debug;

use parley_types::api::{SendMessageRequest, SendMessageResponse, UsersResponse};
use parley_types::{Message, User};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server rejected the call with {0}")]
    Status(reqwest::StatusCode),

    #[error("websocket failure: {0}")]
    Ws(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("cannot decode stream frame: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid server url: {0}")]
    BadUrl(String),
}

pub struct Client {
    http: reqwest::Client,
    base_url: String,
}

impl Client {
    /// `base_url` is the server root, e.g. `http://127.0.0.1:4050`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn get_users(&self) -> Result<Vec<User>, ClientError> {
        let resp = self
            .http
            .get(format!("{}/users", self.base_url))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ClientError::Status(resp.status()));
        }
        Ok(resp.json::<UsersResponse>().await?.users)
    }

    pub async fn create_user(&self, user: &User) -> Result<(), ClientError> {
        let resp = self
            .http
            .post(format!("{}/users", self.base_url))
            .json(user)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ClientError::Status(resp.status()));
        }
        Ok(())
    }

    /// Send a message; the server stamps the creation time. Returns the
    /// server's receipt string.
    pub async fn send_message(
        &self,
        login_from: &str,
        login_to: &str,
        body: &str,
    ) -> Result<String, ClientError> {
        let req = SendMessageRequest {
            login_from: login_from.into(),
            login_to: login_to.into(),
            body: body.into(),
        };
        let resp = self
            .http
            .post(format!("{}/messages", self.base_url))
            .json(&req)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ClientError::Status(resp.status()));
        }
        Ok(resp.json::<SendMessageResponse>().await?.status)
    }

    /// Open a subscription stream for `login`. Messages arrive on the
    /// returned [`Subscription`] as the server delivers them.
    pub async fn subscribe(&self, login: &str) -> Result<Subscription, ClientError> {
        let url = subscribe_url(&self.base_url, login)?;
        let (stream, _) = connect_async(url.as_str()).await?;
        Ok(Subscription::spawn(stream))
    }
}

fn subscribe_url(base_url: &str, login: &str) -> Result<reqwest::Url, ClientError> {
    // http -> ws, https -> wss
    let ws_base = base_url.replacen("http", "ws", 1);
    let mut url = reqwest::Url::parse(&format!("{ws_base}/subscribe"))
        .map_err(|e| ClientError::BadUrl(e.to_string()))?;
    // query_pairs encodes the login, so '&', '#' and spaces survive the trip
    url.query_pairs_mut().append_pair("login", login);
    Ok(url)
}

/// One open subscription. A background task receives frames off the socket
/// and forwards each decoded message into an unbounded channel; the
/// application drains the channel at its own pace.
///
/// A clean server close ends the channel (`next()` returns `None`) — the
/// distinct "no more messages for this subscription" signal. Any other
/// receive or decode failure is handed to the consumer as an `Err` item and
/// then the channel closes; nothing here terminates the process.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Result<Message, ClientError>>,
    task: JoinHandle<()>,
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

impl Subscription {
    fn spawn(mut stream: WsStream) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(WsFrame::Text(text)) => match serde_json::from_str::<Message>(text.as_str()) {
                        Ok(message) => {
                            if tx.send(Ok(message)).is_err() {
                                // Consumer dropped the subscription.
                                break;
                            }
                        }
                        Err(e) => {
                            // A frame we cannot decode means the stream is
                            // broken; surface it and stop.
                            let _ = tx.send(Err(ClientError::Decode(e)));
                            break;
                        }
                    },
                    Ok(WsFrame::Close(_)) => break,
                    Ok(_) => {} // ping/pong
                    Err(e) => {
                        let _ = tx.send(Err(ClientError::Ws(e)));
                        break;
                    }
                }
            }
            debug!("subscription stream ended");
        });
        Self { rx, task }
    }

    /// Next delivered message, or `None` once the stream has terminated.
    pub async fn next(&mut self) -> Option<Result<Message, ClientError>> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
