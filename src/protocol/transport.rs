//! NDJSON-over-TCP transport: one [`Request`]/[`Response`] pair per line.
//!
//! Each orchestrator-to-worker link is a single persistent connection. RPC
//! calls are serialized through the client's internal mutex, which mirrors
//! the worker's own single-threaded-per-model constraint (see §5 of the
//! design notes) rather than fighting it with a connection pool.

use crate::error::{CoordinatorError, Result};
use crate::protocol::messages::{Request, Response, ResponseBody};
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Framed, LinesCodec};

type Conn = Framed<TcpStream, LinesCodec>;

/// Client half of the transport: one call in flight at a time, matching the
/// worker's single forward-execution thread.
pub struct RpcClient {
    conn: tokio::sync::Mutex<Conn>,
}

impl RpcClient {
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let conn = Framed::new(stream, LinesCodec::new_with_max_length(64 * 1024 * 1024));
        Ok(Self {
            conn: tokio::sync::Mutex::new(conn),
        })
    }

    pub async fn call(&self, request: Request) -> Result<ResponseBody> {
        let mut conn = self.conn.lock().await;
        let line = serde_json::to_string(&request)?;
        conn.send(line)
            .await
            .map_err(|e| CoordinatorError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
        let reply = conn
            .next()
            .await
            .ok_or_else(|| CoordinatorError::WorkerFault("connection closed".into()))?
            .map_err(|e| CoordinatorError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
        match serde_json::from_str::<Response>(&reply)? {
            Response::Ok(body) => Ok(body),
            Response::Err { message } => Err(CoordinatorError::WorkerFault(message)),
        }
    }
}

/// A handler receives one decoded [`Request`] and returns the body to
/// reply with, or an error message for the `Err` envelope.
#[async_trait::async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, request: Request) -> std::result::Result<ResponseBody, String>;
}

/// Runs an accept loop, spawning one task per connection. Each connection
/// processes requests sequentially off its own socket, but the handler
/// itself is shared (and internally mutex-guarded) across connections,
/// since the underlying model is the true point of serialization.
pub async fn serve(addr: &str, handler: std::sync::Arc<dyn RequestHandler>) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "worker listening");
    serve_listener(listener, handler).await
}

/// Same accept loop as [`serve`], but over an already-bound listener. Lets
/// callers bind to `127.0.0.1:0` and read back the OS-assigned port before
/// handing the listener off, which `serve` itself has no way to report.
pub async fn serve_listener(listener: TcpListener, handler: std::sync::Arc<dyn RequestHandler>) -> Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        let handler = handler.clone();
        tokio::spawn(async move {
            if let Err(err) = serve_connection(stream, handler).await {
                tracing::warn!(%peer, error = %err, "connection closed with error");
            }
        });
    }
}

async fn serve_connection(stream: TcpStream, handler: std::sync::Arc<dyn RequestHandler>) -> Result<()> {
    let mut conn = Framed::new(stream, LinesCodec::new_with_max_length(64 * 1024 * 1024));
    while let Some(line) = conn.next().await {
        let line = line.map_err(|e| CoordinatorError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => match handler.handle(request).await {
                Ok(body) => Response::Ok(body),
                Err(message) => Response::Err { message },
            },
            Err(e) => Response::Err {
                message: format!("malformed request: {e}"),
            },
        };
        let reply = serde_json::to_string(&response)?;
        conn.send(reply)
            .await
            .map_err(|e| CoordinatorError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
    }
    Ok(())
}
