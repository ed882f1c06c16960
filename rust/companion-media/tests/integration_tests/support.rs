//! Local stand-in for the media service.
//!
//! Every POST is checked against the expected credentials with the same
//! signing code the client uses; requests that fail verification get a 401
//! shaped like the real service's. Replies are scripted per `Action`: queued
//! replies are served in order and the last one repeats. GET requests serve
//! registered files, so the same server doubles as the media CDN.

use std::collections::{HashMap, VecDeque};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use companion_media::{Credentials, DEFAULT_REGION, DEFAULT_SERVICE, ServiceConfig};
use companion_signing::{Received, Request as SignedRequest, Scope, Signer};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::TcpListener;

pub const ACCESS_KEY: &str = "AKTESTFAKESERVICE";
pub const SECRET_KEY: &str = "fake-service-secret";

pub fn credentials() -> Credentials {
    Credentials::new(ACCESS_KEY, SECRET_KEY)
}

#[derive(Clone)]
struct Reply {
    status: StatusCode,
    body: Bytes,
}

#[derive(Default)]
struct Script {
    replies: HashMap<String, VecDeque<Reply>>,
    files: HashMap<String, Bytes>,
    requests: Vec<(String, Value)>,
    rejected: usize,
}

/// A running fake media service.
pub struct FakeMediaService {
    addr: SocketAddr,
    script: Arc<Mutex<Script>>,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
}

impl FakeMediaService {
    /// Start a service that accepts requests signed with [`credentials`].
    pub async fn start() -> anyhow::Result<Self> {
        let signer = Arc::new(Signer::new(
            credentials(),
            Scope::new(DEFAULT_REGION, DEFAULT_SERVICE),
        ));
        let script = Arc::new(Mutex::new(Script::default()));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, mut shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let accept_script = script.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    result = listener.accept() => {
                        if let Ok((stream, _)) = result {
                            let signer = signer.clone();
                            let script = accept_script.clone();
                            let service = service_fn(move |request| {
                                handle(signer.clone(), script.clone(), request)
                            });
                            tokio::spawn(async move {
                                let _ = http1::Builder::new()
                                    .serve_connection(TokioIo::new(stream), service)
                                    .await;
                            });
                        }
                    }
                }
            }
        });

        Ok(Self {
            addr,
            script,
            shutdown_tx,
        })
    }

    /// Base URL of the service.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// URL under which a file registered with [`serve_file`] is available.
    pub fn file_url(&self, path: &str) -> String {
        format!("{}/{}", self.url(), path.trim_start_matches('/'))
    }

    /// Client configuration pointing at this service.
    pub fn config(&self) -> ServiceConfig {
        ServiceConfig::new(self.url()).with_timeout(5)
    }

    /// Queue a JSON reply for `action`.
    pub fn respond(&self, action: &str, status: u16, body: Value) {
        self.respond_raw(action, status, body.to_string());
    }

    /// Queue a reply with an arbitrary body for `action`.
    pub fn respond_raw(&self, action: &str, status: u16, body: impl Into<String>) {
        let reply = Reply {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            body: Bytes::from(body.into()),
        };
        self.script
            .lock()
            .replies
            .entry(action.to_string())
            .or_default()
            .push_back(reply);
    }

    /// Serve `content` on GET `path`.
    pub fn serve_file(&self, path: &str, content: impl Into<Bytes>) {
        self.script
            .lock()
            .files
            .insert(path.trim_start_matches('/').to_string(), content.into());
    }

    /// Number of signed calls made to `action`.
    pub fn calls(&self, action: &str) -> usize {
        self.script
            .lock()
            .requests
            .iter()
            .filter(|(name, _)| name == action)
            .count()
    }

    /// Number of signed calls of any action.
    pub fn total_calls(&self) -> usize {
        self.script.lock().requests.len()
    }

    /// Number of calls refused for a bad signature.
    pub fn rejected(&self) -> usize {
        self.script.lock().rejected
    }

    /// JSON bodies sent to `action`, oldest first.
    pub fn bodies(&self, action: &str) -> Vec<Value> {
        self.script
            .lock()
            .requests
            .iter()
            .filter(|(name, _)| name == action)
            .map(|(_, body)| body.clone())
            .collect()
    }

    /// Stop the server.
    pub fn stop(self) {
        let _ = self.shutdown_tx.send(());
    }
}

async fn handle(
    signer: Arc<Signer>,
    script: Arc<Mutex<Script>>,
    request: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = request.method().clone();
    let path = request.uri().path().trim_start_matches('/').to_string();
    let query = request.uri().query().unwrap_or_default().to_string();
    let headers = request.headers().clone();
    let body = match request.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => Bytes::new(),
    };

    if method == Method::GET {
        let file = script.lock().files.get(&path).cloned();
        return Ok(match file {
            Some(content) => reply(StatusCode::OK, content),
            None => reply(StatusCode::NOT_FOUND, Bytes::from_static(b"not found")),
        });
    }

    let header = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());
    let host = header("host").unwrap_or_default();
    let received = Received {
        request: SignedRequest::new(method.as_str(), host, &query, &body),
        date: header("x-date"),
        content_sha256: header("x-content-sha256"),
        authorization: header("authorization"),
    };

    if let Err(error) = signer.verify(&received) {
        script.lock().rejected += 1;
        let body = json!({
            "ResponseMetadata": {
                "Error": { "Code": "SignatureDoesNotMatch", "Message": error.to_string() }
            }
        });
        return Ok(reply(StatusCode::UNAUTHORIZED, Bytes::from(body.to_string())));
    }

    let action = query
        .split('&')
        .find_map(|pair| pair.strip_prefix("Action="))
        .unwrap_or_default()
        .to_string();
    let sent = serde_json::from_slice(&body).unwrap_or(Value::Null);

    let mut script = script.lock();
    script.requests.push((action.clone(), sent));
    let scripted = script.replies.get_mut(&action).and_then(|queue| {
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    });

    Ok(match scripted {
        Some(Reply { status, body }) => reply(status, body),
        None => reply(
            StatusCode::NOT_FOUND,
            Bytes::from(json!({ "message": format!("no reply scripted for {action}") }).to_string()),
        ),
    })
}

fn reply(status: StatusCode, body: Bytes) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
}
