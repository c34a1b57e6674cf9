use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

pub(crate) const OK_RESPONSE: &[u8] =
    b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nOK";
pub(crate) const NOT_FOUND_RESPONSE: &[u8] =
    b"HTTP/1.1 404 Not Found\r\nContent-Length: 9\r\nConnection: close\r\n\r\nnot found";
pub(crate) const GARBAGE_RESPONSE: &[u8] = b"this is not http at all\r\n\r\n";

/// Requests seen by a test server, raw head and body as text.
pub(crate) type SeenRequests = Arc<Mutex<Vec<String>>>;

pub(crate) struct TestServer {
    pub(crate) url: String,
    pub(crate) seen: SeenRequests,
    handle: JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Serves `response` to every connection after `delay`.
pub(crate) async fn spawn_server(
    response: &'static [u8],
    delay: Duration,
) -> Result<TestServer, String> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(|err| format!("bind test server failed: {}", err))?;
    let addr = listener
        .local_addr()
        .map_err(|err| format!("server addr failed: {}", err))?;
    let seen: SeenRequests = Arc::new(Mutex::new(Vec::new()));
    let seen_server = Arc::clone(&seen);

    let handle = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let seen = Arc::clone(&seen_server);
            tokio::spawn(async move {
                handle_client(stream, response, delay, &seen).await;
            });
        }
    });

    Ok(TestServer {
        url: format!("http://{}", addr),
        seen,
        handle,
    })
}

/// A URL nothing listens on.
pub(crate) async fn refused_url() -> Result<String, String> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(|err| format!("bind failed: {}", err))?;
    let addr = listener
        .local_addr()
        .map_err(|err| format!("addr failed: {}", err))?;
    drop(listener);
    Ok(format!("http://{}", addr))
}

async fn handle_client(
    mut stream: TcpStream,
    response: &'static [u8],
    delay: Duration,
    seen: &SeenRequests,
) {
    let Some(request) = read_request(&mut stream).await else {
        return;
    };
    if let Ok(mut guard) = seen.lock() {
        guard.push(request);
    }
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    if stream.write_all(response).await.is_err() {
        return;
    }
    drop(stream.shutdown().await);
}

async fn read_request(stream: &mut TcpStream) -> Option<String> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 1024];
    let header_end = loop {
        let read = stream.read(&mut chunk).await.ok()?;
        if read == 0 {
            return None;
        }
        buffer.extend_from_slice(chunk.get(..read)?);
        if let Some(pos) = find_header_end(&buffer) {
            break pos;
        }
    };
    let head = String::from_utf8_lossy(buffer.get(..header_end)?).into_owned();
    let body_len = content_length(&head);
    while buffer.len() < header_end.saturating_add(body_len) {
        let read = stream.read(&mut chunk).await.ok()?;
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(chunk.get(..read)?);
    }
    Some(String::from_utf8_lossy(&buffer).into_owned())
}

fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(4)
        .position(|window| window == b"\r\n\r\n")
        .map(|pos| pos.saturating_add(4))
}

fn content_length(head: &str) -> usize {
    head.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}
