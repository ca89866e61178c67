//! Loopback receiver for the authorization redirect.
//!
//! The browser is sent back to `http://localhost:<port><path>?code=..&state=..`;
//! a one-shot listener on that port answers the request with a small HTML
//! page and hands the code back to the caller.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use tracing::debug;

use super::ProviderError;

/// How long to wait for the browser before giving up.
pub const CALLBACK_TIMEOUT: Duration = Duration::from_secs(120);

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What the redirect carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirect {
    Code(String),
    /// The provider redirected with `error` (e.g. consent denied).
    Denied(String),
    StateMismatch,
    /// Not the callback path, or no code at all.
    Invalid,
}

impl Redirect {
    /// Converts the redirect into the authorization code.
    ///
    /// # Errors
    /// Returns a provider error for anything but a code.
    pub fn into_code(self) -> Result<String, ProviderError> {
        match self {
            Redirect::Code(code) => Ok(code),
            Redirect::Denied(reason) => Err(ProviderError::Failed(reason)),
            Redirect::StateMismatch => Err(ProviderError::StateMismatch),
            Redirect::Invalid => Err(ProviderError::Failed(
                "Invalid authorization response".to_string(),
            )),
        }
    }
}

/// One-shot listener bound to the redirect port.
#[derive(Debug)]
pub struct CallbackListener {
    listener: TcpListener,
    path: String,
}

impl CallbackListener {
    /// Binds `127.0.0.1:<port>`. Port 0 picks a free port.
    ///
    /// # Errors
    /// Returns an error if the port is taken.
    pub fn bind(port: u16, path: &str) -> std::io::Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", port))?;
        listener.set_nonblocking(true)?;
        Ok(Self {
            listener,
            path: path.to_string(),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Blocks until one request arrives or `timeout` elapses.
    ///
    /// Returns `None` on timeout.
    pub fn wait(self, expected_state: &str, timeout: Duration) -> Option<Redirect> {
        let (tx, rx) = mpsc::channel::<Option<Redirect>>();
        let expected_state = expected_state.to_string();
        let Self { listener, path } = self;

        std::thread::spawn(move || {
            let start = Instant::now();
            loop {
                match listener.accept() {
                    Ok((mut stream, _)) => {
                        let _ = stream.set_nonblocking(false);
                        let mut buffer = [0u8; 4096];
                        let read = stream.read(&mut buffer).unwrap_or(0);
                        let request = String::from_utf8_lossy(&buffer[..read]);
                        let redirect = parse_redirect_request(&request, &path, &expected_state);
                        debug!(?redirect, "authorization redirect received");
                        let response = match redirect {
                            Redirect::Code(_) => success_response(),
                            _ => error_response(),
                        };
                        let _ = stream.write_all(response.as_bytes());
                        let _ = tx.send(Some(redirect));
                        break;
                    }
                    Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                        if start.elapsed() > timeout {
                            let _ = tx.send(None);
                            break;
                        }
                        std::thread::sleep(POLL_INTERVAL);
                    }
                    Err(_) => {
                        let _ = tx.send(None);
                        break;
                    }
                }
            }
        });

        rx.recv_timeout(timeout + POLL_INTERVAL).ok().flatten()
    }
}

/// Parses the raw HTTP request line of a redirect.
pub fn parse_redirect_request(request: &str, callback_path: &str, expected_state: &str) -> Redirect {
    let Some(target) = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
    else {
        return Redirect::Invalid;
    };
    let Ok(url) = url::Url::parse(&format!("http://localhost{target}")) else {
        return Redirect::Invalid;
    };
    if url.path() != callback_path {
        return Redirect::Invalid;
    }

    let param = |name: &str| {
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.to_string())
    };

    if param("state").as_deref() != Some(expected_state) {
        return Redirect::StateMismatch;
    }
    if let Some(error) = param("error") {
        return Redirect::Denied(param("error_description").unwrap_or(error));
    }
    match param("code") {
        Some(code) if !code.is_empty() => Redirect::Code(code),
        _ => Redirect::Invalid,
    }
}

/// Parses a pasted authorization input into code + optional state.
///
/// Accepts a full redirect URL, a bare query string, or the code itself.
pub fn parse_authorization_input(input: &str) -> (Option<String>, Option<String>) {
    let value = input.trim();
    if value.is_empty() {
        return (None, None);
    }

    let find = |pairs: &[(String, String)], key: &str| {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    };

    if let Ok(url) = url::Url::parse(value) {
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        return (find(&pairs, "code"), find(&pairs, "state"));
    }

    if value.contains("code=") {
        let pairs: Vec<(String, String)> = url::form_urlencoded::parse(value.as_bytes())
            .into_owned()
            .collect();
        return (find(&pairs, "code"), find(&pairs, "state"));
    }

    (Some(value.to_string()), None)
}

fn success_response() -> String {
    let body = "<!doctype html><html><head><meta charset=\"utf-8\" /><title>FDRZ sign-in</title></head><body><h3>Signed in</h3><p>Return to your terminal to continue.</p></body></html>";
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    )
}

fn error_response() -> String {
    let body = "<!doctype html><html><head><meta charset=\"utf-8\" /><title>FDRZ sign-in</title></head><body><h3>Sign-in failed</h3><p>Return to your terminal and paste the redirect URL.</p></body></html>";
    format!(
        "HTTP/1.1 400 Bad Request\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    )
}
