//! Host implementation on a tokio current-thread runtime.
//!
//! Hooks spawn tokio tasks that push `(token, event)` pairs onto one unbounded
//! channel. [`Dispatcher::run`] drains that channel and hands each event to
//! [`Runtime::deliver`], one at a time, on the thread that owns the runtime.

use std::rc::Rc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures_util::StreamExt;
use reqwest::header::{COOKIE, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use tokio::process::Command;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};
use weeslack_core::{Host, Runtime};
use weeslack_types::{
    FutureId, HostEvent, PROCESS_ERROR, PROCESS_RUNNING, ProcessChunk, ProcessOptions,
};

type Delivery = (FutureId, HostEvent);

/// Prefix marking a process command as a URL fetch.
const URL_PREFIX: &str = "url:";

#[derive(Debug)]
pub struct TokioHost {
    handle: Handle,
    events: mpsc::UnboundedSender<Delivery>,
    client: reqwest::Client,
}

/// Receiving side of a [`TokioHost`]'s event channel.
#[derive(Debug)]
pub struct Dispatcher {
    events: mpsc::UnboundedReceiver<Delivery>,
}

impl TokioHost {
    /// Create a host that spawns its work on `handle`.
    #[must_use]
    pub fn new(handle: Handle) -> (Rc<Self>, Dispatcher) {
        let (tx, rx) = mpsc::unbounded_channel();
        let host = Self {
            handle,
            events: tx,
            client: reqwest::Client::new(),
        };
        (Rc::new(host), Dispatcher { events: rx })
    }
}

impl Dispatcher {
    /// Deliver events until no task is waiting for one.
    ///
    /// Returns the number of events delivered. Deliveries the scheduler
    /// rejects are logged and skipped.
    pub async fn run(&mut self, rt: &Runtime) -> usize {
        let mut delivered = 0;
        while !rt.is_idle() {
            let Some((token, event)) = self.events.recv().await else {
                break;
            };
            trace!(token = %token, kind = event.kind(), "dispatching host event");
            match rt.deliver(token, event) {
                Ok(()) => delivered += 1,
                Err(err) => warn!(error = %err, "dropped host event"),
            }
        }
        delivered
    }
}

impl Host for TokioHost {
    fn hook_timer(&self, interval_ms: u64, align_second: u32, max_calls: u32, token: FutureId) {
        let tx = self.events.clone();
        self.handle.spawn(async move {
            let interval = Duration::from_millis(interval_ms);
            tokio::time::sleep(first_delay(interval, align_second)).await;
            let mut fire_count = 1;
            loop {
                if tx.send((token, HostEvent::Timer { fire_count })).is_err() {
                    return;
                }
                if max_calls != 0 && fire_count >= max_calls {
                    return;
                }
                fire_count += 1;
                tokio::time::sleep(interval).await;
            }
        });
    }

    fn hook_process_hashtable(
        &self,
        command: &str,
        options: &ProcessOptions,
        timeout_ms: u64,
        token: FutureId,
    ) {
        let sink = ChunkSink {
            token,
            label: command.to_string(),
            events: self.events.clone(),
        };
        let options = options.clone();
        let work = if let Some(url) = command.strip_prefix(URL_PREFIX) {
            let url = url.to_string();
            let client = self.client.clone();
            let sink = sink.clone();
            futures_util::future::Either::Left(async move {
                fetch_url(&client, &url, &options, &sink).await;
            })
        } else {
            let command = command.to_string();
            let sink = sink.clone();
            futures_util::future::Either::Right(async move {
                run_shell(&command, &sink).await;
            })
        };

        self.handle.spawn(async move {
            if timeout_ms == 0 {
                work.await;
                return;
            }
            if tokio::time::timeout(Duration::from_millis(timeout_ms), work)
                .await
                .is_err()
            {
                debug!(command = %sink.label, timeout_ms, "process hook timed out");
                sink.send(PROCESS_ERROR, String::new(), "timeout".to_string());
            }
        });
    }
}

fn first_delay(interval: Duration, align_second: u32) -> Duration {
    if align_second == 0 {
        return interval;
    }
    let align_ms = u128::from(align_second) * 1000;
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let to_boundary = (align_ms - now_ms % align_ms) as u64;
    interval + Duration::from_millis(to_boundary)
}

#[derive(Debug, Clone)]
struct ChunkSink {
    token: FutureId,
    label: String,
    events: mpsc::UnboundedSender<Delivery>,
}

impl ChunkSink {
    fn send(&self, return_code: i32, stdout: String, stderr: String) {
        let chunk = ProcessChunk::new(self.label.clone(), return_code, stdout, stderr);
        // The receiver is gone only when the dispatcher has shut down.
        let _ = self.events.send((self.token, HostEvent::Process(chunk)));
    }
}

async fn fetch_url(
    client: &reqwest::Client,
    url: &str,
    options: &ProcessOptions,
    sink: &ChunkSink,
) {
    match stream_url(client, url, options, sink).await {
        Ok(()) => sink.send(0, String::new(), String::new()),
        Err(err) => {
            debug!(url, error = %err, "url fetch failed");
            sink.send(1, String::new(), format!("{err:#}"));
        }
    }
}

async fn stream_url(
    client: &reqwest::Client,
    url: &str,
    options: &ProcessOptions,
    sink: &ChunkSink,
) -> anyhow::Result<()> {
    let proxied;
    let client = match proxy_from_options(options)? {
        Some(proxy) => {
            proxied = reqwest::Client::builder().proxy(proxy).build()?;
            &proxied
        }
        None => client,
    };

    let response = client
        .get(url)
        .headers(request_headers(options)?)
        .send()
        .await?;

    if options.get("header").is_some_and(|v| v == "1") {
        sink.send(PROCESS_RUNNING, status_block(&response), String::new());
    }

    let mut stream = response.bytes_stream();
    let mut pending: Vec<u8> = Vec::new();
    while let Some(chunk) = stream.next().await {
        pending.extend_from_slice(&chunk?);
        let text = take_utf8_prefix(&mut pending);
        if !text.is_empty() {
            sink.send(PROCESS_RUNNING, text, String::new());
        }
    }
    if !pending.is_empty() {
        sink.send(
            PROCESS_RUNNING,
            String::from_utf8_lossy(&pending).into_owned(),
            String::new(),
        );
    }
    Ok(())
}

/// Remove and return the longest valid UTF-8 prefix of `buf`, leaving an
/// incomplete trailing sequence in place. Invalid bytes are replaced.
fn take_utf8_prefix(buf: &mut Vec<u8>) -> String {
    let keep_from = match std::str::from_utf8(buf) {
        Ok(_) => buf.len(),
        Err(err) if err.error_len().is_none() => err.valid_up_to(),
        Err(_) => buf.len(),
    };
    let rest = buf.split_off(keep_from);
    let text = String::from_utf8_lossy(buf).into_owned();
    *buf = rest;
    text
}

fn request_headers(options: &ProcessOptions) -> anyhow::Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    if let Some(agent) = options.get("useragent") {
        headers.insert(USER_AGENT, HeaderValue::from_str(agent)?);
    }
    if let Some(cookie) = options.get("cookie").filter(|c| !c.is_empty()) {
        headers.insert(COOKIE, HeaderValue::from_str(cookie)?);
    }
    if let Some(lines) = options.get("httpheader") {
        for line in lines.lines() {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            headers.append(
                HeaderName::from_bytes(name.trim().as_bytes())?,
                HeaderValue::from_str(value.trim())?,
            );
        }
    }
    Ok(headers)
}

fn proxy_from_options(options: &ProcessOptions) -> anyhow::Result<Option<reqwest::Proxy>> {
    let Some(address) = options.get("proxy").filter(|a| !a.is_empty()) else {
        return Ok(None);
    };
    let scheme = options.get("proxytype").map_or("http", String::as_str);
    let port = options.get("proxyport").map_or("", String::as_str);
    let mut proxy = reqwest::Proxy::all(format!("{scheme}://{address}:{port}"))?;
    if let (Some(user), Some(pass)) = (options.get("proxyusername"), options.get("proxypassword"))
    {
        proxy = proxy.basic_auth(user, pass);
    }
    Ok(Some(proxy))
}

fn status_block(response: &reqwest::Response) -> String {
    let version = response.version();
    let version = if version == reqwest::Version::HTTP_2 {
        "HTTP/2"
    } else if version == reqwest::Version::HTTP_3 {
        "HTTP/3"
    } else if version == reqwest::Version::HTTP_10 {
        "HTTP/1.0"
    } else {
        "HTTP/1.1"
    };
    let status = response.status();
    let mut block = format!(
        "{version} {} {}\r\n",
        status.as_u16(),
        status.canonical_reason().unwrap_or("")
    );
    for (name, value) in response.headers() {
        block.push_str(name.as_str());
        block.push_str(": ");
        block.push_str(&String::from_utf8_lossy(value.as_bytes()));
        block.push_str("\r\n");
    }
    block.push_str("\r\n");
    block
}

async fn run_shell(command: &str, sink: &ChunkSink) {
    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .kill_on_drop(true)
        .output()
        .await;
    match output {
        Ok(output) => sink.send(
            output.status.code().unwrap_or(PROCESS_ERROR),
            String::from_utf8_lossy(&output.stdout).into_owned(),
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ),
        Err(err) => sink.send(PROCESS_ERROR, String::new(), err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use weeslack_types::ProcessOptions;

    use super::{first_delay, proxy_from_options, request_headers, take_utf8_prefix};

    #[test]
    fn utf8_prefix_keeps_incomplete_sequence() {
        let snowman = "☃".as_bytes();
        let mut buf = b"ab".to_vec();
        buf.extend_from_slice(&snowman[..2]);
        assert_eq!(take_utf8_prefix(&mut buf), "ab");
        assert_eq!(buf, &snowman[..2]);

        buf.extend_from_slice(&snowman[2..]);
        assert_eq!(take_utf8_prefix(&mut buf), "☃");
        assert!(buf.is_empty());
    }

    #[test]
    fn headers_come_from_transport_options() {
        let options = ProcessOptions::from([
            ("useragent".to_string(), "wee_slack 0.1.0".to_string()),
            ("cookie".to_string(), "d=abc".to_string()),
            (
                "httpheader".to_string(),
                "Authorization: Bearer t\nX-Extra: 1".to_string(),
            ),
        ]);
        let headers = request_headers(&options).unwrap();
        assert_eq!(headers["user-agent"], "wee_slack 0.1.0");
        assert_eq!(headers["cookie"], "d=abc");
        assert_eq!(headers["authorization"], "Bearer t");
        assert_eq!(headers["x-extra"], "1");
    }

    #[test]
    fn proxy_is_optional() {
        assert!(proxy_from_options(&ProcessOptions::new()).unwrap().is_none());
        let options = ProcessOptions::from([
            ("proxy".to_string(), "127.0.0.1".to_string()),
            ("proxyport".to_string(), "1080".to_string()),
            ("proxytype".to_string(), "http".to_string()),
        ]);
        assert!(proxy_from_options(&options).unwrap().is_some());
    }

    #[test]
    fn unaligned_timer_waits_interval() {
        let interval = Duration::from_millis(250);
        assert_eq!(first_delay(interval, 0), interval);
        let aligned = first_delay(interval, 1);
        assert!(aligned > interval);
        assert!(aligned <= interval + Duration::from_secs(1));
    }
}
