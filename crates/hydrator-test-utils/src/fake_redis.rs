//! A minimal in-process Redis stand-in.
//!
//! [`FakeRedis`] speaks just enough RESP2 for the TTL cache: `PING`, `GET`,
//! `SETEX` and `FLUSHDB`. Any other command gets `+OK`. It can be switched
//! into an outage mode where every command after the connection handshake
//! answers with an error, to exercise runtime fallbacks.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

#[derive(Default)]
struct State {
    data: Mutex<HashMap<String, String>>,
    commands: Mutex<Vec<Vec<String>>>,
    failing: AtomicBool,
}

impl State {
    fn reply(&self, args: Vec<String>) -> Vec<u8> {
        let Some(name) = args.first().map(|a| a.to_uppercase()) else {
            return b"-ERR empty command\r\n".to_vec();
        };
        self.commands.lock().expect("commands lock").push(args.clone());

        // The client's handshake must still succeed during an outage.
        if self.failing.load(Ordering::SeqCst) && name != "CLIENT" {
            return b"-ERR simulated outage\r\n".to_vec();
        }

        let mut data = self.data.lock().expect("data lock");
        match (name.as_str(), args.as_slice()) {
            ("PING", _) => b"+PONG\r\n".to_vec(),
            ("GET", [_, key]) => match data.get(key) {
                Some(value) => format!("${}\r\n{value}\r\n", value.len()).into_bytes(),
                None => b"$-1\r\n".to_vec(),
            },
            ("SETEX", [_, key, _secs, value]) => {
                data.insert(key.clone(), value.clone());
                b"+OK\r\n".to_vec()
            }
            ("FLUSHDB", _) => {
                data.clear();
                b"+OK\r\n".to_vec()
            }
            ("GET" | "SETEX", _) => b"-ERR wrong number of arguments\r\n".to_vec(),
            _ => b"+OK\r\n".to_vec(),
        }
    }
}

/// A fake Redis server on an ephemeral localhost port, stopped on drop.
pub struct FakeRedis {
    addr: SocketAddr,
    state: Arc<State>,
    task: JoinHandle<()>,
}

impl FakeRedis {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind fake redis");
        let addr = listener.local_addr().expect("fake redis has no address");
        let state = Arc::new(State::default());

        let shared = Arc::clone(&state);
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve_connection(stream, Arc::clone(&shared)));
            }
        });

        Self { addr, state, task }
    }

    /// Connection URL for this server.
    pub fn url(&self) -> String {
        format!("redis://{}", self.addr)
    }

    /// Start or stop answering commands with errors.
    pub fn set_failing(&self, failing: bool) {
        self.state.failing.store(failing, Ordering::SeqCst);
    }

    /// Raw value stored under `key`.
    pub fn stored(&self, key: &str) -> Option<String> {
        self.state.data.lock().expect("data lock").get(key).cloned()
    }

    /// Every command received so far, as argument lists.
    pub fn commands(&self) -> Vec<Vec<String>> {
        self.state.commands.lock().expect("commands lock").clone()
    }

    /// Commands received whose name is `name` (case-insensitive).
    pub fn commands_named(&self, name: &str) -> Vec<Vec<String>> {
        self.commands()
            .into_iter()
            .filter(|args| args.first().is_some_and(|a| a.eq_ignore_ascii_case(name)))
            .collect()
    }
}

impl Drop for FakeRedis {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve_connection(stream: TcpStream, state: Arc<State>) {
    let (read, mut write) = stream.into_split();
    let mut reader = BufReader::new(read);
    while let Ok(Some(args)) = read_command(&mut reader).await {
        if write.write_all(&state.reply(args)).await.is_err() {
            break;
        }
    }
}

/// Read one RESP array of bulk strings. `None` on a clean EOF.
async fn read_command<R>(reader: &mut R) -> io::Result<Option<Vec<String>>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    let count = header(&line, '*')?;

    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        line.clear();
        reader.read_line(&mut line).await?;
        let len = header(&line, '$')?;
        let mut buf = vec![0; len + 2];
        reader.read_exact(&mut buf).await?;
        buf.truncate(len);
        args.push(String::from_utf8_lossy(&buf).into_owned());
    }
    Ok(Some(args))
}

fn header(line: &str, marker: char) -> io::Result<usize> {
    line.trim_end()
        .strip_prefix(marker)
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, format!("bad header {line:?}")))
}
