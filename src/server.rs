use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use crate::broker::Broker;
use crate::handlers;
use crate::heartbeat;
use crate::session::Session;

pub async fn run(
    broker: Arc<Broker>,
    addr: &str,
    heartbeat_interval: Duration,
    heartbeat_timeout: Duration,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    eprintln!("nimbus: listening on {addr}");
    serve(listener, broker, heartbeat_interval, heartbeat_timeout).await
}

/// Accepts and serves connections on an already-bound listener. Split
/// out from `run` so tests can bind to an ephemeral port (`127.0.0.1:0`)
/// and learn the real port via `TcpListener::local_addr` before serving.
pub async fn serve(
    listener: TcpListener,
    broker: Arc<Broker>,
    heartbeat_interval: Duration,
    heartbeat_timeout: Duration,
) -> std::io::Result<()> {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                eprintln!("nimbus: accept error: {e}");
                continue;
            }
        };
        let broker = Arc::clone(&broker);
        tokio::spawn(handle_connection(stream, peer, broker, heartbeat_interval, heartbeat_timeout));
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    broker: Arc<Broker>,
    heartbeat_interval: Duration,
    heartbeat_timeout: Duration,
) {
    let _ = stream.set_nodelay(true);

    let id = broker.next_session_id();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Vec<u8>>(broker.max_backlog());
    let session = Session::new(id, peer.to_string(), outbound_tx);

    broker.register(Arc::clone(&session));
    eprintln!("nimbus: client connected: {peer} (session {id})");

    tokio::spawn(heartbeat::supervise(
        Arc::clone(&broker),
        Arc::clone(&session),
        heartbeat_interval,
        heartbeat_timeout,
    ));

    let mut reader = BufReader::new(stream);
    let mut line = String::new();

    loop {
        line.clear();
        tokio::select! {
            biased;

            _ = session.closed() => break,

            maybe_bytes = outbound_rx.recv() => {
                match maybe_bytes {
                    Some(bytes) => {
                        if reader.write_all(&bytes).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }

            result = reader.read_line(&mut line) => {
                match result {
                    Ok(0) => break,
                    Ok(_) => {
                        let trimmed = line.trim();
                        if !trimmed.is_empty() {
                            broker.touch(id);
                            handlers::dispatch(&broker, &session, trimmed, &mut reader).await;
                        }
                    }
                    Err(_) => break,
                }
            }
        }
    }

    broker.unregister(id);
    eprintln!("nimbus: client disconnected: {peer} (session {id})");
}
