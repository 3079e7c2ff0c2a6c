use std::sync::Arc;
use std::time::Duration;

use nimbus::broker::Broker;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

async fn start_on(log_dir: &std::path::Path) -> String {
    let broker = Arc::new(Broker::new(log_dir.to_path_buf(), 1000));
    let replayed = nimbus::log_store::replay_all(log_dir).unwrap();
    for (name, messages) in replayed {
        let channel = broker.get_or_create_channel(&name);
        channel.replay(messages);
    }

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(nimbus::server::serve(
        listener,
        broker,
        Duration::from_secs(5),
        Duration::from_secs(300),
    ));
    addr
}

async fn connect(addr: &str) -> BufReader<TcpStream> {
    BufReader::new(TcpStream::connect(addr).await.unwrap())
}

async fn send(stream: &mut BufReader<TcpStream>, line: &str) {
    stream.write_all(line.as_bytes()).await.unwrap();
    stream.write_all(b"\n").await.unwrap();
}

async fn recv(stream: &mut BufReader<TcpStream>) -> String {
    let mut line = String::new();
    stream.read_line(&mut line).await.unwrap();
    line
}

#[tokio::test(flavor = "multi_thread")]
async fn restart_replays_history_from_the_log() {
    let dir = tempfile::tempdir().unwrap();

    let addr1 = start_on(dir.path()).await;
    let mut client = connect(&addr1).await;
    send(&mut client, "PUBLISH general one").await;
    send(&mut client, "PUBLISH general two").await;
    // Give the blocking-pool publish tasks time to sync the log to disk.
    tokio::time::sleep(Duration::from_millis(100)).await;
    drop(client);

    // Simulate a restart: a brand new broker reading the same log_dir.
    let addr2 = start_on(dir.path()).await;
    let mut client = connect(&addr2).await;
    send(&mut client, "GET general 0").await;
    let first = recv(&mut client).await;
    let second = recv(&mut client).await;
    assert!(first.contains("one"));
    assert!(second.contains("two"));
    let ack = recv(&mut client).await;
    assert_eq!(ack, "OK GOT 2 messages\n");
}

#[tokio::test(flavor = "multi_thread")]
async fn retention_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();

    let addr1 = start_on(dir.path()).await;
    let mut client = connect(&addr1).await;
    send(&mut client, "PUBLISH general one").await;
    send(&mut client, "PUBLISH general two").await;
    send(&mut client, "PUBLISH general three").await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    send(&mut client, "RETENTION general 1").await;
    let ack = recv(&mut client).await;
    assert_eq!(ack, "OK RETENTION general 1\n");
    tokio::time::sleep(Duration::from_millis(50)).await;
    drop(client);

    let addr2 = start_on(dir.path()).await;
    let mut client = connect(&addr2).await;
    send(&mut client, "GET general 0").await;
    let only = recv(&mut client).await;
    assert!(only.contains("three"));
    let ack = recv(&mut client).await;
    assert_eq!(ack, "OK GOT 1 messages\n");
}
