//! End-to-end runs: a real UDP listener wired through the whole
//! pipeline to a real (scripted) upstream on the loopback interface.

use crate::config::ConfigFile;
use crate::enums::Rcode;
use crate::message::Message;
use crate::resolver::NoopHandler;
use crate::service::Service;
use crate::tests::harness::{a_query, a_record};
use concread::cowcell::asynch::CowCell;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

/// An upstream that answers every query with NXDOMAIN and counts how
/// often it was asked.
async fn spawn_nxdomain_upstream() -> (SocketAddr, Arc<AtomicUsize>) {
    let sock = UdpSocket::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind fake upstream");
    let addr = sock.local_addr().expect("local addr");
    let queries = Arc::new(AtomicUsize::new(0));
    let task_queries = queries.clone();
    tokio::spawn(async move {
        let mut buf = [0u8; 512];
        loop {
            let (len, from) = match sock.recv_from(&mut buf).await {
                Ok(value) => value,
                Err(_) => break,
            };
            task_queries.fetch_add(1, Ordering::SeqCst);
            let query = match Message::from_bytes(&buf[..len]) {
                Ok(value) => value,
                Err(_) => continue,
            };
            let reply = query.make_error(Rcode::NameError);
            let _ = sock
                .send_to(&reply.as_bytes().expect("Failed to serialize"), from)
                .await;
        }
    });
    (addr, queries)
}

fn test_config(udp_port: u16, upstream: SocketAddr) -> ConfigFile {
    ConfigFile {
        address: "127.0.0.1".to_string(),
        udp_port,
        upstream_servers: vec![upstream.to_string()],
        use_system_resolvers: false,
        upstream_timeout_ms: 1000,
        ..ConfigFile::default()
    }
}

/// Sends the query until the listener answers; the listener task binds
/// its socket a moment after start() returns.
async fn exchange(server: SocketAddr, query_bytes: &[u8]) -> Vec<u8> {
    let client = UdpSocket::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind client socket");
    let mut buf = [0u8; 512];
    for _ in 0..20 {
        client
            .send_to(query_bytes, server)
            .await
            .expect("Failed to send query");
        if let Ok(Ok((len, _))) =
            timeout(Duration::from_millis(250), client.recv_from(&mut buf)).await
        {
            return buf[..len].to_vec();
        }
    }
    panic!("no response from {server} after 20 attempts");
}

#[tokio::test]
/// The NXDOMAIN round trip: the first query reaches upstream, the
/// second is served from the negative cache without upstream contact.
async fn test_udp_nxdomain_round_trip() {
    let (upstream_addr, upstream_queries) = spawn_nxdomain_upstream().await;
    let config = CowCell::new(test_config(25953, upstream_addr));
    let service = Service::build(config, Box::new(NoopHandler))
        .await
        .expect("Failed to build service");
    let servers = service.start().await.expect("Failed to start service");
    let server_addr: SocketAddr = "127.0.0.1:25953".parse().expect("test addr parses");

    let query_bytes = a_query(0x5151, "nope.example")
        .as_bytes()
        .expect("Failed to serialize query");
    let reply = Message::from_bytes(&exchange(server_addr, &query_bytes).await)
        .expect("Failed to parse reply");
    assert_eq!(reply.id(), 0x5151);
    assert_eq!(reply.rcode(), Rcode::NameError);
    assert!(reply.is_response());
    // let any retried duplicates of the first query drain before
    // snapshotting the upstream counter
    tokio::time::sleep(Duration::from_millis(300)).await;
    let upstream_calls = upstream_queries.load(Ordering::SeqCst);
    assert!(upstream_calls >= 1);

    let query_bytes = a_query(0x5252, "nope.example")
        .as_bytes()
        .expect("Failed to serialize query");
    let reply = Message::from_bytes(&exchange(server_addr, &query_bytes).await)
        .expect("Failed to parse reply");
    assert_eq!(reply.id(), 0x5252);
    assert_eq!(reply.rcode(), Rcode::NameError);
    // no new upstream traffic: the negative cache answered
    assert_eq!(upstream_queries.load(Ordering::SeqCst), upstream_calls);

    service.shutdown(&servers);
    assert!(service.cache().is_empty());
}

#[tokio::test]
/// A positive answer comes back with the upstream's records and lands
/// in the cache.
async fn test_udp_positive_answer_is_cached() {
    let sock = UdpSocket::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind fake upstream");
    let upstream_addr = sock.local_addr().expect("local addr");
    let upstream_queries = Arc::new(AtomicUsize::new(0));
    let task_queries = upstream_queries.clone();
    tokio::spawn(async move {
        let mut buf = [0u8; 512];
        loop {
            let (len, from) = match sock.recv_from(&mut buf).await {
                Ok(value) => value,
                Err(_) => break,
            };
            task_queries.fetch_add(1, Ordering::SeqCst);
            let query = match Message::from_bytes(&buf[..len]) {
                Ok(value) => value,
                Err(_) => continue,
            };
            let reply = query.make_response(
                vec![a_record("yes.example", 60, [203, 0, 113, 77])],
                vec![],
                vec![],
            );
            let _ = sock
                .send_to(&reply.as_bytes().expect("Failed to serialize"), from)
                .await;
        }
    });

    let config = CowCell::new(test_config(25954, upstream_addr));
    let service = Service::build(config, Box::new(NoopHandler))
        .await
        .expect("Failed to build service");
    let servers = service.start().await.expect("Failed to start service");
    let server_addr: SocketAddr = "127.0.0.1:25954".parse().expect("test addr parses");

    let query_bytes = a_query(0x6161, "yes.example")
        .as_bytes()
        .expect("Failed to serialize query");
    let reply = Message::from_bytes(&exchange(server_addr, &query_bytes).await)
        .expect("Failed to parse reply");
    assert_eq!(reply.id(), 0x6161);
    assert_eq!(reply.rcode(), Rcode::NoError);
    assert_eq!(reply.answers.len(), 1);
    assert_eq!(reply.answers[0].rdata, vec![203, 0, 113, 77]);
    tokio::time::sleep(Duration::from_millis(300)).await;
    let upstream_calls = upstream_queries.load(Ordering::SeqCst);

    // second ask: same answer, no new upstream traffic
    let query_bytes = a_query(0x6262, "yes.example")
        .as_bytes()
        .expect("Failed to serialize query");
    let reply = Message::from_bytes(&exchange(server_addr, &query_bytes).await)
        .expect("Failed to parse reply");
    assert_eq!(reply.id(), 0x6262);
    assert_eq!(reply.answers[0].rdata, vec![203, 0, 113, 77]);
    assert_eq!(upstream_queries.load(Ordering::SeqCst), upstream_calls);

    service.shutdown(&servers);
}
