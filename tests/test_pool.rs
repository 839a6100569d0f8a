mod common;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use common::{MockSocket, RecordingHandler, peer};
use simpleweb::http::connection::Connection;
use simpleweb::http::handler::RequestHandler;
use simpleweb::server::pool::{ConnectionPool, PoolHandle, PoolSettings};
use tokio::time::{Instant, advance};

const TIMEOUT: Duration = Duration::from_secs(5);

fn pool(handler: &Arc<RecordingHandler>) -> (ConnectionPool<MockSocket>, PoolHandle<MockSocket>) {
    let settings = PoolSettings {
        poll_interval: Duration::from_millis(1),
        idle_timeout: TIMEOUT,
    };
    let handler: Arc<dyn RequestHandler> = handler.clone();
    ConnectionPool::new(settings, handler)
}

fn add(handle: &PoolHandle<MockSocket>, port: u16) -> MockSocket {
    let socket = MockSocket::new();
    handle.add(Connection::new(socket.clone(), peer(port))).unwrap();
    socket
}

#[test]
fn test_default_settings() {
    let settings = PoolSettings::default();
    assert_eq!(settings.poll_interval, Duration::from_millis(1));
    assert_eq!(settings.idle_timeout, Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_pending_connections_are_admitted_on_tick() {
    let handler = RecordingHandler::new();
    let (mut pool, handle) = pool(&handler);

    add(&handle, 5000);
    add(&handle, 5001);
    assert_eq!(pool.active_len(), 0);

    pool.tick();
    assert_eq!(pool.active_len(), 2);
    assert_eq!(pool.admit_pending(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_tick_delivers_requests_from_all_connections() {
    let handler = RecordingHandler::new();
    let (mut pool, handle) = pool(&handler);

    add(&handle, 5000).push(b"GET /a HTTP/1.1\r\n\r\n");
    add(&handle, 5001).push(b"GET /b HTTP/1.1\r\n\r\n");
    pool.tick();

    let mut uris: Vec<_> = handler.requests().into_iter().map(|r| r.uri).collect();
    uris.sort();
    assert_eq!(uris, vec!["/a", "/b"]);
    assert_eq!(pool.active_len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_sweep_reports_busy_pass() {
    let handler = RecordingHandler::new();
    let (mut pool, handle) = pool(&handler);

    let socket = add(&handle, 5000);
    pool.admit_pending();

    assert!(!pool.sweep(Instant::now()));
    socket.push(b"GET");
    assert!(pool.sweep(Instant::now()));
    assert!(!pool.sweep(Instant::now()));
}

#[tokio::test(start_paused = true)]
async fn test_idle_connection_evicted_once() {
    let handler = RecordingHandler::new();
    let (mut pool, handle) = pool(&handler);

    let socket = add(&handle, 5000);
    pool.tick();

    advance(TIMEOUT - Duration::from_millis(1)).await;
    pool.tick();
    assert_eq!(pool.active_len(), 1);
    assert_eq!(socket.closes(), 0);

    advance(Duration::from_millis(1)).await;
    pool.tick();
    assert_eq!(pool.active_len(), 0);
    assert_eq!(socket.closes(), 1);

    advance(TIMEOUT).await;
    pool.tick();
    assert_eq!(socket.closes(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_sweep_keeps_connection_that_read_in_the_same_pass() {
    let handler = RecordingHandler::new();
    let (mut pool, handle) = pool(&handler);

    let busy = add(&handle, 5000);
    let idle = add(&handle, 5001);
    pool.admit_pending();

    busy.push(b"GET / HTTP/1.1\r\n");
    assert!(pool.sweep(Instant::now() + TIMEOUT));

    assert_eq!(pool.active_len(), 1);
    assert_eq!(busy.closes(), 0);
    assert_eq!(idle.closes(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_activity_before_timeout_prevents_eviction() {
    let handler = RecordingHandler::new();
    let (mut pool, handle) = pool(&handler);

    let socket = add(&handle, 5000);
    pool.tick();

    advance(Duration::from_millis(4900)).await;
    socket.push(b"GET / HTTP/1.1\r\n");
    pool.tick();

    advance(Duration::from_millis(4900)).await;
    pool.tick();
    assert_eq!(pool.active_len(), 1);
    assert_eq!(socket.closes(), 0);

    advance(Duration::from_millis(100)).await;
    pool.tick();
    assert_eq!(pool.active_len(), 0);
    assert_eq!(socket.closes(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_request_only_evicts_offender() {
    let handler = RecordingHandler::new();
    let (mut pool, handle) = pool(&handler);

    let bad = add(&handle, 5000);
    let good = add(&handle, 5001);
    bad.push(b"GET  / HTTP/1.1\r\n\r\n");
    good.push(b"GET /ok HTTP/1.1\r\n\r\n");
    pool.tick();

    assert_eq!(pool.active_len(), 1);
    assert_eq!(bad.closes(), 1);
    assert_eq!(good.closes(), 0);
    assert_eq!(handler.malformed().len(), 1);
    assert_eq!(handler.requests()[0].uri, "/ok");
    assert_eq!(handler.peers(), vec![peer(5001)]);
}

#[tokio::test(start_paused = true)]
async fn test_failed_and_disconnected_connections_are_closed() {
    let handler = RecordingHandler::new();
    let (mut pool, handle) = pool(&handler);

    let reset = add(&handle, 5000);
    let gone = add(&handle, 5001);
    let alive = add(&handle, 5002);
    reset.fail_with(io::ErrorKind::ConnectionReset);
    gone.hang_up();
    pool.tick();

    assert_eq!(pool.active_len(), 1);
    assert_eq!(reset.closes(), 1);
    assert_eq!(gone.closes(), 1);
    assert_eq!(alive.closes(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_add_fails_after_pool_dropped() {
    let handler = RecordingHandler::new();
    let (pool, handle) = pool(&handler);
    drop(pool);

    let socket = MockSocket::new();
    assert!(handle.add(Connection::new(socket, peer(5000))).is_err());
}

#[tokio::test(start_paused = true)]
async fn test_run_serves_until_handles_dropped() {
    let handler = RecordingHandler::new();
    let (pool, handle) = pool(&handler);
    let task = tokio::spawn(pool.run());

    let socket = add(&handle, 5000);
    socket.push(b"OPTIONS * HTTP/1.1\r\nHost: example.com\r\n\r\n");

    for _ in 0..100 {
        if !handler.requests().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert_eq!(handler.requests()[0].uri, "*");

    drop(handle);
    socket.hang_up();
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("pool should stop")
        .unwrap();
    assert_eq!(socket.closes(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_run_evicts_idle_connections() {
    let handler = RecordingHandler::new();
    let (pool, handle) = pool(&handler);
    let task = tokio::spawn(pool.run());

    let socket = add(&handle, 5000);
    drop(handle);

    tokio::time::timeout(TIMEOUT * 2, task)
        .await
        .expect("idle connection should be evicted")
        .unwrap();
    assert_eq!(socket.closes(), 1);
}
