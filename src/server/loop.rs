// Server loop module
// Single-threaded wait/dispatch cycle that owns every piece of relay state

use std::future::Future;
use std::net::SocketAddr;

use tokio::net::TcpListener;

use super::acceptor::ConnectionAcceptor;
use super::connection::Connection;
use super::multiplexer::{self, Readiness};
use super::relay::MessageRelay;
use super::stats::RelayStats;
use super::table::ClientTable;
use crate::config::RelayConfig;
use crate::logger::{self, EventKind, RelayEvent};

/// The relay server.
///
/// Each iteration waits in the multiplexer, then services the listener
/// (at most one accept) followed by every ready connection in ascending
/// slot order. The table is only ever touched from this loop, so no
/// locking is involved.
pub struct ServerLoop {
    listener: TcpListener,
    table: ClientTable<Connection>,
    acceptor: ConnectionAcceptor,
    relay: MessageRelay,
    stats: RelayStats,
}

impl ServerLoop {
    pub fn new(listener: TcpListener, config: &RelayConfig) -> Self {
        Self {
            listener,
            table: ClientTable::with_capacity(config.capacity),
            acceptor: ConnectionAcceptor::new(config),
            relay: MessageRelay::new(config),
            stats: RelayStats::default(),
        }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run until `shutdown` resolves, then close every connection and
    /// return the final counters.
    ///
    /// `shutdown` is only observed while waiting for readiness; a dispatch
    /// in progress always runs to completion first.
    pub async fn run_until<F>(mut self, shutdown: F) -> RelayStats
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let readiness = tokio::select! {
                biased;
                () = &mut shutdown => break,
                readiness = multiplexer::wait(&self.listener, &self.table) => readiness,
            };
            self.dispatch(readiness).await;
        }

        self.close_all().await;
        self.stats
    }

    async fn dispatch(&mut self, readiness: Readiness) {
        if let Some(incoming) = readiness.incoming {
            self.acceptor
                .handle(incoming, &mut self.table, &mut self.stats)
                .await;
        }

        let mut freed = false;
        for (slot, id) in readiness.ready {
            let outcome = self
                .relay
                .service(slot, id, &mut self.table, &mut self.stats)
                .await;
            freed |= outcome.freed_slot();
        }

        if freed {
            self.acceptor.admit_pending(&mut self.table).await;
        }
    }

    async fn close_all(&mut self) {
        if self.table.is_empty() && self.acceptor.pending_len() == 0 {
            logger::log_info(&format!("Relay stopped with no open connections: {}", self.stats));
            return;
        }
        let pending = self.acceptor.drain_pending();
        let active = self.table.drain();
        logger::log_event(&RelayEvent::new(EventKind::Shutdown).detail(format!(
            "closing {} active and {} queued connection(s)",
            active.len(),
            pending.len()
        )));

        for (_, _, conn) in active {
            conn.close().await;
        }
        for conn in pending {
            conn.close().await;
        }
        logger::log_info(&format!("Relay stopped: {}", self.stats));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OverflowPolicy, ReadErrorPolicy};
    use crate::server::acceptor::WELCOME_MESSAGE;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;
    use tokio::task::JoinHandle;
    use tokio::time::{sleep, timeout};

    const WAIT: Duration = Duration::from_secs(5);
    const QUIET: Duration = Duration::from_millis(150);

    struct Running {
        addr: SocketAddr,
        stop: oneshot::Sender<()>,
        handle: JoinHandle<RelayStats>,
    }

    impl Running {
        async fn stop(self) -> RelayStats {
            let _ = self.stop.send(());
            timeout(WAIT, self.handle)
                .await
                .expect("server stops in time")
                .expect("server task")
        }
    }

    fn relay_config(capacity: usize, on_full: OverflowPolicy) -> RelayConfig {
        RelayConfig {
            capacity,
            buffer_size: 1024,
            on_full,
            queue_limit: 4,
            on_read_error: ReadErrorPolicy::Evict,
        }
    }

    async fn start(config: RelayConfig) -> Running {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let server = ServerLoop::new(listener, &config);
        let addr = server.local_addr().expect("local addr");
        let (stop, stopped) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.run_until(async {
            let _ = stopped.await;
        }));
        Running { addr, stop, handle }
    }

    async fn connect_welcomed(addr: SocketAddr) -> TcpStream {
        let mut client = TcpStream::connect(addr).await.expect("connect");
        let mut welcome = [0u8; 23];
        timeout(WAIT, client.read_exact(&mut welcome))
            .await
            .expect("welcome in time")
            .expect("read welcome");
        assert_eq!(&welcome, WELCOME_MESSAGE);
        client
    }

    async fn expect_bytes(client: &mut TcpStream, expected: &[u8]) {
        let mut buf = vec![0u8; expected.len()];
        timeout(WAIT, client.read_exact(&mut buf))
            .await
            .expect("payload in time")
            .expect("read payload");
        assert_eq!(buf, expected);
    }

    async fn expect_silence(client: &mut TcpStream) {
        let mut buf = [0u8; 64];
        let result = timeout(QUIET, client.read(&mut buf)).await;
        assert!(result.is_err(), "expected no data, got {result:?}");
    }

    async fn expect_closed(client: &mut TcpStream) {
        let mut buf = [0u8; 64];
        let n = timeout(WAIT, client.read(&mut buf))
            .await
            .expect("close in time")
            .unwrap_or(0);
        assert_eq!(n, 0, "expected EOF, got {:?}", &buf[..n]);
    }

    #[tokio::test]
    async fn test_two_clients_then_reconnect_scenario() {
        let server = start(relay_config(4, OverflowPolicy::Reject)).await;

        let mut a = connect_welcomed(server.addr).await;
        let mut b = connect_welcomed(server.addr).await;

        a.write_all(b"hello\n").await.expect("a sends");
        expect_bytes(&mut b, b"hello\n").await;
        expect_silence(&mut a).await;

        b.shutdown().await.expect("b closes");
        drop(b);
        // let the server observe the disconnect before C arrives
        sleep(QUIET).await;

        let mut c = connect_welcomed(server.addr).await;
        a.write_all(b"hi\n").await.expect("a sends again");
        expect_bytes(&mut c, b"hi\n").await;
        expect_silence(&mut a).await;

        let stats = server.stop().await;
        assert_eq!(stats.accepted, 3);
        assert_eq!(stats.disconnected, 1);
        assert_eq!(stats.messages, 2);
        assert_eq!(stats.bytes_delivered, 6 + 3);
    }

    #[tokio::test]
    async fn test_every_other_client_receives_broadcast() {
        let server = start(relay_config(4, OverflowPolicy::Reject)).await;

        let mut clients = Vec::new();
        for _ in 0..4 {
            clients.push(connect_welcomed(server.addr).await);
        }

        clients[2].write_all(b"from the third\n").await.expect("send");
        for (index, client) in clients.iter_mut().enumerate() {
            if index == 2 {
                expect_silence(client).await;
            } else {
                expect_bytes(client, b"from the third\n").await;
            }
        }

        server.stop().await;
    }

    #[tokio::test]
    async fn test_fifth_connection_is_rejected_and_others_unaffected() {
        let server = start(relay_config(4, OverflowPolicy::Reject)).await;

        let mut clients = Vec::new();
        for _ in 0..4 {
            clients.push(connect_welcomed(server.addr).await);
        }

        let mut fifth = TcpStream::connect(server.addr).await.expect("os accepts");
        expect_closed(&mut fifth).await;

        clients[0].write_all(b"still here\n").await.expect("send");
        for client in &mut clients[1..] {
            expect_bytes(client, b"still here\n").await;
        }

        let stats = server.stop().await;
        assert_eq!(stats.accepted, 5);
        assert_eq!(stats.rejected, 1);
    }

    #[tokio::test]
    async fn test_queued_connection_is_admitted_after_disconnect() {
        let server = start(relay_config(1, OverflowPolicy::Queue)).await;

        let mut first = connect_welcomed(server.addr).await;
        let mut waiting = TcpStream::connect(server.addr).await.expect("connect");
        expect_silence(&mut waiting).await;

        first.shutdown().await.expect("first closes");
        drop(first);

        let mut welcome = [0u8; 23];
        timeout(WAIT, waiting.read_exact(&mut welcome))
            .await
            .expect("welcome after admission")
            .expect("read welcome");
        assert_eq!(&welcome, WELCOME_MESSAGE);

        let stats = server.stop().await;
        assert_eq!(stats.queued, 1);
        assert_eq!(stats.rejected, 0);
    }

    #[tokio::test]
    async fn test_large_payload_is_relayed_in_chunks() {
        let server = start(relay_config(4, OverflowPolicy::Reject)).await;

        let mut a = connect_welcomed(server.addr).await;
        let mut b = connect_welcomed(server.addr).await;

        let payload: Vec<u8> = (0..3000u32).map(|i| (i % 251) as u8).collect();
        a.write_all(&payload).await.expect("send");
        expect_bytes(&mut b, &payload).await;

        let stats = server.stop().await;
        // 3000 bytes need at least three 1023-byte reads
        assert!(stats.messages >= 3);
        assert_eq!(stats.bytes_delivered, 3000);
    }

    #[tokio::test]
    async fn test_shutdown_closes_active_connections() {
        let server = start(relay_config(4, OverflowPolicy::Reject)).await;

        let mut a = connect_welcomed(server.addr).await;
        let mut b = connect_welcomed(server.addr).await;

        let stats = server.stop().await;
        assert_eq!(stats.accepted, 2);
        expect_closed(&mut a).await;
        expect_closed(&mut b).await;
    }
}
