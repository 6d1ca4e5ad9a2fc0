use anyhow::{anyhow, Result};
use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::broadcast::{AlertBroadcaster, Subscriber, SubscriberId};

const ACCEPT_POLL: Duration = Duration::from_millis(50);
/// Read timeout of the disconnect watchers; bounds how long `stop` waits.
const WATCH_POLL: Duration = Duration::from_millis(200);

#[derive(Clone, Debug)]
pub struct AlertServerConfig {
    pub addr: String,
    /// Per-write timeout; a stalled client is dropped rather than blocking
    /// the dispatcher.
    pub write_timeout: Duration,
}

impl Default for AlertServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8765".to_string(),
            write_timeout: Duration::from_secs(2),
        }
    }
}

/// One connected client.
pub struct TcpSubscriber {
    peer: SocketAddr,
    stream: Mutex<TcpStream>,
}

impl TcpSubscriber {
    pub fn new(stream: TcpStream, write_timeout: Duration) -> Result<Self> {
        let peer = stream.peer_addr()?;
        stream.set_nonblocking(false)?;
        stream.set_write_timeout(Some(write_timeout))?;
        stream.set_nodelay(true)?;
        Ok(Self {
            peer,
            stream: Mutex::new(stream),
        })
    }
}

impl Subscriber for TcpSubscriber {
    fn send(&self, payload: &str) -> Result<()> {
        let mut stream = self
            .stream
            .lock()
            .map_err(|_| anyhow!("subscriber stream lock poisoned"))?;
        stream.write_all(payload.as_bytes())?;
        stream.write_all(b"\n")?;
        stream.flush()?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("tcp {}", self.peer)
    }
}

#[derive(Debug)]
pub struct AlertServerHandle {
    pub addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl AlertServerHandle {
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("alert server thread panicked"))?;
        }
        Ok(())
    }
}

pub struct AlertServer {
    cfg: AlertServerConfig,
    broadcaster: Arc<AlertBroadcaster>,
}

impl AlertServer {
    pub fn new(cfg: AlertServerConfig, broadcaster: Arc<AlertBroadcaster>) -> Self {
        Self { cfg, broadcaster }
    }

    pub fn spawn(self) -> Result<AlertServerHandle> {
        let configured_addr: SocketAddr = self.cfg.addr.parse()?;
        let listener = TcpListener::bind(configured_addr)?;
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;
        log::info!("alert server listening on {}", addr);

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let join = std::thread::Builder::new()
            .name("alert-server".to_string())
            .spawn(move || {
                if let Err(err) = run_server(listener, self, shutdown_thread) {
                    log::error!("alert server stopped: {}", err);
                }
            })?;

        Ok(AlertServerHandle {
            addr,
            shutdown,
            join: Some(join),
        })
    }
}

fn run_server(listener: TcpListener, server: AlertServer, shutdown: Arc<AtomicBool>) -> Result<()> {
    let mut watchers: Vec<JoinHandle<()>> = Vec::new();
    let result = loop {
        if shutdown.load(Ordering::SeqCst) {
            break Ok(());
        }
        match listener.accept() {
            Ok((stream, _)) => {
                match attach(stream, &server, &shutdown) {
                    Ok(watcher) => watchers.push(watcher),
                    Err(err) => log::warn!("alert client rejected: {}", err),
                }
                watchers.retain(|watcher| !watcher.is_finished());
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => {
                std::thread::sleep(ACCEPT_POLL);
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => break Err(err.into()),
        }
    };

    shutdown.store(true, Ordering::SeqCst);
    for watcher in watchers {
        let _ = watcher.join();
    }
    result
}

/// Subscribe a new client and start the thread that notices its disconnect.
fn attach(
    stream: TcpStream,
    server: &AlertServer,
    shutdown: &Arc<AtomicBool>,
) -> Result<JoinHandle<()>> {
    let reader = stream.try_clone()?;
    let subscriber = TcpSubscriber::new(stream, server.cfg.write_timeout)?;
    reader.set_read_timeout(Some(WATCH_POLL))?;
    let peer = subscriber.peer;
    let id = server.broadcaster.subscribe(Arc::new(subscriber));

    let broadcaster = server.broadcaster.clone();
    let shutdown = shutdown.clone();
    let watcher = std::thread::Builder::new()
        .name(format!("alert-client-{}", id.get()))
        .spawn(move || watch_disconnect(reader, peer, id, &broadcaster, &shutdown));
    match watcher {
        Ok(watcher) => Ok(watcher),
        Err(err) => {
            server.broadcaster.unsubscribe(id);
            Err(err.into())
        }
    }
}

/// Block on the client's read side until it closes, then unsubscribe it.
/// Anything the client sends is discarded.
fn watch_disconnect(
    mut reader: TcpStream,
    peer: SocketAddr,
    id: SubscriberId,
    broadcaster: &AlertBroadcaster,
    shutdown: &AtomicBool,
) {
    let mut buf = [0u8; 256];
    while !shutdown.load(Ordering::SeqCst) {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) => {}
            Err(err) => {
                log::debug!("alert client {} read failed: {}", peer, err);
                break;
            }
        }
    }
    if broadcaster.unsubscribe(id) {
        log::info!("subscriber {} disconnected: tcp {}", id.get(), peer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::AlertEvent;
    use crate::Level;
    use std::io::{BufRead, BufReader};
    use std::time::Instant;

    fn wait_for_subscribers(broadcaster: &AlertBroadcaster, n: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while broadcaster.subscriber_count() < n && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(broadcaster.subscriber_count(), n);
    }

    #[test]
    fn connected_client_receives_json_lines() {
        let broadcaster = Arc::new(AlertBroadcaster::new());
        let cfg = AlertServerConfig {
            addr: "127.0.0.1:0".to_string(),
            ..AlertServerConfig::default()
        };
        let handle = AlertServer::new(cfg, broadcaster.clone()).spawn().unwrap();

        let client = TcpStream::connect(handle.addr).unwrap();
        client
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        wait_for_subscribers(&broadcaster, 1);

        let report = broadcaster.broadcast(&AlertEvent {
            id: 3,
            level: Level::Warning,
            message: "face_down".to_string(),
        });
        assert_eq!(report.delivered, 1);

        let mut line = String::new();
        BufReader::new(client).read_line(&mut line).unwrap();
        assert_eq!(
            line,
            "{\"id\":3,\"level\":\"warning\",\"message\":\"face_down\"}\n"
        );

        handle.stop().unwrap();
    }

    #[test]
    fn stop_releases_connected_clients() {
        let broadcaster = Arc::new(AlertBroadcaster::new());
        let cfg = AlertServerConfig {
            addr: "127.0.0.1:0".to_string(),
            ..AlertServerConfig::default()
        };
        let handle = AlertServer::new(cfg, broadcaster.clone()).spawn().unwrap();
        let _client = TcpStream::connect(handle.addr).unwrap();
        wait_for_subscribers(&broadcaster, 1);

        let started = Instant::now();
        handle.stop().unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(broadcaster.subscriber_count(), 0);
    }
}
