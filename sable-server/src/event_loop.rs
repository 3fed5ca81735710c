//! Single-threaded reactor multiplexing client sockets with time events.
//!
//! One `mio::Poll` waits for readiness with a timeout derived from the nearest time-event
//! deadline, so maintenance work (expiry sweep, incremental rehash) interleaves with request
//! handling on the one loop thread. Command execution never suspends, which makes every command
//! atomic from a client's point of view.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::SocketAddr;
use std::time::Duration;

use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};
use sable_common::error::{SableError, SableResult};
use sable_common::time::now_unix_millis;
use sable_core::command::CommandReply;
use sable_facade::connection::ConnectionState;

use crate::app::ServerApp;
use crate::ingress::ingress_connection_bytes;

const LISTENER_TOKEN: Token = Token(0);
const CONNECTION_TOKEN_START: usize = 1;
const READ_CHUNK_BYTES: usize = 1024;
const MAX_EVENTS: usize = 128;

/// Time-event callback. `Some(delay)` reschedules the event `delay` ms after the current run;
/// `None` removes it.
pub(crate) type TimeEventHandler = fn(&mut ServerApp) -> Option<u64>;

struct TimeEvent {
    id: u64,
    process_at_ms: u64,
    handler: TimeEventHandler,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionLifecycle {
    Active,
    Draining,
    Closing,
}

struct ReactorConnection {
    socket: TcpStream,
    parser: ConnectionState,
    write_buffer: Vec<u8>,
    lifecycle: ConnectionLifecycle,
    interest: Interest,
}

impl ReactorConnection {
    fn new(socket: TcpStream) -> Self {
        Self {
            socket,
            parser: ConnectionState::new(),
            write_buffer: Vec::new(),
            lifecycle: ConnectionLifecycle::Active,
            interest: Interest::READABLE,
        }
    }

    fn mark_draining(&mut self) {
        if self.lifecycle == ConnectionLifecycle::Active {
            self.lifecycle = ConnectionLifecycle::Draining;
        }
    }

    fn mark_closing(&mut self) {
        self.lifecycle = ConnectionLifecycle::Closing;
    }

    fn can_read(&self) -> bool {
        self.lifecycle == ConnectionLifecycle::Active
    }

    fn should_close_now(&self) -> bool {
        self.lifecycle == ConnectionLifecycle::Closing
            || (self.lifecycle == ConnectionLifecycle::Draining && self.write_buffer.is_empty())
    }
}

#[derive(Debug, Clone, Copy)]
struct EventSnapshot {
    token: Token,
    readable: bool,
    writable: bool,
    closed_or_error: bool,
}

impl EventSnapshot {
    fn from_mio_event(event: &mio::event::Event) -> Self {
        Self {
            token: event.token(),
            readable: event.is_readable(),
            writable: event.is_writable(),
            closed_or_error: event.is_read_closed() || event.is_write_closed() || event.is_error(),
        }
    }
}

/// Reactor owning the listener, all accepted connections, and the time-event list.
pub(crate) struct EventLoop {
    poll: Poll,
    events: Events,
    listener: TcpListener,
    connections: HashMap<Token, ReactorConnection>,
    time_events: Vec<TimeEvent>,
    next_token: usize,
    next_time_event_id: u64,
}

impl EventLoop {
    /// Binds the RESP listener and registers it in the poller.
    ///
    /// # Errors
    ///
    /// Returns `SableError::Io` if the listener bind or poll registration fails.
    pub(crate) fn bind(addr: SocketAddr) -> SableResult<Self> {
        let poll =
            Poll::new().map_err(|error| SableError::Io(format!("create poll failed: {error}")))?;
        let mut listener = TcpListener::bind(addr)
            .map_err(|error| SableError::Io(format!("bind listener failed: {error}")))?;
        poll.registry()
            .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)
            .map_err(|error| {
                SableError::Io(format!("register listener in poll failed: {error}"))
            })?;

        Ok(Self {
            poll,
            events: Events::with_capacity(MAX_EVENTS),
            listener,
            connections: HashMap::new(),
            time_events: Vec::new(),
            next_token: CONNECTION_TOKEN_START,
            next_time_event_id: 1,
        })
    }

    #[cfg(test)]
    pub(crate) fn local_addr(&self) -> SableResult<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|error| SableError::Io(format!("query local address failed: {error}")))
    }

    /// Registers a time event firing `delay_ms` from now; returns its id.
    pub(crate) fn schedule(&mut self, delay_ms: u64, handler: TimeEventHandler) -> u64 {
        let id = self.next_time_event_id;
        self.next_time_event_id += 1;
        self.time_events.push(TimeEvent {
            id,
            process_at_ms: now_unix_millis().saturating_add(delay_ms),
            handler,
        });
        id
    }

    #[cfg(test)]
    pub(crate) fn connection_count(&self) -> usize {
        self.connections.len()
    }

    fn nearest_deadline(&self) -> Option<u64> {
        self.time_events.iter().map(|event| event.process_at_ms).min()
    }

    /// Runs one readiness cycle: socket I/O first, then every due time event.
    ///
    /// # Errors
    ///
    /// Returns `SableError::Io` if polling or socket registration fails.
    pub(crate) fn poll_once(&mut self, app: &mut ServerApp) -> SableResult<usize> {
        let now = now_unix_millis();
        let timeout = self
            .nearest_deadline()
            .map_or(Duration::ZERO, |deadline| {
                Duration::from_millis(deadline.saturating_sub(now))
            });
        self.poll
            .poll(&mut self.events, Some(timeout))
            .map_err(|error| SableError::Io(format!("poll wait failed: {error}")))?;

        let snapshots = self
            .events
            .iter()
            .map(EventSnapshot::from_mio_event)
            .collect::<Vec<_>>();
        for snapshot in &snapshots {
            if snapshot.token == LISTENER_TOKEN {
                self.accept_new_connections()?;
                continue;
            }
            self.handle_connection_event(app, *snapshot)?;
        }

        self.process_time_events(app);
        Ok(snapshots.len())
    }

    /// Runs the reactor until polling fails.
    ///
    /// # Errors
    ///
    /// Returns `SableError::Io` if polling or socket registration fails.
    pub(crate) fn run(&mut self, app: &mut ServerApp) -> SableResult<()> {
        loop {
            let _ = self.poll_once(app)?;
        }
    }

    fn process_time_events(&mut self, app: &mut ServerApp) {
        let now = now_unix_millis();
        let mut index = 0_usize;
        while index < self.time_events.len() {
            if self.time_events[index].process_at_ms > now {
                index += 1;
                continue;
            }
            let handler = self.time_events[index].handler;
            match handler(app) {
                Some(delay_ms) => {
                    self.time_events[index].process_at_ms =
                        now_unix_millis().saturating_add(delay_ms);
                    index += 1;
                }
                None => {
                    let removed = self.time_events.swap_remove(index);
                    log::debug!("time event {} finished", removed.id);
                }
            }
        }
    }

    fn accept_new_connections(&mut self) -> SableResult<()> {
        loop {
            match self.listener.accept() {
                Ok((mut socket, peer)) => {
                    let token = self.allocate_connection_token();
                    self.poll
                        .registry()
                        .register(&mut socket, token, Interest::READABLE)
                        .map_err(|error| {
                            SableError::Io(format!(
                                "register accepted connection in poll failed: {error}"
                            ))
                        })?;
                    let _ = socket.set_nodelay(true);
                    log::debug!("accepted connection from {peer}");
                    let _ = self.connections.insert(token, ReactorConnection::new(socket));
                }
                Err(error) if error.kind() == std::io::ErrorKind::WouldBlock => return Ok(()),
                Err(error) => {
                    return Err(SableError::Io(format!("accept connection failed: {error}")));
                }
            }
        }
    }

    fn handle_connection_event(
        &mut self,
        app: &mut ServerApp,
        snapshot: EventSnapshot,
    ) -> SableResult<()> {
        let Some(mut connection) = self.connections.remove(&snapshot.token) else {
            return Ok(());
        };

        if snapshot.closed_or_error {
            connection.mark_draining();
        }
        if snapshot.readable && connection.can_read() {
            Self::read_connection_bytes(app, &mut connection);
        }
        if snapshot.writable || !connection.write_buffer.is_empty() {
            Self::flush_connection_writes(&mut connection);
        }

        if connection.should_close_now() {
            self.close_connection(snapshot.token, connection)?;
            return Ok(());
        }

        self.refresh_connection_interest(snapshot.token, &mut connection)?;
        let _ = self.connections.insert(snapshot.token, connection);
        Ok(())
    }

    fn read_connection_bytes(app: &mut ServerApp, connection: &mut ReactorConnection) {
        let mut chunk = [0_u8; READ_CHUNK_BYTES];
        loop {
            match connection.socket.read(&mut chunk) {
                Ok(0) => {
                    connection.mark_draining();
                    return;
                }
                Ok(read_len) => {
                    match ingress_connection_bytes(app, &mut connection.parser, &chunk[..read_len])
                    {
                        Ok(replies) => {
                            for reply in replies {
                                connection.write_buffer.extend_from_slice(&reply);
                            }
                        }
                        Err(error) => {
                            // Malformed framing: report once, then drain and drop the client.
                            let reply =
                                CommandReply::Error(format!("ERR Protocol error: {error}"));
                            connection.write_buffer.extend_from_slice(&reply.to_resp_bytes());
                            connection.mark_draining();
                            return;
                        }
                    }
                }
                Err(error) if error.kind() == std::io::ErrorKind::WouldBlock => return,
                Err(_error) => {
                    connection.mark_closing();
                    return;
                }
            }
        }
    }

    fn flush_connection_writes(connection: &mut ReactorConnection) {
        while !connection.write_buffer.is_empty() {
            match connection.socket.write(connection.write_buffer.as_slice()) {
                Ok(0) => {
                    connection.mark_closing();
                    return;
                }
                Ok(written) => {
                    let _ = connection.write_buffer.drain(..written);
                }
                Err(error) if error.kind() == std::io::ErrorKind::WouldBlock => return,
                Err(_error) => {
                    connection.mark_closing();
                    return;
                }
            }
        }
    }

    fn refresh_connection_interest(
        &self,
        token: Token,
        connection: &mut ReactorConnection,
    ) -> SableResult<()> {
        let mut next_interest = Interest::READABLE;
        if !connection.write_buffer.is_empty() {
            next_interest |= Interest::WRITABLE;
        }
        if next_interest == connection.interest {
            return Ok(());
        }

        self.poll
            .registry()
            .reregister(&mut connection.socket, token, next_interest)
            .map_err(|error| {
                SableError::Io(format!("refresh connection poll interest failed: {error}"))
            })?;
        connection.interest = next_interest;
        Ok(())
    }

    fn close_connection(
        &self,
        token: Token,
        mut connection: ReactorConnection,
    ) -> SableResult<()> {
        self.poll
            .registry()
            .deregister(&mut connection.socket)
            .map_err(|error| {
                SableError::Io(format!(
                    "deregister closed connection {} failed: {error}",
                    token.0
                ))
            })?;
        log::debug!("closed connection {}", token.0);
        Ok(())
    }

    fn allocate_connection_token(&mut self) -> Token {
        let token = Token(self.next_token);
        self.next_token = self.next_token.saturating_add(1);
        token
    }
}

#[cfg(test)]
#[path = "event_loop/tests.rs"]
mod tests;
