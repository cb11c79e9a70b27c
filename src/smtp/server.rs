//! Mock server bring-up and test caller surface

use std::io::{BufRead, BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, warn};
use mailin::{Action, AuthMechanism, SessionBuilder};

use crate::smtp::backend::{Backend, Credentials, OnReceive, OnReceiveResult};
use crate::smtp::error::ServerError;
use crate::smtp::handler::SessionHandler;
use crate::smtp::mail::Mail;
use crate::smtp::session::Session;

/// Read/write timeout for accepted client connections.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(60);

/// Configures and starts a [`SmtpMock`].
pub struct SmtpMockBuilder {
    hostname: String,
    bind_addr: String,
    credentials: Option<Credentials>,
    observers: Vec<Box<dyn OnReceive>>,
}

impl SmtpMockBuilder {
    pub fn new() -> Self {
        Self {
            hostname: "localhost".to_string(),
            bind_addr: "127.0.0.1:0".to_string(),
            credentials: None,
            observers: Vec::new(),
        }
    }

    /// Hostname announced in the greeting and EHLO response.
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    /// Address to listen on. Defaults to an ephemeral localhost port.
    pub fn bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.bind_addr = addr.into();
        self
    }

    /// Offer AUTH PLAIN and accept exactly these credentials.
    ///
    /// Without this, authentication is not offered at all.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Register a callback invoked for every completed transaction.
    ///
    /// Observers run synchronously in registration order; an error rejects
    /// the message.
    pub fn on_receive<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str, &str, &[String], &Mail) -> OnReceiveResult + Send + Sync + 'static,
    {
        self.observers.push(Box::new(callback));
        self
    }

    /// Register an [`OnReceive`] implementation as an observer.
    pub fn observer(mut self, observer: impl OnReceive + 'static) -> Self {
        self.observers.push(Box::new(observer));
        self
    }

    /// Bind the listener and start accepting connections in the background.
    pub fn start(self) -> Result<SmtpMock, ServerError> {
        let backend = Arc::new(Backend::new(self.credentials, self.observers));
        let listener = TcpListener::bind(&self.bind_addr)?;
        let addr = listener.local_addr()?;
        let shared = Arc::new(Shared::new());

        let accept_handle = {
            let hostname = self.hostname.clone();
            let backend = Arc::clone(&backend);
            let shared = Arc::clone(&shared);
            thread::spawn(move || accept_loop(listener, hostname, backend, shared))
        };

        info!("mock SMTP server listening on {addr}");
        Ok(SmtpMock {
            addr,
            backend,
            shared,
            accept_handle: Some(accept_handle),
        })
    }
}

impl Default for SmtpMockBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// An in-process mock SMTP server.
///
/// Accepts real TCP connections, records every transaction, and exposes the
/// records to test code. Snapshots are safe to take while transactions are
/// still in flight.
pub struct SmtpMock {
    addr: SocketAddr,
    backend: Arc<Backend>,
    shared: Arc<Shared>,
    accept_handle: Option<JoinHandle<()>>,
}

/// State shared between the server handle and its background threads.
struct Shared {
    shutdown: AtomicBool,
    connections: Mutex<Vec<TcpStream>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    errors: Mutex<Vec<ServerError>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            shutdown: AtomicBool::new(false),
            connections: Mutex::new(Vec::new()),
            handles: Mutex::new(Vec::new()),
            errors: Mutex::new(Vec::new()),
        }
    }
}

impl SmtpMock {
    pub fn builder() -> SmtpMockBuilder {
        SmtpMockBuilder::new()
    }

    /// The address clients should connect to.
    pub fn address(&self) -> SocketAddr {
        self.addr
    }

    /// Every session in connection order, including those still in flight
    /// and those that never completed a transaction.
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.backend.sessions()
    }

    /// Every completed message in connection order.
    pub fn messages(&self) -> Vec<Mail> {
        self.backend
            .sessions()
            .iter()
            .filter_map(|session| session.message())
            .collect()
    }

    /// Raw payloads of every completed message, in connection order.
    pub fn raw_messages(&self) -> Vec<Vec<u8>> {
        self.backend
            .sessions()
            .iter()
            .filter_map(|session| session.raw_message())
            .collect()
    }

    /// Drain the errors accumulated by the background accept loop.
    pub fn take_errors(&self) -> Vec<ServerError> {
        let mut errors = lock(&self.shared.errors);
        std::mem::take(&mut *errors)
    }

    /// Stop the listener, shut down open connections, and wait for every
    /// connection thread to finish.
    ///
    /// After this returns, no handler is still writing to the registry.
    pub fn close(&mut self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);

        if let Some(handle) = self.accept_handle.take() {
            // Unblock the accept loop so it can observe the flag.
            let _ = TcpStream::connect(self.addr);
            let _ = handle.join();
        }

        let connections = std::mem::take(&mut *lock(&self.shared.connections));
        for connection in connections {
            let _ = connection.shutdown(Shutdown::Both);
        }

        let handles = std::mem::take(&mut *lock(&self.shared.handles));
        for handle in handles {
            let _ = handle.join();
        }
        debug!("mock SMTP server on {} closed", self.addr);
    }
}

impl Drop for SmtpMock {
    fn drop(&mut self) {
        self.close();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn accept_loop(listener: TcpListener, hostname: String, backend: Arc<Backend>, shared: Arc<Shared>) {
    for stream in listener.incoming() {
        if shared.shutdown.load(Ordering::SeqCst) {
            break;
        }
        match stream {
            Ok(stream) => {
                if let Ok(clone) = stream.try_clone() {
                    lock(&shared.connections).push(clone);
                }
                let hostname = hostname.clone();
                let backend = Arc::clone(&backend);
                let handle = thread::spawn(move || {
                    if let Err(e) = handle_connection(stream, &hostname, backend) {
                        warn!("error handling client: {e}");
                    }
                });
                lock(&shared.handles).push(handle);
            }
            Err(e) => {
                if shared.shutdown.load(Ordering::SeqCst) {
                    break;
                }
                error!("error accepting connection: {e}");
                lock(&shared.errors).push(e.into());
            }
        }
    }
}

/// Drive the protocol engine over one connection.
///
/// The engine owns parsing and sequencing; this loop only shuttles lines in
/// and responses out.
fn handle_connection(
    stream: TcpStream,
    hostname: &str,
    backend: Arc<Backend>,
) -> Result<(), ServerError> {
    stream.set_read_timeout(Some(CLIENT_TIMEOUT))?;
    stream.set_write_timeout(Some(CLIENT_TIMEOUT))?;
    let peer = stream.peer_addr()?.ip();
    debug!("client connected from {peer}");

    let handler = SessionHandler::new(Arc::clone(&backend));
    let mut builder = SessionBuilder::new(hostname.to_string());
    if backend.offers_auth() {
        builder.enable_auth(AuthMechanism::Plain);
    }
    let mut session = builder.build(peer, handler);

    let mut writer = stream.try_clone()?;
    let mut reader = BufReader::new(stream);
    session.greeting().write_to(&mut writer)?;
    writer.flush()?;

    let mut line = Vec::with_capacity(1024);
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        let response = session.process(&line);
        match response.action {
            Action::Reply => {
                response.write_to(&mut writer)?;
                writer.flush()?;
            }
            Action::Close => {
                response.write_to(&mut writer)?;
                writer.flush()?;
                break;
            }
            Action::NoReply => {}
            // STARTTLS is never offered.
            _ => break,
        }
    }
    debug!("client {peer} disconnected");
    Ok(())
}
