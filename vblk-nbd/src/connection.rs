//! Connection to an NBD server.
//!
//! A connection owns the socket, the export parameters captured during the
//! handshake and a background thread that reads replies. Callers send one
//! request at a time with [`Connection::request`] and block in
//! [`Connection::reply`] until the reader hands back the outcome.

use crate::error::NbdError;
use crate::handshake::{negotiate, HandshakeOutcome};
use crate::io::{read_full, write_full};
use crate::transaction::{Completion, Pending, TransactionStore};
use bytes::Bytes;
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::oneshot;
use vblk_protocol::{
    Command, ExportFlags, ReplyHeader, RequestHeader, WireStatus, REPLY_HEADER_SIZE,
};

/// Name given to the reply reader thread.
const READER_THREAD_NAME: &str = "vblk-nbd-reader";

/// State shared between callers and the reply reader.
struct Shared {
    socket_path: PathBuf,
    stream: UnixStream,
    store: TransactionStore,
}

impl Shared {
    /// Marks the connection dead, logging only for the first observer.
    fn mark_dead(&self, reason: &dyn std::fmt::Display) {
        if self.store.mark_dead() {
            tracing::debug!(
                "permanent failure while talking to server {}: {}",
                self.socket_path.display(),
                reason
            );
        }
    }

    /// Writes a request header without touching the transaction slot.
    fn send_raw(&self, header: &RequestHeader) -> std::io::Result<()> {
        tracing::debug!(
            "sending request with type {} and cookie {:#x}",
            header.command_word(),
            header.cookie
        );
        write_full(&mut &self.stream, &header.encode())
    }
}

/// A live connection to an NBD server.
pub struct Connection {
    shared: Arc<Shared>,
    export_size: u64,
    export_flags: ExportFlags,
    reader: Option<JoinHandle<()>>,
}

impl Connection {
    /// Connects to `socket_path`, negotiates `export` and starts the reply reader.
    pub fn open(socket_path: &Path, export: &str) -> Result<Self, NbdError> {
        tracing::debug!("connecting to {}", socket_path.display());
        let stream = UnixStream::connect(socket_path).map_err(|e| {
            tracing::error!("connect: {}", e);
            e
        })?;
        Self::from_stream(stream, socket_path, export)
    }

    /// Negotiates over an already connected stream.
    pub fn from_stream(
        mut stream: UnixStream,
        socket_path: &Path,
        export: &str,
    ) -> Result<Self, NbdError> {
        let outcome = negotiate(&mut stream, export)?;
        Self::start(stream, socket_path, outcome)
    }

    fn start(
        stream: UnixStream,
        socket_path: &Path,
        outcome: HandshakeOutcome,
    ) -> Result<Self, NbdError> {
        let shared = Arc::new(Shared {
            socket_path: socket_path.to_path_buf(),
            stream,
            store: TransactionStore::new(),
        });

        let reader_shared = shared.clone();
        let reader = std::thread::Builder::new()
            .name(READER_THREAD_NAME.to_string())
            .spawn(move || reader_loop(&reader_shared))
            .map_err(|e| {
                tracing::error!("failed to initialize reader thread: {}", e);
                e
            })?;

        Ok(Self {
            shared,
            export_size: outcome.export_size,
            export_flags: outcome.export_flags,
            reader: Some(reader),
        })
    }

    pub fn export_size(&self) -> u64 {
        self.export_size
    }

    pub fn export_flags(&self) -> ExportFlags {
        self.export_flags
    }

    /// Whether the connection has hit an unrecoverable error.
    pub fn is_dead(&self) -> bool {
        self.shared.store.is_dead()
    }

    /// Whether the reply reader has stopped reading from the socket.
    pub fn reader_finished(&self) -> bool {
        self.reader.as_ref().map_or(true, |reader| reader.is_finished())
    }

    /// Sends one request and returns the receiver its completion will arrive on.
    ///
    /// `payload` is sent after the header (writes only). `reply_len` is the
    /// number of data bytes the server returns on success (reads only).
    pub fn request(
        &self,
        command: Command,
        flags: u32,
        offset: u64,
        length: u32,
        payload: Option<&[u8]>,
        reply_len: usize,
    ) -> Result<oneshot::Receiver<Completion>, NbdError> {
        let (cookie, rx) = self.shared.store.begin(reply_len)?;

        let header = RequestHeader::new(command, offset, length, cookie).with_flags(flags);
        let sent = self.shared.send_raw(&header).and_then(|()| match payload {
            Some(data) => write_full(&mut &self.shared.stream, data),
            None => Ok(()),
        });

        if let Err(e) = sent {
            // part of the request may be on the wire; nothing after it can be trusted
            tracing::error!("failed to send request: {}", e);
            self.shared.mark_dead(&e);
            self.shared.store.finish();
            return Err(NbdError::Dead);
        }
        Ok(rx)
    }

    /// Waits for the completion of the request issued by [`Connection::request`].
    pub fn reply(&self, rx: oneshot::Receiver<Completion>) -> Result<Bytes, NbdError> {
        let outcome = match rx.blocking_recv() {
            Ok(outcome) => outcome,
            // the reader dropped the sender: the connection died mid-request
            Err(_) => Err(NbdError::Dead),
        };
        self.shared.store.finish();
        outcome
    }

    /// Sends a request and waits for its reply.
    pub fn transact(
        &self,
        command: Command,
        flags: u32,
        offset: u64,
        length: u32,
        payload: Option<&[u8]>,
        reply_len: usize,
    ) -> Result<Bytes, NbdError> {
        let rx = self.request(command, flags, offset, length, payload, reply_len)?;
        self.reply(rx)
    }

    /// Disconnects and joins the reply reader.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(reader) = self.reader.take() else {
            return;
        };

        if !self.shared.store.is_dead() {
            let disc = RequestHeader::new(Command::Disconnect, 0, 0, 0);
            if let Err(e) = self.shared.send_raw(&disc) {
                tracing::debug!("failed to send disconnect: {}", e);
            }
        }

        // wakes the reader out of its blocking read
        if let Err(e) = self.shared.stream.shutdown(Shutdown::Both) {
            tracing::debug!("socket shutdown: {}", e);
        }

        if reader.join().is_err() {
            tracing::warn!("reply reader thread panicked");
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Reads replies until the connection dies.
fn reader_loop(shared: &Shared) {
    tracing::debug!("reply reader started for {}", shared.socket_path.display());
    loop {
        receive_one(shared);
        if shared.store.is_dead() {
            break;
        }
    }
    // a caller blocked on a reply that will never come must not hang
    shared.store.abort();
    tracing::debug!("reply reader stopped");
}

/// Handles one reply: decode, correlate, read data, signal the caller.
fn receive_one(shared: &Shared) {
    let mut raw = [0u8; REPLY_HEADER_SIZE];
    if let Err(e) = read_full(&mut &shared.stream, &mut raw) {
        shared.mark_dead(&e);
        return;
    }

    let reply = match ReplyHeader::decode(&raw) {
        Ok(reply) => reply,
        Err(e) => {
            shared.mark_dead(&e);
            return;
        }
    };
    tracing::debug!("received reply for cookie {:#x}", reply.cookie);

    let Pending { cookie, reply_len } = match shared.store.pending() {
        Some(p) if p.cookie == reply.cookie => p,
        Some(p) => {
            shared.mark_dead(&format_args!(
                "reply cookie {:#x} does not match request cookie {:#x}",
                reply.cookie, p.cookie
            ));
            return;
        }
        None => {
            shared.mark_dead(&format_args!(
                "unsolicited reply with cookie {:#x}",
                reply.cookie
            ));
            return;
        }
    };

    let outcome = match reply.wire_status() {
        WireStatus::Success => {
            let mut data = vec![0u8; reply_len];
            if let Err(e) = read_full(&mut &shared.stream, &mut data) {
                shared.mark_dead(&e);
                return;
            }
            Ok(Bytes::from(data))
        }
        WireStatus::Shutdown => {
            // only one request can be outstanding, so it is safe to
            // start the soft disconnect right away
            let disc = RequestHeader::new(Command::Disconnect, 0, 0, 0);
            if let Err(e) = shared.send_raw(&disc) {
                tracing::debug!("failed to send disconnect: {}", e);
            }
            shared.mark_dead(&"server requested shutdown");
            Err(NbdError::Dead)
        }
        status => Err(NbdError::Status(status)),
    };

    shared.store.complete(cookie, outcome);
}
