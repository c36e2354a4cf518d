//! Turmoil transport.
//!
//! Each participant runs on its own turmoil host named by [`host_name`] and
//! listens on [`PORT`]. Outbound traffic uses one TCP stream per destination,
//! opened on first send, so every sender/receiver pair stays FIFO. Inbound
//! streams are read by spawned tasks that decode frames and feed a single
//! channel.

use std::{collections::BTreeMap, io, time::Duration};

use async_trait::async_trait;
use bytes::BytesMut;
use pairlock_core::{
    mailbox::{Mailbox, MessageFilter},
    transport::{Transport, TransportError},
};
use pairlock_proto::{Message, MessageKind, ParticipantId, frame};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    sync::mpsc,
};
use tracing::{debug, warn};
use turmoil::net::{TcpListener, TcpStream};

/// Port every participant listens on.
pub const PORT: u16 = 7400;

const CONNECT_ATTEMPTS: u32 = 50;
const CONNECT_BACKOFF: Duration = Duration::from_millis(10);

/// Turmoil host name for `id`.
pub fn host_name(id: ParticipantId) -> String {
    format!("participant-{id}")
}

/// [`Transport`] over turmoil TCP.
pub struct SimTransport {
    id: ParticipantId,
    inbox: mpsc::UnboundedReceiver<Message>,
    mailbox: Mailbox,
    streams: BTreeMap<ParticipantId, TcpStream>,
}

impl SimTransport {
    /// Start listening as participant `id`.
    ///
    /// Must be called from inside a turmoil host.
    pub async fn bind(id: ParticipantId) -> io::Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", PORT)).await?;
        let (tx, inbox) = mpsc::unbounded_channel();
        tokio::spawn(accept_loop(id, listener, tx));
        Ok(Self { id, inbox, mailbox: Mailbox::new(), streams: BTreeMap::new() })
    }

    async fn stream_to(&mut self, to: ParticipantId) -> Result<&mut TcpStream, TransportError> {
        if !self.streams.contains_key(&to) {
            let stream = connect(to).await?;
            self.streams.insert(to, stream);
        }
        self.streams.get_mut(&to).ok_or(TransportError::UnknownParticipant(to))
    }

    fn pull_ready(&mut self) {
        while let Ok(message) = self.inbox.try_recv() {
            self.mailbox.push(message);
        }
    }
}

/// Connect to `to`, retrying while its host is still starting.
async fn connect(to: ParticipantId) -> Result<TcpStream, TransportError> {
    let host = host_name(to);
    let mut attempt = 1;
    loop {
        match TcpStream::connect((host.as_str(), PORT)).await {
            Ok(stream) => return Ok(stream),
            Err(error) if attempt < CONNECT_ATTEMPTS => {
                debug!(to, attempt, %error, "connect failed, retrying");
                attempt += 1;
                tokio::time::sleep(CONNECT_BACKOFF).await;
            },
            Err(error) => return Err(error.into()),
        }
    }
}

async fn accept_loop(id: ParticipantId, listener: TcpListener, tx: mpsc::UnboundedSender<Message>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                debug!(participant = id, %peer, "accepted connection");
                tokio::spawn(read_loop(id, stream, tx.clone()));
            },
            Err(error) => {
                warn!(participant = id, %error, "accept failed");
                return;
            },
        }
    }
}

async fn read_loop(id: ParticipantId, mut stream: TcpStream, tx: mpsc::UnboundedSender<Message>) {
    let mut buf = BytesMut::with_capacity(1024);
    loop {
        loop {
            match frame::decode(&mut buf) {
                Ok(Some(message)) => {
                    if tx.send(message).is_err() {
                        return;
                    }
                },
                Ok(None) => break,
                Err(error) => {
                    warn!(participant = id, %error, "dropping connection on bad frame");
                    return;
                },
            }
        }

        match stream.read_buf(&mut buf).await {
            Ok(0) => return,
            Ok(_) => {},
            Err(error) => {
                warn!(participant = id, %error, "read failed");
                return;
            },
        }
    }
}

#[async_trait]
impl Transport for SimTransport {
    fn local_id(&self) -> ParticipantId {
        self.id
    }

    async fn send(&mut self, message: Message) -> Result<(), TransportError> {
        let mut buf = BytesMut::new();
        frame::encode(&message, &mut buf)?;
        let stream = self.stream_to(message.to).await?;
        stream.write_all(&buf).await?;
        Ok(())
    }

    fn probe(&mut self) -> Option<(ParticipantId, MessageKind)> {
        self.pull_ready();
        self.mailbox.probe()
    }

    fn try_receive(&mut self, filter: MessageFilter) -> Option<Message> {
        self.pull_ready();
        self.mailbox.take(filter)
    }

    async fn receive(&mut self, filter: MessageFilter) -> Result<Message, TransportError> {
        loop {
            if let Some(message) = self.try_receive(filter) {
                return Ok(message);
            }
            match self.inbox.recv().await {
                Some(message) => self.mailbox.push(message),
                None => return Err(TransportError::Closed),
            }
        }
    }
}
