//! In-process transport.
//!
//! One unbounded tokio channel per participant. Channels are FIFO, so every
//! sender/receiver pair is FIFO as well, which is all the protocol asks for.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use pairlock_core::{
    mailbox::{Mailbox, MessageFilter},
    transport::{Transport, TransportError},
};
use pairlock_proto::{Message, MessageKind, ParticipantId};
use tokio::sync::mpsc;

type Routes = Arc<BTreeMap<ParticipantId, mpsc::UnboundedSender<Message>>>;

/// Channel network for a fixed set of participants.
#[derive(Debug)]
pub struct LocalNetwork {
    routes: Routes,
    inboxes: BTreeMap<ParticipantId, mpsc::UnboundedReceiver<Message>>,
}

impl LocalNetwork {
    /// Network connecting `participants`.
    pub fn new(participants: impl IntoIterator<Item = ParticipantId>) -> Self {
        let mut routes = BTreeMap::new();
        let mut inboxes = BTreeMap::new();
        for id in participants {
            let (tx, rx) = mpsc::unbounded_channel();
            routes.insert(id, tx);
            inboxes.insert(id, rx);
        }
        Self { routes: Arc::new(routes), inboxes }
    }

    /// Take the endpoint for `id`. Each endpoint can be taken once.
    pub fn endpoint(&mut self, id: ParticipantId) -> Option<LocalTransport> {
        let inbox = self.inboxes.remove(&id)?;
        Some(LocalTransport { id, inbox, mailbox: Mailbox::new(), routes: Arc::clone(&self.routes) })
    }
}

/// One participant's endpoint on a [`LocalNetwork`].
#[derive(Debug)]
pub struct LocalTransport {
    id: ParticipantId,
    inbox: mpsc::UnboundedReceiver<Message>,
    mailbox: Mailbox,
    routes: Routes,
}

impl LocalTransport {
    fn pull_ready(&mut self) {
        while let Ok(message) = self.inbox.try_recv() {
            self.mailbox.push(message);
        }
    }
}

#[async_trait]
impl Transport for LocalTransport {
    fn local_id(&self) -> ParticipantId {
        self.id
    }

    async fn send(&mut self, message: Message) -> Result<(), TransportError> {
        let route =
            self.routes.get(&message.to).ok_or(TransportError::UnknownParticipant(message.to))?;
        route.send(message).map_err(|_| TransportError::Closed)
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

#[cfg(test)]
mod tests {
    use pairlock_proto::Body;

    use super::*;

    #[tokio::test]
    async fn delivers_between_endpoints() {
        let mut net = LocalNetwork::new(0..2);
        let mut a = net.endpoint(0).unwrap();
        let mut b = net.endpoint(1).unwrap();

        a.send(Message::new(0, 1, Body::Request { clock: 1 })).await.unwrap();
        let msg = b.receive(MessageFilter::ANY).await.unwrap();
        assert_eq!(msg, Message::new(0, 1, Body::Request { clock: 1 }));
    }

    #[tokio::test]
    async fn probe_then_filtered_receive() {
        let mut net = LocalNetwork::new(0..3);
        let mut a = net.endpoint(0).unwrap();
        let mut b = net.endpoint(1).unwrap();
        let mut c = net.endpoint(2).unwrap();

        assert_eq!(c.probe(), None);
        a.send(Message::new(0, 2, Body::Reply { clock: 3 })).await.unwrap();
        b.send(Message::new(1, 2, Body::PairRequest)).await.unwrap();

        assert_eq!(c.probe(), Some((0, MessageKind::Reply)));
        let msg = c.try_receive(MessageFilter::from_source(1)).unwrap();
        assert_eq!(msg.kind(), MessageKind::PairRequest);
        assert_eq!(c.probe(), Some((0, MessageKind::Reply)));
    }

    #[tokio::test]
    async fn unknown_destination_fails() {
        let mut net = LocalNetwork::new(0..1);
        let mut a = net.endpoint(0).unwrap();
        let err = a.send(Message::new(0, 9, Body::PairEnd)).await.unwrap_err();
        assert!(matches!(err, TransportError::UnknownParticipant(9)));
    }

    #[test]
    fn endpoint_taken_once() {
        let mut net = LocalNetwork::new(0..1);
        assert!(net.endpoint(0).is_some());
        assert!(net.endpoint(0).is_none());
    }
}
