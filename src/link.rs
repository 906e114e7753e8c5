//! Funnels the byte streams of all transports into a single pipeline.
//!
//! Transports run on their own threads and only ever send messages. One consumer owns the
//! [`Pipeline`] and feeds it bytes of the currently selected transport, so the decoder is never
//! driven by two sources at once.

use embassy_sync::{
    blocking_mutex::raw::CriticalSectionRawMutex,
    channel::{Channel, Receiver, Sender},
};

use crate::pipeline::{Observer, Pipeline};

pub const QUEUE_DEPTH: usize = 32;
pub const CHUNK_SIZE: usize = 64;

pub type Chunk = heapless::Vec<u8, CHUNK_SIZE>;

type MessageQueue = Channel<CriticalSectionRawMutex, Message, QUEUE_DEPTH>;
pub type MessageSender<'a> = Sender<'a, CriticalSectionRawMutex, Message, QUEUE_DEPTH>;
pub type MessageReceiver<'a> = Receiver<'a, CriticalSectionRawMutex, Message, QUEUE_DEPTH>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    Serial,
    Bluetooth,
}

#[derive(Debug)]
pub enum Message {
    /// Makes the source the one the pipeline is fed from.
    Select(Source),
    Bytes(Source, Chunk),
    Disconnected(Source),
    Shutdown,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub bytes_processed: u64,
    /// Bytes received from a source that was not selected.
    pub bytes_discarded: u64,
    pub handoffs: u32,
    pub disconnects: u32,
}

pub struct Link {
    queue: MessageQueue,
}

impl Default for Link {
    fn default() -> Self {
        Self::new()
    }
}

impl Link {
    pub const fn new() -> Self {
        Self {
            queue: MessageQueue::new(),
        }
    }

    pub fn transport(&self, source: Source) -> Transport<'_> {
        Transport {
            source,
            queue: self.queue.sender(),
        }
    }

    /// Stops [`Link::run`] once every message sent before is processed.
    pub fn shutdown(&self) {
        smol::block_on(self.queue.send(Message::Shutdown));
    }

    /// Processes messages on the current thread until shut down.
    pub fn run<O: Observer>(&self, pipeline: &mut Pipeline<O>) -> LinkStats {
        smol::block_on(run(pipeline, self.queue.receiver()))
    }
}

/// Producer handle of one transport.
#[derive(Clone, Copy)]
pub struct Transport<'a> {
    source: Source,
    queue: MessageSender<'a>,
}

impl Transport<'_> {
    pub async fn send(&self, bytes: &[u8]) {
        for chunk in bytes.chunks(CHUNK_SIZE) {
            let chunk = chunk.iter().copied().collect::<Chunk>();
            self.queue.send(Message::Bytes(self.source, chunk)).await;
        }
    }

    /// Sends bytes, waiting for room in the queue.
    pub fn push(&self, bytes: &[u8]) {
        smol::block_on(self.send(bytes));
    }

    pub fn select(&self) {
        smol::block_on(self.queue.send(Message::Select(self.source)));
    }

    pub fn disconnected(&self) {
        smol::block_on(self.queue.send(Message::Disconnected(self.source)));
    }
}

/// Feeds the pipeline from the selected source until a [`Message::Shutdown`] arrives.
pub async fn run<O: Observer>(
    pipeline: &mut Pipeline<O>,
    queue: MessageReceiver<'_>,
) -> LinkStats {
    let mut stats = LinkStats::default();
    let mut selected = None;

    loop {
        match queue.receive().await {
            Message::Select(source) => {
                if selected != Some(source) {
                    log::info!("Switching to {source:?}");
                    // A frame started on the previous source can not be completed by this one.
                    pipeline.reset_decoder();
                    selected = Some(source);
                    stats.handoffs += 1;
                }
            }

            Message::Bytes(source, chunk) if selected == Some(source) => {
                pipeline.feed_all(&chunk);
                stats.bytes_processed += chunk.len() as u64;
            }

            Message::Bytes(source, chunk) => {
                log::trace!("Discarding {} bytes from {source:?}", chunk.len());
                stats.bytes_discarded += chunk.len() as u64;
            }

            Message::Disconnected(source) => {
                log::info!("{source:?} disconnected");
                stats.disconnects += 1;
            }

            Message::Shutdown => {
                log::info!("Link shut down: {stats:?}");
                return stats;
            }
        }
    }
}
