//! Transport seams for a stream session.
//!
//! A session pushes data through a [`FrameSink`] and reads client signals
//! from a [`ControlChannel`]. The WebSocket adapter lives in `ws`; the
//! channel-backed pair in [`memory`] drives sessions without a network.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Sent once, before the first data batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamMetadata {
    /// Estimated duration of the whole track from its size and bitrate.
    pub duration_secs: f64,
    /// Position the stream starts at.
    pub start_secs: f64,
}

/// Signals a client may send during a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    StillPlaying,
    Finished,
}

impl ControlSignal {
    pub const STILL_PLAYING: &'static str = "played_60_sec";
    pub const FINISHED: &'static str = "finish";

    /// Recognize a text message. Anything else is not a control signal.
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            Self::STILL_PLAYING => Some(Self::StillPlaying),
            Self::FINISHED => Some(Self::Finished),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StillPlaying => Self::STILL_PLAYING,
            Self::Finished => Self::FINISHED,
        }
    }
}

/// Outbound half of a session.
#[async_trait]
pub trait FrameSink: Send {
    async fn send_metadata(&mut self, metadata: &StreamMetadata) -> Result<()>;

    /// Send one batch of concatenated frames. May wait under backpressure.
    async fn send_batch(&mut self, batch: Bytes) -> Result<()>;

    /// Send a text event such as a confirmed play.
    async fn send_event(&mut self, event: String) -> Result<()>;

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Inbound half of a session.
#[async_trait]
pub trait ControlChannel: Send {
    /// Next control signal. Unrecognized messages are skipped; `Ok(None)`
    /// means the client went away.
    async fn recv(&mut self) -> Result<Option<ControlSignal>>;
}

pub mod memory {
    //! Channel-backed transport.

    use super::*;
    use crate::error::Error;
    use tokio::sync::mpsc;

    /// What the server sent.
    #[derive(Debug, Clone, PartialEq)]
    pub enum Outbound {
        Metadata(StreamMetadata),
        Batch(Bytes),
        Event(String),
        Close,
    }

    /// What the client sends.
    #[derive(Debug, Clone, PartialEq)]
    pub enum Inbound {
        Text(String),
        Binary(Vec<u8>),
        /// Simulate a broken connection.
        Error(String),
    }

    pub struct ChannelSink {
        tx: mpsc::Sender<Outbound>,
    }

    pub struct ChannelControl {
        rx: mpsc::Receiver<Inbound>,
    }

    /// The client's ends of the pair.
    pub struct ClientEnd {
        pub received: mpsc::Receiver<Outbound>,
        pub control: mpsc::Sender<Inbound>,
    }

    impl ClientEnd {
        pub async fn send_text(&self, text: &str) -> bool {
            self.control.send(Inbound::Text(text.to_string())).await.is_ok()
        }
    }

    /// Build a connected pair. `buffer` bounds the outbound queue, so a
    /// client that stops reading applies backpressure.
    pub fn pair(buffer: usize) -> (ChannelSink, ChannelControl, ClientEnd) {
        let (out_tx, out_rx) = mpsc::channel(buffer.max(1));
        let (in_tx, in_rx) = mpsc::channel(16);
        (
            ChannelSink { tx: out_tx },
            ChannelControl { rx: in_rx },
            ClientEnd {
                received: out_rx,
                control: in_tx,
            },
        )
    }

    impl ChannelSink {
        async fn push(&mut self, message: Outbound) -> Result<()> {
            self.tx
                .send(message)
                .await
                .map_err(|_| Error::transport("client receiver dropped"))
        }
    }

    #[async_trait]
    impl FrameSink for ChannelSink {
        async fn send_metadata(&mut self, metadata: &StreamMetadata) -> Result<()> {
            self.push(Outbound::Metadata(metadata.clone())).await
        }

        async fn send_batch(&mut self, batch: Bytes) -> Result<()> {
            self.push(Outbound::Batch(batch)).await
        }

        async fn send_event(&mut self, event: String) -> Result<()> {
            self.push(Outbound::Event(event)).await
        }

        async fn close(&mut self) -> Result<()> {
            // Never wait here; the client may have stopped reading.
            let _ = self.tx.try_send(Outbound::Close);
            Ok(())
        }
    }

    #[async_trait]
    impl ControlChannel for ChannelControl {
        async fn recv(&mut self) -> Result<Option<ControlSignal>> {
            while let Some(message) = self.rx.recv().await {
                match message {
                    Inbound::Text(text) => {
                        if let Some(signal) = ControlSignal::parse(&text) {
                            return Ok(Some(signal));
                        }
                    }
                    Inbound::Binary(_) => {}
                    Inbound::Error(e) => return Err(Error::transport(e)),
                }
            }
            Ok(None)
        }
    }
}
