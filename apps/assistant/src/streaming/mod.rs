//! Streaming delivery: one reply becomes an ordered sequence of events.
//!
//! Order on the wire: optional `title`, optional `candidates`/`jobs` payload,
//! the text as word fragments, then `done`. A turn that fails after the stream
//! opened ends with a single `error` event instead of `done`. A failed write
//! means the client left; delivery stops quietly.

use std::convert::Infallible;
use std::time::Duration;

use async_trait::async_trait;
use axum::response::sse::Event;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::models::record::{RecordKind, SearchRecord};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Title {
        title: String,
    },
    Candidates {
        candidates: Vec<Value>,
        total: usize,
        has_more: bool,
    },
    Jobs {
        jobs: Vec<Value>,
        total: usize,
        has_more: bool,
    },
    Text {
        content: String,
    },
    Done,
    Error {
        code: String,
        message: String,
    },
}

impl StreamEvent {
    /// Structured payload for a ranked batch, tagged by record kind.
    pub fn results<R: SearchRecord>(records: &[R], total: usize, has_more: bool) -> Self {
        let items = records
            .iter()
            .filter_map(|record| serde_json::to_value(record).ok())
            .collect();
        match R::KIND {
            RecordKind::Candidates => StreamEvent::Candidates {
                candidates: items,
                total,
                has_more,
            },
            RecordKind::Jobs => StreamEvent::Jobs {
                jobs: items,
                total,
                has_more,
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::Title { .. } => "title",
            StreamEvent::Candidates { .. } => "candidates",
            StreamEvent::Jobs { .. } => "jobs",
            StreamEvent::Text { .. } => "text",
            StreamEvent::Done => "done",
            StreamEvent::Error { .. } => "error",
        }
    }
}

/// Splits on lines, then words. Every word keeps a trailing space except the
/// last word of a line, which carries the line's `\n` instead.
pub fn fragments(text: &str) -> Vec<String> {
    let lines: Vec<&str> = text.split('\n').collect();
    let last_line = lines.len().saturating_sub(1);
    let mut out = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let newline = if i < last_line { "\n" } else { "" };
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() {
            if !newline.is_empty() {
                out.push(newline.to_string());
            }
            continue;
        }
        let last_word = words.len() - 1;
        for (j, word) in words.iter().enumerate() {
            if j < last_word {
                out.push(format!("{word} "));
            } else {
                out.push(format!("{word}{newline}"));
            }
        }
    }
    out
}

#[derive(Debug, Error)]
#[error("client disconnected")]
pub struct ClientGone;

/// Transport seam: anything that can take events in order.
#[async_trait]
pub trait EventSink: Send {
    async fn write_event(&mut self, event: &StreamEvent) -> Result<(), ClientGone>;
    async fn end(&mut self);
}

/// Feeds an axum SSE response through a channel; the receiver side is the body.
pub struct SseSink {
    tx: Option<mpsc::Sender<Result<Event, Infallible>>>,
}

impl SseSink {
    pub fn new(tx: mpsc::Sender<Result<Event, Infallible>>) -> Self {
        Self { tx: Some(tx) }
    }
}

#[async_trait]
impl EventSink for SseSink {
    async fn write_event(&mut self, event: &StreamEvent) -> Result<(), ClientGone> {
        let tx = self.tx.as_ref().ok_or(ClientGone)?;
        let sse = match Event::default().event(event.name()).json_data(event) {
            Ok(sse) => sse,
            Err(e) => {
                warn!("Dropping unserializable {} event: {e}", event.name());
                return Ok(());
            }
        };
        tx.send(Ok(sse)).await.map_err(|_| ClientGone)
    }

    async fn end(&mut self) {
        // Dropping the sender closes the response body.
        self.tx = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub events_sent: usize,
    pub completed: bool,
}

/// Ordered writer for one reply. Events go out as soon as they are known; after
/// a failed write every further call is a no-op. Never returns an error.
pub struct ReplyStream<'a> {
    sink: &'a mut dyn EventSink,
    word_delay: Duration,
    sent: usize,
    open: bool,
}

impl<'a> ReplyStream<'a> {
    pub fn new(sink: &'a mut dyn EventSink, word_delay: Duration) -> Self {
        Self {
            sink,
            word_delay,
            sent: 0,
            open: true,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub async fn send(&mut self, event: &StreamEvent) {
        if !self.open {
            return;
        }
        match self.sink.write_event(event).await {
            Ok(()) => self.sent += 1,
            Err(e) => {
                warn!("Stream stopped after {} events at {}: {e}", self.sent, event.name());
                self.open = false;
                self.sink.end().await;
            }
        }
    }

    /// Word fragments of `text`, paced by the configured delay.
    pub async fn send_text(&mut self, text: &str) {
        let parts = fragments(text);
        let last = parts.len().saturating_sub(1);
        for (i, content) in parts.into_iter().enumerate() {
            self.send(&StreamEvent::Text { content }).await;
            if !self.open {
                return;
            }
            if i < last && !self.word_delay.is_zero() {
                tokio::time::sleep(self.word_delay).await;
            }
        }
    }

    /// Writes `done` and closes the sink.
    pub async fn finish(mut self) -> Delivery {
        self.send(&StreamEvent::Done).await;
        self.close().await
    }

    /// Writes a terminal `error` event in place of `done` and closes the sink.
    pub async fn fail(mut self, code: &str, message: &str) -> Delivery {
        self.send(&StreamEvent::Error {
            code: code.to_string(),
            message: message.to_string(),
        })
        .await;
        self.close().await;
        Delivery {
            events_sent: self.sent,
            completed: false,
        }
    }

    async fn close(&mut self) -> Delivery {
        let completed = self.open;
        if self.open {
            self.open = false;
            self.sink.end().await;
            debug!("Stream delivered {} events", self.sent);
        }
        Delivery {
            events_sent: self.sent,
            completed,
        }
    }
}
