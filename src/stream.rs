// src/stream.rs
//! Merging the poll and change feeds into one NMEA byte stream

use crate::modem::{bounded, LocationChanges, LocationPayload, ModemLocation};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::{future::Future, io::Write, time::Duration};
use tokio::time::MissedTickBehavior;

/// Every NMEA sentence starts with this
pub const SENTENCE_START: char = '$';
/// Line terminator gpsd expects after each sentence
pub const LINE_TERMINATOR: &str = "\r\n";

/// Counters kept while the engine runs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamStats {
    pub polls: u64,
    pub poll_errors: u64,
    pub notifications: u64,
    pub lines_written: u64,
    pub write_errors: u64,
    pub last_forward: Option<DateTime<Utc>>,
}

/// Writes NMEA text from both feeds to a single sink.
///
/// Both feeds run on the same task, so a handler always finishes before the
/// next one starts. There is no ordering between the feeds and no
/// deduplication: gpsd copes with repeated sentences.
pub struct StreamEngine<W> {
    sink: W,
    poll_interval: Duration,
    call_timeout: Duration,
    last_forwarded: Option<String>,
    stats: StreamStats,
}

impl<W: Write> StreamEngine<W> {
    /// A poll read without a reply within `call_timeout` counts as failed
    pub fn new(sink: W, poll_interval: Duration, call_timeout: Duration) -> Self {
        Self {
            sink,
            poll_interval,
            call_timeout,
            last_forwarded: None,
            stats: StreamStats::default(),
        }
    }

    /// Most recently forwarded raw payload
    pub fn last_forwarded(&self) -> Option<&str> {
        self.last_forwarded.as_deref()
    }

    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }

    pub fn sink(&self) -> &W {
        &self.sink
    }

    /// Write every `$` line of `sentences` followed by CRLF.
    ///
    /// Each sentence goes out in a single write. The pty does not block, so
    /// a full buffer can take part of a sentence; the fragment is then ended
    /// with CRLF and the consumer drops it on its checksum. Returns the number
    /// of lines written in full. Write errors are logged per line and never
    /// returned.
    pub fn forward(&mut self, sentences: &str) -> usize {
        let mut written = 0;

        for line in sentences.split(&['\r', '\n'][..]).map(str::trim) {
            if !line.starts_with(SENTENCE_START) {
                continue;
            }

            let mut out = String::with_capacity(line.len() + LINE_TERMINATOR.len());
            out.push_str(line);
            out.push_str(LINE_TERMINATOR);

            match self.sink.write(out.as_bytes()) {
                Ok(n) if n == out.len() => written += 1,
                Ok(n) => {
                    self.stats.write_errors += 1;
                    tracing::warn!("PTY short write: {} of {} bytes", n, out.len());
                    if n > 0 {
                        let _ = self.sink.write(LINE_TERMINATOR.as_bytes());
                    }
                }
                Err(e) => {
                    self.stats.write_errors += 1;
                    tracing::warn!("PTY write error: {}", e);
                }
            }
        }

        self.stats.lines_written += written as u64;
        written
    }

    /// One poll tick: read the current location and forward its NMEA entry
    pub async fn poll_once<L: ModemLocation>(&mut self, modem: &L) {
        self.stats.polls += 1;

        match bounded(self.call_timeout, modem.location()).await {
            Ok(payload) => self.forward_payload(&payload),
            Err(e) => {
                self.stats.poll_errors += 1;
                tracing::warn!("Poll error: {}", e);
            }
        }
    }

    /// Handle one `Location` change notification
    pub fn on_change(&mut self, payload: &LocationPayload) {
        self.stats.notifications += 1;
        self.forward_payload(payload);
    }

    /// An empty NMEA entry forwards nothing; no keep-alive is synthesised
    /// from the last snapshot.
    fn forward_payload(&mut self, payload: &LocationPayload) {
        let Some(nmea) = payload.nmea() else {
            return;
        };

        self.forward(nmea);
        self.last_forwarded = Some(nmea.to_string());
        self.stats.last_forward = Some(Utc::now());
    }

    /// Run both feeds until `shutdown` completes.
    ///
    /// The first poll happens immediately, then once per interval. If the
    /// change stream ends, polling carries on alone. `shutdown` also cuts a
    /// poll that is still waiting for its reply.
    pub async fn run<L, F>(&mut self, modem: &L, mut changes: LocationChanges, shutdown: F)
    where
        L: ModemLocation,
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tokio::pin!(shutdown);
        let mut changes_open = true;

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => break,
                _ = ticker.tick() => tokio::select! {
                    biased;

                    _ = &mut shutdown => break,
                    _ = self.poll_once(modem) => {}
                },
                change = changes.next(), if changes_open => match change {
                    Some(payload) => self.on_change(&payload),
                    None => {
                        changes_open = false;
                        tracing::warn!("Location change notifications ended; continuing with polling only");
                    }
                },
            }
        }
    }
}
