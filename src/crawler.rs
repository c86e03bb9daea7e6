// SPDX-FileCopyrightText: 2020 Kerstin Humm <mail@erictapen.name>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::ingest::{IngestError, PullSink};
use crate::via_rail_feed::{self, Feed};
use log::{error, info, warn};
use std::error::Error as StdError;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};
use thiserror::Error;

/// The feed only updates every few minutes anyway, so this is on the generous side.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// One week. Also keeps `Instant + interval` far away from overflowing.
pub const MAX_INTERVAL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("failed to fetch train data")]
    Fetch(#[from] reqwest::Error),
    #[error("failed to decode train data")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error("failed to store train data ({} stage)", .0.stage())]
    Ingest(#[from] IngestError),
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("pull interval must be between 1 and 604800 seconds, got {0}")]
pub struct InvalidInterval(pub u64);

/// Turn the `--interval` option into a pull interval.
pub fn pull_interval(seconds: u64) -> Result<Duration, InvalidInterval> {
    let interval = Duration::from_secs(seconds);
    if seconds == 0 || interval > MAX_INTERVAL {
        return Err(InvalidInterval(seconds));
    }
    Ok(interval)
}

/// Where train data comes from.
pub trait FeedSource {
    fn fetch(&mut self) -> Result<Feed, FeedError>;
}

pub struct HttpFeedSource {
    client: reqwest::blocking::Client,
    url: String,
}

impl HttpFeedSource {
    pub fn new(url: &str) -> Result<Self, FeedError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(HttpFeedSource {
            client,
            url: url.to_string(),
        })
    }
}

impl FeedSource for HttpFeedSource {
    fn fetch(&mut self) -> Result<Feed, FeedError> {
        info!("Fetching train data from {}", self.url);
        let body = self
            .client
            .get(&self.url)
            .send()?
            .error_for_status()?
            .text()?;
        info!("Decoding train data.");
        Ok(via_rail_feed::deserialize(&body)?)
    }
}

/// Decides when the next pull happens.
pub trait Ticker {
    /// Block until the next pull is due. `false` means no further pulls should happen.
    fn wait(&mut self) -> bool;
}

/// Ticks at a fixed rate until something is sent on, or the sender hangs up, the shutdown
/// channel.
pub struct IntervalTicker {
    interval: Duration,
    next_execution: Instant,
    shutdown: Receiver<()>,
}

impl IntervalTicker {
    /// The first tick is due one `interval` from now.
    pub fn new(interval: Duration, shutdown: Receiver<()>) -> Self {
        IntervalTicker {
            interval,
            next_execution: Instant::now() + interval,
            shutdown,
        }
    }
}

impl Ticker for IntervalTicker {
    fn wait(&mut self) -> bool {
        let timeout = self.next_execution.saturating_duration_since(Instant::now());
        match self.shutdown.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => {
                self.next_execution += self.interval;
                // Don't try to catch up on ticks missed during a very long pull.
                let now = Instant::now();
                if self.next_execution < now {
                    self.next_execution = now + self.interval;
                }
                true
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }
}

/// One fetch and store cycle.
pub fn pull_once(
    source: &mut impl FeedSource,
    sink: &mut impl PullSink,
) -> Result<i64, CrawlError> {
    let feed = source.fetch()?;
    if feed.is_empty() {
        warn!("Feed contains no trains, storing an empty pull.");
    }
    info!("Fetched {} trains, inserting train data.", feed.len());
    Ok(sink.store(&feed)?)
}

/// Pull once right away and then on every tick, until the ticker says stop.
///
/// Failed cycles are logged and otherwise ignored, the next tick is the retry.
pub fn crawler(
    source: &mut impl FeedSource,
    sink: &mut impl PullSink,
    ticker: &mut impl Ticker,
) {
    loop {
        match pull_once(source, sink) {
            Ok(pull_id) => info!("Pull {} complete.", pull_id),
            Err(e) => log_crawl_error(&e),
        }
        if !ticker.wait() {
            info!("Crawler stopped.");
            return;
        }
    }
}

fn log_crawl_error(e: &CrawlError) {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        message = format!("{}: {}", message, cause);
        source = cause.source();
    }
    error!("{}", message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::IngestStage;
    use crate::via_rail_feed::RawTrain;
    use rstest::rstest;
    use std::collections::VecDeque;
    use std::error::Error;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc::channel;
    use std::thread;

    /// Hands out prepared responses, then keeps failing to decode.
    struct FakeSource {
        responses: VecDeque<Result<Feed, FeedError>>,
        fetches: usize,
    }

    impl FakeSource {
        fn new(responses: Vec<Result<Feed, FeedError>>) -> Self {
            FakeSource {
                responses: responses.into(),
                fetches: 0,
            }
        }
    }

    fn decode_error() -> FeedError {
        match via_rail_feed::deserialize("not json") {
            Ok(_) => unreachable!("\"not json\" is not json"),
            Err(e) => FeedError::Decode(e),
        }
    }

    impl FeedSource for FakeSource {
        fn fetch(&mut self) -> Result<Feed, FeedError> {
            self.fetches += 1;
            self.responses.pop_front().unwrap_or_else(|| Err(decode_error()))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        stored: Vec<usize>,
        fail: bool,
    }

    impl PullSink for RecordingSink {
        fn store(&mut self, feed: &Feed) -> Result<i64, IngestError> {
            if self.fail {
                return Err(IngestError::InsertPull {
                    source: diesel::result::Error::RollbackTransaction,
                });
            }
            self.stored.push(feed.len());
            Ok(self.stored.len() as i64)
        }
    }

    /// Allows a fixed number of ticks without waiting.
    struct CountingTicker {
        remaining: usize,
        waits: usize,
    }

    impl Ticker for CountingTicker {
        fn wait(&mut self) -> bool {
            self.waits += 1;
            if self.remaining == 0 {
                return false;
            }
            self.remaining -= 1;
            true
        }
    }

    fn feed_with(names: &[&str]) -> Feed {
        names
            .iter()
            .map(|name| (name.to_string(), RawTrain::default()))
            .collect()
    }

    #[test]
    fn pulls_immediately_and_on_every_tick() {
        let mut source = FakeSource::new(vec![
            Ok(feed_with(&["61"])),
            Ok(feed_with(&["61", "63"])),
            Ok(feed_with(&[])),
        ]);
        let mut sink = RecordingSink::default();
        let mut ticker = CountingTicker {
            remaining: 2,
            waits: 0,
        };

        crawler(&mut source, &mut sink, &mut ticker);

        assert_eq!(source.fetches, 3);
        assert_eq!(sink.stored, vec![1, 2, 0]);
        assert_eq!(ticker.waits, 3);
    }

    #[test]
    fn failed_cycles_do_not_stop_the_crawler() {
        let mut source = FakeSource::new(vec![Err(decode_error()), Ok(feed_with(&["61"]))]);
        let mut sink = RecordingSink::default();
        let mut ticker = CountingTicker {
            remaining: 2,
            waits: 0,
        };

        crawler(&mut source, &mut sink, &mut ticker);

        assert_eq!(source.fetches, 3);
        assert_eq!(sink.stored, vec![1]);
    }

    #[test]
    fn stopped_ticker_means_exactly_one_pull() {
        let mut source = FakeSource::new(vec![Ok(feed_with(&["61"]))]);
        let mut sink = RecordingSink::default();
        let mut ticker = CountingTicker {
            remaining: 0,
            waits: 0,
        };

        crawler(&mut source, &mut sink, &mut ticker);

        assert_eq!(source.fetches, 1);
        assert_eq!(sink.stored, vec![1]);
    }

    #[test]
    fn pull_once_reports_failing_stage() {
        let mut source = FakeSource::new(vec![Ok(feed_with(&["61"]))]);
        let mut sink = RecordingSink {
            fail: true,
            ..RecordingSink::default()
        };

        match pull_once(&mut source, &mut sink) {
            Err(CrawlError::Ingest(e)) => assert_eq!(e.stage(), IngestStage::Pull),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn pull_once_reports_decode_errors() {
        let mut source = FakeSource::new(vec![]);
        let mut sink = RecordingSink::default();

        assert!(matches!(
            pull_once(&mut source, &mut sink),
            Err(CrawlError::Feed(FeedError::Decode(_)))
        ));
        assert!(sink.stored.is_empty());
    }

    #[test]
    fn pull_once_against_the_database() -> Result<(), Box<dyn Error>> {
        let mut source = FakeSource::new(vec![Ok(via_rail_feed::deserialize(
            crate::testing::SAMPLE_FEED,
        )?)]);
        let mut db = crate::testing::connection()?;

        let pull_id = pull_once(&mut source, &mut db)?;

        let trains = crate::store::list_trains(&mut db, pull_id, false)?;
        assert_eq!(trains.len(), 2);
        Ok(())
    }

    #[test]
    fn interval_ticker_ticks_after_interval() {
        let (_tx, rx) = channel();
        let mut ticker = IntervalTicker::new(Duration::from_millis(10), rx);

        let start = Instant::now();
        assert!(ticker.wait());
        assert!(ticker.wait());
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn interval_ticker_stops_on_shutdown() -> Result<(), Box<dyn Error>> {
        let (tx, rx) = channel();
        let mut ticker = IntervalTicker::new(Duration::from_secs(3600), rx);

        tx.send(())?;

        let start = Instant::now();
        assert!(!ticker.wait());
        assert!(start.elapsed() < Duration::from_secs(60));
        Ok(())
    }

    #[test]
    fn interval_ticker_stops_when_sender_is_gone() {
        let (tx, rx) = channel::<()>();
        let mut ticker = IntervalTicker::new(Duration::from_secs(3600), rx);
        drop(tx);

        assert!(!ticker.wait());
    }

    #[test]
    fn interval_ticker_keeps_a_fixed_rate() {
        let interval = Duration::from_millis(100);
        let (_tx, rx) = channel();
        let mut ticker = IntervalTicker::new(interval, rx);

        // A pull that takes longer than a few intervals.
        thread::sleep(interval * 3 + interval / 2);
        let before = Instant::now();
        assert!(ticker.wait());
        let after = Instant::now();
        assert!(after - before < interval, "overdue tick should fire at once");
        // One interval from now, not a backlog of overdue deadlines.
        assert!(ticker.next_execution >= before + interval);
        assert!(ticker.next_execution <= after + interval);

        // A short pull doesn't shift the schedule.
        let deadline = ticker.next_execution;
        thread::sleep(interval / 5);
        assert!(ticker.wait());
        assert!(Instant::now() >= deadline);
        assert_eq!(ticker.next_execution, deadline + interval);
    }

    #[rstest]
    #[case(1, Ok(Duration::from_secs(1)))]
    #[case(7200, Ok(Duration::from_secs(7200)))]
    #[case(604_800, Ok(MAX_INTERVAL))]
    #[case(0, Err(InvalidInterval(0)))]
    #[case(604_801, Err(InvalidInterval(604_801)))]
    #[case(u64::MAX, Err(InvalidInterval(u64::MAX)))]
    fn interval_bounds(#[case] seconds: u64, #[case] expected: Result<Duration, InvalidInterval>) {
        assert_eq!(pull_interval(seconds), expected);
    }

    /// Answer exactly one request with `response` and hand back the URL to request.
    fn serve_once(response: &'static str) -> Result<String, Box<dyn Error>> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let url = format!("http://{}/data/allData.json", listener.local_addr()?);
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut request = Vec::new();
                let mut buf = [0; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let _ = stream.write_all(response.as_bytes());
            }
        });
        Ok(url)
    }

    #[test]
    fn http_source_decodes_the_feed() -> Result<(), Box<dyn Error>> {
        let url = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 2\r\nConnection: close\r\n\r\n{}",
        )?;
        let mut source = HttpFeedSource::new(&url)?;

        let feed = source.fetch()?;

        assert!(feed.is_empty());
        Ok(())
    }

    #[test]
    fn http_source_unreachable_is_a_fetch_error() -> Result<(), Box<dyn Error>> {
        let mut source = HttpFeedSource::new("http://127.0.0.1:1/")?;

        assert!(matches!(source.fetch(), Err(FeedError::Fetch(_))));
        Ok(())
    }

    #[test]
    fn http_source_error_status_is_a_fetch_error() -> Result<(), Box<dyn Error>> {
        let url = serve_once(
            "HTTP/1.1 503 Service Unavailable\r\nContent-Type: application/json\r\nContent-Length: 2\r\nConnection: close\r\n\r\n{}",
        )?;
        let mut source = HttpFeedSource::new(&url)?;

        match source.fetch() {
            Err(FeedError::Fetch(e)) => {
                assert_eq!(e.status().map(|s| s.as_u16()), Some(503));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn http_source_garbage_is_a_decode_error() -> Result<(), Box<dyn Error>> {
        let url = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: 13\r\nConnection: close\r\n\r\n<html></html>",
        )?;
        let mut source = HttpFeedSource::new(&url)?;

        assert!(matches!(source.fetch(), Err(FeedError::Decode(_))));
        Ok(())
    }
}
