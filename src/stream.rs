use crate::error::StreamError;
use crate::markdown::{ParseOptions, parse_markdown_with};
use crate::model::AttributedChar;
use log::{debug, trace};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct ParseJob {
    generation: u64,
    buffer: String,
}

/// A parsed buffer tagged with the generation of the submission it answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedText {
    pub generation: u64,
    pub sequence: Vec<AttributedChar>,
}

/// Parses buffers on a background thread; the newest submission wins.
///
/// Jobs queued behind a newer one are skipped by the worker, and results for anything but the
/// latest submission are dropped by `poll_latest`.
pub struct ParseWorker {
    jobs: Option<Sender<ParseJob>>,
    results: Receiver<ParsedText>,
    latest: u64,
    thread: Option<JoinHandle<()>>,
}

impl ParseWorker {
    pub fn spawn(options: ParseOptions) -> Result<Self, StreamError> {
        let (job_tx, job_rx) = mpsc::channel::<ParseJob>();
        let (result_tx, result_rx) = mpsc::channel();
        let thread = thread::Builder::new()
            .name("markstream-parse".into())
            .spawn(move || run_worker(&job_rx, &result_tx, &options))
            .map_err(|err| StreamError::Spawn(err.to_string()))?;

        Ok(Self {
            jobs: Some(job_tx),
            results: result_rx,
            latest: 0,
            thread: Some(thread),
        })
    }

    /// Queues `buffer` for parsing and returns its generation.
    pub fn submit(&mut self, buffer: impl Into<String>) -> Result<u64, StreamError> {
        let jobs = self.jobs.as_ref().ok_or(StreamError::WorkerGone)?;
        self.latest += 1;
        jobs.send(ParseJob {
            generation: self.latest,
            buffer: buffer.into(),
        })
        .map_err(|_| StreamError::WorkerGone)?;
        Ok(self.latest)
    }

    pub fn latest_generation(&self) -> u64 {
        self.latest
    }

    /// Drains finished results without blocking, returning the one for the latest submission.
    pub fn poll_latest(&mut self) -> Result<Option<ParsedText>, StreamError> {
        let mut found = None;
        loop {
            match self.results.try_recv() {
                Ok(parsed) => {
                    if let Some(hit) = self.accept(parsed) {
                        found = Some(hit);
                    }
                }
                Err(TryRecvError::Empty) => return Ok(found),
                Err(TryRecvError::Disconnected) => {
                    return match found {
                        Some(parsed) => Ok(Some(parsed)),
                        None => Err(StreamError::WorkerGone),
                    };
                }
            }
        }
    }

    /// Blocks until the latest submission is parsed or `timeout` elapses.
    pub fn wait_latest(&mut self, timeout: Duration) -> Result<Option<ParsedText>, StreamError> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.results.recv_timeout(remaining) {
                Ok(parsed) => {
                    if let Some(hit) = self.accept(parsed) {
                        return Ok(Some(hit));
                    }
                }
                Err(RecvTimeoutError::Timeout) => return Ok(None),
                Err(RecvTimeoutError::Disconnected) => return Err(StreamError::WorkerGone),
            }
        }
    }

    fn accept(&self, parsed: ParsedText) -> Option<ParsedText> {
        if parsed.generation == self.latest {
            Some(parsed)
        } else {
            debug!(
                "discarding stale parse {} (latest {})",
                parsed.generation, self.latest
            );
            None
        }
    }
}

impl Drop for ParseWorker {
    fn drop(&mut self) {
        self.jobs.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn run_worker(jobs: &Receiver<ParseJob>, results: &Sender<ParsedText>, options: &ParseOptions) {
    while let Ok(mut job) = jobs.recv() {
        while let Ok(newer) = jobs.try_recv() {
            trace!("parse job {} superseded by {}", job.generation, newer.generation);
            job = newer;
        }
        let sequence = parse_markdown_with(&job.buffer, options);
        let parsed = ParsedText {
            generation: job.generation,
            sequence,
        };
        if results.send(parsed).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::parse_markdown;
    use pretty_assertions::assert_eq;

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn parses_submitted_buffer() {
        let mut worker = ParseWorker::spawn(ParseOptions::default()).expect("spawn");
        let generation = worker.submit("**hi**").expect("submit");
        let parsed = worker.wait_latest(WAIT).expect("worker alive").expect("result");
        assert_eq!(parsed.generation, generation);
        assert_eq!(parsed.sequence, parse_markdown("**hi**"));
    }

    #[test]
    fn only_latest_submission_is_delivered() {
        let mut worker = ParseWorker::spawn(ParseOptions::default()).expect("spawn");
        for n in 0..20 {
            worker.submit(format!("line {n}")).expect("submit");
        }
        let last = worker.submit("final").expect("submit");
        let parsed = worker.wait_latest(WAIT).expect("worker alive").expect("result");
        assert_eq!(parsed.generation, last);
        assert_eq!(parsed.sequence, parse_markdown("final"));
        assert_eq!(worker.poll_latest().expect("worker alive"), None);
    }

    #[test]
    fn poll_without_submission_is_empty() {
        let mut worker = ParseWorker::spawn(ParseOptions::default()).expect("spawn");
        assert_eq!(worker.poll_latest(), Ok(None));
        assert_eq!(worker.latest_generation(), 0);
    }
}
