use crate::error::CrawlError;
use chrono::{DateTime, FixedOffset, Local};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Mutex;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

/// One successfully processed page: the url and every outbound link that
/// survived filtering. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlRecord {
    pub url: String,
    pub links: Vec<String>,
    pub crawled_at: DateTime<FixedOffset>,
}

impl CrawlRecord {
    pub fn new<U, I>(url: U, links: I) -> Self
    where
        U: Into<String>,
        I: IntoIterator<Item = String>,
    {
        Self {
            url: url.into(),
            links: links.into_iter().sorted().dedup().collect(),
            crawled_at: Local::now().fixed_offset(),
        }
    }
}

impl fmt::Display for CrawlRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "URL: \n{}\n", self.url)?;
        write!(f, "LINKS: \n{}\n", self.links.iter().join("\n"))
    }
}

#[async_trait::async_trait]
pub trait RecordSink: Send + Sync + 'static {
    async fn record(&self, record: CrawlRecord) -> Result<(), CrawlError>;
}

/// Append-only JSON-lines sink. Records from concurrently running tasks
/// funnel through a channel into one writer task, so lines never interleave;
/// arrival order in the log is whatever the crawl produced.
pub struct LogSink {
    tx: mpsc::Sender<CrawlRecord>,
}

/// Handle on the writer task; closing it yields every record of the run.
pub struct RecordDrain {
    task: JoinHandle<Result<Vec<CrawlRecord>, CrawlError>>,
}

impl LogSink {
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<(Self, RecordDrain), CrawlError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())
            .await?;

        let (tx, mut rx) = mpsc::channel::<CrawlRecord>(64);
        let task = tokio::spawn(async move {
            let mut writer = BufWriter::new(file);
            let mut records: Vec<CrawlRecord> = Vec::new();
            while let Some(record) = rx.recv().await {
                let line = serde_json::to_string(&record)?;
                writer.write_all(line.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                info!("[{}] Recorded {}", records.len() + 1, record.url);
                records.push(record);
            }
            writer.flush().await?;
            Ok(records)
        });

        Ok((Self { tx }, RecordDrain { task }))
    }
}

#[async_trait::async_trait]
impl RecordSink for LogSink {
    async fn record(&self, record: CrawlRecord) -> Result<(), CrawlError> {
        self.tx
            .send(record)
            .await
            .map_err(|_| CrawlError::SinkClosed)
    }
}

impl RecordDrain {
    /// Waits for the writer to drain. Every sink handle must be dropped
    /// first or this never returns.
    pub async fn close(self) -> Result<Vec<CrawlRecord>, CrawlError> {
        self.task.await?
    }
}

/// In-memory sink, for tests and for embedding the crawler without a log
/// file.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<CrawlRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<CrawlRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl RecordSink for MemorySink {
    async fn record(&self, record: CrawlRecord) -> Result<(), CrawlError> {
        self.records.lock().unwrap().push(record);
        Ok(())
    }
}

/// The full report as one string: a block per recorded url, pages whose
/// link set came up empty are skipped.
pub fn summary(records: &[CrawlRecord]) -> String {
    records
        .iter()
        .filter(|record| !record.links.is_empty())
        .map(|record| format!("{record}\n"))
        .collect()
}

pub fn print_summary(records: &[CrawlRecord]) {
    print!("{}", summary(records));
}
