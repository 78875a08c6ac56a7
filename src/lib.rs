use scraper::Html;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use url::Url;

pub mod error;
pub mod extract;
pub mod fetch;
pub mod filter;
pub mod registry;
pub mod report;

pub use error::{CrawlError, FetchError};
pub use fetch::{Fetcher, HttpFetcher};
pub use registry::VisitedRegistry;
pub use report::{print_summary, CrawlRecord, LogSink, MemorySink, RecordDrain, RecordSink};

pub struct CrawlConfig {
    /// Per-request timeout for the http fetcher.
    pub timeout: Duration,
    /// Maximum number of pages being processed at once.
    pub max_in_flight: usize,
    /// Capacity of the discovered-link channel; a page task publishing
    /// links suspends while it is full.
    pub queue_capacity: usize,
    /// Url suffixes rejected before they can occupy a registry slot,
    /// without the leading dot.
    pub skip_extensions: Vec<String>,
    /// Append-only record log.
    pub log_path: PathBuf,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_in_flight: 20,
            queue_capacity: 256,
            skip_extensions: vec!["pdf".to_string()],
            log_path: PathBuf::from("records.jsonl"),
        }
    }
}

/// Crawls everything reachable under `seed` and prints the final report.
///
/// Scope is fixed to the seed for the whole run: a url is eligible only if
/// its canonical string starts with the seed string. Blocks until no
/// traversal task remains, then closes the record log and prints the
/// summary.
pub async fn run(seed: &str, config: &CrawlConfig) -> Result<Vec<CrawlRecord>, CrawlError> {
    Url::parse(seed)?;

    let fetcher = Arc::new(HttpFetcher::new(config.timeout)?);
    let (sink, drain) = LogSink::open(&config.log_path).await?;
    let sink = Arc::new(sink);

    run_crawler(fetcher, Arc::clone(&sink), seed, config).await?;

    drop(sink);
    let records = drain.close().await?;
    print_summary(&records);
    Ok(records)
}

/// The traversal engine behind [`run`], generic over the fetch and sink
/// boundaries.
///
/// One scheduler loop owns the frontier and the visited registry. It keeps
/// at most `max_in_flight` page tasks running; each task reports the links
/// that survived filtering back over a bounded channel, and the scheduler
/// admits them: in scope, no skipped extension, then an atomic claim, so a
/// url is fetched at most once no matter how many pages point at it. The
/// run is over when nothing is in flight, the frontier is empty and the
/// discovery channel has been drained.
pub async fn run_crawler<F, S>(
    fetcher: Arc<F>,
    sink: Arc<S>,
    seed: &str,
    config: &CrawlConfig,
) -> Result<(), CrawlError>
where
    F: Fetcher,
    S: RecordSink,
{
    Url::parse(seed)?;
    let scope = seed.to_string();
    let skip_suffixes: Vec<String> = config
        .skip_extensions
        .iter()
        .map(|ext| format!(".{}", ext.trim_start_matches('.')))
        .collect();

    let registry = VisitedRegistry::new();
    let (discovered_tx, mut discovered_rx) = mpsc::channel::<Vec<String>>(config.queue_capacity);
    let mut frontier: VecDeque<String> = VecDeque::new();
    let mut tasks: JoinSet<()> = JoinSet::new();
    let mut in_flight = 0usize;

    if admit(&scope, &skip_suffixes, &registry, &scope) {
        frontier.push_back(scope.clone());
    } else {
        info!("Seed {} was rejected, nothing to crawl", seed);
    }

    loop {
        while in_flight < config.max_in_flight {
            let Some(url) = frontier.pop_front() else {
                break;
            };
            in_flight += 1;
            tasks.spawn(process(
                url,
                Arc::clone(&fetcher),
                Arc::clone(&sink),
                discovered_tx.clone(),
            ));
        }

        if in_flight == 0 {
            // Nothing is running, so no new batches can arrive; whatever is
            // buffered is all that is left.
            while let Ok(links) = discovered_rx.try_recv() {
                for link in links {
                    if admit(&scope, &skip_suffixes, &registry, &link) {
                        frontier.push_back(link);
                    }
                }
            }
            if frontier.is_empty() {
                break;
            }
            continue;
        }

        tokio::select! {
            joined = tasks.join_next() => {
                if let Some(result) = joined {
                    in_flight -= 1;
                    if let Err(err) = result {
                        warn!("Crawl task failed: {}", err);
                    }
                }
            }
            batch = discovered_rx.recv() => {
                if let Some(links) = batch {
                    for link in links {
                        if admit(&scope, &skip_suffixes, &registry, &link) {
                            frontier.push_back(link);
                        }
                    }
                }
            }
        }
    }

    info!("Crawl of {} finished, {} urls claimed", scope, registry.len());
    Ok(())
}

/// Scope and extension checks run before the claim attempt, so rejected
/// urls never occupy a registry slot.
fn admit(scope: &str, skip_suffixes: &[String], registry: &VisitedRegistry, url: &str) -> bool {
    if !url.starts_with(scope) {
        return false;
    }
    if skip_suffixes
        .iter()
        .any(|suffix| url.ends_with(suffix.as_str()))
    {
        return false;
    }
    registry.try_claim(url)
}

/// One claimed url through fetch, extract, filter, record, expand. Fetch
/// failures end the task with a warning and nothing recorded; pages whose
/// filtered link set came up empty are not recorded either.
async fn process<F, S>(
    url: String,
    fetcher: Arc<F>,
    sink: Arc<S>,
    discovered: mpsc::Sender<Vec<String>>,
) where
    F: Fetcher,
    S: RecordSink,
{
    debug!("Visit {}", url);
    let body = match fetcher.fetch(&url).await {
        Ok(body) => body,
        Err(err) => {
            warn!("Can not reach {}, skipping: {}", url, err);
            return;
        }
    };

    let raw_links = {
        let doc = Html::parse_document(&body);
        extract::extract_links(&doc)
    };

    let Ok(base) = Url::parse(&url) else {
        debug!("Claimed url {} no longer parses, dropping", url);
        return;
    };
    let filtered = filter::filter_links(&base, &raw_links);
    if filtered.is_empty() {
        debug!("No usable links on {}", url);
        return;
    }

    let record = CrawlRecord::new(url, filtered);
    let links = record.links.clone();
    if let Err(err) = sink.record(record).await {
        warn!("Dropping record: {}", err);
    }
    if discovered.send(links).await.is_err() {
        debug!("Scheduler is gone, discarding discovered links");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools;
    use pretty_assertions::assert_eq;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticFetcher {
        pages: HashMap<String, String>,
        fetches: AtomicUsize,
    }

    impl StaticFetcher {
        fn new(pages: &[(&str, String)]) -> Arc<Self> {
            Arc::new(Self {
                pages: pages
                    .iter()
                    .map(|(url, body)| (url.to_string(), body.clone()))
                    .collect(),
                fetches: AtomicUsize::new(0),
            })
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl Fetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| FetchError::new(format!("no route to {url}")))
        }
    }

    fn page(links: &[&str]) -> String {
        let anchors = links
            .iter()
            .map(|link| format!(r#"<a href="{link}">x</a>"#))
            .join("");
        format!("<html><body>{anchors}</body></html>")
    }

    fn recorded_urls(sink: &MemorySink) -> HashSet<String> {
        sink.records().iter().map(|r| r.url.clone()).collect()
    }

    #[tokio::test]
    async fn records_every_reachable_page_exactly_once() {
        let fetcher = StaticFetcher::new(&[
            ("http://site.test/", page(&["a", "b"])),
            ("http://site.test/a", page(&["b", "c"])),
            ("http://site.test/b", page(&["http://other.test/x", "a"])),
            ("http://site.test/c", page(&[])),
        ]);
        let sink = Arc::new(MemorySink::new());

        run_crawler(
            Arc::clone(&fetcher),
            Arc::clone(&sink),
            "http://site.test/",
            &CrawlConfig::default(),
        )
        .await
        .expect("crawl failed");

        // every in-scope page fetched once, nothing fetched twice
        assert_eq!(fetcher.fetches(), 4);

        let records = sink.records();
        assert_eq!(records.len(), 3);
        assert_eq!(
            recorded_urls(&sink),
            HashSet::from([
                "http://site.test/".to_string(),
                "http://site.test/a".to_string(),
                "http://site.test/b".to_string(),
            ])
        );

        // the out-of-scope link is recorded but never expanded
        let b = records
            .iter()
            .find(|r| r.url == "http://site.test/b")
            .expect("record for /b");
        assert_eq!(b.links, vec!["http://other.test/x", "http://site.test/a"]);
    }

    #[tokio::test]
    async fn skipped_extensions_never_reach_the_fetcher() {
        let fetcher = StaticFetcher::new(&[]);
        let sink = Arc::new(MemorySink::new());

        run_crawler(
            Arc::clone(&fetcher),
            Arc::clone(&sink),
            "http://site.test/doc.pdf",
            &CrawlConfig::default(),
        )
        .await
        .expect("crawl failed");

        assert_eq!(fetcher.fetches(), 0);
        assert!(sink.records().is_empty());
    }

    #[tokio::test]
    async fn pdf_links_are_rejected_before_the_claim() {
        let fetcher = StaticFetcher::new(&[
            ("http://site.test/", page(&["report.pdf", "a"])),
            ("http://site.test/a", page(&[])),
        ]);
        let sink = Arc::new(MemorySink::new());

        run_crawler(
            Arc::clone(&fetcher),
            Arc::clone(&sink),
            "http://site.test/",
            &CrawlConfig::default(),
        )
        .await
        .expect("crawl failed");

        // the pdf shows up in the record but is never fetched
        assert_eq!(fetcher.fetches(), 2);
        let root = sink
            .records()
            .into_iter()
            .find(|r| r.url == "http://site.test/")
            .expect("record for the seed");
        assert!(root
            .links
            .contains(&"http://site.test/report.pdf".to_string()));
    }

    #[tokio::test]
    async fn fetch_failures_do_not_stop_siblings() {
        let fetcher = StaticFetcher::new(&[
            ("http://site.test/", page(&["a", "dead"])),
            ("http://site.test/a", page(&["b"])),
            ("http://site.test/b", page(&[])),
        ]);
        let sink = Arc::new(MemorySink::new());

        run_crawler(
            Arc::clone(&fetcher),
            Arc::clone(&sink),
            "http://site.test/",
            &CrawlConfig::default(),
        )
        .await
        .expect("crawl failed");

        // the dead url was attempted, produced no record, and the rest of
        // the site still got crawled
        assert_eq!(fetcher.fetches(), 4);
        assert_eq!(
            recorded_urls(&sink),
            HashSet::from([
                "http://site.test/".to_string(),
                "http://site.test/a".to_string(),
            ])
        );
    }

    #[tokio::test]
    async fn cyclic_link_graphs_terminate() {
        let fetcher = StaticFetcher::new(&[
            ("http://site.test/", page(&["a"])),
            ("http://site.test/a", page(&["http://site.test/"])),
        ]);
        let sink = Arc::new(MemorySink::new());

        run_crawler(
            Arc::clone(&fetcher),
            Arc::clone(&sink),
            "http://site.test/",
            &CrawlConfig::default(),
        )
        .await
        .expect("crawl failed");

        assert_eq!(fetcher.fetches(), 2);
        assert_eq!(sink.records().len(), 2);
    }

    #[tokio::test]
    async fn a_tight_in_flight_bound_still_finishes_the_crawl() {
        let children: Vec<String> = (0..40).map(|i| format!("p{i}")).collect();
        let child_refs: Vec<&str> = children.iter().map(String::as_str).collect();
        let mut pages = vec![("http://site.test/".to_string(), page(&child_refs))];
        pages.extend((0..40).map(|i| (format!("http://site.test/p{i}"), page(&[]))));
        let pages: Vec<(&str, String)> = pages
            .iter()
            .map(|(url, body)| (url.as_str(), body.clone()))
            .collect();

        let fetcher = StaticFetcher::new(&pages);
        let sink = Arc::new(MemorySink::new());
        let config = CrawlConfig {
            max_in_flight: 2,
            queue_capacity: 1,
            ..CrawlConfig::default()
        };

        run_crawler(
            Arc::clone(&fetcher),
            Arc::clone(&sink),
            "http://site.test/",
            &config,
        )
        .await
        .expect("crawl failed");

        assert_eq!(fetcher.fetches(), 41);
        assert_eq!(sink.records().len(), 1);
    }

    #[test]
    fn out_of_scope_urls_are_rejected_before_the_claim() {
        let registry = VisitedRegistry::new();
        let skip = vec![".pdf".to_string()];

        assert!(!admit("http://site.test/", &skip, &registry, "http://other.test/x"));
        assert!(!admit("http://site.test/", &skip, &registry, "http://site.test/doc.pdf"));
        assert!(registry.is_empty());

        assert!(admit("http://site.test/", &skip, &registry, "http://site.test/a"));
        assert!(!admit("http://site.test/", &skip, &registry, "http://site.test/a"));
        assert!(registry.contains("http://site.test/a"));
    }

    #[tokio::test]
    async fn invalid_seed_is_a_run_level_error() {
        let fetcher = StaticFetcher::new(&[]);
        let sink = Arc::new(MemorySink::new());

        let result = run_crawler(fetcher, sink, "not a url", &CrawlConfig::default()).await;
        assert!(matches!(result, Err(CrawlError::InvalidSeed(_))));
    }
}
