//! Breadth-first, same-site content extraction.
//!
//! The crawler produces a lazy, finite sequence of page events over a
//! channel: the consumer sees pages as they are fetched, per-page failures
//! as recoverable events, and a fatal event when crawling cannot proceed
//! at all.

pub mod fetcher;
pub mod parse;

pub use fetcher::{HttpFetcher, PageFetcher};

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use url::Url;

use self::parse::{parse, same_host};

#[derive(Debug, Clone)]
pub struct CrawledPage {
    pub url: String,
    pub title: String,
    pub text: String,
    pub depth: u32,
    pub link_count: usize,
}

#[derive(Debug, Clone)]
pub enum CrawlEvent {
    Page(CrawledPage),
    /// A single page failed; the crawl continues.
    PageError { url: String, message: String },
    /// The crawl cannot proceed at all.
    Fatal { message: String },
}

#[derive(Clone)]
pub struct SiteCrawler {
    fetcher: Arc<dyn PageFetcher>,
}

impl SiteCrawler {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }

    /// Start a breadth-first crawl; events arrive on the returned channel
    /// until the limits are reached or the frontier is exhausted.
    pub fn stream(
        &self,
        start_url: String,
        max_depth: u32,
        max_pages: u32,
    ) -> mpsc::Receiver<CrawlEvent> {
        let (tx, rx) = mpsc::channel(16);
        let fetcher = self.fetcher.clone();

        tokio::spawn(async move {
            crawl_loop(fetcher, start_url, max_depth, max_pages, tx).await;
        });

        rx
    }
}

async fn crawl_loop(
    fetcher: Arc<dyn PageFetcher>,
    start_url: String,
    max_depth: u32,
    max_pages: u32,
    tx: mpsc::Sender<CrawlEvent>,
) {
    let start = match Url::parse(&start_url) {
        Ok(url) => url,
        Err(err) => {
            let _ = tx
                .send(CrawlEvent::Fatal {
                    message: format!("Invalid start URL {}: {}", start_url, err),
                })
                .await;
            return;
        }
    };

    let mut seen: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<(String, u32)> = VecDeque::from([(start_url, 0)]);
    let mut crawled = 0u32;

    while let Some((url, depth)) = queue.pop_front() {
        if crawled >= max_pages {
            break;
        }

        // Dedup on the fragment-stripped URL.
        let key = url.split('#').next().unwrap_or(&url).to_string();
        if seen.contains(&key) {
            continue;
        }

        let Ok(parsed_url) = Url::parse(&url) else {
            continue;
        };
        if !same_host(&start, &parsed_url) {
            continue;
        }
        seen.insert(key);

        match fetcher.fetch(&url).await {
            Ok(html) => {
                let page = parse(&html, &parsed_url);
                crawled += 1;

                if depth < max_depth {
                    for link in &page.links {
                        let link_key = link.split('#').next().unwrap_or(link).to_string();
                        if !seen.contains(&link_key) {
                            queue.push_back((link.clone(), depth + 1));
                        }
                    }
                }

                let event = CrawlEvent::Page(CrawledPage {
                    url,
                    title: page.title,
                    text: page.text,
                    depth,
                    link_count: page.links.len(),
                });
                if tx.send(event).await.is_err() {
                    return;
                }
            }
            Err(err) => {
                let event = CrawlEvent::PageError {
                    url,
                    message: err.to_string(),
                };
                if tx.send(event).await.is_err() {
                    return;
                }
            }
        }
    }
}

/// Stable page identifier: host plus a short content-independent hash of
/// the full URL.
pub fn page_slug(url: &str) -> String {
    let host = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "page".to_string());

    let digest = Sha256::digest(url.as_bytes());
    format!("{}_{}", host, &hex::encode(digest)[..10])
}
