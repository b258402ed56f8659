// Feed Discovery and Retrieval
//
// A FeedLocator lists the files of one publication as (filename, url) pairs in
// listing order. A Fetcher turns one of those pairs into a local gzip file the
// parser can open.
//
// Locators:
// - HtmlListingLocator: paged HTML table on the chain's price site
// - DirectoryFeedLocator: *.gz files already on disk
//
// Fetchers:
// - HttpFetcher: streams the body into the work directory
// - LocalFetcher: uses the path as given

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Url};
use scraper::{ElementRef, Html, Selector};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::FeedConfig;
use crate::error::{EtlError, Result};
use crate::models::{ITEM_TAG, STORE_TAG};

const USER_AGENT: &str = concat!("pricedock-etl/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// Feed Files
// ============================================================================

/// One downloadable file as listed by a locator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedFile {
    pub filename: String,
    /// Absolute URL, or a filesystem path for local feeds
    pub url: String,
}

impl FeedFile {
    pub fn new(filename: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            url: url.into(),
        }
    }

    pub fn kind(&self) -> Option<FeedKind> {
        FeedKind::classify(&self.filename)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedKind {
    /// Store directory (`Stores...`)
    Stores,
    /// Full price listing for one store (`PriceFull...`)
    Prices,
}

impl FeedKind {
    /// Classify a filename by its prefix token; `None` for anything else
    pub fn classify(filename: &str) -> Option<Self> {
        if filename.contains("Stores") {
            Some(FeedKind::Stores)
        } else if filename.contains("PriceFull") {
            Some(FeedKind::Prices)
        } else {
            None
        }
    }

    /// Repeated record element in documents of this kind
    pub fn record_tag(&self) -> &'static str {
        match self {
            FeedKind::Stores => STORE_TAG,
            FeedKind::Prices => ITEM_TAG,
        }
    }

    /// Download subdirectory under the work directory
    pub fn subdir(&self) -> &'static str {
        match self {
            FeedKind::Stores => "stores",
            FeedKind::Prices => "prices",
        }
    }
}

impl std::fmt::Display for FeedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedKind::Stores => write!(f, "stores"),
            FeedKind::Prices => write!(f, "prices"),
        }
    }
}

/// Whether a listed file is a regular store directory or full price listing.
///
/// Promotion files and `Null` placeholders are excluded.
pub fn is_wanted_listing(filename: &str) -> bool {
    (filename.contains("Stores") || filename.contains("PriceFull"))
        && !filename.contains("Promo")
        && !filename.contains("Null")
}

// ============================================================================
// Locators
// ============================================================================

#[async_trait]
pub trait FeedLocator: Send + Sync {
    /// Ordered list of files to process
    async fn locate(&self) -> Result<Vec<FeedFile>>;
}

/// Scrapes the paged HTML file listing (`<base>?page=N`)
pub struct HtmlListingLocator {
    client: Client,
    base_url: Url,
    max_pages: u32,
    max_files: Option<usize>,
}

impl HtmlListingLocator {
    pub fn new(config: &FeedConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| EtlError::config(format!("Invalid feed URL '{}': {}", config.base_url, e)))?;

        Ok(Self {
            client: http_client(config)?,
            base_url,
            max_pages: config.max_pages,
            max_files: config.max_files,
        })
    }

    fn page_url(&self, page: u32) -> String {
        let mut url = self.base_url.clone();
        url.query_pairs_mut().clear().append_pair("page", &page.to_string());
        url.to_string()
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| EtlError::fetch(url, e))?;

        if !response.status().is_success() {
            return Err(EtlError::fetch(url, format!("HTTP error: {}", response.status())));
        }

        response.text().await.map_err(|e| EtlError::fetch(url, e))
    }
}

#[async_trait]
impl FeedLocator for HtmlListingLocator {
    async fn locate(&self) -> Result<Vec<FeedFile>> {
        info!(base_url = %self.base_url, "Scanning file listing");

        let mut files = Vec::new();

        for page in 1..=self.max_pages {
            let url = self.page_url(page);
            let html = self.fetch_page(&url).await?;

            let Some(listed) = parse_listing_page(&html, &self.base_url)? else {
                debug!(page, "Listing exhausted");
                break;
            };

            for file in listed.into_iter().filter(|f| is_wanted_listing(&f.filename)) {
                debug!(filename = %file.filename, "Found feed file");
                files.push(file);
            }

            if let Some(max) = self.max_files {
                if files.len() >= max {
                    files.truncate(max);
                    break;
                }
            }
        }

        info!(files = files.len(), "File listing scanned");
        Ok(files)
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| EtlError::config(format!("Invalid selector '{}': {}", css, e)))
}

/// Extract every `(filename, url)` row of the first table on a listing page.
///
/// Returns `None` when the page has no table or the table has no data rows,
/// which marks the end of the listing. The first row is the header. Rows whose
/// first cell has no link are skipped.
pub fn parse_listing_page(html: &str, base_url: &Url) -> Result<Option<Vec<FeedFile>>> {
    let document = Html::parse_document(html);
    let table_selector = selector("table")?;
    let row_selector = selector("tr")?;
    let cell_selector = selector("td")?;
    let link_selector = selector("a[href]")?;

    let Some(table) = document.select(&table_selector).next() else {
        return Ok(None);
    };

    let rows: Vec<ElementRef> = table.select(&row_selector).skip(1).collect();
    if rows.is_empty() {
        return Ok(None);
    }

    let mut files = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(cell) = row.select(&cell_selector).next() else {
            continue;
        };

        let filename = cell.text().collect::<String>().trim().to_string();
        let href = cell
            .select(&link_selector)
            .next()
            .and_then(|a| a.value().attr("href"));

        match href.map(|h| base_url.join(h.trim())) {
            Some(Ok(url)) if !filename.is_empty() => {
                files.push(FeedFile::new(filename, url.to_string()));
            },
            Some(Err(e)) => warn!(filename = %filename, error = %e, "Unresolvable link in listing"),
            _ => debug!(filename = %filename, "Listing row without link"),
        }
    }

    Ok(Some(files))
}

/// Lists wanted `*.gz` feed files of a local directory, sorted by name
pub struct DirectoryFeedLocator {
    dir: PathBuf,
}

impl DirectoryFeedLocator {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl FeedLocator for DirectoryFeedLocator {
    async fn locate(&self) -> Result<Vec<FeedFile>> {
        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(|e| {
            EtlError::fetch(self.dir.display().to_string(), format!("cannot read directory: {e}"))
        })?;

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("gz") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if !is_wanted_listing(stem) {
                debug!(filename = stem, "Skipping unwanted local feed file");
                continue;
            }
            files.push(FeedFile::new(stem, path.display().to_string()));
        }

        files.sort_by(|a, b| a.filename.cmp(&b.filename));
        info!(dir = %self.dir.display(), files = files.len(), "Local feed directory scanned");
        Ok(files)
    }
}

// ============================================================================
// Fetchers
// ============================================================================

/// A feed file available on local disk
#[derive(Debug)]
pub struct FetchedFile {
    pub path: PathBuf,
    /// Whether the file was created by the fetcher and may be removed
    owned: bool,
}

impl FetchedFile {
    pub fn downloaded(path: PathBuf) -> Self {
        Self { path, owned: true }
    }

    pub fn borrowed(path: PathBuf) -> Self {
        Self { path, owned: false }
    }

    pub fn is_owned(&self) -> bool {
        self.owned
    }

    /// Remove a downloaded file. Borrowed files are left untouched.
    pub async fn discard(self) {
        if !self.owned {
            return;
        }
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            warn!(path = %self.path.display(), error = %e, "Failed to remove downloaded file");
        }
    }
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, file: &FeedFile, kind: FeedKind) -> Result<FetchedFile>;

    /// Release a fetched file once it has been processed
    async fn release(&self, fetched: FetchedFile) {
        fetched.discard().await;
    }
}

/// Downloads feed files into `<work_dir>/<stores|prices>/<filename>.gz`
pub struct HttpFetcher {
    client: Client,
    work_dir: PathBuf,
    keep_downloads: bool,
}

impl HttpFetcher {
    pub fn new(config: &FeedConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config)?,
            work_dir: config.work_dir.clone(),
            keep_downloads: config.keep_downloads,
        })
    }

    /// Local download path for a listed file
    pub fn target_path(&self, filename: &str, kind: FeedKind) -> PathBuf {
        let safe: String = filename
            .chars()
            .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
            .collect();
        let name = if safe.ends_with(".gz") {
            safe
        } else {
            format!("{safe}.gz")
        };
        self.work_dir.join(kind.subdir()).join(name)
    }

    async fn download(&self, url: &str, path: &Path) -> Result<u64> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| EtlError::fetch(url, e))?;

        if !response.status().is_success() {
            return Err(EtlError::fetch(url, format!("HTTP error: {}", response.status())));
        }

        let mut out = tokio::fs::File::create(path).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| EtlError::fetch(url, e))?;
            out.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        out.flush().await?;
        Ok(written)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, file: &FeedFile, kind: FeedKind) -> Result<FetchedFile> {
        let path = self.target_path(&file.filename, kind);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        info!(filename = %file.filename, url = %file.url, "Downloading feed file");

        match self.download(&file.url, &path).await {
            Ok(bytes) => {
                debug!(path = %path.display(), bytes, "Download complete");
                Ok(FetchedFile::downloaded(path))
            },
            Err(e) => {
                let _ = tokio::fs::remove_file(&path).await;
                Err(e)
            },
        }
    }

    async fn release(&self, fetched: FetchedFile) {
        if self.keep_downloads {
            debug!(path = %fetched.path.display(), "Keeping downloaded file");
            return;
        }
        fetched.discard().await;
    }
}

/// Treats each feed url as a local path
#[derive(Debug, Default)]
pub struct LocalFetcher;

#[async_trait]
impl Fetcher for LocalFetcher {
    async fn fetch(&self, file: &FeedFile, _kind: FeedKind) -> Result<FetchedFile> {
        let path = PathBuf::from(&file.url);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(FetchedFile::borrowed(path)),
            Ok(_) => Err(EtlError::fetch(&file.url, "not a regular file")),
            Err(e) => Err(EtlError::fetch(&file.url, e)),
        }
    }
}

fn http_client(config: &FeedConfig) -> Result<Client> {
    Client::builder()
        .timeout(config.timeout())
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| EtlError::config(format!("Failed to build HTTP client: {e}")))
}
