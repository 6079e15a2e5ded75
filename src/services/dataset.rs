use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{RatingRecord, RatingTable};

/// Tab-separated (user_id, movie_id, rating, timestamp) rows
pub const RATINGS_FILE: &str = "u.data";

/// Pipe-separated movie metadata; only id and title are used
pub const MOVIES_FILE: &str = "u.item";

/// Fetches the raw dataset archive from a URL
///
/// Abstracted behind a trait so tests can supply archive bytes without
/// touching the network.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArchiveFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> AppResult<Vec<u8>>;
}

/// Downloads the archive over HTTP with a bounded timeout
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ArchiveFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> AppResult<Vec<u8>> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

/// Ensures the dataset is on disk, then loads and merges it into the flat
/// rating table. This is the one-time startup path.
pub async fn prepare(config: &Config) -> AppResult<RatingTable> {
    let fetcher = HttpFetcher::new(Duration::from_secs(config.download_timeout_secs))?;
    ensure_dataset(config, &fetcher).await?;
    load_table(config)
}

/// Downloads and extracts the MovieLens archive unless both data files are
/// already present in the configured data directory.
pub async fn ensure_dataset(config: &Config, fetcher: &dyn ArchiveFetcher) -> AppResult<()> {
    let data_dir = Path::new(&config.data_dir);
    if data_dir.join(RATINGS_FILE).exists() && data_dir.join(MOVIES_FILE).exists() {
        return Ok(());
    }

    std::fs::create_dir_all(data_dir)?;
    tracing::info!(url = %config.dataset_url, "downloading MovieLens dataset");
    let bytes = fetcher.fetch(&config.dataset_url).await?;
    extract_archive(&bytes, data_dir)?;
    tracing::info!(dir = %data_dir.display(), "dataset downloaded and extracted");
    Ok(())
}

/// Extracts every file in the archive into `data_dir`, flattening the
/// leading `ml-100k/` directory.
fn extract_archive(bytes: &[u8], data_dir: &Path) -> AppResult<()> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.name().ends_with('/') {
            continue;
        }
        let file_name = match entry.name().rsplit('/').next() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => continue,
        };
        let mut out = std::fs::File::create(data_dir.join(file_name))?;
        std::io::copy(&mut entry, &mut out)?;
    }
    Ok(())
}

/// Parses both data files and inner-joins ratings to movie titles on
/// movie id. Ratings whose movie id has no title row are dropped.
pub fn load_table(config: &Config) -> AppResult<RatingTable> {
    let data_dir = Path::new(&config.data_dir);
    let titles = read_movie_titles(&data_dir.join(MOVIES_FILE))?;
    let records = read_ratings(&data_dir.join(RATINGS_FILE), &titles)?;
    if records.is_empty() {
        return Err(AppError::Dataset(
            "no rating rows left after merging movies and ratings".to_string(),
        ));
    }
    Ok(RatingTable::new(records))
}

fn read_movie_titles(path: &Path) -> AppResult<HashMap<u32, String>> {
    // u.item is Latin-1, not UTF-8.
    let raw = std::fs::read(path)?;
    let (text, _, _) = encoding_rs::WINDOWS_1252.decode(&raw);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'|')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(text.as_bytes());

    let mut titles = HashMap::new();
    for row in reader.records() {
        let row = row?;
        let (Some(id), Some(title)) = (row.get(0), row.get(1)) else {
            continue;
        };
        let movie_id = id
            .parse::<u32>()
            .map_err(|_| AppError::Dataset(format!("invalid movie id '{id}' in {MOVIES_FILE}")))?;
        titles.insert(movie_id, title.to_string());
    }

    if titles.is_empty() {
        return Err(AppError::Dataset(format!("{MOVIES_FILE} contains no movies")));
    }
    Ok(titles)
}

#[derive(Debug, serde::Deserialize)]
struct RatingRow {
    user_id: u32,
    movie_id: u32,
    rating: f64,
    timestamp: i64,
}

fn read_ratings(path: &Path, titles: &HashMap<u32, String>) -> AppResult<Vec<RatingRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_path(path)?;

    let mut records = Vec::new();
    for row in reader.deserialize() {
        let row: RatingRow = row?;
        let Some(title) = titles.get(&row.movie_id) else {
            continue;
        };
        records.push(RatingRecord {
            movie_id: row.movie_id,
            title: title.clone(),
            user_id: row.user_id,
            rating: row.rating,
            timestamp: row.timestamp,
        });
    }
    Ok(records)
}
