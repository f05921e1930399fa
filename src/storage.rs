//! Append-only CSV record of every ad seen so far.
//!
//! The table's column order is a format contract shared with earlier runs:
//! `time,name,location,price,square,link`, with the listing URL always last.
//! Rows are only ever appended; nothing is rewritten or removed.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, error, info};

use crate::models::AdRecord;

/// Header row of the backing table.
pub const CSV_HEADER: [&str; 6] = ["time", "name", "location", "price", "square", "link"];

/// Errors writing the backing table.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// The durable set of seen listing URLs.
#[derive(Debug, Clone)]
pub struct DedupStore {
    path: PathBuf,
}

impl DedupStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every URL recorded so far.
    ///
    /// A missing table is an empty set. The URL is the row's last column,
    /// taken verbatim. Rows that cannot be decoded or are too short are
    /// skipped; an unreadable file yields what was read before
    /// the failure.
    pub fn load_known_urls(&self) -> HashSet<String> {
        let mut urls = HashSet::new();

        if !self.path.exists() {
            info!(
                "Backing table {} does not exist yet; it will be created",
                self.path.display()
            );
            return urls;
        }

        let mut reader = match csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&self.path)
        {
            Ok(reader) => reader,
            Err(e) => {
                error!("Failed to open {}: {}", self.path.display(), e);
                return urls;
            }
        };

        for (index, result) in reader.records().enumerate() {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    if let csv::ErrorKind::Io(_) = e.kind() {
                        error!("Failed reading {}: {}", self.path.display(), e);
                        break;
                    }
                    debug!("Skipping malformed row {}: {}", index + 1, e);
                    continue;
                }
            };

            if index == 0 && record.iter().eq(CSV_HEADER.iter().copied()) {
                continue;
            }

            // The link is the last column; wider legacy rows keep it last too.
            let link = match record.len() {
                n if n >= CSV_HEADER.len() => record.get(n - 1),
                _ => None,
            };
            match link {
                Some(link) if !link.is_empty() => {
                    urls.insert(link.to_string());
                }
                _ => debug!("Skipping short row {} ({} columns)", index + 1, record.len()),
            }
        }

        urls
    }

    /// Append ads to the table, writing the header first if the table is
    /// new or empty. Returns the number of rows written.
    pub fn append(&self, ads: &[AdRecord]) -> Result<usize, StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let needs_header = fs::metadata(&self.path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if needs_header {
            writer.write_record(CSV_HEADER)?;
        }
        for ad in ads {
            writer.write_record(ad.to_row())?;
        }
        writer.flush()?;

        info!("Appended {} ad(s) to {}", ads.len(), self.path.display());
        Ok(ads.len())
    }
}

/// Decides which scraped ads are new.
///
/// An ad is new when its URL is neither in the backing table nor already
/// accepted earlier in the same run.
#[derive(Debug, Default)]
pub struct NoveltyFilter {
    known: HashSet<String>,
    accepted: HashSet<String>,
}

impl NoveltyFilter {
    pub fn new(known: HashSet<String>) -> Self {
        Self {
            known,
            accepted: HashSet::new(),
        }
    }

    /// Number of URLs loaded from the backing table.
    pub fn known_count(&self) -> usize {
        self.known.len()
    }

    /// Accept `url` if it has not been seen; returns whether it was new.
    pub fn accept(&mut self, url: &str) -> bool {
        if self.known.contains(url) || self.accepted.contains(url) {
            return false;
        }
        self.accepted.insert(url.to_string())
    }

    /// Keep the first occurrence of every unseen URL, preserving order.
    pub fn filter_new(&mut self, ads: Vec<AdRecord>) -> Vec<AdRecord> {
        ads.into_iter().filter(|ad| self.accept(&ad.url)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ad(n: u32) -> AdRecord {
        AdRecord {
            posted_at: "05 березня 2024 р.".to_string(),
            title: format!("Квартира {}", n),
            location: "Київ, Дарницький".to_string(),
            price: "15 000 грн.".to_string(),
            area: String::new(),
            url: format!("https://www.olx.ua/d/obyavlenie/{}.html", n),
        }
    }

    #[test]
    fn test_missing_table_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = DedupStore::new(dir.path().join("nope.csv"));
        assert!(store.load_known_urls().is_empty());
    }

    #[test]
    fn test_append_then_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = DedupStore::new(dir.path().join("csv").join("all_ad.csv"));
        let ads: Vec<AdRecord> = (1..=4).map(ad).collect();

        assert_eq!(store.append(&ads).unwrap(), 4);

        let urls = store.load_known_urls();
        assert_eq!(urls.len(), 4);
        for a in &ads {
            assert!(urls.contains(&a.url));
        }
    }

    #[test]
    fn test_header_written_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("all_ad.csv");
        let store = DedupStore::new(&path);

        store.append(&[ad(1)]).unwrap();
        store.append(&[ad(2)]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "time,name,location,price,square,link");
        assert_eq!(lines.len(), 3);
        assert_eq!(
            content.matches("time,name,location,price,square,link").count(),
            1
        );
        assert!(lines[1].ends_with("https://www.olx.ua/d/obyavlenie/1.html"));
    }

    #[test]
    fn test_empty_existing_file_gets_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("all_ad.csv");
        fs::write(&path, "").unwrap();

        DedupStore::new(&path).append(&[ad(7)]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("time,name,location,price,square,link"));
    }

    #[test]
    fn test_fields_with_commas_and_quotes_survive() {
        let dir = TempDir::new().unwrap();
        let store = DedupStore::new(dir.path().join("all_ad.csv"));
        let mut tricky = ad(9);
        tricky.title = "Квартира, \"люкс\"".to_string();
        tricky.url = "https://example.com/ad?a=1,2".to_string();

        store.append(&[tricky.clone()]).unwrap();

        let urls = store.load_known_urls();
        assert!(urls.contains(&tricky.url));
        assert_eq!(urls.len(), 1);
    }

    #[test]
    fn test_malformed_rows_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("all_ad.csv");
        fs::write(
            &path,
            "time,name,location,price,square,link\n\
             short,row\n\
             t,n,l,p,s,https://example.com/1\n\
             \n\
             t,n,l,p,s,https://example.com/2\n",
        )
        .unwrap();

        let urls = DedupStore::new(&path).load_known_urls();
        assert_eq!(urls.len(), 2);
        assert!(urls.contains("https://example.com/1"));
        assert!(urls.contains("https://example.com/2"));
    }

    #[test]
    fn test_link_is_last_column_verbatim() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("all_ad.csv");
        fs::write(
            &path,
            "time,name,location,price,square,link\n\
             t,n,l,p,s,extra,https://example.com/wide\n\
             t,n,l,p,s,\" https://example.com/padded \"\n",
        )
        .unwrap();

        let urls = DedupStore::new(&path).load_known_urls();
        assert_eq!(urls.len(), 2);
        assert!(urls.contains("https://example.com/wide"));
        assert!(urls.contains(" https://example.com/padded "));
        assert!(!urls.contains("https://example.com/padded"));
    }

    #[test]
    fn test_headerless_table_reads_first_row() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("all_ad.csv");
        fs::write(&path, "t,n,l,p,s,https://example.com/first\n").unwrap();

        let urls = DedupStore::new(&path).load_known_urls();
        assert!(urls.contains("https://example.com/first"));
    }

    #[test]
    fn test_novelty_filter_known_and_in_run_duplicates() {
        let known: HashSet<String> = [ad(1).url].into_iter().collect();
        let mut filter = NoveltyFilter::new(known);

        let mut duplicate = ad(2);
        duplicate.title = "same url, different title".to_string();
        let fresh = filter.filter_new(vec![ad(1), ad(2), ad(3), duplicate]);

        assert_eq!(fresh.len(), 2);
        assert_eq!(fresh[0], ad(2));
        assert_eq!(fresh[1], ad(3));
        assert!(!filter.accept(&ad(3).url));
    }

    #[test]
    fn test_url_identity_is_exact() {
        let mut filter = NoveltyFilter::default();
        assert!(filter.accept("https://example.com/ad"));
        assert!(filter.accept("https://example.com/ad/"));
        assert!(filter.accept("https://example.com/ad?x=1"));
        assert!(!filter.accept("https://example.com/ad"));
    }
}
