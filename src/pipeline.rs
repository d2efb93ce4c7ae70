use std::time::Duration;

use chrono::{NaiveDate, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use tracing::{info, warn};

use crate::config::{CategoryConfig, DETAIL_FETCH_DELAY_MS, MAX_PAGES_PER_SUBCATEGORY};
use crate::extract::{embedded_json, i64_at, path, str_at};
use crate::fetch::PageFetcher;
use crate::members::{merge, MemberLedger, MemberProfile};
use crate::normalize::{extract_member_page, extract_seller, normalize_listing, CanonicalListing};
use crate::storage::{
    build_key, load_member_collection, save_member_collection, Artifact, ObjectStore,
    JSON_CONTENT_TYPE,
};

/// Terminal state of one subcategory batch. A batch moves strictly forward
/// (fetched → classified → normalized → keyed → written) and never re-enters
/// a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Batch written to storage.
    Written,
    /// Every record was rejected by the recency window; nothing to write.
    Skipped,
    /// The store refused the write after the collaborator's own retries.
    Failed,
}

#[derive(Debug, Default)]
pub struct RunStats {
    pub listings: usize,
    pub members: usize,
    pub images: usize,
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunStats {
    fn absorb(&mut self, other: &RunStats) {
        self.listings += other.listings;
        self.members += other.members;
        self.images += other.images;
        self.written += other.written;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }

    pub fn print(&self) {
        println!(
            "Saved {} listings, {} members, {} images ({} batches written, {} skipped, {} failed).",
            self.listings, self.members, self.images, self.written, self.skipped, self.failed,
        );
    }
}

/// A navigation facet on a category page: one child category or subcategory.
#[derive(Debug, Clone)]
struct Facet {
    label: String,
    url_path: String,
}

/// Sequences classify → normalize → merge → key → write for every batch of a
/// run. Owns the run-local member ledger; all storage writes go through the
/// single pipeline owner.
pub struct Pipeline<'a, F, S> {
    fetcher: &'a F,
    store: &'a S,
    base_url: &'a str,
    target_date: NaiveDate,
    ledger: MemberLedger,
}

impl<'a, F: PageFetcher, S: ObjectStore> Pipeline<'a, F, S> {
    pub fn new(fetcher: &'a F, store: &'a S, base_url: &'a str, target_date: NaiveDate) -> Self {
        Self {
            fetcher,
            store,
            base_url,
            target_date,
            ledger: MemberLedger::default(),
        }
    }

    /// Run every selected category. Categories are isolated: a category that
    /// yields nothing logs and the run moves on to the next one.
    pub async fn run(mut self, categories: &[&CategoryConfig], max_pages: Option<usize>) -> RunStats {
        let mut totals = RunStats::default();
        for cfg in categories {
            let stats = self.run_category(cfg, max_pages).await;
            info!(
                "Category {}: {} listings, {} members, {} images",
                cfg.key, stats.listings, stats.members, stats.images
            );
            totals.absorb(&stats);
        }
        totals
    }

    /// Scrape one vertical: its child categories, their subcategories, and
    /// every in-window listing beneath them; then persist the member delta
    /// with the vertical's merge policy.
    pub async fn run_category(&mut self, cfg: &CategoryConfig, max_pages: Option<usize>) -> RunStats {
        info!("Scraping category: {}", cfg.key);
        let mut stats = RunStats::default();

        let landing_url = format!("{}/{}", self.base_url, cfg.url_path);
        let Some(mains) = self.facets(&landing_url).await else {
            warn!("No child categories found for {}; skipping", cfg.key);
            return stats;
        };

        let pb = ProgressBar::new(mains.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );

        let mut new_profiles: Vec<MemberProfile> = Vec::new();
        for main in &mains {
            pb.set_message(main.label.clone());
            let category_url = format!("{}/{}", self.base_url, main.url_path);
            let Some(subs) = self.facets(&category_url).await else {
                warn!("No subcategories under {} -> {}", cfg.key, main.label);
                pb.inc(1);
                continue;
            };
            for sub in &subs {
                let outcome = self
                    .scrape_subcategory(cfg, &main.label, sub, max_pages, &mut stats, &mut new_profiles)
                    .await;
                match outcome {
                    BatchOutcome::Written => stats.written += 1,
                    BatchOutcome::Skipped => stats.skipped += 1,
                    BatchOutcome::Failed => stats.failed += 1,
                }
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        if !new_profiles.is_empty() {
            stats.members += new_profiles.len();
            self.persist_members(cfg, new_profiles);
        }
        stats
    }

    /// Merge this category's member delta into the persisted collection and
    /// write it back whole.
    fn persist_members(&self, cfg: &CategoryConfig, new_profiles: Vec<MemberProfile>) {
        let existing = load_member_collection(self.store);
        let mut merged = merge(existing, new_profiles, cfg.merge_policy);
        merged.scraped_at = Some(Utc::now().format("%Y-%m-%d %H:%M:%S").to_string());
        if save_member_collection(self.store, &merged) {
            info!("Member collection now holds {} profiles", merged.count);
        } else {
            warn!("Failed to persist member collection after {}", cfg.key);
        }
    }

    /// Fetch a category page and return its facet entries.
    async fn facets(&self, url: &str) -> Option<Vec<Facet>> {
        let html = self.fetcher.fetch(url).await?;
        let props = embedded_json(&html, "pageProps")?;
        let items = path(&props, &["serpApiResponse", "facets", "items"])?.as_array()?;

        let facets: Vec<Facet> = items
            .iter()
            .filter_map(|item| {
                Some(Facet {
                    label: str_at(item, &["label"])?,
                    url_path: str_at(item, &["url_ar"])?,
                })
            })
            .collect();
        if facets.is_empty() {
            None
        } else {
            Some(facets)
        }
    }

    /// Fetch one listings page; returns the raw listing stubs and the total
    /// page count from pagination metadata.
    async fn listings_page(&self, sub_path: &str, page: usize) -> Option<(Vec<Value>, usize)> {
        let url = if page > 1 {
            format!("{}/{}?page={}", self.base_url, sub_path, page)
        } else {
            format!("{}/{}", self.base_url, sub_path)
        };
        let html = self.fetcher.fetch(&url).await?;
        let props = embedded_json(&html, "pageProps")?;
        let listings = path(&props, &["serpApiResponse", "listings"])?;

        let items = listings
            .get("items")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        let total_pages = i64_at(listings, &["meta", "pages"]).unwrap_or(1).max(1) as usize;
        Some((items, total_pages))
    }

    /// Walk one subcategory's pages, keep listings inside the recency window,
    /// and write the batch under its partitioned key.
    async fn scrape_subcategory(
        &mut self,
        cfg: &CategoryConfig,
        category_label: &str,
        sub: &Facet,
        max_pages: Option<usize>,
        stats: &mut RunStats,
        new_profiles: &mut Vec<MemberProfile>,
    ) -> BatchOutcome {
        let page_limit = max_pages.unwrap_or(MAX_PAGES_PER_SUBCATEGORY);
        let mut batch: Vec<CanonicalListing> = Vec::new();
        let mut page = 1;

        loop {
            let Some((items, total_pages)) = self.listings_page(&sub.url_path, page).await else {
                break;
            };
            if items.is_empty() {
                break;
            }

            for item in &items {
                let posted_at = str_at(item, &["posted_at"]).unwrap_or_default();
                if !cfg.window.is_in_window(&posted_at) {
                    continue;
                }
                let Some(listing_id) = i64_at(item, &["id"]) else {
                    continue;
                };

                if let Some(listing) = self
                    .process_listing(cfg, category_label, sub, listing_id, stats, new_profiles)
                    .await
                {
                    batch.push(listing);
                }
                tokio::time::sleep(Duration::from_millis(DETAIL_FETCH_DELAY_MS)).await;
            }

            if page >= total_pages || page >= page_limit {
                break;
            }
            page += 1;
        }

        if batch.is_empty() {
            return BatchOutcome::Skipped;
        }
        stats.listings += batch.len();

        let key = build_key(
            cfg.base_folder,
            self.target_date,
            Artifact::ListingBatch {
                category: category_label,
                subcategory: &sub.label,
            },
        );
        let bytes = match serde_json::to_vec_pretty(&batch) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Error serializing batch for {}: {}", key, e);
                return BatchOutcome::Failed;
            }
        };
        if self.store.put(&key, &bytes, JSON_CONTENT_TYPE) {
            info!("Wrote {} listings to {}", batch.len(), key);
            BatchOutcome::Written
        } else {
            warn!("Store refused batch {}", key);
            BatchOutcome::Failed
        }
    }

    /// Fetch and normalize one listing detail page, collect its seller, and
    /// store its images. Any failed collaborator call skips just this record.
    async fn process_listing(
        &mut self,
        cfg: &CategoryConfig,
        category_label: &str,
        sub: &Facet,
        listing_id: i64,
        stats: &mut RunStats,
        new_profiles: &mut Vec<MemberProfile>,
    ) -> Option<CanonicalListing> {
        let url = format!("{}/search/{}", self.base_url, listing_id);
        let Some(html) = self.fetcher.fetch(&url).await else {
            warn!("Skipping listing {} in {}: detail fetch failed", listing_id, cfg.key);
            return None;
        };
        let Some(raw) = embedded_json(&html, "pageProps") else {
            warn!("Skipping listing {} in {}: no embedded payload", listing_id, cfg.key);
            return None;
        };
        let listing = normalize_listing(&raw)?;

        self.collect_member(&raw, new_profiles).await;

        for (index, media) in listing.media.iter().enumerate() {
            let Some(bytes) = self.fetcher.fetch_bytes(&media.uri).await else {
                warn!("Image fetch failed for listing {}: {}", listing_id, media.uri);
                continue;
            };
            let ext = media.file_ext();
            let key = build_key(
                cfg.base_folder,
                self.target_date,
                Artifact::Image {
                    category: category_label,
                    subcategory: &sub.label,
                    listing_id,
                    index,
                    ext: &ext,
                },
            );
            if self.store.put(&key, &bytes, &media.mime_type) {
                stats.images += 1;
            } else {
                warn!("Store refused image {}", key);
            }
        }

        Some(listing)
    }

    /// Record the listing's seller once per run, enriched from the member
    /// profile page when one is linked.
    async fn collect_member(&mut self, raw: &Value, new_profiles: &mut Vec<MemberProfile>) {
        let scraped_at = Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let Some(seed) = extract_seller(raw, &scraped_at) else {
            return;
        };
        if self.ledger.contains(&seed.profile.id) {
            return;
        }

        let mut profile = seed.profile;
        if let Some(link) = seed.member_link.as_deref() {
            let member_url = format!("{}{}", self.base_url, link);
            if let Some(html) = self.fetcher.fetch(&member_url).await {
                if let Some(full) = embedded_json(&html, "pageProps")
                    .and_then(|props| extract_member_page(&props, &scraped_at))
                {
                    profile = full;
                }
            }
        }

        if self.ledger.insert(profile.id.clone()) {
            new_profiles.push(profile);
        }
    }
}

// ── Tests ──
