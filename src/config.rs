use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::members::MergePolicy;
use crate::recency::RecencyWindow;

pub const DEFAULT_BASE_URL: &str = "https://kw.opensooq.com/ar";

// Request settings
pub const REQUEST_TIMEOUT_SECS: u64 = 30;
pub const MAX_RETRIES: u32 = 3;
pub const RETRY_DELAY_SECS: u64 = 5;

/// Cooperative throttle between detail fetches, not a scheduler.
pub const DETAIL_FETCH_DELAY_MS: u64 = 500;

/// Safety limit on pagination per subcategory.
pub const MAX_PAGES_PER_SUBCATEGORY: usize = 100;

pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Process-wide settings read once at startup.
pub struct AppConfig {
    pub base_url: String,
    pub storage_root: PathBuf,
}

impl AppConfig {
    /// Read settings from the environment. A missing storage root is the one
    /// fatal configuration error; everything else has a default.
    pub fn from_env() -> Result<Self> {
        let storage_root = std::env::var("SOUQ_STORAGE_ROOT")
            .context("SOUQ_STORAGE_ROOT must point at the storage root directory")?;
        let base_url =
            std::env::var("SOUQ_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Ok(Self {
            base_url,
            storage_root: storage_root.into(),
        })
    }
}

/// One category vertical: where to start crawling, where its artifacts live,
/// and the recency/merge variants it runs with.
pub struct CategoryConfig {
    pub key: &'static str,
    pub base_folder: &'static str,
    /// Path of the vertical's landing page under the site base URL.
    pub url_path: &'static str,
    pub window: RecencyWindow,
    pub merge_policy: MergePolicy,
}

/// The six configured verticals. Properties keeps the strict 24-48h window
/// and overwrite merge it always ran with; the rest use the same-day window
/// with append-only merge.
pub const CATEGORIES: [CategoryConfig; 6] = [
    CategoryConfig {
        key: "properties",
        base_folder: "properties",
        url_path: "عقارات",
        window: RecencyWindow::StrictYesterday,
        merge_policy: MergePolicy::OverwriteOnMatch,
    },
    CategoryConfig {
        key: "services",
        base_folder: "services",
        url_path: "الخدمات",
        window: RecencyWindow::SameDay,
        merge_policy: MergePolicy::AppendOnlyNew,
    },
    CategoryConfig {
        key: "shops",
        base_folder: "shops",
        url_path: "متاجر",
        window: RecencyWindow::SameDay,
        merge_policy: MergePolicy::AppendOnlyNew,
    },
    CategoryConfig {
        key: "home-garden",
        base_folder: "home-garden",
        url_path: "المنزل-والحديقة",
        window: RecencyWindow::SameDay,
        merge_policy: MergePolicy::AppendOnlyNew,
    },
    CategoryConfig {
        key: "businesses-industrial",
        base_folder: "businesses-industrial",
        url_path: "شركات-صناعية",
        window: RecencyWindow::SameDay,
        merge_policy: MergePolicy::AppendOnlyNew,
    },
    CategoryConfig {
        key: "commercial-offers",
        base_folder: "commercial-offers",
        url_path: "العروض",
        window: RecencyWindow::SameDay,
        merge_policy: MergePolicy::AppendOnlyNew,
    },
];

pub fn find_category(key: &str) -> Option<&'static CategoryConfig> {
    CATEGORIES.iter().find(|c| c.key == key)
}

// ── Tests ──
