use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use tracing::{info, warn};

use crate::members::MemberCollection;

/// Member data lives at one fixed, non-partitioned key regardless of
/// category: member identity is process-wide, not category-scoped.
pub const MEMBER_INFO_KEY: &str = "info-json/info.json";

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// One persisted artifact and the key material it needs.
#[derive(Debug, Clone, Copy)]
pub enum Artifact<'a> {
    ListingBatch {
        category: &'a str,
        subcategory: &'a str,
    },
    MemberInfo,
    Image {
        category: &'a str,
        subcategory: &'a str,
        listing_id: i64,
        index: usize,
        ext: &'a str,
    },
}

/// Build the storage key for an artifact. Pure: the same inputs always yield
/// the same string, so re-running a day overwrites in place and downstream
/// readers can prune by the date partition.
pub fn build_key(base_folder: &str, date: NaiveDate, artifact: Artifact) -> String {
    let partition = format!(
        "year={:04}/month={:02}/day={:02}",
        date.year(),
        date.month(),
        date.day()
    );

    match artifact {
        Artifact::ListingBatch {
            category,
            subcategory,
        } => format!(
            "{}/{}/json-files/{}/{}.json",
            base_folder,
            partition,
            sanitize(category),
            sanitize(subcategory)
        ),
        Artifact::MemberInfo => MEMBER_INFO_KEY.to_string(),
        Artifact::Image {
            category,
            subcategory,
            listing_id,
            index,
            ext,
        } => format!(
            "{}/{}/images/{}/{}/{}_{}.{}",
            base_folder,
            partition,
            sanitize(category),
            sanitize(subcategory),
            listing_id,
            index,
            ext
        ),
    }
}

/// Spaces and path separators would split the key hierarchy; fold them to
/// underscores so labels like "A B" and "C/D" stay single segments.
fn sanitize(segment: &str) -> String {
    segment
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' => '_',
            other => other,
        })
        .collect()
}

// ── Object store ──

/// Key/value object storage. Errors surface as `false`/`None`, never as
/// panics or results; callers log and move on.
pub trait ObjectStore {
    fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> bool;
    fn get(&self, key: &str) -> Option<Vec<u8>>;
    fn exists(&self, key: &str) -> bool;
    fn list(&self, prefix: &str) -> Vec<String>;
}

/// Filesystem-backed store mapping keys to files under a root directory.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, key: &str) -> PathBuf {
        let mut path = self.root.clone();
        for segment in key.split('/').filter(|s| !s.is_empty()) {
            path.push(segment);
        }
        path
    }

    fn collect_keys(&self, dir: &Path, keys: &mut Vec<String>) {
        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                self.collect_keys(&path, keys);
            } else if let Ok(rel) = path.strip_prefix(&self.root) {
                let key = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                keys.push(key);
            }
        }
    }
}

impl ObjectStore for FsStore {
    fn put(&self, key: &str, bytes: &[u8], _content_type: &str) -> bool {
        let path = self.resolve(key);
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!("Error creating {}: {}", parent.display(), e);
                return false;
            }
        }
        match fs::write(&path, bytes) {
            Ok(()) => true,
            Err(e) => {
                warn!("Error writing {}: {}", key, e);
                false
            }
        }
    }

    fn get(&self, key: &str) -> Option<Vec<u8>> {
        fs::read(self.resolve(key)).ok()
    }

    fn exists(&self, key: &str) -> bool {
        self.resolve(key).is_file()
    }

    fn list(&self, prefix: &str) -> Vec<String> {
        let mut keys = Vec::new();
        self.collect_keys(&self.root, &mut keys);
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();
        keys
    }
}

/// In-memory store for tests.
#[cfg(test)]
pub struct MemoryStore {
    objects: std::sync::Mutex<std::collections::BTreeMap<String, Vec<u8>>>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self {
            objects: std::sync::Mutex::new(std::collections::BTreeMap::new()),
        }
    }
}

#[cfg(test)]
impl ObjectStore for MemoryStore {
    fn put(&self, key: &str, bytes: &[u8], _content_type: &str) -> bool {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), bytes.to_vec());
        true
    }

    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    fn exists(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    fn list(&self, prefix: &str) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect()
    }
}

// ── Member collection persistence ──

/// Load the persisted member collection; missing or corrupt state becomes the
/// empty baseline so new data is never blocked on unreadable history.
pub fn load_member_collection(store: &impl ObjectStore) -> MemberCollection {
    let Some(bytes) = store.get(MEMBER_INFO_KEY) else {
        info!("No existing member file at {}", MEMBER_INFO_KEY);
        return MemberCollection::default();
    };
    match serde_json::from_slice(&bytes) {
        Ok(collection) => collection,
        Err(e) => {
            warn!(
                "Unreadable member file at {}, starting from empty: {}",
                MEMBER_INFO_KEY, e
            );
            MemberCollection::default()
        }
    }
}

/// Overwrite the member file with the full merged collection.
pub fn save_member_collection(store: &impl ObjectStore, collection: &MemberCollection) -> bool {
    match serde_json::to_vec_pretty(collection) {
        Ok(bytes) => store.put(MEMBER_INFO_KEY, &bytes, JSON_CONTENT_TYPE),
        Err(e) => {
            warn!("Error serializing member collection: {}", e);
            false
        }
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::members::{merge, MemberId, MemberProfile, MergePolicy};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 25).unwrap()
    }

    #[test]
    fn listing_batch_key_layout() {
        // base "properties", category "A B", subcategory "C/D"
        let key = build_key(
            "properties",
            date(),
            Artifact::ListingBatch {
                category: "A B",
                subcategory: "C/D",
            },
        );
        assert_eq!(
            key,
            "properties/year=2026/month=01/day=25/json-files/A_B/C_D.json"
        );
    }

    #[test]
    fn build_key_is_deterministic() {
        let artifact = Artifact::ListingBatch {
            category: "عقارات للإيجار",
            subcategory: "شقق",
        };
        assert_eq!(
            build_key("properties", date(), artifact),
            build_key("properties", date(), artifact)
        );
    }

    #[test]
    fn space_and_separator_variants_collapse_to_the_same_key() {
        let spaced = build_key(
            "services",
            date(),
            Artifact::ListingBatch {
                category: "Home Services",
                subcategory: "AC Repair",
            },
        );
        let underscored = build_key(
            "services",
            date(),
            Artifact::ListingBatch {
                category: "Home_Services",
                subcategory: "AC_Repair",
            },
        );
        assert_eq!(spaced, underscored);
    }

    #[test]
    fn member_info_key_ignores_category_and_date() {
        let key = build_key("properties", date(), Artifact::MemberInfo);
        assert_eq!(key, "info-json/info.json");
        let other = build_key(
            "services",
            NaiveDate::from_ymd_opt(2025, 12, 1).unwrap(),
            Artifact::MemberInfo,
        );
        assert_eq!(key, other);
    }

    #[test]
    fn image_key_carries_listing_id_and_index() {
        let key = build_key(
            "home-garden",
            date(),
            Artifact::Image {
                category: "أثاث",
                subcategory: "غرف نوم",
                listing_id: 275039437,
                index: 2,
                ext: "jpg",
            },
        );
        assert_eq!(
            key,
            "home-garden/year=2026/month=01/day=25/images/أثاث/غرف_نوم/275039437_2.jpg"
        );
    }

    #[test]
    fn fs_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());

        let key = "services/year=2026/month=01/day=25/json-files/a/b.json";
        assert!(!store.exists(key));
        assert!(store.get(key).is_none());

        assert!(store.put(key, b"[1,2,3]", JSON_CONTENT_TYPE));
        assert!(store.exists(key));
        assert_eq!(store.get(key).unwrap(), b"[1,2,3]");

        assert_eq!(store.list("services/"), vec![key.to_string()]);
        assert!(store.list("properties/").is_empty());

        // Same key overwrites in place
        assert!(store.put(key, b"[4]", JSON_CONTENT_TYPE));
        assert_eq!(store.get(key).unwrap(), b"[4]");
    }

    #[test]
    fn missing_member_file_is_an_empty_baseline() {
        let store = MemoryStore::new();
        let collection = load_member_collection(&store);
        assert_eq!(collection.count, 0);
        assert!(collection.members.is_empty());
    }

    #[test]
    fn corrupt_member_file_is_an_empty_baseline() {
        let store = MemoryStore::new();
        store.put(MEMBER_INFO_KEY, b"{broken", JSON_CONTENT_TYPE);
        let collection = load_member_collection(&store);
        assert!(collection.members.is_empty());
    }

    #[test]
    fn member_collection_survives_an_empty_delta_run() {
        let profile = MemberProfile {
            id: MemberId::Id(1),
            full_name: Some("واحد".to_string()),
            avatar: None,
            rating_avg: Some(4.0),
            rating_count: Some(3),
            member_since: None,
            is_shop: Some(false),
            verification_level: None,
            response_time: None,
            scraped_at: "2026-01-25 03:00:00".to_string(),
        };
        let original = merge(
            MemberCollection::default(),
            vec![profile],
            MergePolicy::AppendOnlyNew,
        );

        let store = MemoryStore::new();
        assert!(save_member_collection(&store, &original));

        let reloaded = load_member_collection(&store);
        let remerged = merge(reloaded, Vec::new(), MergePolicy::AppendOnlyNew);
        assert_eq!(remerged, original);
    }
}
