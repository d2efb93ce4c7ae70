use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Member identity: the site exposes either a numeric id or a stable username
/// inside a `/mid/member-<username>` profile link. Numeric ids sort before
/// usernames so the persisted collection stays byte-stable across runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MemberId {
    Id(i64),
    Username(String),
}

impl MemberId {
    /// Extract the username segment from a profile link.
    pub fn from_link(link: &str) -> Option<MemberId> {
        let tail = link.trim_end_matches('/').rsplit('/').next()?;
        tail.strip_prefix("member-")
            .filter(|u| !u.is_empty())
            .map(|u| MemberId::Username(u.to_string()))
    }
}

/// Identity and reputation record of the party who posted a listing. Null
/// fields are omitted from the persisted JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberProfile {
    pub id: MemberId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating_avg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_since: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_shop: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_level: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time: Option<String>,
    pub scraped_at: String,
}

/// The persisted member file: all profiles ever seen, sorted by id.
/// Read whole, merged, written back whole each run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemberCollection {
    #[serde(default)]
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scraped_at: Option<String>,
    #[serde(default)]
    pub members: Vec<MemberProfile>,
}

/// How an incoming profile whose id already exists in the persisted
/// collection is handled. Both behaviors exist in production data flows, so
/// the choice is an explicit per-category setting rather than a default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// Existing profiles are left untouched; only unseen ids are appended.
    AppendOnlyNew,
    /// An incoming profile replaces the stored one with the same id.
    OverwriteOnMatch,
}

impl MergePolicy {
    pub fn label(&self) -> &'static str {
        match self {
            MergePolicy::AppendOnlyNew => "append-only-new",
            MergePolicy::OverwriteOnMatch => "overwrite-on-match",
        }
    }
}

/// Union `incoming` into `existing` without losing stored profiles, dedup by
/// id, and re-sort ascending so output is byte-stable for equal membership.
/// Idempotent: merging the same `incoming` twice equals merging it once.
/// `scraped_at` is carried over unchanged; the caller stamps it on upload.
pub fn merge(
    existing: MemberCollection,
    incoming: Vec<MemberProfile>,
    policy: MergePolicy,
) -> MemberCollection {
    let mut members = existing.members;
    let mut seen: HashSet<MemberId> = members.iter().map(|m| m.id.clone()).collect();

    for profile in incoming {
        if seen.contains(&profile.id) {
            if policy == MergePolicy::OverwriteOnMatch {
                if let Some(slot) = members.iter_mut().find(|m| m.id == profile.id) {
                    *slot = profile;
                }
            }
            continue;
        }
        seen.insert(profile.id.clone());
        members.push(profile);
    }

    members.sort_by(|a, b| a.id.cmp(&b.id));
    MemberCollection {
        count: members.len(),
        scraped_at: existing.scraped_at,
        members,
    }
}

/// Run-local record of members already collected, so a seller appearing under
/// several listings or categories is fetched and uploaded once per run.
/// Discarded at process exit; cross-run dedup happens through [`merge`].
#[derive(Debug, Default)]
pub struct MemberLedger {
    seen: HashSet<MemberId>,
}

impl MemberLedger {
    pub fn contains(&self, id: &MemberId) -> bool {
        self.seen.contains(id)
    }

    /// Record an id; false if it was already present.
    pub fn insert(&mut self, id: MemberId) -> bool {
        self.seen.insert(id)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

// ── Tests ──
