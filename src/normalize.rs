use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::extract::{bool_at, f64_at, i64_at, path, str_at};
use crate::members::{MemberId, MemberProfile};

/// One media asset attached to a listing, in source order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub uri: String,
    pub mime_type: String,
}

impl MediaRef {
    /// File extension for the stored copy, derived from the mime type with
    /// the URI extension as fallback.
    pub fn file_ext(&self) -> String {
        match self.mime_type.as_str() {
            "image/jpeg" => "jpg".to_string(),
            "image/png" => "png".to_string(),
            "image/webp" => "webp".to_string(),
            "image/gif" => "gif".to_string(),
            _ => self
                .uri
                .rsplit('.')
                .next()
                .filter(|ext| ext.len() <= 4 && !ext.contains('/'))
                .unwrap_or("jpg")
                .to_string(),
        }
    }
}

/// A listing normalized out of the heterogeneous per-category payloads into
/// one stable shape. `listing_id` is the only required field; dates are kept
/// exactly as received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalListing {
    pub listing_id: i64,
    pub title: Option<String>,
    pub description: Option<String>,
    pub price_amount: Option<f64>,
    pub price_currency: Option<String>,
    pub city: Option<String>,
    pub city_id: Option<i64>,
    pub neighborhood: Option<String>,
    pub neighborhood_id: Option<i64>,
    pub category: Option<String>,
    pub category_id: Option<i64>,
    pub sub_category: Option<String>,
    pub sub_category_id: Option<i64>,
    pub posted_date: Option<String>,
    pub publish_date: Option<String>,
    pub condition: Option<String>,
    pub member_id: Option<i64>,
    pub has_video: bool,
    pub has_360: bool,
    pub has_delivery: bool,
    pub media: Vec<MediaRef>,
}

/// Normalize the `postData.listing` subtree of a detail page. Every missing
/// nested field becomes a null field; a missing listing id drops the record.
pub fn normalize_listing(raw: &Value) -> Option<CanonicalListing> {
    let listing = path(raw, &["postData", "listing"])?;
    let Some(listing_id) = i64_at(listing, &["listing_id"]) else {
        warn!("Dropping listing without an id");
        return None;
    };

    let price_currency = path(listing, &["price", "currencies"])
        .and_then(|v| v.as_array())
        .and_then(|currencies| currencies.first())
        .and_then(|c| c.get("currency_code"))
        .and_then(|c| c.as_str())
        .map(|c| c.to_string());

    Some(CanonicalListing {
        listing_id,
        title: str_at(listing, &["title"]),
        description: str_at(listing, &["masked_description"]),
        price_amount: f64_at(listing, &["price_amount"]),
        price_currency,
        city: str_at(listing, &["city", "label"]),
        city_id: i64_at(listing, &["city", "id"]),
        neighborhood: str_at(listing, &["neighborhood", "label"]),
        neighborhood_id: i64_at(listing, &["neighborhood", "id"]),
        category: str_at(listing, &["category", "label"]),
        category_id: i64_at(listing, &["category", "id"]),
        sub_category: str_at(listing, &["sub_category", "label"]),
        sub_category_id: i64_at(listing, &["sub_category", "id"]),
        posted_date: str_at(listing, &["posted_date"]),
        publish_date: str_at(listing, &["publish_date"]),
        condition: extract_condition(listing),
        member_id: i64_at(listing, &["member_id"]),
        has_video: bool_at(listing, &["has_video"]).unwrap_or(false),
        has_360: bool_at(listing, &["has_360"]).unwrap_or(false),
        has_delivery: bool_at(listing, &["has_delivery_service"]).unwrap_or(false),
        media: extract_media(listing),
    })
}

/// The used/new condition lives in a flat attribute list under a fixed field
/// name rather than a dedicated key.
fn extract_condition(listing: &Value) -> Option<String> {
    listing
        .get("basic_info")
        .and_then(|v| v.as_array())
        .and_then(|info| {
            info.iter().find_map(|entry| {
                if str_at(entry, &["field_name"]).as_deref() == Some("ConditionUsed") {
                    str_at(entry, &["option_label"])
                } else {
                    None
                }
            })
        })
}

fn extract_media(listing: &Value) -> Vec<MediaRef> {
    listing
        .get("media")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    Some(MediaRef {
                        id: i64_at(item, &["id"]),
                        uri: str_at(item, &["uri"])?,
                        mime_type: str_at(item, &["mime_type"])
                            .unwrap_or_else(|| "image/jpeg".to_string()),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Seller identity pulled from a detail page; the profile link (when present)
/// points at the richer member page.
#[derive(Debug, Clone)]
pub struct SellerSeed {
    pub profile: MemberProfile,
    pub member_link: Option<String>,
}

/// Extract the member-profile flavor of a detail page. Seller identity is
/// persisted separately from the listing, so null fields are dropped on
/// serialization. None when no usable identity exists.
pub fn extract_seller(raw: &Value, scraped_at: &str) -> Option<SellerSeed> {
    let seller = path(raw, &["postData", "listing", "seller"])?;
    let member_link = str_at(seller, &["member_link"]);

    let id = i64_at(seller, &["id"])
        .map(MemberId::Id)
        .or_else(|| member_link.as_deref().and_then(MemberId::from_link))?;

    Some(SellerSeed {
        profile: MemberProfile {
            id,
            full_name: str_at(seller, &["full_name"]),
            avatar: str_at(seller, &["profile_picture"]),
            rating_avg: f64_at(seller, &["rating_avg"]),
            rating_count: i64_at(seller, &["number_of_ratings"]),
            member_since: str_at(seller, &["member_since"]),
            is_shop: bool_at(seller, &["is_shop"]),
            verification_level: i64_at(seller, &["verification_level"]),
            response_time: str_at(seller, &["response_time"]),
            scraped_at: scraped_at.to_string(),
        },
        member_link,
    })
}

/// Extract the full profile from a member page (`userInfo.member`), which
/// carries the rating breakdown the detail page lacks.
pub fn extract_member_page(raw: &Value, scraped_at: &str) -> Option<MemberProfile> {
    let member = path(raw, &["userInfo", "member"])?;
    let id = i64_at(member, &["id"]).map(MemberId::Id)?;

    Some(MemberProfile {
        id,
        full_name: str_at(member, &["branding", "name"]),
        avatar: str_at(member, &["branding", "avatar"]),
        rating_avg: f64_at(member, &["rating", "average_rating"]),
        rating_count: i64_at(member, &["rating", "number_of_rating"]),
        member_since: str_at(member, &["member_since"]),
        is_shop: bool_at(member, &["is_shop"]),
        verification_level: i64_at(member, &["verification_level"]),
        response_time: str_at(member, &["response_time"]),
        scraped_at: scraped_at.to_string(),
    })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn detail_payload() -> Value {
        json!({
            "postData": {
                "listing": {
                    "listing_id": 275039437,
                    "title": "شقة للإيجار",
                    "masked_description": "شقة واسعة",
                    "price_amount": 450.0,
                    "price": { "currencies": [{ "currency_code": "KWD" }] },
                    "city": { "id": 7, "label": "السالمية" },
                    "neighborhood": { "id": 31, "label": "حولي" },
                    "category": { "id": 100, "label": "عقارات" },
                    "sub_category": { "id": 8001, "label": "شقق للايجار" },
                    "posted_date": "2026-01-24",
                    "publish_date": "2026-01-24 14:02:11",
                    "member_id": 5512,
                    "has_video": true,
                    "has_delivery_service": false,
                    "basic_info": [
                        { "field_name": "Rooms", "option_label": "3" },
                        { "field_name": "ConditionUsed", "option_label": "مستعمل" }
                    ],
                    "media": [
                        { "id": 1, "uri": "https://img.example.com/a.jpg", "mime_type": "image/jpeg" },
                        { "id": 2, "uri": "https://img.example.com/b.webp", "mime_type": "image/webp" }
                    ],
                    "seller": {
                        "id": 5512,
                        "full_name": "أبو خالد",
                        "rating_avg": 4.5,
                        "number_of_ratings": 12,
                        "member_link": "/mid/member-abu-khaled",
                        "is_shop": false
                    }
                }
            }
        })
    }

    #[test]
    fn normalizes_a_full_detail_payload() {
        let listing = normalize_listing(&detail_payload()).unwrap();
        assert_eq!(listing.listing_id, 275039437);
        assert_eq!(listing.title.as_deref(), Some("شقة للإيجار"));
        assert_eq!(listing.price_amount, Some(450.0));
        assert_eq!(listing.price_currency.as_deref(), Some("KWD"));
        assert_eq!(listing.city.as_deref(), Some("السالمية"));
        assert_eq!(listing.sub_category_id, Some(8001));
        assert_eq!(listing.condition.as_deref(), Some("مستعمل"));
        assert_eq!(listing.member_id, Some(5512));
        assert!(listing.has_video);
        assert!(!listing.has_360);
        assert_eq!(listing.media.len(), 2);
        assert_eq!(listing.media[1].file_ext(), "webp");
    }

    #[test]
    fn missing_listing_id_drops_the_record() {
        let raw = json!({ "postData": { "listing": { "title": "بدون رقم" } } });
        assert!(normalize_listing(&raw).is_none());
    }

    #[test]
    fn missing_structure_yields_none() {
        assert!(normalize_listing(&json!({})).is_none());
        assert!(normalize_listing(&json!({ "postData": {} })).is_none());
    }

    #[test]
    fn missing_nested_fields_become_nulls() {
        let raw = json!({ "postData": { "listing": { "listing_id": 5 } } });
        let listing = normalize_listing(&raw).unwrap();
        assert_eq!(listing.title, None);
        assert_eq!(listing.price_currency, None);
        assert_eq!(listing.condition, None);
        assert!(listing.media.is_empty());
        assert!(!listing.has_delivery);
    }

    #[test]
    fn condition_requires_the_exact_field_name() {
        let raw = json!({
            "postData": { "listing": {
                "listing_id": 5,
                "basic_info": [ { "field_name": "Condition", "option_label": "جديد" } ]
            } }
        });
        assert_eq!(normalize_listing(&raw).unwrap().condition, None);
    }

    #[test]
    fn seller_extraction_prefers_numeric_id() {
        let seed = extract_seller(&detail_payload(), "2026-01-25 03:00:00").unwrap();
        assert_eq!(seed.profile.id, MemberId::Id(5512));
        assert_eq!(seed.profile.full_name.as_deref(), Some("أبو خالد"));
        assert_eq!(seed.profile.rating_count, Some(12));
        assert_eq!(seed.member_link.as_deref(), Some("/mid/member-abu-khaled"));
    }

    #[test]
    fn seller_falls_back_to_username_from_link() {
        let raw = json!({
            "postData": { "listing": { "seller": { "member_link": "/mid/member-shop42" } } }
        });
        let seed = extract_seller(&raw, "2026-01-25 03:00:00").unwrap();
        assert_eq!(seed.profile.id, MemberId::Username("shop42".to_string()));
    }

    #[test]
    fn seller_without_any_identity_is_dropped() {
        let raw = json!({
            "postData": { "listing": { "seller": { "full_name": "مجهول" } } }
        });
        assert!(extract_seller(&raw, "2026-01-25 03:00:00").is_none());
    }

    #[test]
    fn member_page_extraction() {
        let raw = json!({
            "userInfo": { "member": {
                "id": 5512,
                "branding": { "name": "متجر أبو خالد", "avatar": "https://img.example.com/av.png" },
                "rating": { "average_rating": 4.7, "number_of_rating": 40 },
                "member_since": "2019-03-01",
                "is_shop": true,
                "verification_level": 2,
                "response_time": "ساعة"
            } }
        });
        let profile = extract_member_page(&raw, "2026-01-25 03:00:00").unwrap();
        assert_eq!(profile.id, MemberId::Id(5512));
        assert_eq!(profile.full_name.as_deref(), Some("متجر أبو خالد"));
        assert_eq!(profile.rating_avg, Some(4.7));
        assert_eq!(profile.is_shop, Some(true));
    }
}
