use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

static NEXT_DATA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<script id="__NEXT_DATA__" type="application/json"[^>]*>(.*?)</script>"#)
        .unwrap()
});

/// Pull the `__NEXT_DATA__` JSON payload embedded in a page and descend into
/// `props.<key>`. Returns None when the tag is absent or the payload is
/// malformed; callers treat both the same way.
pub fn embedded_json(html: &str, key: &str) -> Option<Value> {
    let raw = NEXT_DATA_RE.captures(html)?.get(1)?.as_str();
    let data: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            debug!("Malformed __NEXT_DATA__ payload: {}", e);
            return None;
        }
    };
    data.get("props").and_then(|props| props.get(key)).cloned()
}

/// Walk nested objects along `segments`; None as soon as any step is missing.
pub fn path<'a>(value: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    let mut current = value;
    for segment in segments {
        current = current.get(segment)?;
    }
    Some(current)
}

pub fn str_at(value: &Value, segments: &[&str]) -> Option<String> {
    path(value, segments)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

pub fn i64_at(value: &Value, segments: &[&str]) -> Option<i64> {
    path(value, segments).and_then(|v| v.as_i64())
}

pub fn f64_at(value: &Value, segments: &[&str]) -> Option<f64> {
    path(value, segments).and_then(|v| v.as_f64())
}

pub fn bool_at(value: &Value, segments: &[&str]) -> Option<bool> {
    path(value, segments).and_then(|v| v.as_bool())
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(props: Value) -> String {
        let payload = json!({ "props": props });
        format!(
            "<html><body><script id=\"__NEXT_DATA__\" type=\"application/json\">{}</script></body></html>",
            payload
        )
    }

    #[test]
    fn embedded_json_descends_into_props() {
        let html = page(json!({ "pageProps": { "postData": { "x": 1 } } }));
        let props = embedded_json(&html, "pageProps").unwrap();
        assert_eq!(props["postData"]["x"], 1);
    }

    #[test]
    fn embedded_json_missing_tag() {
        assert!(embedded_json("<html><body>no payload</body></html>", "pageProps").is_none());
    }

    #[test]
    fn embedded_json_malformed_payload() {
        let html = "<script id=\"__NEXT_DATA__\" type=\"application/json\">{not json</script>";
        assert!(embedded_json(html, "pageProps").is_none());
    }

    #[test]
    fn path_stops_at_first_missing_step() {
        let v = json!({ "a": { "b": { "c": 7 } } });
        assert_eq!(path(&v, &["a", "b", "c"]).and_then(|x| x.as_i64()), Some(7));
        assert!(path(&v, &["a", "missing", "c"]).is_none());
        assert!(path(&v, &["a", "b", "c", "d"]).is_none());
    }

    #[test]
    fn typed_leaf_helpers() {
        let v = json!({ "s": "text", "n": 3, "f": 1.5, "b": true });
        assert_eq!(str_at(&v, &["s"]), Some("text".to_string()));
        assert_eq!(i64_at(&v, &["n"]), Some(3));
        assert_eq!(f64_at(&v, &["f"]), Some(1.5));
        assert_eq!(bool_at(&v, &["b"]), Some(true));
        // Type mismatch behaves like a missing field
        assert_eq!(str_at(&v, &["n"]), None);
    }
}
