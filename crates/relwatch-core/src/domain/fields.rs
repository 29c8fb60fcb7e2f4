//! Coercions from raw Bitable field values into typed values.
//!
//! The record store hands back loosely typed JSON: a text column may arrive
//! as a plain string or as a list of `{ "text": .., "type": "text" }`
//! segments, numbers may arrive as strings, single-select and multi-select
//! columns differ only in list-ness. Every conversion the record model relies
//! on lives here so it can be tested in isolation.

use serde_json::{Map, Value};

use super::record::{FileInfo, LinkInfo, ParentReference, UserInfo};

/// Raw field map of one row, keyed by column name.
pub type FieldMap = Map<String, Value>;

/// Render a value as text.
///
/// Strings pass through, numbers are formatted, text-segment lists and
/// `{ "text": .. }` objects are concatenated. `null`, booleans and lists
/// that yield nothing return `None`.
pub fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => {
            let joined: String = items.iter().filter_map(text_value).collect();
            if joined.is_empty() {
                None
            } else {
                Some(joined)
            }
        }
        Value::Object(obj) => obj.get("text").and_then(text_value),
        Value::Null | Value::Bool(_) => None,
    }
}

/// Like [`text_value`] but treats blank text as absent.
pub fn non_empty_text(value: &Value) -> Option<String> {
    text_value(value).filter(|s| !s.trim().is_empty())
}

/// Collect every scalar rendering of a value.
///
/// Used for status columns, which hold either one option or a list of them.
/// Matching against these values is by presence, never by identity.
pub fn string_values(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(text_value).collect(),
        Value::Null => Vec::new(),
        other => text_value(other).into_iter().collect(),
    }
}

/// Coerce a value into an integer.
///
/// Floats are truncated and numeric strings are parsed (`"42"`, `"42.0"`).
pub fn integer_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().map(|f| f as i64))
        }
        Value::Array(items) if items.len() == 1 => integer_value(&items[0]),
        _ => None,
    }
}

/// Coerce a value into a float.
pub fn float_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Epoch-millisecond timestamp. Zero counts as unset.
pub fn timestamp_millis(value: &Value) -> Option<i64> {
    integer_value(value).filter(|ms| *ms != 0)
}

/// App Store identifier. Zero and negative values count as unset.
pub fn app_id(value: &Value) -> Option<u64> {
    integer_value(value)
        .filter(|id| *id > 0)
        .map(|id| id as u64)
}

fn obj_text(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(non_empty_text)
}

/// Parse parent-reference objects.
///
/// Non-object list items are ignored. A non-empty plain string is kept as a
/// reference carrying only raw text.
pub fn parent_references(value: &Value) -> Vec<ParentReference> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::Object(obj) => Some(ParentReference {
                    target_table: obj_text(obj, "table_id").unwrap_or_default(),
                    record_ids: obj.get("record_ids").map(string_values).unwrap_or_default(),
                    raw_text: obj_text(obj, "text"),
                    text_arr: obj.get("text_arr").map(string_values).unwrap_or_default(),
                    kind: obj_text(obj, "type").unwrap_or_else(|| "text".to_string()),
                }),
                _ => None,
            })
            .collect(),
        Value::String(s) if !s.is_empty() => vec![ParentReference::text_only(s.clone())],
        _ => Vec::new(),
    }
}

/// Whether a parent-reference field leaves the row without a parent.
///
/// Absent, `null`, `""`, `[]`, or lists whose objects carry neither record
/// ids nor raw text all count as empty. Any other scalar is a parent.
pub fn parent_is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(v @ Value::Array(_)) => parent_references(v).iter().all(ParentReference::is_empty),
        Some(_) => false,
    }
}

/// Parse a list of user references.
pub fn users(value: &Value) -> Vec<UserInfo> {
    let Value::Array(items) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(Value::as_object)
        .map(|obj| UserInfo {
            id: obj_text(obj, "id").unwrap_or_default(),
            name: obj_text(obj, "name").unwrap_or_default(),
            en_name: obj_text(obj, "en_name"),
            email: obj_text(obj, "email"),
            avatar_url: obj_text(obj, "avatar_url"),
        })
        .collect()
}

/// Parse a list of file attachments.
pub fn files(value: &Value) -> Vec<FileInfo> {
    let Value::Array(items) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(Value::as_object)
        .map(|obj| FileInfo {
            file_token: obj_text(obj, "file_token").unwrap_or_default(),
            name: obj_text(obj, "name").unwrap_or_default(),
            size: obj.get("size").and_then(integer_value).unwrap_or(0).max(0) as u64,
            tmp_url: obj_text(obj, "tmp_url"),
            mime_type: obj_text(obj, "type"),
            url: obj_text(obj, "url"),
        })
        .collect()
}

/// Parse a hyperlink column. A bare string becomes both link and label.
pub fn link(value: &Value) -> Option<LinkInfo> {
    match value {
        Value::Object(obj) => {
            let link = obj_text(obj, "link")?;
            let text = obj_text(obj, "text").unwrap_or_else(|| link.clone());
            Some(LinkInfo { link, text })
        }
        other => non_empty_text(other).map(|s| LinkInfo {
            link: s.clone(),
            text: s,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_value_variants() {
        assert_eq!(text_value(&json!("Atlas")), Some("Atlas".to_string()));
        assert_eq!(text_value(&json!(1.5)), Some("1.5".to_string()));
        assert_eq!(
            text_value(&json!([{"text": "At", "type": "text"}, {"text": "las", "type": "text"}])),
            Some("Atlas".to_string())
        );
        assert_eq!(text_value(&json!(null)), None);
        assert_eq!(text_value(&json!([])), None);
    }

    #[test]
    fn test_non_empty_text_rejects_blank() {
        assert_eq!(non_empty_text(&json!("   ")), None);
        assert_eq!(non_empty_text(&json!("x")), Some("x".to_string()));
    }

    #[test]
    fn test_string_values_scalar_and_list() {
        assert_eq!(string_values(&json!("提审中")), vec!["提审中"]);
        assert_eq!(string_values(&json!(["提审中", "已发布"])), vec!["提审中", "已发布"]);
        assert!(string_values(&json!(null)).is_empty());
    }

    #[test]
    fn test_integer_value_coercions() {
        assert_eq!(integer_value(&json!(42)), Some(42));
        assert_eq!(integer_value(&json!(42.9)), Some(42));
        assert_eq!(integer_value(&json!("1700000000000")), Some(1_700_000_000_000));
        assert_eq!(integer_value(&json!("12.0")), Some(12));
        assert_eq!(integer_value(&json!("abc")), None);
        assert_eq!(integer_value(&json!(true)), None);
    }

    #[test]
    fn test_timestamp_zero_is_unset() {
        assert_eq!(timestamp_millis(&json!(0)), None);
        assert_eq!(timestamp_millis(&json!(100)), Some(100));
    }

    #[test]
    fn test_app_id_rejects_non_positive() {
        assert_eq!(app_id(&json!(0)), None);
        assert_eq!(app_id(&json!(-3)), None);
        assert_eq!(app_id(&json!("6450000001")), Some(6_450_000_001));
    }

    #[test]
    fn test_parent_is_empty_rules() {
        assert!(parent_is_empty(None));
        assert!(parent_is_empty(Some(&json!(null))));
        assert!(parent_is_empty(Some(&json!(""))));
        assert!(parent_is_empty(Some(&json!([]))));
        assert!(parent_is_empty(Some(&json!([{"table_id": "tbl", "record_ids": null}]))));
        assert!(parent_is_empty(Some(&json!([{"table_id": "tbl", "record_ids": [], "text": ""}]))));

        assert!(!parent_is_empty(Some(&json!([{"table_id": "tbl", "record_ids": ["rec1"]}]))));
        assert!(!parent_is_empty(Some(&json!([{"table_id": "tbl", "text": "Atlas"}]))));
        assert!(!parent_is_empty(Some(&json!("Atlas"))));
        assert!(!parent_is_empty(Some(&json!(7))));
    }

    #[test]
    fn test_non_object_parent_items_are_ignored() {
        assert!(parent_is_empty(Some(&json!(["x"]))));
        assert!(parent_is_empty(Some(&json!(["x", 3, null]))));
        assert!(!parent_is_empty(Some(&json!(["x", {"record_ids": ["rec1"]}]))));
        assert!(parent_references(&json!(["x"])).is_empty());
    }

    #[test]
    fn test_parent_references_parse_ids() {
        let refs = parent_references(&json!([
            {"table_id": "tblA", "record_ids": ["rec1", "rec2"], "text": "Atlas", "type": "text"}
        ]));
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].target_table, "tblA");
        assert_eq!(refs[0].record_ids, vec!["rec1", "rec2"]);
        assert_eq!(refs[0].raw_text.as_deref(), Some("Atlas"));
    }

    #[test]
    fn test_users_and_files() {
        let people = users(&json!([{"id": "ou_1", "name": "Lin", "email": "lin@example.com"}]));
        assert_eq!(people.len(), 1);
        assert_eq!(people[0].id, "ou_1");
        assert_eq!(people[0].en_name, None);

        let logo = files(&json!([{"file_token": "ft", "name": "logo.png", "size": 2048, "type": "image/png"}]));
        assert_eq!(logo[0].size, 2048);
        assert_eq!(logo[0].mime_type.as_deref(), Some("image/png"));

        assert!(users(&json!("not a list")).is_empty());
    }

    #[test]
    fn test_link_from_object_and_string() {
        let l = link(&json!({"link": "https://git.example.com/atlas", "text": "repo"})).unwrap();
        assert_eq!(l.text, "repo");

        let l = link(&json!("https://git.example.com/atlas")).unwrap();
        assert_eq!(l.link, l.text);

        assert!(link(&json!(null)).is_none());
    }
}
