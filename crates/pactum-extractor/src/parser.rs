//! Parse reasoning service answers into records and line items

use crate::error::ExtractorError;
use pactum_domain::{ContractRecord, LineItem};
use serde_json::Value;
use tracing::warn;

/// Keys under which a line item list may be wrapped
const LINE_ITEM_KEYS: &[&str] = &["services", "line_items", "items"];

/// Parse a partial contract record from an extraction answer
pub fn parse_record(response: &str) -> Result<ContractRecord, ExtractorError> {
    let json = parse_value(response)?;
    if !json.is_object() {
        return Err(ExtractorError::InvalidFormat(
            "Expected a JSON object".to_string(),
        ));
    }
    Ok(ContractRecord::from_value(json)?)
}

/// Parse the merged record from a merge answer
pub fn parse_merge(response: &str) -> Result<ContractRecord, ExtractorError> {
    parse_record(response)
}

/// Parse line items from an extraction answer
///
/// Accepts `{"services": [...]}`, `{"line_items": [...]}`, `{"items": [...]}`
/// or a bare array. Items without a usable name are skipped.
pub fn parse_line_items(response: &str) -> Result<Vec<LineItem>, ExtractorError> {
    let json = parse_value(response)?;

    let items = match json {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            let key = LINE_ITEM_KEYS.iter().find(|k| map.contains_key(**k));
            match key.and_then(|k| map.remove(*k)) {
                Some(Value::Array(items)) => items,
                Some(Value::Null) => Vec::new(),
                Some(_) => {
                    return Err(ExtractorError::InvalidFormat(
                        "Line item list is not an array".to_string(),
                    ))
                }
                None => {
                    return Err(ExtractorError::InvalidFormat(
                        "Expected a line item list".to_string(),
                    ))
                }
            }
        }
        _ => {
            return Err(ExtractorError::InvalidFormat(
                "Expected a JSON array or object".to_string(),
            ))
        }
    };

    let mut parsed = Vec::with_capacity(items.len());
    for (idx, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<LineItem>(item) {
            Ok(item) if item.name.trim().is_empty() => {
                warn!("Line item {} has an empty name, skipping", idx);
            }
            Ok(item) => parsed.push(item),
            Err(e) => {
                warn!("Failed to parse line item {}: {}", idx, e);
            }
        }
    }

    Ok(parsed)
}

fn parse_value(response: &str) -> Result<Value, ExtractorError> {
    let json_str = extract_json(response)?;
    Ok(serde_json::from_str(json_str)?)
}

/// Extract JSON from an answer, handling markdown code blocks and chatter
fn extract_json(response: &str) -> Result<&str, ExtractorError> {
    let trimmed = response.trim();
    if trimmed.is_empty() {
        return Err(ExtractorError::InvalidFormat("Empty response".to_string()));
    }

    if let Some(fence) = trimmed.find("```") {
        let after = &trimmed[fence + 3..];
        // A language tag runs up to the newline or the JSON on the same line
        let tag_end = after.find(['\n', '{', '[']).unwrap_or(after.len());
        let body = if is_language_tag(after[..tag_end].trim()) {
            &after[tag_end..]
        } else {
            after.find(['{', '[']).map(|i| &after[i..]).unwrap_or(after)
        };
        let body = match body.find("```") {
            Some(end) => &body[..end],
            None => body,
        };
        let body = body.trim();
        if body.is_empty() {
            return Err(ExtractorError::InvalidFormat("Empty code block".to_string()));
        }
        return Ok(body);
    }

    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Ok(trimmed);
    }

    // Text around a JSON body: take the outermost braces
    let start = trimmed.find(['{', '[']);
    let end = trimmed.rfind(['}', ']']);
    match (start, end) {
        (Some(start), Some(end)) if end > start => Ok(&trimmed[start..=end]),
        _ => Err(ExtractorError::JsonParse(format!(
            "No JSON found in response: {}",
            trimmed.chars().take(100).collect::<String>()
        ))),
    }
}

fn is_language_tag(tag: &str) -> bool {
    tag.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_record() {
        let response = r#"{"inn": "7707083893", "contract_number": "15/24", "contract_price": 26360.8}"#;
        let record = parse_record(response).unwrap();
        assert_eq!(record.inn.as_deref(), Some("7707083893"));
        assert_eq!(record.contract_number.as_deref(), Some("15/24"));
        assert_eq!(record.contract_price, Some(26360.8));
    }

    #[test]
    fn test_parse_record_with_markdown_wrapper() {
        let response = "```json\n{\"kpp\": \"770701001\"}\n```";
        let record = parse_record(response).unwrap();
        assert_eq!(record.kpp.as_deref(), Some("770701001"));
    }

    #[test]
    fn test_parse_record_with_chatter() {
        let response = "Here is the result:\n{\"full_name\": \"ООО \\\"Ромашка\\\"\"}\nHope it helps.";
        let record = parse_record(response).unwrap();
        assert_eq!(record.full_name.as_deref(), Some("ООО \"Ромашка\""));
    }

    #[test]
    fn test_parse_invalid_json() {
        let result = parse_record("This is not JSON");
        assert!(matches!(result, Err(ExtractorError::JsonParse(_))));
    }

    #[test]
    fn test_parse_record_not_object() {
        let result = parse_record("[1, 2]");
        assert!(matches!(result, Err(ExtractorError::InvalidFormat(_))));
    }

    #[test]
    fn test_parse_empty_response() {
        assert!(parse_record("   ").is_err());
        assert!(parse_record("```json\n```").is_err());
    }

    #[test]
    fn test_parse_line_items_services_wrapper() {
        let response = r#"{"services": [
            {"name": "Заправка картриджа", "quantity": 2, "unit": "шт", "unit_price": "539,50", "total_price": "1 079,00"},
            {"name": "Ремонт принтера", "quantity": null}
        ]}"#;
        let items = parse_line_items(response).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].unit_price, Some(539.5));
        assert_eq!(items[0].total_price, Some(1079.0));
        assert_eq!(items[1].quantity, None);
    }

    #[test]
    fn test_parse_line_items_other_shapes() {
        assert_eq!(parse_line_items(r#"[{"name": "A"}]"#).unwrap().len(), 1);
        assert_eq!(parse_line_items(r#"{"line_items": [{"name": "A"}]}"#).unwrap().len(), 1);
        assert!(parse_line_items(r#"{"services": null}"#).unwrap().is_empty());
        assert!(parse_line_items(r#"{"other": []}"#).is_err());
        assert!(parse_line_items(r#"{"services": "none"}"#).is_err());
    }

    #[test]
    fn test_parse_line_items_skips_invalid() {
        let response = r#"{"services": [
            {"name": "Valid"},
            {"unit": "шт"},
            {"name": "   "},
            {"name": "Also valid", "total_price": "n/a"}
        ]}"#;
        let items = parse_line_items(response).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "Valid");
        assert_eq!(items[1].total_price, None);
    }

    #[test]
    fn test_extract_json_from_plain_json() {
        let json = r#"{"key": "value"}"#;
        assert_eq!(extract_json(json).unwrap(), json);
    }

    #[test]
    fn test_extract_json_from_markdown_without_language() {
        let response = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(extract_json(response).unwrap(), r#"{"key": "value"}"#);
    }

    #[test]
    fn test_parse_record_fenced_on_one_line() {
        let record = parse_record("```json {\"inn\": \"7707083893\"} ```").unwrap();
        assert_eq!(record.inn.as_deref(), Some("7707083893"));

        let record = parse_record("```{\"inn\": \"1\"}```").unwrap();
        assert_eq!(record.inn.as_deref(), Some("1"));
    }

    #[test]
    fn test_extract_json_after_fence_chatter() {
        let response = "```here is the result: {\"key\": \"value\"}\n```";
        assert_eq!(extract_json(response).unwrap(), r#"{"key": "value"}"#);
    }
}
