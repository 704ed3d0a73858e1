//! Line items - enumerable services or goods from a contract specification

use crate::lenient;
use crate::record::Completeness;
use serde::{Deserialize, Serialize};

/// A single service or product row
///
/// # Examples
///
/// ```
/// use pactum_domain::{Completeness, LineItem};
///
/// let item: LineItem = serde_json::from_str(
///     r#"{"name": "Toner refill", "unit": "pcs", "total_price": "1 079,00"}"#,
/// ).unwrap();
/// assert_eq!(item.total_price, Some(1079.0));
/// assert_eq!(item.filled_fields(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Full item name exactly as written in the document
    pub name: String,

    /// Quantity, when the table has a quantity column
    #[serde(default, deserialize_with = "lenient::number")]
    pub quantity: Option<f64>,

    /// Unit of measurement
    #[serde(default, deserialize_with = "lenient::string")]
    pub unit: Option<String>,

    /// Price per unit
    #[serde(default, deserialize_with = "lenient::number")]
    pub unit_price: Option<f64>,

    /// Total price of the row
    #[serde(default, deserialize_with = "lenient::number")]
    pub total_price: Option<f64>,

    /// Free-form notes
    #[serde(default, deserialize_with = "lenient::string")]
    pub description: Option<String>,
}

impl LineItem {
    /// Create an item with only a name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quantity: None,
            unit: None,
            unit_price: None,
            total_price: None,
            description: None,
        }
    }

    /// Deduplication key: trimmed, case-insensitive name
    pub fn dedup_key(&self) -> String {
        self.name.trim().to_lowercase()
    }
}

impl Completeness for LineItem {
    fn filled_fields(&self) -> usize {
        usize::from(!self.name.trim().is_empty())
            + usize::from(self.quantity.is_some())
            + usize::from(self.unit.is_some())
            + usize::from(self.unit_price.is_some())
            + usize::from(self.total_price.is_some())
            + usize::from(self.description.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_key_normalizes_case_and_whitespace() {
        let a = LineItem::named("  Заправка картриджа ");
        let b = LineItem::named("заправка КАРТРИДЖА");
        assert_eq!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn test_null_fields_deserialize_as_none() {
        let item: LineItem = serde_json::from_str(
            r#"{"name": "Service", "quantity": null, "unit": null, "unit_price": null, "total_price": 10, "description": null}"#,
        )
        .unwrap();
        assert_eq!(item.total_price, Some(10.0));
        assert_eq!(item.filled_fields(), 2);
    }

    #[test]
    fn test_missing_name_is_rejected() {
        let result: Result<LineItem, _> = serde_json::from_str(r#"{"unit": "pcs"}"#);
        assert!(result.is_err());
    }
}
