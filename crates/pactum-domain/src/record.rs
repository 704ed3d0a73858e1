//! Contract records - the canonical structured output for one document
//!
//! A record produced from a single chunk is partial: most fields are `None`
//! and list fields hold only what that slice of the document mentions. The
//! reconciler combines partial records into one canonical record.

use crate::lenient;
use crate::line_item::LineItem;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Count of populated attributes, used to pick the more complete of two variants
pub trait Completeness {
    /// Number of non-null, non-empty attributes
    fn filled_fields(&self) -> usize;
}

fn count<T>(field: &Option<T>) -> usize {
    usize::from(field.is_some())
}

fn normalize_key(raw: &str) -> Option<String> {
    let key = raw.trim().to_lowercase();
    (!key.is_empty()).then_some(key)
}

/// One party to the contract
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Counterparty {
    /// Taxpayer identification number
    #[serde(default, deserialize_with = "lenient::string")]
    pub inn: Option<String>,

    /// Tax registration reason code
    #[serde(default, deserialize_with = "lenient::string")]
    pub kpp: Option<String>,

    /// Full legal name
    #[serde(default, deserialize_with = "lenient::string")]
    pub full_name: Option<String>,

    /// Short name
    #[serde(default, deserialize_with = "lenient::string")]
    pub short_name: Option<String>,

    /// Organizational form (OOO, AO, IP, ...)
    #[serde(default, deserialize_with = "lenient::string")]
    pub organizational_form: Option<String>,

    /// Legal entity or individual
    #[serde(default, deserialize_with = "lenient::string")]
    pub legal_entity_type: Option<String>,
}

impl Completeness for Counterparty {
    fn filled_fields(&self) -> usize {
        count(&self.inn)
            + count(&self.kpp)
            + count(&self.full_name)
            + count(&self.short_name)
            + count(&self.organizational_form)
            + count(&self.legal_entity_type)
    }
}

/// A contact person
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponsiblePerson {
    /// Full name; natural key
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: Option<String>,

    /// Phone numbers, comma separated when several
    #[serde(default, deserialize_with = "lenient::string")]
    pub phone: Option<String>,

    /// Email addresses, comma separated when several
    #[serde(default, deserialize_with = "lenient::string")]
    pub email: Option<String>,

    /// Job title
    #[serde(default, deserialize_with = "lenient::string")]
    pub position: Option<String>,
}

impl ResponsiblePerson {
    /// Normalized name, if any
    pub fn dedup_key(&self) -> Option<String> {
        self.name.as_deref().and_then(normalize_key)
    }
}

impl Completeness for ResponsiblePerson {
    fn filled_fields(&self) -> usize {
        count(&self.name) + count(&self.phone) + count(&self.email) + count(&self.position)
    }
}

/// A service location
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Full address; natural key
    #[serde(default, deserialize_with = "lenient::string")]
    pub address: Option<String>,

    /// Person responsible at this address
    #[serde(default, deserialize_with = "lenient::object")]
    pub responsible_person: Option<ResponsiblePerson>,

    /// Directions or access notes
    #[serde(default, deserialize_with = "lenient::string")]
    pub directions: Option<String>,
}

impl Location {
    /// Normalized address, if any
    pub fn dedup_key(&self) -> Option<String> {
        self.address.as_deref().and_then(normalize_key)
    }
}

impl Completeness for Location {
    fn filled_fields(&self) -> usize {
        count(&self.address)
            + self
                .responsible_person
                .as_ref()
                .map_or(0, Completeness::filled_fields)
            + count(&self.directions)
    }
}

/// The structured description of one contract
///
/// Every field is optional. Unknown keys returned by the reasoning service
/// are preserved in [`ContractRecord::extra`].
///
/// # Examples
///
/// ```
/// use pactum_domain::ContractRecord;
///
/// let record = ContractRecord::from_json(r#"{
///     "inn": 7707083893,
///     "contract_price": "26 360,80",
///     "service_locations": [{"address": "Москва, ул. Ленина, 1"}],
///     "responsible_persons": null,
///     "region": "77"
/// }"#).unwrap();
///
/// assert_eq!(record.inn.as_deref(), Some("7707083893"));
/// assert_eq!(record.contract_price, Some(26360.80));
/// assert_eq!(record.locations.len(), 1);
/// assert!(record.responsible_persons.is_empty());
/// assert_eq!(record.extra["region"], "77");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractRecord {
    // Header fields
    /// Counterparty INN
    #[serde(default, deserialize_with = "lenient::string")]
    pub inn: Option<String>,

    /// Counterparty KPP
    #[serde(default, deserialize_with = "lenient::string")]
    pub kpp: Option<String>,

    /// Counterparty full name
    #[serde(default, deserialize_with = "lenient::string")]
    pub full_name: Option<String>,

    /// Counterparty short name
    #[serde(default, deserialize_with = "lenient::string")]
    pub short_name: Option<String>,

    /// Counterparty organizational form
    #[serde(default, deserialize_with = "lenient::string")]
    pub organizational_form: Option<String>,

    /// Legal entity or individual
    #[serde(default, deserialize_with = "lenient::string")]
    pub legal_entity_type: Option<String>,

    /// Contract title
    #[serde(default, deserialize_with = "lenient::string")]
    pub contract_name: Option<String>,

    /// Contract number
    #[serde(default, deserialize_with = "lenient::string")]
    pub contract_number: Option<String>,

    /// Contract date, ISO formatted when the service manages it
    #[serde(default, deserialize_with = "lenient::string")]
    pub contract_date: Option<String>,

    /// Total contract price
    #[serde(default, deserialize_with = "lenient::number")]
    pub contract_price: Option<f64>,

    /// VAT treatment
    #[serde(default, deserialize_with = "lenient::string")]
    pub vat_type: Option<String>,

    /// VAT rate in percent
    #[serde(default, deserialize_with = "lenient::number")]
    pub vat_percent: Option<f64>,

    /// The counterparty supplies goods or services
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub is_supplier: Option<bool>,

    /// The counterparty buys goods or services
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub is_buyer: Option<bool>,

    // Parties
    /// Customer side of the contract
    #[serde(default, deserialize_with = "lenient::object")]
    pub customer: Option<Counterparty>,

    /// Contractor side of the contract
    #[serde(default, deserialize_with = "lenient::object")]
    pub contractor: Option<Counterparty>,

    // Lists
    /// Service locations, keyed by address
    #[serde(default, deserialize_with = "lenient::list")]
    pub locations: Vec<Location>,

    /// Contact persons, keyed by name
    #[serde(default, deserialize_with = "lenient::list")]
    pub responsible_persons: Vec<ResponsiblePerson>,

    /// Services or goods, keyed by name
    #[serde(default, deserialize_with = "lenient::list")]
    pub line_items: Vec<LineItem>,

    // Terms
    /// Subject of the contract
    #[serde(default, deserialize_with = "lenient::string")]
    pub service_description: Option<String>,

    /// Service period start
    #[serde(default, deserialize_with = "lenient::string")]
    pub service_start_date: Option<String>,

    /// Service period end
    #[serde(default, deserialize_with = "lenient::string")]
    pub service_end_date: Option<String>,

    /// Payment terms
    #[serde(default, deserialize_with = "lenient::string")]
    pub payment_terms: Option<String>,

    /// Payment deferral in days
    #[serde(default, deserialize_with = "lenient::integer")]
    pub payment_deferral_days: Option<i64>,

    /// The contract has a specification appendix
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub specification_exists: Option<bool>,

    /// How the price is determined
    #[serde(default, deserialize_with = "lenient::string")]
    pub pricing_method: Option<String>,

    /// Acceptance procedure
    #[serde(default, deserialize_with = "lenient::string")]
    pub acceptance_procedure: Option<String>,

    /// Reporting documents
    #[serde(default, deserialize_with = "lenient::string")]
    pub reporting_forms: Option<String>,

    /// Anything else worth keeping
    #[serde(default, deserialize_with = "lenient::string")]
    pub additional_conditions: Option<String>,

    /// Technical details of the service
    #[serde(default, deserialize_with = "lenient::string")]
    pub technical_info: Option<String>,

    /// Fields outside the fixed schema, passed through untouched
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Legacy key names mapped onto their canonical field
const ALIASES: &[(&str, &str)] = &[("service_locations", "locations"), ("services", "line_items")];

impl ContractRecord {
    /// Build a record from a JSON value, folding legacy key names into canonical ones
    ///
    /// When both the legacy and the canonical key are present the canonical
    /// one wins unless it is null or empty.
    pub fn from_value(mut value: Value) -> Result<Self, serde_json::Error> {
        if let Value::Object(map) = &mut value {
            for (legacy, canonical) in ALIASES {
                if let Some(legacy_value) = map.remove(*legacy) {
                    let canonical_empty = match map.get(*canonical) {
                        None | Some(Value::Null) => true,
                        Some(Value::Array(items)) => items.is_empty(),
                        Some(_) => false,
                    };
                    if canonical_empty {
                        map.insert((*canonical).to_string(), legacy_value);
                    }
                }
            }
        }
        serde_json::from_value(value)
    }

    /// Parse a record from JSON text
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Self::from_value(serde_json::from_str(json)?)
    }

    /// Serialize to a JSON value
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// True when nothing at all was extracted
    pub fn is_empty(&self) -> bool {
        self.filled_fields() == 0
    }

    /// Best available INN: the header field, then customer, then contractor
    pub fn counterparty_inn(&self) -> Option<&str> {
        self.inn
            .as_deref()
            .or_else(|| self.customer.as_ref().and_then(|c| c.inn.as_deref()))
            .or_else(|| self.contractor.as_ref().and_then(|c| c.inn.as_deref()))
    }
}

impl Completeness for ContractRecord {
    fn filled_fields(&self) -> usize {
        let header = count(&self.inn)
            + count(&self.kpp)
            + count(&self.full_name)
            + count(&self.short_name)
            + count(&self.organizational_form)
            + count(&self.legal_entity_type)
            + count(&self.contract_name)
            + count(&self.contract_number)
            + count(&self.contract_date)
            + count(&self.contract_price)
            + count(&self.vat_type)
            + count(&self.vat_percent)
            + count(&self.is_supplier)
            + count(&self.is_buyer);

        let parties = self.customer.as_ref().map_or(0, Completeness::filled_fields)
            + self.contractor.as_ref().map_or(0, Completeness::filled_fields);

        let lists = usize::from(!self.locations.is_empty())
            + usize::from(!self.responsible_persons.is_empty())
            + usize::from(!self.line_items.is_empty());

        let terms = count(&self.service_description)
            + count(&self.service_start_date)
            + count(&self.service_end_date)
            + count(&self.payment_terms)
            + count(&self.payment_deferral_days)
            + count(&self.specification_exists)
            + count(&self.pricing_method)
            + count(&self.acceptance_procedure)
            + count(&self.reporting_forms)
            + count(&self.additional_conditions)
            + count(&self.technical_info);

        let extra = self.extra.values().filter(|v| !v.is_null()).count();

        header + parties + lists + terms + extra
    }
}
