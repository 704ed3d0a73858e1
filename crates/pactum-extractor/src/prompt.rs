//! Requests sent to the reasoning service and the running context summary

use crate::error::ExtractorError;
use pactum_domain::{ContractRecord, Counterparty, RequestKind, ServiceRequest};
use serde::Serialize;

/// One chunk's contribution to a merge request
#[derive(Debug, Clone, Serialize)]
pub struct MergeEntry<'a> {
    /// Index of the chunk the record came from
    pub chunk_index: usize,

    /// Leading slice of the chunk text
    pub chunk_preview: String,

    /// Record extracted from the chunk
    pub extracted_data: &'a ContractRecord,
}

/// Builds service requests for every pipeline stage
pub struct PromptBuilder;

impl PromptBuilder {
    /// Request a partial record from one chunk
    pub fn extract_record(chunk_index: usize, chunk_text: &str) -> ServiceRequest {
        let mut prompt = String::new();
        prompt.push_str(&format!("Document fragment #{}:\n", chunk_index));
        prompt.push_str("---\n");
        prompt.push_str(chunk_text);
        prompt.push_str("\n---\n\n");
        prompt.push_str(RECORD_FORMAT);

        ServiceRequest::new(RequestKind::ExtractRecord, RECORD_INSTRUCTIONS, prompt)
    }

    /// Request the line items listed in one chunk
    pub fn extract_line_items(chunk_index: usize, chunk_text: &str) -> ServiceRequest {
        let mut prompt = String::new();
        prompt.push_str(&format!("Document fragment #{}:\n", chunk_index));
        prompt.push_str("---\n");
        prompt.push_str(chunk_text);
        prompt.push_str("\n---\n\n");
        prompt.push_str(LINE_ITEMS_FORMAT);

        ServiceRequest::new(RequestKind::ExtractLineItems, LINE_ITEMS_INSTRUCTIONS, prompt)
    }

    /// Request one merged record from several partial ones
    pub fn merge_records(
        entries: &[MergeEntry<'_>],
        running_context: Option<&str>,
    ) -> Result<ServiceRequest, ExtractorError> {
        let chunks_data = serde_json::to_string_pretty(entries)?;

        let mut prompt = String::new();
        prompt.push_str(&format!(
            "The document was split into fragments; {} of them produced data.\n\n",
            entries.len()
        ));
        if let Some(context) = running_context.filter(|c| !c.trim().is_empty()) {
            prompt.push_str("Known so far:\n");
            prompt.push_str(context);
            prompt.push_str("\n\n");
        }
        prompt.push_str("Fragments:\n");
        prompt.push_str(&chunks_data);
        prompt.push_str("\n\n");
        prompt.push_str(MERGE_RULES);

        Ok(ServiceRequest::new(
            RequestKind::MergeRecords,
            MERGE_INSTRUCTIONS,
            prompt,
        ))
    }
}

/// First `max_chars` characters of `text`
pub fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", preview(text, max_chars))
    } else {
        text.to_string()
    }
}

/// Textual summary of what is known about a contract so far
pub struct RunningContext;

impl RunningContext {
    /// Render a record as a sectioned summary; empty when nothing is known
    ///
    /// # Examples
    ///
    /// ```
    /// use pactum_domain::ContractRecord;
    /// use pactum_extractor::RunningContext;
    ///
    /// let record = ContractRecord {
    ///     contract_number: Some("15/24".to_string()),
    ///     ..Default::default()
    /// };
    /// let context = RunningContext::render(&record);
    /// assert!(context.contains("Contract number: 15/24"));
    /// assert!(RunningContext::render(&ContractRecord::default()).is_empty());
    /// ```
    pub fn render(record: &ContractRecord) -> String {
        let mut sections: Vec<String> = Vec::new();

        let mut contract = Vec::new();
        push_line(&mut contract, "Contract name", record.contract_name.as_deref());
        push_line(&mut contract, "Contract number", record.contract_number.as_deref());
        push_line(&mut contract, "Contract date", record.contract_date.as_deref());
        push_line(
            &mut contract,
            "Contract price",
            record.contract_price.map(|p| p.to_string()).as_deref(),
        );
        push_line(&mut contract, "VAT type", record.vat_type.as_deref());
        push_line(
            &mut contract,
            "VAT percent",
            record.vat_percent.map(|p| p.to_string()).as_deref(),
        );
        push_section(&mut sections, "CONTRACT", contract);

        if let Some(description) = &record.service_description {
            push_section(
                &mut sections,
                "SUBJECT",
                vec![format!("- {}", truncate(description, 500))],
            );
        }

        let mut dates = Vec::new();
        push_line(&mut dates, "Service start", record.service_start_date.as_deref());
        push_line(&mut dates, "Service end", record.service_end_date.as_deref());
        push_section(&mut sections, "SERVICE PERIOD", dates);

        if let Some(terms) = &record.payment_terms {
            push_section(
                &mut sections,
                "PAYMENT TERMS",
                vec![format!("- {}", truncate(terms, 300))],
            );
        }

        let mut other = Vec::new();
        push_line(
            &mut other,
            "Acceptance procedure",
            record.acceptance_procedure.as_deref().map(|s| truncate(s, 200)).as_deref(),
        );
        push_line(
            &mut other,
            "Specification attached",
            record
                .specification_exists
                .map(|b| if b { "yes" } else { "no" }),
        );
        push_line(
            &mut other,
            "Pricing method",
            record.pricing_method.as_deref().map(|s| truncate(s, 200)).as_deref(),
        );
        push_line(
            &mut other,
            "Reporting forms",
            record.reporting_forms.as_deref().map(|s| truncate(s, 200)).as_deref(),
        );
        push_line(
            &mut other,
            "Additional conditions",
            record.additional_conditions.as_deref().map(|s| truncate(s, 200)).as_deref(),
        );
        push_section(&mut sections, "OTHER TERMS", other);

        let mut parties = Vec::new();
        if let Some(line) = record.customer.as_ref().and_then(|c| party_line("Customer", c)) {
            parties.push(line);
        }
        if let Some(line) = record.contractor.as_ref().and_then(|c| party_line("Contractor", c)) {
            parties.push(line);
        }
        push_section(&mut sections, "PARTIES", parties);

        sections.join("\n\n")
    }
}

fn push_line(lines: &mut Vec<String>, label: &str, value: Option<&str>) {
    if let Some(value) = value {
        lines.push(format!("- {}: {}", label, value));
    }
}

fn push_section(sections: &mut Vec<String>, title: &str, lines: Vec<String>) {
    if !lines.is_empty() {
        sections.push(format!("{}:\n{}", title, lines.join("\n")));
    }
}

fn party_line(role: &str, party: &Counterparty) -> Option<String> {
    let mut fields = Vec::new();
    if let Some(name) = party.full_name.as_deref().or(party.short_name.as_deref()) {
        fields.push(name.to_string());
    }
    if let Some(inn) = &party.inn {
        fields.push(format!("INN {}", inn));
    }
    if let Some(kpp) = &party.kpp {
        fields.push(format!("KPP {}", kpp));
    }
    (!fields.is_empty()).then(|| format!("- {}: {}", role, fields.join(", ")))
}

const RECORD_INSTRUCTIONS: &str = "You extract structured data from fragments of Russian \
contracts. Answer with a single JSON object and nothing else. Use null for anything the \
fragment does not state. Never invent identifiers such as INN or KPP.";

const RECORD_FORMAT: &str = r#"Return a JSON object with these keys (null when absent):
inn, kpp, full_name, short_name, organizational_form, legal_entity_type,
contract_name, contract_number, contract_date (YYYY-MM-DD), contract_price, vat_type, vat_percent,
is_supplier, is_buyer,
customer and contractor as objects {inn, kpp, full_name, short_name, organizational_form, legal_entity_type},
locations as a list of {address, responsible_person: {name, phone, email, position}, directions},
responsible_persons as a list of {name, phone, email, position},
service_description, service_start_date, service_end_date, payment_terms, payment_deferral_days,
specification_exists, pricing_method, acceptance_procedure, reporting_forms, additional_conditions,
technical_info."#;

const LINE_ITEMS_INSTRUCTIONS: &str = "You list every service or product named in a fragment \
of a Russian contract, typically from specification tables. Answer with JSON only. Copy names \
exactly as written; do not merge or shorten rows.";

const LINE_ITEMS_FORMAT: &str = r#"Return {"services": [{"name", "quantity", "unit", "unit_price", "total_price", "description"}]}.
Use null for missing values and an empty list when the fragment names no services."#;

const MERGE_INSTRUCTIONS: &str = "You reconcile contract data extracted from several fragments \
of one document into a single consistent JSON object. Answer with JSON only.";

const MERGE_RULES: &str = r#"Merge rules:
- Header fields (inn, kpp, names, contract_*, vat_*, is_supplier, is_buyer): prefer the value from the earliest fragment that has one.
- customer and contractor: keep the most complete variant; fill missing fields from other fragments.
- locations (keyed by address), responsible_persons (keyed by name): union of all fragments, one entry per key, keeping the more complete entry.
- Other text fields: if fragments disagree, keep the more detailed text.
- A field that is null in every fragment stays null. Never invent a value.
Return the merged JSON object with the same keys as the fragments."#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_record_request() {
        let request = PromptBuilder::extract_record(3, "Цена договора 100 рублей");
        assert_eq!(request.kind, RequestKind::ExtractRecord);
        assert!(request.prompt.contains("Document fragment #3"));
        assert!(request.prompt.contains("Цена договора 100 рублей"));
        assert!(request.system.contains("Never invent"));
    }

    #[test]
    fn test_line_items_request() {
        let request = PromptBuilder::extract_line_items(1, "| A | 1 |");
        assert_eq!(request.kind, RequestKind::ExtractLineItems);
        assert!(request.prompt.contains("\"services\""));
    }

    #[test]
    fn test_merge_request_carries_entries_and_context() {
        let record = ContractRecord {
            inn: Some("7707083893".to_string()),
            ..Default::default()
        };
        let entries = vec![MergeEntry {
            chunk_index: 2,
            chunk_preview: preview("Исполнитель: ООО Ромашка", 11),
            extracted_data: &record,
        }];

        let request = PromptBuilder::merge_records(&entries, Some("CONTRACT:\n- Contract number: 1")).unwrap();
        assert_eq!(request.kind, RequestKind::MergeRecords);
        assert!(request.prompt.contains("\"chunk_index\": 2"));
        assert!(request.prompt.contains("\"chunk_preview\": \"Исполнитель\""));
        assert!(request.prompt.contains("7707083893"));
        assert!(request.prompt.contains("Known so far:"));
    }

    #[test]
    fn test_merge_request_without_context() {
        let record = ContractRecord::default();
        let entries = vec![MergeEntry {
            chunk_index: 1,
            chunk_preview: String::new(),
            extracted_data: &record,
        }];
        let request = PromptBuilder::merge_records(&entries, None).unwrap();
        assert!(!request.prompt.contains("Known so far:"));
    }

    #[test]
    fn test_running_context_truncates_long_fields() {
        let record = ContractRecord {
            service_description: Some("д".repeat(600)),
            payment_terms: Some("p".repeat(100)),
            acceptance_procedure: Some("a".repeat(250)),
            ..Default::default()
        };
        let context = RunningContext::render(&record);
        assert!(context.contains(&format!("- {}...", "д".repeat(500))));
        assert!(!context.contains(&"д".repeat(501)));
        assert!(context.contains(&format!("- {}", "p".repeat(100))));
        assert!(context.contains(&format!("Acceptance procedure: {}...", "a".repeat(200))));
    }

    #[test]
    fn test_running_context_parties() {
        let record = ContractRecord {
            customer: Some(Counterparty {
                full_name: Some("ГБУ Школа 1".to_string()),
                inn: Some("7700000000".to_string()),
                ..Default::default()
            }),
            contractor: Some(Counterparty::default()),
            specification_exists: Some(false),
            ..Default::default()
        };
        let context = RunningContext::render(&record);
        assert!(context.contains("- Customer: ГБУ Школа 1, INN 7700000000"));
        assert!(!context.contains("Contractor"));
        assert!(context.contains("Specification attached: no"));
    }
}
