//! Reconciliation of per-chunk records into one canonical record
//!
//! With several successful chunks the reasoning service is asked to merge
//! them. When that request exhausts its retries, a deterministic local merge
//! takes over. Neither path may produce a value absent from every input.

use crate::config::ExtractorConfig;
use crate::error::ExtractorError;
use crate::limiter::ConcurrencyLimiter;
use crate::parser::parse_merge;
use crate::prompt::{preview, MergeEntry, PromptBuilder};
use crate::retry::{retry_call, RetryPolicy};
use crate::types::{ExtractionResult, ExtractionTask, MergeStrategy};
use pactum_domain::{
    Completeness, ContractRecord, Counterparty, LineItem, Location, ReasoningService,
    ResponsiblePerson,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A canonical record and how it was produced
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    /// Canonical record
    pub record: ContractRecord,
    /// Strategy that produced it
    pub strategy: MergeStrategy,
}

/// Merges partial records through the reasoning service, with a local fallback
///
/// # Examples
///
/// ```
/// use pactum_domain::ContractRecord;
/// use pactum_extractor::{
///     ConcurrencyLimiter, ExtractionResult, ExtractorConfig, MergeStrategy, RecordReconciler,
/// };
/// use pactum_llm::MockService;
/// use std::sync::Arc;
///
/// let reconciler = RecordReconciler::new(
///     Arc::new(MockService::default()),
///     ConcurrencyLimiter::new(1),
///     &ExtractorConfig::default(),
/// );
/// let only = ContractRecord { kpp: Some("770701001".into()), ..Default::default() };
/// let results = vec![ExtractionResult::success(1, only.clone(), 1)];
///
/// let reconciled = tokio_test::block_on(reconciler.reconcile(&results, &[], None)).unwrap();
/// assert_eq!(reconciled.strategy, MergeStrategy::Single);
/// assert_eq!(reconciled.record, only);
/// ```
pub struct RecordReconciler<S: ?Sized> {
    service: Arc<S>,
    limiter: ConcurrencyLimiter,
    policy: RetryPolicy,
    call_timeout: Duration,
    preview_chars: usize,
}

impl<S> RecordReconciler<S>
where
    S: ReasoningService + ?Sized,
{
    /// Create a reconciler sharing `limiter` with the extraction stage
    pub fn new(service: Arc<S>, limiter: ConcurrencyLimiter, config: &ExtractorConfig) -> Self {
        Self {
            service,
            limiter,
            policy: config.merge_retry_policy(),
            call_timeout: config.request_timeout(),
            preview_chars: config.preview_chars,
        }
    }

    /// Produce the canonical record from per-chunk results
    ///
    /// `sources` supplies the chunk text behind each result for the merge
    /// request previews.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractorError::ZeroChunksSucceeded`] when no result holds a record.
    pub async fn reconcile(
        &self,
        results: &[ExtractionResult<ContractRecord>],
        sources: &[ExtractionTask],
        running_context: Option<&str>,
    ) -> Result<Reconciled, ExtractorError> {
        let mut successes: Vec<(usize, &ContractRecord)> = results
            .iter()
            .filter_map(|r| r.value.as_ref().map(|record| (r.chunk_index, record)))
            .collect();
        successes.sort_by_key(|(index, _)| *index);

        match successes.len() {
            0 => Err(ExtractorError::ZeroChunksSucceeded(results.len())),
            1 => {
                debug!("Single successful chunk, no merge needed");
                Ok(Reconciled {
                    record: successes[0].1.clone(),
                    strategy: MergeStrategy::Single,
                })
            }
            n => {
                info!("Merging records from {} chunks", n);
                let inputs: Vec<&ContractRecord> = successes.iter().map(|(_, r)| *r).collect();

                let merged = match self.service_merge(&successes, sources, running_context).await {
                    Ok(record) => sanitize(record, &inputs),
                    Err(e) => Err(e),
                };

                match merged {
                    Ok(record) => Ok(Reconciled {
                        record,
                        strategy: MergeStrategy::ServiceAssisted,
                    }),
                    Err(e) => {
                        warn!("Service merge failed ({}), using deterministic merge", e);
                        Ok(Reconciled {
                            record: fallback_merge(&inputs),
                            strategy: MergeStrategy::Deterministic,
                        })
                    }
                }
            }
        }
    }

    async fn service_merge(
        &self,
        successes: &[(usize, &ContractRecord)],
        sources: &[ExtractionTask],
        running_context: Option<&str>,
    ) -> Result<ContractRecord, ExtractorError> {
        let entries: Vec<MergeEntry<'_>> = successes
            .iter()
            .map(|(index, record)| MergeEntry {
                chunk_index: *index,
                chunk_preview: sources
                    .iter()
                    .find(|t| t.chunk_index == *index)
                    .map(|t| preview(&t.chunk_text, self.preview_chars))
                    .unwrap_or_default(),
                extracted_data: record,
            })
            .collect();

        let request = PromptBuilder::merge_records(&entries, running_context)?;
        let service = &self.service;
        let request = &request;

        let outcome = retry_call(
            &self.policy,
            &self.limiter,
            self.call_timeout,
            "Merge",
            || async move {
                let answer = service.complete(request).await?;
                parse_merge(&answer)
            },
            ExtractorError::class,
        )
        .await;

        debug!("Merge request finished after {} attempts", outcome.attempts);
        outcome.result
    }
}

/// Clear every field of a service-merged record that no input supports
fn sanitize(
    merged: ContractRecord,
    inputs: &[&ContractRecord],
) -> Result<ContractRecord, ExtractorError> {
    let mut value = merged.to_value()?;
    let inputs: Vec<Value> = inputs
        .iter()
        .map(|r| r.to_value())
        .collect::<Result<_, _>>()?;

    let mut cleared = Vec::new();
    if let Value::Object(map) = &mut value {
        for (key, field) in map.iter_mut() {
            if is_blank(Some(&*field)) {
                continue;
            }
            if inputs.iter().all(|input| is_blank(input.get(key))) {
                *field = if field.is_array() {
                    Value::Array(Vec::new())
                } else {
                    Value::Null
                };
                cleared.push(key.clone());
                continue;
            }
            if let Value::Object(sub) = field {
                for (sub_key, sub_field) in sub.iter_mut() {
                    if is_blank(Some(&*sub_field)) {
                        continue;
                    }
                    let supported = inputs
                        .iter()
                        .any(|input| !is_blank(input.get(key).and_then(|v| v.get(sub_key))));
                    if !supported {
                        *sub_field = Value::Null;
                        cleared.push(format!("{}.{}", key, sub_key));
                    }
                }
            }
        }
    }

    if !cleared.is_empty() {
        warn!(
            "Merge result contained values absent from every chunk, cleared: {}",
            cleared.join(", ")
        );
    }

    let mut record = ContractRecord::from_value(value)?;
    record.extra.retain(|_, v| !v.is_null());
    Ok(record)
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(map)) => map.values().all(|v| is_blank(Some(v))),
        Some(_) => false,
    }
}

macro_rules! fill_missing {
    ($target:expr, $source:expr, $($field:ident),+ $(,)?) => {
        $(
            if $target.$field.is_none() && $source.$field.is_some() {
                $target.$field = $source.$field.clone();
            }
        )+
    };
}

macro_rules! prefer_longer {
    ($target:expr, $source:expr, $($field:ident),+ $(,)?) => {
        $( longer_text(&mut $target.$field, &$source.$field); )+
    };
}

/// Merge records locally, in order, without consulting the service
///
/// Header fields keep the first value seen. List fields are unioned by
/// natural key, replacing an entry only with a strictly more complete one.
/// Other text fields keep the first value unless a later one is strictly
/// longer.
///
/// # Examples
///
/// ```
/// use pactum_domain::ContractRecord;
/// use pactum_extractor::fallback_merge;
///
/// let first = ContractRecord { inn: Some("7707083893".into()), ..Default::default() };
/// let second = ContractRecord {
///     inn: Some("0000000000".into()),
///     kpp: Some("770701001".into()),
///     ..Default::default()
/// };
/// let merged = fallback_merge(&[&first, &second]);
/// assert_eq!(merged.inn.as_deref(), Some("7707083893"));
/// assert_eq!(merged.kpp.as_deref(), Some("770701001"));
/// ```
pub fn fallback_merge(records: &[&ContractRecord]) -> ContractRecord {
    let Some((first, rest)) = records.split_first() else {
        return ContractRecord::default();
    };

    let mut merged = (*first).clone();

    for record in rest {
        fill_missing!(
            merged,
            record,
            inn,
            kpp,
            full_name,
            short_name,
            organizational_form,
            legal_entity_type,
            contract_name,
            contract_number,
            contract_date,
            contract_price,
            vat_type,
            vat_percent,
            is_supplier,
            is_buyer,
        );

        merge_party(&mut merged.customer, &record.customer);
        merge_party(&mut merged.contractor, &record.contractor);

        merge_keyed(&mut merged.locations, &record.locations, Location::dedup_key);
        merge_keyed(
            &mut merged.responsible_persons,
            &record.responsible_persons,
            ResponsiblePerson::dedup_key,
        );
        merge_keyed(&mut merged.line_items, &record.line_items, line_item_key);

        prefer_longer!(
            merged,
            record,
            service_description,
            service_start_date,
            service_end_date,
            payment_terms,
            pricing_method,
            acceptance_procedure,
            reporting_forms,
            additional_conditions,
            technical_info,
        );
        fill_missing!(merged, record, payment_deferral_days, specification_exists);

        for (key, value) in &record.extra {
            match merged.extra.get(key) {
                None | Some(Value::Null) => {
                    merged.extra.insert(key.clone(), value.clone());
                }
                Some(Value::String(existing)) => {
                    if let Value::String(candidate) = value {
                        if candidate.chars().count() > existing.chars().count() {
                            merged.extra.insert(key.clone(), value.clone());
                        }
                    }
                }
                Some(_) => {}
            }
        }
    }

    merged
}

fn line_item_key(item: &LineItem) -> Option<String> {
    let key = item.dedup_key();
    (!key.is_empty()).then_some(key)
}

fn longer_text(target: &mut Option<String>, candidate: &Option<String>) {
    match (target.as_ref(), candidate) {
        (None, Some(_)) => *target = candidate.clone(),
        (Some(current), Some(new)) if new.chars().count() > current.chars().count() => {
            *target = candidate.clone()
        }
        _ => {}
    }
}

fn merge_party(target: &mut Option<Counterparty>, source: &Option<Counterparty>) {
    let Some(source) = source else {
        return;
    };
    match target {
        None => *target = Some(source.clone()),
        Some(party) => {
            fill_missing!(
                party,
                source,
                inn,
                kpp,
                full_name,
                short_name,
                organizational_form,
                legal_entity_type,
            );
        }
    }
}

/// Union `incoming` into `items` by natural key
///
/// Keyless items are appended unless an identical item is already present.
pub fn merge_keyed<T, K>(items: &mut Vec<T>, incoming: &[T], key: K)
where
    T: Clone + PartialEq + Completeness,
    K: Fn(&T) -> Option<String>,
{
    for item in incoming {
        match key(item) {
            Some(k) => match items.iter().position(|existing| key(existing).as_deref() == Some(k.as_str())) {
                Some(pos) => {
                    if item.filled_fields() > items[pos].filled_fields() {
                        items[pos] = item.clone();
                    }
                }
                None => items.push(item.clone()),
            },
            None => {
                if !items.contains(item) {
                    items.push(item.clone());
                }
            }
        }
    }
}
