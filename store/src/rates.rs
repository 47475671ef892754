//! Reconciliation engine for stored rate documents.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, instrument, warn};

use forexsync_common::{PairList, PairPackage};

use crate::error::StoreResult;
use crate::repository::RateRepository;

/// Combine a stored pair list with freshly pulled pairs.
///
/// Existing pairs keep their position; a fresh value for the same key wins.
/// Fresh pairs with unseen keys are appended in their own order. No stored
/// pair is ever dropped.
pub fn reconcile(existing: &PairList, fresh: &PairList) -> PairList {
    let mut pending = fresh.clone();
    let mut merged = PairList::new();

    for pair in existing {
        match pending.remove(&pair.key()) {
            Some(update) => merged.insert(update),
            None => merged.insert(pair.clone()),
        };
    }
    merged.extend(pending);

    merged
}

/// Rate store reconciling packages into one document per exchange date.
pub struct RateStore {
    repository: Arc<dyn RateRepository>,
}

impl RateStore {
    pub fn new(repository: Arc<dyn RateRepository>) -> Self {
        Self { repository }
    }

    /// Whole stored document for a date.
    pub fn find_full(&self, exchange_date: NaiveDate) -> StoreResult<Option<PairPackage>> {
        self.repository.load(exchange_date)
    }

    /// Stored values for every requested pair, or nothing.
    ///
    /// A partial match counts as a miss. The returned package holds only the
    /// requested pairs, in stored order.
    #[instrument(skip(self, request), fields(date = %request.exchange_date_str()))]
    pub fn find_complete(&self, request: &PairPackage) -> StoreResult<Option<PairPackage>> {
        let stored = match self.repository.load(request.exchange_date())? {
            Some(stored) => stored,
            None => return Ok(None),
        };

        let found: PairList = stored
            .pairs()
            .iter()
            .filter(|pair| request.pairs().contains(&pair.key()))
            .cloned()
            .collect();

        if found.len() < request.pairs().len() {
            debug!(
                requested = request.pairs().len(),
                found = found.len(),
                "Stored document is missing requested pairs"
            );
            return Ok(None);
        }

        Ok(Some(PairPackage::for_date(request.exchange_date()).with_pairs(found)))
    }

    /// Reconcile a valued package into the stored document for its date.
    #[instrument(skip(self, package), fields(date = %package.exchange_date_str()))]
    pub fn merge(&self, package: &PairPackage) -> StoreResult<()> {
        package.ensure_values()?;

        match self.repository.load(package.exchange_date())? {
            None => {
                self.repository.save(package)?;
                info!(pairs = package.pairs().len(), "Stored new rate document");
            }
            Some(existing) => {
                let merged = reconcile(existing.pairs(), package.pairs());
                let added = merged.len() - existing.pairs().len();
                self.repository
                    .save(&PairPackage::for_date(package.exchange_date()).with_pairs(merged))?;
                info!(
                    updated = package.pairs().len() - added,
                    added,
                    "Merged rate document"
                );
            }
        }

        Ok(())
    }

    /// Overwrite the stored document with a valued package.
    #[instrument(skip(self, package), fields(date = %package.exchange_date_str()))]
    pub fn replace(&self, package: &PairPackage) -> StoreResult<()> {
        package.ensure_values()?;

        if let Some(existing) = self.repository.load(package.exchange_date())? {
            let dropped = existing
                .pairs()
                .keys()
                .filter(|key| !package.pairs().contains(key))
                .count();
            if dropped > 0 {
                warn!(dropped, "Replacing rate document drops stored pairs");
            }
        }

        self.repository.save(package)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::repository::InMemoryRateRepository;
    use forexsync_common::{Currency, RatePair, ValidationError};
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn pair(base: &str, quote: &str, value: Decimal) -> RatePair {
        RatePair::new(base, quote).unwrap().with_value(value).unwrap()
    }

    fn package(pairs: Vec<RatePair>) -> PairPackage {
        PairPackage::new("2023-01-10").unwrap().with_pairs(pairs)
    }

    fn store() -> RateStore {
        RateStore::new(Arc::new(InMemoryRateRepository::new()))
    }

    fn codes(package: &PairPackage) -> Vec<String> {
        package
            .pairs()
            .iter()
            .map(|p| format!("{}/{}", p.base(), p.quote()))
            .collect()
    }

    #[test]
    fn test_first_write_stored_verbatim() {
        let store = store();
        let input = package(vec![
            pair("USD", "EUR", dec!(0.9)),
            pair("USD", "GBP", dec!(0.8)),
        ]);

        store.merge(&input).unwrap();

        assert_eq!(store.find_full(input.exchange_date()).unwrap(), Some(input));
    }

    #[test]
    fn test_merge_updates_and_appends() {
        let store = store();
        store
            .merge(&package(vec![
                pair("USD", "EUR", dec!(0.9)),
                pair("USD", "GBP", dec!(0.8)),
            ]))
            .unwrap();

        store
            .merge(&package(vec![
                pair("USD", "JPY", dec!(130)),
                pair("USD", "EUR", dec!(0.95)),
            ]))
            .unwrap();

        let stored = store
            .find_full(NaiveDate::from_ymd_opt(2023, 1, 10).unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(codes(&stored), vec!["USD/EUR", "USD/GBP", "USD/JPY"]);
        assert_eq!(
            stored.pairs().get(Currency::USD, Currency::EUR).unwrap().value(),
            Some(dec!(0.95))
        );
        assert_eq!(
            stored.pairs().get(Currency::USD, Currency::GBP).unwrap().value(),
            Some(dec!(0.8))
        );
    }

    #[test]
    fn test_merge_is_idempotent() {
        let store = store();
        let input = package(vec![
            pair("USD", "EUR", dec!(0.9)),
            pair("EUR", "USD", dec!(1.1)),
        ]);

        store.merge(&input).unwrap();
        store.merge(&input).unwrap();

        assert_eq!(store.find_full(input.exchange_date()).unwrap(), Some(input));
    }

    #[test]
    fn test_merge_rejects_missing_value() {
        let store = store();
        let input = package(vec![
            pair("USD", "EUR", dec!(0.9)),
            RatePair::new("USD", "GBP").unwrap(),
        ]);

        let result = store.merge(&input);

        assert!(matches!(
            result,
            Err(StoreError::Validation(ValidationError::MissingValue { .. }))
        ));
        assert!(store.find_full(input.exchange_date()).unwrap().is_none());
    }

    #[test]
    fn test_find_complete_is_all_or_nothing() {
        let store = store();
        store
            .merge(&package(vec![
                pair("USD", "EUR", dec!(0.9)),
                pair("USD", "GBP", dec!(0.8)),
                pair("USD", "JPY", dec!(130)),
            ]))
            .unwrap();

        let request = package(vec![
            RatePair::new("USD", "JPY").unwrap(),
            RatePair::new("USD", "EUR").unwrap(),
        ]);
        let found = store.find_complete(&request).unwrap().unwrap();
        assert_eq!(codes(&found), vec!["USD/EUR", "USD/JPY"]);
        assert!(found.ensure_values().is_ok());

        let partial = package(vec![
            RatePair::new("USD", "EUR").unwrap(),
            RatePair::new("USD", "CHF").unwrap(),
        ]);
        assert!(store.find_complete(&partial).unwrap().is_none());
    }

    #[test]
    fn test_find_complete_without_document() {
        let request = package(vec![RatePair::new("USD", "EUR").unwrap()]);
        assert!(store().find_complete(&request).unwrap().is_none());
    }

    #[test]
    fn test_replace_overwrites() {
        let store = store();
        store
            .merge(&package(vec![
                pair("USD", "EUR", dec!(0.9)),
                pair("USD", "GBP", dec!(0.8)),
            ]))
            .unwrap();

        let replacement = package(vec![pair("USD", "JPY", dec!(130))]);
        store.replace(&replacement).unwrap();

        assert_eq!(
            store.find_full(replacement.exchange_date()).unwrap(),
            Some(replacement)
        );
    }

    #[test]
    fn test_replace_rejects_missing_value() {
        let result = store().replace(&package(vec![RatePair::new("USD", "EUR").unwrap()]));
        assert!(matches!(result, Err(StoreError::Validation(_))));
    }

    fn pair_list(entries: Vec<(usize, usize, i64)>) -> PairList {
        let currencies: Vec<Currency> = Currency::all().collect();
        entries
            .into_iter()
            .filter(|(b, q, _)| b != q)
            .map(|(b, q, v)| {
                RatePair::from_currencies(currencies[b], currencies[q])
                    .with_value(Decimal::new(v, 3))
                    .unwrap()
            })
            .collect()
    }

    proptest! {
        #[test]
        fn prop_reconcile_never_drops_pairs(
            existing in prop::collection::vec((0usize..15, 0usize..15, 1i64..100_000), 0..40),
            fresh in prop::collection::vec((0usize..15, 0usize..15, 1i64..100_000), 0..40),
        ) {
            let existing = pair_list(existing);
            let fresh = pair_list(fresh);
            let merged = reconcile(&existing, &fresh);

            for key in existing.keys().chain(fresh.keys()) {
                prop_assert!(merged.contains(&key));
            }
            for pair in fresh.iter() {
                prop_assert_eq!(merged.get(pair.base(), pair.quote()).unwrap().value(), pair.value());
            }

            let prefix: Vec<_> = merged.keys().take(existing.len()).collect();
            let stored: Vec<_> = existing.keys().collect();
            prop_assert_eq!(prefix, stored);
        }
    }
}
