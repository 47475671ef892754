//! Facade used by producers and readers of the rate store.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, instrument};

use forexsync_common::{PairPackage, ValidationError};

use crate::error::StoreResult;
use crate::queue::TaskQueue;
use crate::rates::RateStore;
use crate::task::{IngestionTask, RecordStatus};

/// Read stored rates and enqueue ingestion work.
pub struct ForexHandler {
    store: Arc<RateStore>,
    queue: Arc<dyn TaskQueue>,
}

impl ForexHandler {
    pub fn new(store: Arc<RateStore>, queue: Arc<dyn TaskQueue>) -> Self {
        Self { store, queue }
    }

    /// Stored value of the single pair in `request`.
    pub fn get_one_rate_value(&self, request: &PairPackage) -> StoreResult<Option<Decimal>> {
        let actual = request.pairs().len();
        if actual != 1 {
            return Err(ValidationError::PairCount { expected: 1, actual }.into());
        }

        Ok(self
            .store
            .find_complete(request)?
            .and_then(|found| found.pairs().iter().next().and_then(|pair| pair.value())))
    }

    /// Stored values for every pair in `request`, or nothing if any is missing.
    pub fn get_pair_package_values(&self, request: &PairPackage) -> StoreResult<Option<PairPackage>> {
        self.store.find_complete(request)
    }

    /// Queue one package. Status defaults to `INSERTED`.
    #[instrument(skip(self, package), fields(date = %package.exchange_date_str()))]
    pub fn enqueue_one(
        &self,
        package: PairPackage,
        status: Option<RecordStatus>,
    ) -> StoreResult<IngestionTask> {
        let task = IngestionTask::with_status(package, status.unwrap_or(RecordStatus::Inserted))?;
        self.queue.insert_one(task.clone())?;
        info!(task_id = %task.id(), "Task enqueued");
        Ok(task)
    }

    /// Queue several packages with the same status.
    pub fn enqueue_many<I>(&self, packages: I, status: Option<RecordStatus>) -> StoreResult<usize>
    where
        I: IntoIterator<Item = PairPackage>,
    {
        let status = status.unwrap_or(RecordStatus::Inserted);
        let tasks = packages
            .into_iter()
            .map(|package| IngestionTask::with_status(package, status))
            .collect::<StoreResult<Vec<_>>>()?;

        let count = tasks.len();
        self.queue.insert_many(tasks)?;
        info!(count, ?status, "Tasks enqueued");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::queue::InMemoryTaskQueue;
    use crate::repository::InMemoryRateRepository;
    use forexsync_common::{PairPackageList, RatePair};
    use rust_decimal_macros::dec;

    fn handler() -> (ForexHandler, Arc<RateStore>, Arc<InMemoryTaskQueue>) {
        let store = Arc::new(RateStore::new(Arc::new(InMemoryRateRepository::new())));
        let queue = Arc::new(InMemoryTaskQueue::new());
        (ForexHandler::new(store.clone(), queue.clone()), store, queue)
    }

    fn request(pairs: &[(&str, &str)]) -> PairPackage {
        PairPackage::new("2023-01-10").unwrap().with_pairs(
            pairs
                .iter()
                .map(|(b, q)| RatePair::new(b, q).unwrap())
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn test_get_one_rate_value() {
        let (handler, store, _) = handler();
        store
            .merge(&PairPackage::new("2023-01-10").unwrap().with_pairs(vec![RatePair::new(
                "USD", "EUR",
            )
            .unwrap()
            .with_value(dec!(0.91))
            .unwrap()]))
            .unwrap();

        assert_eq!(
            handler.get_one_rate_value(&request(&[("USD", "EUR")])).unwrap(),
            Some(dec!(0.91))
        );
        assert_eq!(
            handler.get_one_rate_value(&request(&[("USD", "GBP")])).unwrap(),
            None
        );
    }

    #[test]
    fn test_get_one_rate_value_requires_single_pair() {
        let (handler, _, _) = handler();
        let result = handler.get_one_rate_value(&request(&[("USD", "EUR"), ("USD", "GBP")]));
        assert!(matches!(
            result,
            Err(StoreError::Validation(ValidationError::PairCount { expected: 1, actual: 2 }))
        ));
    }

    #[test]
    fn test_enqueue() {
        let (handler, _, queue) = handler();

        let task = handler.enqueue_one(request(&[("USD", "EUR")]), None).unwrap();
        assert_eq!(task.record_status(), RecordStatus::Inserted);

        let packages: PairPackageList = vec![
            request(&[("USD", "EUR")]),
            PairPackage::new("2023-01-11").unwrap().with_pairs(vec![RatePair::new("USD", "GBP").unwrap()]),
        ]
        .into_iter()
        .collect();
        let count = handler
            .enqueue_many(packages, Some(RecordStatus::ForceProcess))
            .unwrap();

        assert_eq!(count, 2);
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.count_waiting().unwrap(), 3);
    }
}
