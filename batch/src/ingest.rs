//! Unit of work shared by both controllers.

use forexsync_common::PairPackage;
use forexsync_fx::RateProvider;
use forexsync_store::RateStore;

use crate::error::BatchResult;

/// How a unit of work was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Every requested pair was already stored.
    AlreadyStored,
    /// Rates were pulled and merged.
    Fetched,
}

/// Answer `request` from the store when allowed, otherwise pull `fetch` and
/// merge it.
pub async fn ingest(
    store: &RateStore,
    provider: &dyn RateProvider,
    request: &PairPackage,
    fetch: PairPackage,
    use_stored: bool,
) -> BatchResult<Completion> {
    if use_stored && store.find_complete(request)?.is_some() {
        return Ok(Completion::AlreadyStored);
    }

    let filled = provider.pull(fetch).await?;
    store.merge(&filled)?;
    Ok(Completion::Fetched)
}
