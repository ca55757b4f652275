//! Decision procedure shared by every store: fetch or not, and how a response
//! is folded back in.

use crate::store::ResourceStore;
use std::fmt;
use std::future::Future;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchReason {
    Initial,
    Missing,
    Invalidated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    InFlight,
    Fresh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDecision {
    Fetch(FetchReason),
    Skip(SkipReason),
}

impl SyncDecision {
    pub fn should_fetch(self) -> bool {
        matches!(self, SyncDecision::Fetch(_))
    }
}

/// Identity of an issued fetch. Responses are only committed while the store
/// still expects this exact ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket<K = ()> {
    pub seq: u64,
    pub key: K,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Committed(usize),
    Failed,
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Fetched(usize),
    Skipped(SkipReason),
}

pub fn decide<T, K>(store: &ResourceStore<T, K>) -> SyncDecision {
    if store.is_fetching() {
        return SyncDecision::Skip(SkipReason::InFlight);
    }
    if store.is_initial_sync_pending() {
        return SyncDecision::Fetch(FetchReason::Initial);
    }
    if !store.has_items() {
        return SyncDecision::Fetch(FetchReason::Missing);
    }
    if store.did_invalidate() {
        return SyncDecision::Fetch(FetchReason::Invalidated);
    }
    SyncDecision::Skip(SkipReason::Fresh)
}

/// Runs the decision and, when a fetch is warranted, flags the store and hands
/// back the ticket the caller must issue the request with.
pub fn begin<T, K: Clone>(store: &mut ResourceStore<T, K>) -> Option<FetchTicket<K>> {
    match decide(store) {
        SyncDecision::Skip(_) => None,
        SyncDecision::Fetch(reason) => {
            store.consume_initial_sync();
            let seq = store.mark_fetching();
            debug!(event = "sync_fetch_issued", seq, ?reason);
            Some(FetchTicket {
                seq,
                key: store.key().clone(),
            })
        }
    }
}

pub fn resolve<T, K, E>(
    store: &mut ResourceStore<T, K>,
    ticket: &FetchTicket<K>,
    result: Result<Vec<T>, E>,
) -> Resolution
where
    K: PartialEq,
    E: fmt::Display,
{
    if !store.accepts(ticket.seq, &ticket.key) {
        debug!(event = "sync_response_discarded", seq = ticket.seq);
        return Resolution::Stale;
    }
    match result {
        Ok(items) => {
            let count = items.len();
            store.commit(items);
            Resolution::Committed(count)
        }
        Err(err) => {
            store.fail(err.to_string());
            Resolution::Failed
        }
    }
}

/// Awaiting variant for callers that own the store across the request.
pub async fn sync_with<T, K, F, Fut, E>(
    store: &mut ResourceStore<T, K>,
    fetch: F,
) -> Result<SyncOutcome, E>
where
    K: Clone + PartialEq,
    F: FnOnce(K) -> Fut,
    Fut: Future<Output = Result<Vec<T>, E>>,
    E: fmt::Display,
{
    let decision = decide(store);
    let Some(ticket) = begin(store) else {
        let reason = match decision {
            SyncDecision::Skip(reason) => reason,
            SyncDecision::Fetch(_) => SkipReason::InFlight,
        };
        return Ok(SyncOutcome::Skipped(reason));
    };

    match fetch(ticket.key.clone()).await {
        Ok(items) => {
            let count = items.len();
            resolve::<T, K, E>(store, &ticket, Ok(items));
            Ok(SyncOutcome::Fetched(count))
        }
        Err(err) => {
            store.fail(err.to_string());
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settled(items: Vec<u8>) -> ResourceStore<u8> {
        let mut store = ResourceStore::new();
        let ticket = begin(&mut store).expect("initial fetch");
        resolve::<u8, (), String>(&mut store, &ticket, Ok(items));
        store
    }

    #[test]
    fn first_call_fetches_even_when_items_present() {
        let mut store: ResourceStore<u8> = ResourceStore::new();
        store.commit(vec![1]);
        assert!(!store.did_invalidate());
        assert_eq!(decide(&store), SyncDecision::Fetch(FetchReason::Initial));
        assert!(begin(&mut store).is_some());
    }

    #[test]
    fn decision_table() {
        // items absent, not fetching
        let mut missing: ResourceStore<u8, u8> = ResourceStore::with_key(0);
        missing.consume_initial_sync();
        assert_eq!(decide(&missing), SyncDecision::Fetch(FetchReason::Missing));

        // committed empty list counts as present
        let empty = settled(vec![]);
        assert_eq!(decide(&empty), SyncDecision::Skip(SkipReason::Fresh));

        // items present, fetching
        let mut fetching = settled(vec![1]);
        fetching.mark_invalid();
        fetching.mark_fetching();
        assert_eq!(decide(&fetching), SyncDecision::Skip(SkipReason::InFlight));

        // items present, idle, invalidated
        let mut stale = settled(vec![1]);
        stale.mark_invalid();
        assert_eq!(decide(&stale), SyncDecision::Fetch(FetchReason::Invalidated));

        // items present, idle, valid, not first call
        let fresh = settled(vec![1]);
        assert_eq!(decide(&fresh), SyncDecision::Skip(SkipReason::Fresh));
    }

    #[test]
    fn outstanding_fetch_blocks_second_issue() {
        let mut store: ResourceStore<u8> = ResourceStore::new();
        store.mark_fetching();
        assert!(begin(&mut store).is_none());

        let mut store: ResourceStore<u8> = ResourceStore::new();
        assert!(begin(&mut store).is_some());
        store.mark_invalid();
        assert!(begin(&mut store).is_none());
    }

    #[test]
    fn stale_ticket_is_discarded() {
        let mut store: ResourceStore<u8, &str> = ResourceStore::with_key("t1");
        let old = begin(&mut store).expect("fetch t1");
        store.select("t2");
        let current = begin(&mut store).expect("fetch t2");

        assert_eq!(
            resolve::<u8, &str, String>(&mut store, &old, Ok(vec![9])),
            Resolution::Stale
        );
        assert!(store.is_fetching());
        assert_eq!(
            resolve::<u8, &str, String>(&mut store, &current, Ok(vec![2])),
            Resolution::Committed(1)
        );
        assert_eq!(store.items(), &[2]);
    }

    #[test]
    fn failed_fetch_allows_retry() {
        let mut store: ResourceStore<u8> = ResourceStore::new();
        let ticket = begin(&mut store).expect("fetch");
        assert_eq!(
            resolve::<u8, (), String>(&mut store, &ticket, Err("timeout".to_string())),
            Resolution::Failed
        );
        assert!(!store.is_fetching());
        assert!(begin(&mut store).is_some());
    }

    #[tokio::test]
    async fn sync_with_commits_in_server_order() {
        let mut store: ResourceStore<&str> = ResourceStore::new();
        let outcome = sync_with(&mut store, |_| async {
            Ok::<_, String>(vec!["a", "b"])
        })
        .await
        .expect("sync");

        assert_eq!(outcome, SyncOutcome::Fetched(2));
        assert_eq!(store.items(), &["a", "b"]);
        assert!(!store.is_fetching());

        let again = sync_with(&mut store, |_| async { Ok::<_, String>(vec!["c"]) })
            .await
            .expect("sync");
        assert_eq!(again, SyncOutcome::Skipped(SkipReason::Fresh));
        assert_eq!(store.items(), &["a", "b"]);
    }

    #[tokio::test]
    async fn sync_with_surfaces_errors() {
        let mut store: ResourceStore<u8> = ResourceStore::new();
        let err = sync_with(&mut store, |_| async {
            Err::<Vec<u8>, _>("connection refused".to_string())
        })
        .await
        .expect_err("should fail");

        assert_eq!(err, "connection refused");
        assert!(!store.is_fetching());
        assert!(store.last_error().is_some());
    }
}
