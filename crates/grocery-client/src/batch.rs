//! Concurrent batch deletion with a single reconciliation step
//!
//! A batch call moves through
//! `Launching -> AwaitingAll -> Reconciled | Reported`:
//! 1. ids are captured for every requested index under the state lock, before
//!    any request is sent
//! 2. one DELETE per id is launched concurrently; none of them touches the
//!    local sequence
//! 3. once every call has resolved the outcome is applied in one pass, keyed
//!    by id so concurrent reordering of the list cannot shift removals
//!
//! Dropping the returned future cancels the in-flight deletes. Because
//! reconciliation only runs after all of them resolve, a cancelled batch
//! leaves local state untouched.

use futures::future::join_all;
use grocery_api::{BatchFailure, ClientError, Result, StoreEvent};
use std::collections::BTreeSet;
use std::future::Future;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::store::GroceryStore;

/// What to do with the local sequence when only some deletes succeed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReconcilePolicy {
    /// Remove nothing unless every delete succeeded; report the failure as
    /// `ClientError::Batch`. Entries already deleted on the server stay
    /// visible until the next fetch.
    #[default]
    AllOrNothing,
    /// Remove the entries whose delete succeeded and report the rest.
    ApplySucceeded,
}

/// Result of every delete in one batch, before reconciliation.
#[derive(Debug, Clone, Default, PartialEq)]
struct BatchOutcome {
    succeeded: Vec<(usize, Uuid)>,
    failed: Vec<(usize, ClientError)>,
}

impl BatchOutcome {
    fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    fn succeeded_ids(&self) -> Vec<Uuid> {
        self.succeeded.iter().map(|(_, id)| *id).collect()
    }
}

/// What a batch call applied locally.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    /// Ids the server confirmed as deleted
    pub deleted: Vec<Uuid>,
    /// Ids removed from the local sequence. Empty when the local list no
    /// longer holds the batch's entries by the time it is reconciled.
    pub removed: Vec<Uuid>,
    /// Deletes that failed; only non-empty under `ApplySucceeded`
    pub failed: Vec<(usize, ClientError)>,
}

/// Capture the ids at `indices` from `ids`, failing on the first stale index.
fn capture_targets(indices: &BTreeSet<usize>, ids: &[Uuid]) -> Result<Vec<(usize, Uuid)>> {
    indices
        .iter()
        .map(|&index| {
            ids.get(index)
                .map(|id| (index, *id))
                .ok_or(ClientError::IndexOutOfRange {
                    index,
                    len: ids.len(),
                })
        })
        .collect()
}

/// Run one delete per target concurrently and collect every outcome.
async fn run_batch<F, Fut>(targets: &[(usize, Uuid)], delete: F) -> BatchOutcome
where
    F: Fn(Uuid) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    debug!("[Batch] Launching {} deletes", targets.len());
    let calls = targets.iter().map(|&(index, id)| {
        let call = delete(id);
        async move { (index, id, call.await) }
    });

    debug!("[Batch] Awaiting all");
    let mut outcome = BatchOutcome::default();
    for (index, id, result) in join_all(calls).await {
        match result {
            Ok(()) => outcome.succeeded.push((index, id)),
            Err(e) => {
                warn!("[Batch] Delete at index {} ({}) failed: {}", index, id, e);
                outcome.failed.push((index, e));
            }
        }
    }
    outcome
}

/// Decide which ids to remove under `policy`, or the error to report.
fn settle(outcome: BatchOutcome, policy: ReconcilePolicy) -> Result<BatchReport> {
    match policy {
        ReconcilePolicy::AllOrNothing if !outcome.all_succeeded() => {
            info!(
                "[Batch] Reported: {} of {} deletes failed, no local change",
                outcome.failed.len(),
                outcome.failed.len() + outcome.succeeded.len()
            );
            Err(ClientError::Batch(BatchFailure {
                succeeded: outcome.succeeded,
                failed: outcome.failed,
            }))
        }
        _ => Ok(BatchReport {
            deleted: outcome.succeeded_ids(),
            removed: Vec::new(),
            failed: outcome.failed,
        }),
    }
}

impl GroceryStore {
    /// Delete the categories at `indices` of the current local list.
    pub async fn delete_categories_at(
        &self,
        indices: impl IntoIterator<Item = usize>,
    ) -> Result<BatchReport> {
        self.delete_categories_at_with_policy(indices, ReconcilePolicy::default())
            .await
    }

    #[tracing::instrument(name = "store.delete_categories_at", skip_all, fields(policy = ?policy))]
    pub async fn delete_categories_at_with_policy(
        &self,
        indices: impl IntoIterator<Item = usize>,
        policy: ReconcilePolicy,
    ) -> Result<BatchReport> {
        let indices: BTreeSet<usize> = indices.into_iter().collect();
        let Some(session) = self.session_for("delete_categories_at").await else {
            return Ok(BatchReport::default());
        };

        let targets = {
            let state = self.state.read().await;
            let ids: Vec<Uuid> = state.categories.iter().map(|c| c.id).collect();
            capture_targets(&indices, &ids)?
        };

        let outcome = run_batch(&targets, |id| self.delete_category_as(&session, id, false)).await;
        let mut report = settle(outcome, policy)?;

        if !report.deleted.is_empty() {
            self.state.write().await.remove_categories(&report.deleted);
            report.removed = report.deleted.clone();
            info!("[Batch] Reconciled: removed {} categories", report.removed.len());
            self.emit(StoreEvent::CategoriesRemoved {
                ids: report.removed.clone(),
            });
        }
        Ok(report)
    }

    /// Delete the items at `indices` of the local item list of `category_id`.
    pub async fn delete_items_at(
        &self,
        category_id: Uuid,
        indices: impl IntoIterator<Item = usize>,
    ) -> Result<BatchReport> {
        self.delete_items_at_with_policy(category_id, indices, ReconcilePolicy::default())
            .await
    }

    #[tracing::instrument(name = "store.delete_items_at", skip(self, indices))]
    pub async fn delete_items_at_with_policy(
        &self,
        category_id: Uuid,
        indices: impl IntoIterator<Item = usize>,
        policy: ReconcilePolicy,
    ) -> Result<BatchReport> {
        let indices: BTreeSet<usize> = indices.into_iter().collect();
        let Some(session) = self.session_for("delete_items_at").await else {
            return Ok(BatchReport::default());
        };

        let targets = {
            let state = self.state.read().await;
            if state.items_category_id != Some(category_id) {
                return Err(ClientError::InvalidRequest {
                    message: format!("items of category {} are not loaded", category_id),
                });
            }
            let ids: Vec<Uuid> = state.items.iter().map(|item| item.id).collect();
            capture_targets(&indices, &ids)?
        };

        let outcome = run_batch(&targets, |id| {
            self.delete_item_as(&session, category_id, id, false)
        })
        .await;
        let mut report = settle(outcome, policy)?;

        if !report.deleted.is_empty() {
            let applied = self
                .state
                .write()
                .await
                .remove_items(category_id, &report.deleted);
            if applied {
                report.removed = report.deleted.clone();
                info!("[Batch] Reconciled: removed {} items", report.removed.len());
                self.emit(StoreEvent::ItemsRemoved {
                    category_id,
                    ids: report.removed.clone(),
                });
            } else {
                debug!(
                    "[Batch] Items of category {} no longer loaded, {} deletes not applied locally",
                    category_id,
                    report.deleted.len()
                );
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_rejects_stale_index() {
        let ids = vec![Uuid::new_v4(), Uuid::new_v4()];
        let indices: BTreeSet<usize> = [0, 2].into_iter().collect();
        assert_eq!(
            capture_targets(&indices, &ids),
            Err(ClientError::IndexOutOfRange { index: 2, len: 2 })
        );
    }

    #[test]
    fn test_capture_keeps_index_order() {
        let ids = vec![Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        let indices: BTreeSet<usize> = [2, 0].into_iter().collect();
        assert_eq!(
            capture_targets(&indices, &ids).unwrap(),
            vec![(0, ids[0]), (2, ids[2])]
        );
    }

    #[tokio::test]
    async fn test_run_batch_collects_every_outcome() {
        let bad = Uuid::new_v4();
        let targets = vec![(0, Uuid::new_v4()), (1, bad), (2, Uuid::new_v4())];

        let outcome = run_batch(&targets, |id| async move {
            if id == bad {
                Err(ClientError::Transport {
                    message: "reset".to_string(),
                    timeout: false,
                })
            } else {
                Ok(())
            }
        })
        .await;

        assert_eq!(outcome.succeeded.len(), 2);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].0, 1);
    }

    #[test]
    fn test_settle_all_or_nothing_reports_failure() {
        let outcome = BatchOutcome {
            succeeded: vec![(0, Uuid::new_v4())],
            failed: vec![(
                1,
                ClientError::Server {
                    status: 500,
                    body: String::new(),
                },
            )],
        };

        match settle(outcome.clone(), ReconcilePolicy::AllOrNothing) {
            Err(ClientError::Batch(failure)) => {
                assert_eq!(failure.succeeded, outcome.succeeded);
                assert_eq!(failure.failed.len(), 1);
            }
            other => panic!("expected batch failure, got {:?}", other),
        }

        let report = settle(outcome.clone(), ReconcilePolicy::ApplySucceeded).unwrap();
        assert_eq!(report.deleted, vec![outcome.succeeded[0].1]);
        assert!(report.removed.is_empty());
        assert_eq!(report.failed.len(), 1);
    }
}
