use std::sync::Arc;

use drivemirror_core::RemoteStore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span};

use crate::config::Mapping;

use super::reconcile::{Reconciler, SyncError, SyncReport};

#[derive(Debug)]
pub struct MappingOutcome {
    pub mapping: Mapping,
    pub result: Result<SyncReport, SyncError>,
}

/// Reconciles every mapping concurrently and waits for all of them.
///
/// Each mapping runs in its own task with its own run state; a failure or a
/// panic in one task is reported in its outcome and never cancels the
/// others. Outcomes come back in the order of `mappings`.
pub async fn run<S>(
    store: Arc<S>,
    mappings: Vec<Mapping>,
    cancel: CancellationToken,
) -> Vec<MappingOutcome>
where
    S: RemoteStore + 'static,
{
    let mut tasks = JoinSet::new();
    for (slot, mapping) in mappings.iter().cloned().enumerate() {
        let store = Arc::clone(&store);
        let cancel = cancel.child_token();
        let span = info_span!(
            "mapping",
            local = %mapping.local_root.display(),
            remote = %mapping.remote_root_id
        );
        tasks.spawn(
            async move {
                info!("reconciliation started");
                let result = Reconciler::new(store.as_ref(), &mapping)
                    .with_cancel(cancel)
                    .reconcile()
                    .await;
                match &result {
                    Ok(report) => info!(
                        created = report.created,
                        updated = report.updated,
                        unchanged = report.unchanged,
                        deleted = report.deleted,
                        conflicts = report.conflicts,
                        failed = report.failed,
                        "reconciliation finished"
                    ),
                    Err(err) => error!("reconciliation failed: {err}"),
                }
                (slot, result)
            }
            .instrument(span),
        );
    }

    let mut results: Vec<Option<Result<SyncReport, SyncError>>> =
        mappings.iter().map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((slot, result)) => results[slot] = Some(result),
            Err(err) => error!("mapping task ended abnormally: {err}"),
        }
    }

    mappings
        .into_iter()
        .zip(results)
        .map(|(mapping, result)| MappingOutcome {
            mapping,
            result: result
                .unwrap_or_else(|| Err(SyncError::Aborted("task panicked or was cancelled".into()))),
        })
        .collect()
}
