use crate::{
    core::{reconcile::Error as ReconcileError, Ensured, InstanceHandler, PolicyStore},
    k8s::{self, sql_instance, ResourceExt, SqlInstance},
    metrics::ReconcileMetrics,
};
use futures::prelude::*;
use kube::runtime::{controller, watcher, Controller};
use std::sync::Arc;
use tokio::{sync::watch, time::Duration};

/// State shared by every reconciliation.
pub struct Context<S> {
    handler: InstanceHandler<S>,
    metrics: ReconcileMetrics,
    resync_period: Duration,
    shutdown: watch::Receiver<bool>,
}

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct Error(#[from] ReconcileError);

impl<S> Context<S> {
    pub fn new(
        handler: InstanceHandler<S>,
        metrics: ReconcileMetrics,
        resync_period: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            handler,
            metrics,
            resync_period,
            shutdown,
        }
    }

    /// Completes once shutdown has been signaled.
    fn shutdown(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.shutdown.clone();
        async move {
            if rx.wait_for(|shutdown| *shutdown).await.is_err() {
                // The signal is gone without firing, so it never will.
                future::pending::<()>().await;
            }
        }
    }
}

/// Watches SQLInstances in all namespaces and reconciles their network
/// policies until shutdown.
pub async fn run<S>(client: k8s::Client, ctx: Arc<Context<S>>)
where
    S: PolicyStore + 'static,
{
    let ar = sql_instance::api_resource();
    let instances = k8s::Api::<SqlInstance>::all_with(client, &ar);
    // The controller requires a shareable trigger.
    let shutdown = ctx.shutdown().boxed().shared();

    Controller::new_with(instances, watcher::Config::default(), ar)
        .graceful_shutdown_on(shutdown)
        .run(reconcile::<S>, error_policy::<S>, ctx)
        .for_each(|res| async move {
            match res {
                Ok((obj, _)) => tracing::trace!(%obj, "Reconciled"),
                // Already logged by the error policy.
                Err(controller::Error::ReconcilerFailed(..)) => {}
                Err(controller::Error::ObjectNotFound(obj)) => {
                    tracing::debug!(%obj, "SQLInstance no longer exists")
                }
                Err(error) => tracing::warn!(%error, "Controller error"),
            }
        })
        .await;
    tracing::info!("SQLInstance controller stopped");
}

/// Handles a single add, update or resync of an instance.
///
/// Every instance is revisited after the resync period, regardless of the
/// result, so nothing is retried here.
async fn reconcile<S: PolicyStore>(
    instance: Arc<SqlInstance>,
    ctx: Arc<Context<S>>,
) -> Result<controller::Action, Error> {
    tracing::debug!(
        namespace = %instance.namespace().unwrap_or_default(),
        instance = %instance.name_any(),
        "Received SQLInstance event"
    );

    match ctx.handler.ensure(&instance, ctx.shutdown()).await {
        Ok(Ensured::Applied { outcome, .. }) => {
            ctx.metrics.applied(outcome);
            Ok(controller::Action::requeue(ctx.resync_period))
        }
        Ok(Ensured::Skipped(reason)) => {
            ctx.metrics.skipped(&reason);
            Ok(controller::Action::requeue(ctx.resync_period))
        }
        Ok(Ensured::Deleting) => Ok(controller::Action::await_change()),
        Err(error) if error.is_cancelled() => {
            tracing::debug!(instance = %instance.name_any(), "Reconciliation cancelled");
            Ok(controller::Action::await_change())
        }
        Err(error) => {
            ctx.metrics.failed();
            Err(error.into())
        }
    }
}

fn error_policy<S>(
    instance: Arc<SqlInstance>,
    error: &Error,
    ctx: Arc<Context<S>>,
) -> controller::Action {
    tracing::error!(
        namespace = %instance.namespace().unwrap_or_default(),
        instance = %instance.name_any(),
        %error,
        "Failed to ensure NetworkPolicy"
    );
    controller::Action::requeue(ctx.resync_period)
}
