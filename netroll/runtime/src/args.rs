use crate::{
    controller::{self, Context},
    core::{InstanceHandler, OwnerKinds},
    k8s::{sql_instance, Client},
    metrics::ReconcileMetrics,
    store::KubeStore,
};
use anyhow::{bail, Result};
use clap::Parser;
use prometheus_client::registry::Registry;
use std::sync::Arc;
use tokio::{sync::watch, time::Duration};
use tracing::{info, info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(
    name = "netroll",
    about = "Restricts egress from workloads to the SQL instances they own"
)]
pub struct Args {
    #[clap(long, default_value = "netroll=info,warn", env = "NETROLL_LOG")]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain", env = "NETROLL_LOG_FORMAT")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// Kinds of workloads whose SQL instances get a network policy.
    #[clap(long, default_value = "Application,Job", env = "NETROLL_OWNER_KINDS")]
    owner_kinds: OwnerKinds,

    /// How often every SQL instance is reconciled, even without changes.
    #[clap(long, default_value = "300")]
    resync_period_secs: u64,

    #[clap(long, default_value = "5000")]
    store_timeout_ms: u64,
}

/// Settings shared by the controller's components, fixed at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub owner_kinds: OwnerKinds,
    pub resync_period: Duration,
    pub store_timeout: Duration,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub fn config(&self) -> Config {
        Config {
            owner_kinds: self.owner_kinds.clone(),
            resync_period: Duration::from_secs(self.resync_period_secs),
            store_timeout: Duration::from_millis(self.store_timeout_ms),
        }
    }

    pub async fn run(self) -> Result<()> {
        let config = self.config();
        let Self {
            admin,
            client,
            log_level,
            log_format,
            ..
        } = self;

        let mut prom = <Registry>::default();
        let metrics = ReconcileMetrics::register(prom.sub_registry_with_prefix("netroll"));
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        if sql_instances_served(&runtime.client()).await {
            info!(
                owner_kinds = %config.owner_kinds,
                resync_period = ?config.resync_period,
                "Watching SQLInstances"
            );
            let client = runtime.client();
            let store = KubeStore::new(client.clone(), config.store_timeout);
            let handler = InstanceHandler::new(config.owner_kinds, store);

            // In-flight reconciliations observe shutdown through this channel,
            // and the drain handle is only released once they are done.
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            let ctx = Arc::new(Context::new(
                handler,
                metrics,
                config.resync_period,
                shutdown_rx,
            ));
            let drain = runtime.shutdown_handle();
            tokio::spawn(
                async move {
                    let controller = controller::run(client, ctx);
                    tokio::pin!(controller);
                    tokio::select! {
                        () = &mut controller => {}
                        handle = drain.signaled() => {
                            let _ = shutdown_tx.send(true);
                            handle.release_after(controller).await;
                        }
                    }
                }
                .instrument(info_span!("sqlinstances")),
            );
        } else {
            tracing::warn!(
                "{}.{} resource kind not found, skipping watches",
                sql_instance::PLURAL,
                sql_instance::GROUP
            );
        }

        // Block the main thread on the shutdown signal. Once it fires, wait for
        // the background tasks to complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}

async fn sql_instances_served(client: &Client) -> bool {
    client
        .list_api_group_resources(sql_instance::API_VERSION)
        .await
        .ok()
        .iter()
        .flat_map(|r| r.resources.iter())
        .any(|r| r.kind == sql_instance::KIND)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["netroll"]).unwrap();
        let config = args.config();
        assert_eq!(config.owner_kinds, OwnerKinds::default());
        assert_eq!(config.resync_period, Duration::from_secs(300));
        assert_eq!(config.store_timeout, Duration::from_secs(5));
    }

    #[test]
    fn overrides() {
        let args = Args::try_parse_from([
            "netroll",
            "--owner-kinds=Application,Naisjob",
            "--resync-period-secs=60",
            "--store-timeout-ms=250",
        ])
        .unwrap();
        let config = args.config();
        assert!(config.owner_kinds.contains("Naisjob"));
        assert!(!config.owner_kinds.contains("Job"));
        assert_eq!(config.resync_period, Duration::from_secs(60));
        assert_eq!(config.store_timeout, Duration::from_millis(250));
    }

    #[test]
    fn rejects_empty_owner_kinds() {
        assert!(Args::try_parse_from(["netroll", "--owner-kinds="]).is_err());
    }
}
