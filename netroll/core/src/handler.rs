use crate::{
    build, extract,
    reconcile::{self, Outcome, PolicyStore, Reconciler},
    OwnerKinds, SkipReason,
};
use netroll_k8s_api::{ResourceExt, SqlInstance};
use std::future::Future;

/// Ensures that each instance it is handed has a matching network policy.
#[derive(Clone, Debug)]
pub struct InstanceHandler<S> {
    owner_kinds: OwnerKinds,
    reconciler: Reconciler<S>,
}

/// What handling a single instance event amounted to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Ensured {
    Applied { name: String, outcome: Outcome },
    Skipped(SkipReason),
    /// The instance is being deleted; its policy is left to the garbage
    /// collector.
    Deleting,
}

impl<S: PolicyStore> InstanceHandler<S> {
    pub fn new(owner_kinds: OwnerKinds, store: S) -> Self {
        Self {
            owner_kinds,
            reconciler: Reconciler::new(store),
        }
    }

    pub fn reconciler(&self) -> &Reconciler<S> {
        &self.reconciler
    }

    pub async fn ensure<C>(
        &self,
        instance: &SqlInstance,
        cancel: C,
    ) -> Result<Ensured, reconcile::Error>
    where
        C: Future<Output = ()>,
    {
        let namespace = instance.namespace().unwrap_or_default();
        let instance_name = instance.name_any();

        if instance.metadata.deletion_timestamp.is_some() {
            tracing::info!(
                %namespace,
                instance = %instance_name,
                "SQLInstance is being deleted, ignoring"
            );
            return Ok(Ensured::Deleting);
        }

        let desc = match extract(instance, &self.owner_kinds) {
            Ok(desc) => desc,
            Err(reason) => {
                tracing::debug!(
                    %namespace,
                    instance = %instance_name,
                    %reason,
                    "Missing required NetworkPolicy info, ignoring"
                );
                return Ok(Ensured::Skipped(reason));
            }
        };

        tracing::info!(
            %namespace,
            instance = %instance_name,
            owner = %desc.owner,
            "Ensuring NetworkPolicy"
        );
        let desired = build(&desc);
        let outcome = self.reconciler.reconcile(&desired, cancel).await?;
        Ok(Ensured::Applied {
            name: desired.name,
            outcome,
        })
    }
}
