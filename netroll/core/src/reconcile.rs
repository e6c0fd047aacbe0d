use crate::DesiredPolicy;
use netroll_k8s_api::NetworkPolicy;
use std::{fmt, future::Future, pin::Pin};

/// Read and write access to stored network policies, keyed by namespace and
/// name.
#[async_trait::async_trait]
pub trait PolicyStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns `None` if no policy is stored under the key.
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<NetworkPolicy>, Self::Error>;

    async fn create(
        &self,
        namespace: &str,
        policy: &NetworkPolicy,
    ) -> Result<NetworkPolicy, Self::Error>;

    /// Replaces the stored object wholesale.
    async fn replace(
        &self,
        namespace: &str,
        name: &str,
        policy: &NetworkPolicy,
    ) -> Result<NetworkPolicy, Self::Error>;
}

/// Applies desired policies to a [`PolicyStore`].
#[derive(Clone, Debug)]
pub struct Reconciler<S> {
    store: S,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Updated,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Op {
    Get,
    Create,
    Replace,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to {op} NetworkPolicy {namespace}/{name}: {source}")]
    StoreUnavailable {
        op: Op,
        namespace: String,
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("reconciliation cancelled")]
    Cancelled,
}

// === impl Reconciler ===

impl<S: PolicyStore> Reconciler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates the policy if it doesn't exist and replaces it otherwise.
    ///
    /// The stored object is always written, even when it already matches.
    /// If `cancel` completes while a store call is in flight, the call is
    /// dropped and [`Error::Cancelled`] is returned.
    pub async fn reconcile<C>(&self, desired: &DesiredPolicy, cancel: C) -> Result<Outcome, Error>
    where
        C: Future<Output = ()>,
    {
        let DesiredPolicy {
            namespace,
            name,
            policy,
        } = desired;
        tokio::pin!(cancel);

        let current = cancellable(cancel.as_mut(), self.store.get(namespace, name))
            .await?
            .map_err(|e| Error::unavailable(Op::Get, namespace, name, e))?;

        match current {
            None => {
                cancellable(cancel.as_mut(), self.store.create(namespace, policy))
                    .await?
                    .map_err(|e| Error::unavailable(Op::Create, namespace, name, e))?;
                tracing::info!(%namespace, %name, "Created NetworkPolicy");
                Ok(Outcome::Created)
            }

            Some(current) => {
                // Replacing requires the version being replaced.
                let mut policy = policy.clone();
                policy.metadata.resource_version = current.metadata.resource_version;
                cancellable(cancel.as_mut(), self.store.replace(namespace, name, &policy))
                    .await?
                    .map_err(|e| Error::unavailable(Op::Replace, namespace, name, e))?;
                tracing::info!(%namespace, %name, "Updated NetworkPolicy");
                Ok(Outcome::Updated)
            }
        }
    }
}

async fn cancellable<C, F>(cancel: Pin<&mut C>, op: F) -> Result<F::Output, Error>
where
    C: Future<Output = ()>,
    F: Future,
{
    tokio::select! {
        biased;
        _ = cancel => Err(Error::Cancelled),
        out = op => Ok(out),
    }
}

// === impl Outcome ===

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
        }
    }
}

// === impl Op ===

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "get",
            Self::Create => "create",
            Self::Replace => "replace",
        })
    }
}

// === impl Error ===

impl Error {
    fn unavailable<E>(op: Op, namespace: &str, name: &str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::StoreUnavailable {
            op,
            namespace: namespace.to_string(),
            name: name.to_string(),
            source: source.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
