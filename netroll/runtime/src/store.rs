use crate::{
    core::PolicyStore,
    k8s::{self, NetworkPolicy, PostParams},
};
use std::future::Future;
use tokio::time;

const FIELD_MANAGER: &str = "netroll";

/// Stores network policies through the Kubernetes API.
#[derive(Clone)]
pub struct KubeStore {
    client: k8s::Client,
    timeout: time::Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Api(#[from] k8s::Error),

    #[error("request timed out after {0:?}")]
    Timeout(time::Duration),
}

impl KubeStore {
    pub fn new(client: k8s::Client, timeout: time::Duration) -> Self {
        Self { client, timeout }
    }

    fn api(&self, namespace: &str) -> k8s::Api<NetworkPolicy> {
        k8s::Api::namespaced(self.client.clone(), namespace)
    }

    fn post_params() -> PostParams {
        PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        }
    }
}

#[async_trait::async_trait]
impl PolicyStore for KubeStore {
    type Error = StoreError;

    async fn get(&self, namespace: &str, name: &str) -> Result<Option<NetworkPolicy>, StoreError> {
        with_timeout(self.timeout, self.api(namespace).get_opt(name))
            .await
    }

    async fn create(
        &self,
        namespace: &str,
        policy: &NetworkPolicy,
    ) -> Result<NetworkPolicy, StoreError> {
        with_timeout(
            self.timeout,
            self.api(namespace).create(&Self::post_params(), policy),
        )
        .await
    }

    async fn replace(
        &self,
        namespace: &str,
        name: &str,
        policy: &NetworkPolicy,
    ) -> Result<NetworkPolicy, StoreError> {
        with_timeout(
            self.timeout,
            self.api(namespace).replace(name, &Self::post_params(), policy),
        )
        .await
    }
}

async fn with_timeout<T, F>(timeout: time::Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, k8s::Error>>,
{
    time::timeout(timeout, call)
        .await
        .map_err(|_| StoreError::Timeout(timeout))?
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn slow_calls_time_out() {
        let timeout = time::Duration::from_secs(5);
        let res = with_timeout(timeout, std::future::pending::<Result<(), k8s::Error>>())
            .await;
        assert!(
            matches!(res, Err(StoreError::Timeout(t)) if t == timeout),
            "unexpected result: {res:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn passes_results_through() {
        let res = with_timeout(time::Duration::from_secs(5), async {
            Ok::<_, k8s::Error>("db-myapp-db1")
        })
        .await;
        assert_eq!(res.unwrap(), "db-myapp-db1");
    }
}
