use crate::domain::model::{Declaration, DeployReport};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Whatever applies a declaration to the device. Implementations own session
/// handling, task polling and timeouts; callers only see the final outcome.
#[async_trait]
pub trait DeployAgent: Send + Sync {
    async fn submit(&self, declaration: &Declaration) -> Result<DeployReport>;
    async fn remove(&self, tenant: &str) -> Result<DeployReport>;
}
