//! Crew 能力抽象

use std::time::Duration;

use async_trait::async_trait;

use crate::core::CrewError;
use crate::crew::CrewOutput;
use crate::store::Inputs;

/// 可被调用的 Crew：给定输入键值，返回最后一个任务的输出
#[async_trait]
pub trait Crew: Send + Sync {
    fn name(&self) -> &str;

    async fn invoke(&self, inputs: &Inputs) -> Result<CrewOutput, CrewError>;
}

/// 带总超时的调用；超时返回 CrewError::Timeout
pub async fn invoke_with_timeout(
    crew: &dyn Crew,
    inputs: &Inputs,
    timeout: Duration,
) -> Result<CrewOutput, CrewError> {
    match tokio::time::timeout(timeout, crew.invoke(inputs)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!(crew = crew.name(), timeout_secs = timeout.as_secs(), "crew invocation timed out");
            Err(CrewError::Timeout(timeout.as_secs()))
        }
    }
}
