//! 工具执行器
//!
//! 持有一组工具与超时，execute(tool_name, args) 在超时内调用，
//! 超时或失败时转为 CrewError（ToolTimeout / ToolExecutionFailed）；每次调用输出结构化审计日志（JSON）。

use std::time::{Duration, Instant};

use tokio::time::timeout;

use crate::core::CrewError;
use crate::tools::ToolRegistry;

/// 工具执行器：对每次调用施加超时，并将结果映射为 CrewError
#[derive(Clone)]
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub async fn execute(&self, tool_name: &str, args: serde_json::Value) -> Result<String, CrewError> {
        let start = Instant::now();
        let args_preview = args_preview(&args);
        let result = timeout(self.timeout, self.registry.execute(tool_name, args)).await;

        let outcome = match &result {
            Ok(Ok(_)) => "ok",
            Ok(Err(_)) => "error",
            Err(_) => "timeout",
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit, "tool");

        match result {
            Ok(Ok(content)) => Ok(content),
            Ok(Err(e)) => Err(CrewError::ToolExecutionFailed(e)),
            Err(_) => Err(CrewError::ToolTimeout(tool_name.to_string())),
        }
    }
}

fn args_preview(args: &serde_json::Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{DummyTool, Tool};
    use async_trait::async_trait;

    struct Slow;

    #[async_trait]
    impl Tool for Slow {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "sleeps"
        }
        async fn execute(&self, _args: serde_json::Value) -> Result<String, String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".into())
        }
    }

    #[tokio::test]
    async fn test_executor_ok_and_unknown() {
        let mut reg = ToolRegistry::new();
        reg.register(DummyTool);
        let exec = ToolExecutor::new(reg, 5);
        assert!(exec
            .execute("Dummy Tool", serde_json::json!({"question": "capital?"}))
            .await
            .unwrap()
            .contains("SinkingBangkok"));
        assert!(matches!(
            exec.execute("ghost", serde_json::Value::Null).await,
            Err(CrewError::ToolExecutionFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_executor_timeout() {
        let mut reg = ToolRegistry::new();
        reg.register(Slow);
        let exec = ToolExecutor::new(reg, 1);
        assert!(matches!(
            exec.execute("slow", serde_json::Value::Null).await,
            Err(CrewError::ToolTimeout(_))
        ));
    }
}
