use super::{ComponentState, SmartDoorController};
use crate::error::{Result, SmartDoorError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info};

impl SmartDoorController {
    /// Cancel every task and wait for each to finish.
    ///
    /// Tasks drop their device subscriptions as they exit. Returns 0 when all
    /// components stopped cleanly and 1 otherwise.
    pub async fn shutdown(&mut self) -> Result<i32> {
        info!("Beginning graceful shutdown");

        self.cancellation_token.cancel();

        let limit = self.config.system.shutdown_timeout();
        let mut exit_code = 0;

        // Producers first, in reverse spawn order
        let tasks = std::mem::take(&mut self.tasks);
        for (component, handle) in tasks.into_iter().rev() {
            if let Err(e) = self.stop_component(component, handle, limit).await {
                error!("Error stopping {}: {}", component, e);
                exit_code = 1;
            }
        }

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }

    async fn stop_component(
        &self,
        component: &str,
        mut handle: JoinHandle<()>,
        limit: Duration,
    ) -> Result<()> {
        info!("Stopping {} component", component);
        self.set_component_state(component, ComponentState::Stopping)
            .await;

        match timeout(limit, &mut handle).await {
            Ok(Ok(())) => {
                self.set_component_state(component, ComponentState::Stopped)
                    .await;
                info!("{} component stopped", component);
                Ok(())
            }
            Ok(Err(e)) => {
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                Err(SmartDoorError::component(component.to_string(), e.to_string()))
            }
            Err(_) => {
                handle.abort();
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                Err(SmartDoorError::component(
                    component.to_string(),
                    format!("stop timed out after {:?}", limit),
                ))
            }
        }
    }
}
