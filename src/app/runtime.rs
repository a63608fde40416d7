use super::{ShutdownHandle, ShutdownReason, SmartDoorController};
use crate::error::{Result, SmartDoorError};
use crate::events::SmartDoorEvent;
use chrono::Utc;
use tracing::{info, warn};

impl SmartDoorController {
    /// Run until a shutdown is requested, then stop every component.
    /// Returns the process exit code.
    pub async fn run(&mut self) -> Result<i32> {
        info!("Smart door controller is running");

        let shutdown_receiver = self
            .shutdown_receiver
            .take()
            .ok_or_else(|| SmartDoorError::system("Shutdown receiver already taken"))?;

        self.setup_signal_handlers();

        let shutdown_reason = shutdown_receiver
            .await
            .map_err(|_| SmartDoorError::system("Shutdown channel closed unexpectedly"))?;

        info!("Shutdown initiated: {}", shutdown_reason);
        let _ = self.event_bus.publish(SmartDoorEvent::ShutdownRequested {
            reason: shutdown_reason.to_string(),
            timestamp: Utc::now(),
        });

        let exit_code = self.shutdown().await?;

        info!("Smart door controller shutdown complete");
        Ok(exit_code)
    }

    /// Forward SIGINT and SIGTERM to the shutdown channel
    fn setup_signal_handlers(&self) {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    let handle = self.shutdown_handle();
                    tokio::spawn(async move {
                        if sigterm.recv().await.is_some() {
                            info!("Received SIGTERM signal");
                            forward(handle, ShutdownReason::Signal("SIGTERM".to_string())).await;
                        }
                    });
                }
                Err(e) => warn!("Failed to register SIGTERM handler: {}", e),
            }
        }

        let handle = self.shutdown_handle();
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                forward(handle, ShutdownReason::Signal("SIGINT".to_string())).await;
            }
        });
    }
}

async fn forward(handle: ShutdownHandle, reason: ShutdownReason) {
    if !handle.request(reason).await {
        warn!("Shutdown already in progress");
    }
}
