//! Signal handling for graceful shutdown

use anyhow::Result;
use std::future::Future;
use tokio::sync::oneshot;
use tracing::{error, info};

/// Resolve the returned receiver on Ctrl+C or, on Unix, SIGTERM
pub fn setup_signal_handlers() -> Result<oneshot::Receiver<()>> {
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    #[cfg(unix)]
    let sigterm = {
        use std::sync::atomic::AtomicBool;
        use std::sync::Arc;

        let flag = Arc::new(AtomicBool::new(false));
        signal_hook::flag::register(signal_hook::consts::SIGTERM, flag.clone())?;
        flag
    };

    tokio::spawn(async move {
        #[cfg(unix)]
        let terminated = async move {
            use std::sync::atomic::Ordering;
            while !sigterm.load(Ordering::Relaxed) {
                tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            }
        };
        #[cfg(not(unix))]
        let terminated = std::future::pending::<()>();

        wait_for_shutdown(tokio::signal::ctrl_c(), terminated).await;
        let _ = shutdown_tx.send(());
    });

    Ok(shutdown_rx)
}

/// Wait for whichever stop signal arrives first
///
/// A Ctrl+C listener that fails to register leaves SIGTERM as the only way out.
async fn wait_for_shutdown<C, T>(ctrl_c: C, terminated: T)
where
    C: Future<Output = std::io::Result<()>>,
    T: Future<Output = ()>,
{
    tokio::pin!(terminated);

    tokio::select! {
        result = ctrl_c => match result {
            Ok(()) => info!("Ctrl+C signal received"),
            Err(e) => {
                error!("Failed to listen for Ctrl+C signal: {}", e);
                (&mut terminated).await;
                info!("SIGTERM signal received");
            }
        },
        _ = &mut terminated => info!("SIGTERM signal received"),
    }
}
