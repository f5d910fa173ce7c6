use std::time::Duration;

use anyhow::Result;
use tracing::info;

use super::Context;

/// How often the remaining session time is printed
const STATUS_INTERVAL: Duration = Duration::from_secs(300);

/// Hold an authenticated view open until Ctrl-C or session invalidation.
pub async fn run(ctx: &Context) -> Result<()> {
    let session = ctx.client.session();
    // Mount check: nothing is shown without a live session
    session.require_token()?;

    let who = session
        .identity()
        .map(|i| i.display_name().to_string())
        .unwrap_or_else(|| "unknown user".to_string());
    println!("Watching session for {} (Ctrl-C to stop)", who);

    let sweep = session.start_expiry_sweep(Duration::from_secs(ctx.config.sweep_interval_secs));
    let mut status = tokio::time::interval(STATUS_INTERVAL);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Watch interrupted");
                break;
            }
            _ = ctx.invalidated.notified() => {
                info!("Session ended while watching");
                break;
            }
            _ = status.tick() => {
                if let Some(minutes) = session.minutes_until_expiry() {
                    println!("Session valid for {} more minute(s)", minutes);
                }
            }
        }
    }

    sweep.stop();
    Ok(())
}
