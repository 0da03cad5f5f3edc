//! This example queries the service health and the advisory rate-limit status,
//! then follows the countdown until submissions are allowed again.
//!
//! Usage:
//! `cargo run --example rate_limit_status`

use avatar_stylizer::{format_wait_time, Countdown, CountdownMode, StylizerClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let client = StylizerClient::new(None)?;

    match client.health().await {
        Ok(health) => println!("Service status: {}", health.status),
        Err(e) => eprintln!("Health check failed: {}", e),
    }

    let status = client.rate_limit_status().await?;
    if status.can_request {
        println!("A new avatar can be generated now.");
        return Ok(());
    }

    let mut countdown = Countdown::new(CountdownMode::Scheduled);
    let mut rx = countdown.subscribe();
    countdown.set(status.wait_time);

    while rx.changed().await.is_ok() {
        let remaining = *rx.borrow_and_update();
        println!("Next generation available in: {}", format_wait_time(remaining));
        if remaining == 0 {
            break;
        }
    }

    println!("A new avatar can be generated now.");
    Ok(())
}
