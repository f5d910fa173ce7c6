use std::io::{self, BufRead, Write};

use anyhow::{Context as _, Result};
use chrono::Local;
use tracing::{debug, warn};

use mailroom_core::SessionState;

use super::Context;

/// Password from the environment, for scripted logins
const ENV_PASSWORD: &str = "MAILROOM_PASSWORD";

pub async fn login(ctx: &Context, email: Option<String>) -> Result<()> {
    print_summary(ctx).await;

    let email = match email.or_else(|| ctx.config.last_email.clone()) {
        Some(e) => e,
        None => prompt("Email: ")?,
    };
    let password = match std::env::var(ENV_PASSWORD) {
        Ok(p) if !p.is_empty() => p,
        _ => rpassword::prompt_password("Password: ").context("Failed to read password")?,
    };

    let identity = ctx.client.login(&email, &password).await?;

    let mut config = ctx.config.clone();
    config.last_email = Some(email.trim().to_string());
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to remember login email");
    }

    let who = identity
        .as_ref()
        .map(|i| i.display_name().to_string())
        .unwrap_or_else(|| email.trim().to_string());
    match ctx.client.session().expires_at() {
        Some(at) => println!(
            "Logged in as {} (session expires {})",
            who,
            at.with_timezone(&Local).format("%b %d, %H:%M")
        ),
        None => println!("Logged in as {}", who),
    }
    Ok(())
}

pub fn logout(ctx: &Context) {
    ctx.client.logout();
    println!("Logged out");
}

pub async fn whoami(ctx: &Context) {
    let session = ctx.client.session();
    if session.state() == SessionState::Unauthenticated {
        println!("Not logged in");
        print_summary(ctx).await;
        return;
    }

    let who = session
        .identity()
        .map(|i| i.display_name().to_string())
        .unwrap_or_else(|| "unknown user".to_string());
    let minutes = session.minutes_until_expiry().unwrap_or(0);
    println!("{} - session valid for {} more minute(s)", who, minutes);
    print_summary(ctx).await;
}

/// Public counters; the backend being unreachable is not worth an error here.
async fn print_summary(ctx: &Context) {
    match ctx.client.summary().await {
        Ok(summary) => println!(
            "{} email(s) sent to {} merchant(s)",
            summary.total_emails, summary.total_merchants
        ),
        Err(e) => debug!(error = %e, "Skipping system summary"),
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read input")?;
    Ok(line.trim().to_string())
}
