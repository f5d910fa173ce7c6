use anyhow::{anyhow, Result};

use mailroom_core::models::ComposedEmail;

use super::{Context, EmailCommand};
use crate::format::{format_date, format_optional, truncate_string};

pub async fn run(ctx: &Context, command: EmailCommand) -> Result<()> {
    let client = &ctx.client;
    match command {
        EmailCommand::List { page, size } => {
            let result = client.list_emails(page, size).await?;
            if result.data.is_empty() {
                println!("No emails on page {}.", page);
            } else {
                println!(
                    "{:>6}  {:<8}  {:<18}  {:<32}  RECIPIENTS",
                    "ID", "STATUS", "MERCHANT", "SUBJECT"
                );
                for email in &result.data {
                    println!(
                        "{:>6}  {:<8}  {:<18}  {:<32}  {}",
                        email.id,
                        email.status_label(),
                        truncate_string(email.merchant.as_deref().unwrap_or("-"), 18),
                        truncate_string(&email.subject, 32),
                        email.recipient_emails.join(", ")
                    );
                    let when = email
                        .sent_at
                        .as_deref()
                        .or(email.created_at.as_deref())
                        .map(format_date);
                    println!("{:>6}  {}", "", format_optional(when.as_deref(), ""));
                    if let Some(link) = client.attachment_url(email) {
                        println!("{:>6}  {}", "", link);
                    }
                }
            }
            println!("Page {} of {}", page, result.total_pages());
        }
        EmailCommand::Send {
            merchant,
            subject,
            to,
            recipients,
            body,
            attachments,
        } => {
            let merchants = client.list_merchants().await?;
            let target = merchants
                .into_iter()
                .find(|m| m.id == merchant)
                .ok_or_else(|| anyhow!("No merchant with id {}", merchant))?;

            let recipient_emails = if recipients.is_empty() {
                target.recipient_emails.clone()
            } else {
                recipients
            };
            let email = ComposedEmail {
                merchant_id: target.id.to_string(),
                to: to.unwrap_or_else(|| target.merchant_name.clone()),
                subject,
                recipient_emails,
                body,
                attachments,
            };
            let ack = client.send_email(&email).await?;
            println!(
                "{}",
                ack.message
                    .unwrap_or_else(|| "Email has been sent successfully".to_string())
            );
        }
        EmailCommand::Block { id } => {
            let ack = client.set_email_blocked(id, true).await?;
            println!("{}", ack.message.unwrap_or_else(|| format!("Email {} blocked", id)));
        }
        EmailCommand::Unblock { id } => {
            let ack = client.set_email_blocked(id, false).await?;
            println!("{}", ack.message.unwrap_or_else(|| format!("Email {} unblocked", id)));
        }
    }
    Ok(())
}
