use anyhow::{anyhow, Result};

use mailroom_core::models::QueueGeneratedEmail;

use super::{Context, RecordCommand};
use crate::format::{format_amount, format_date, format_optional, truncate_string};

pub async fn transactions(ctx: &Context, search: Option<&str>) -> Result<()> {
    let all = ctx.client.list_transactions().await?;
    let query = search.unwrap_or("");
    let rows: Vec<_> = all.iter().filter(|t| t.matches(query)).collect();

    if rows.is_empty() {
        if query.is_empty() {
            println!("No transactions available.");
        } else {
            println!("No transactions found matching \"{}\".", query);
        }
        return Ok(());
    }

    println!(
        "{:<12}  {:<20}  {:<10}  {:>14}  {:>10}  {:>14}  REFERENCE",
        "DATE", "BUYER", "METHOD", "AMOUNT", "COMMISSION", "NET"
    );
    for t in &rows {
        let currency = t.currency.as_deref().unwrap_or("");
        println!(
            "{:<12}  {:<20}  {:<10}  {:>14}  {:>10}  {:>14}  {}",
            format_optional(t.date.as_deref(), "-"),
            truncate_string(t.buyer_name.as_deref().unwrap_or("-"), 20),
            truncate_string(t.payment_method.as_deref().unwrap_or("-"), 10),
            format!("{} {}", currency, format_amount(t.amount)).trim(),
            format_amount(t.commission),
            format_amount(t.net_amount),
            format_optional(t.reference.as_deref(), "-")
        );
    }
    println!("{} of {} transaction(s)", rows.len(), all.len());
    Ok(())
}

pub async fn run(ctx: &Context, command: RecordCommand) -> Result<()> {
    let client = &ctx.client;
    match command {
        RecordCommand::Uploaded => {
            let records = client.list_uploaded_records().await?;
            if records.is_empty() {
                println!("No uploaded records.");
            }
            for record in &records {
                let files = record.attachment_names();
                println!(
                    "{}  {} file(s): {}",
                    format_date(&record.uploaded_at),
                    files.len(),
                    files.join(", ")
                );
            }
        }
        RecordCommand::Generated => {
            let records = client.list_generated_records().await?;
            if records.is_empty() {
                println!("No generated records.");
            }
            for record in &records {
                println!("{}  ({})", format_date(&record.generated_at), record.generated_at);
                for (i, file) in record.attachments.iter().enumerate() {
                    println!("  [{}] {}", i, file);
                }
            }
        }
        RecordCommand::Queue {
            generated_at,
            attachments,
            merchant,
            subject,
        } => {
            let (records, merchants) = futures::try_join!(
                client.list_generated_records(),
                client.list_merchants()
            )?;
            let record = records
                .into_iter()
                .find(|r| r.generated_at == generated_at)
                .ok_or_else(|| anyhow!("No generated record at {}", generated_at))?;
            let target = merchants
                .into_iter()
                .find(|m| m.id == merchant)
                .ok_or_else(|| anyhow!("No merchant with id {}", merchant))?;

            let request = QueueGeneratedEmail {
                generated_at: record.generated_at.clone(),
                attachment_indexes: attachments,
                to: target.merchant_name,
                subject,
                recipient_emails: target.recipient_emails,
                body: String::new(),
            };
            request.validate(&record).map_err(|e| anyhow!(e))?;

            let ack = client.queue_generated_email(&request).await?;
            println!(
                "{}",
                ack.message
                    .unwrap_or_else(|| "Email queued successfully!".to_string())
            );
        }
    }
    Ok(())
}
