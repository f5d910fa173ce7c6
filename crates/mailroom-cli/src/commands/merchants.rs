use anyhow::Result;

use mailroom_core::models::MerchantDraft;

use super::{Context, MerchantCommand};
use crate::format::{format_date, format_optional, truncate_string};

pub async fn run(ctx: &Context, command: MerchantCommand) -> Result<()> {
    let client = &ctx.client;
    match command {
        MerchantCommand::List => {
            let merchants = client.list_merchants().await?;
            if merchants.is_empty() {
                println!("No merchants yet. Add one with `mailroom merchants add`.");
                return Ok(());
            }
            println!("{:>5}  {:<24}  {:<18}  RECIPIENTS", "ID", "NAME", "CREATED");
            for m in &merchants {
                let created = m.created_at.as_deref().map(format_date);
                println!(
                    "{:>5}  {:<24}  {:<18}  {}",
                    m.id,
                    truncate_string(&m.merchant_name, 24),
                    format_optional(created.as_deref(), "-"),
                    m.recipients_display()
                );
            }
        }
        MerchantCommand::Add { name, recipients } => {
            let draft = MerchantDraft::new(&name, recipients);
            let ack = client.create_merchant(&draft).await?;
            println!(
                "{}",
                ack.message.unwrap_or_else(|| format!("Merchant {} created", draft.merchant_name))
            );
        }
        MerchantCommand::Edit {
            id,
            name,
            recipients,
        } => {
            let draft = MerchantDraft::new(&name, recipients);
            let ack = client.update_merchant(id, &draft).await?;
            println!(
                "{}",
                ack.message.unwrap_or_else(|| format!("Merchant {} updated", id))
            );
        }
        MerchantCommand::Remove { id, reason } => {
            let ack = client.delete_merchant(id, &reason).await?;
            println!(
                "{}",
                ack.message.unwrap_or_else(|| format!("Merchant {} deleted", id))
            );
        }
    }
    Ok(())
}
