use std::path::Path;

use keeper_client::{
    BankCard, BinaryFile, DecryptedRecord, LoginPassword, SecretPayload, TextNote,
};
use keeper_storage::{parse_tag, DataId, Metadata, SecretKind};

use crate::cli::{RecordInput, Tags};
use crate::grpc::{setup_vault, Context};

/// Parse repeated `--tag key=value` flags.
pub fn tags_to_metadata(tags: &Tags) -> Result<Metadata, String> {
    tags.tags
        .iter()
        .map(|tag| parse_tag(tag).ok_or_else(|| format!("Invalid tag '{}': expected KEY=VALUE", tag)))
        .collect()
}

/// Turn command-line input into a payload. Files are read here.
pub fn payload_from_input(
    input: RecordInput,
) -> Result<(SecretPayload, Tags), Box<dyn std::error::Error>> {
    Ok(match input {
        RecordInput::Login {
            login,
            secret,
            tags,
        } => (
            SecretPayload::LoginPassword(LoginPassword {
                login,
                password: secret,
            }),
            tags,
        ),
        RecordInput::Text { text, tags } => (SecretPayload::Text(TextNote { text }), tags),
        RecordInput::File { path, tags } => {
            (SecretPayload::Binary(BinaryFile::from_path(&path)?), tags)
        }
        RecordInput::Card {
            number,
            holder,
            expiry,
            cvv,
            tags,
        } => (
            SecretPayload::BankCard(BankCard {
                number,
                holder,
                expiry,
                cvv,
            }),
            tags,
        ),
    })
}

/// Card number with everything but the last four digits hidden.
pub fn mask_card(number: &str) -> String {
    let digits: Vec<char> = number.chars().filter(|c| c.is_ascii_digit()).collect();
    let shown = digits.len().min(4);
    let hidden = digits.len() - shown;
    let tail: String = digits[hidden..].iter().collect();
    format!("{}{}", "*".repeat(hidden), tail)
}

/// One-line description that never includes a password, CVV or full card number.
pub fn summary(payload: &SecretPayload) -> String {
    match payload {
        SecretPayload::LoginPassword(lp) => lp.login.clone(),
        SecretPayload::Text(note) => {
            let first = note.text.lines().next().unwrap_or_default();
            if first.chars().count() > 40 {
                format!("{}…", first.chars().take(40).collect::<String>())
            } else {
                first.to_string()
            }
        }
        SecretPayload::Binary(file) => format!("{} ({} bytes)", file.file_name, file.content.len()),
        SecretPayload::BankCard(card) => format!("{} {}", mask_card(&card.number), card.holder),
    }
}

fn print_metadata(metadata: &Metadata) {
    for (key, value) in metadata {
        println!("  {}: {}", key, value);
    }
}

pub fn print_record_list(records: &[DecryptedRecord]) {
    if records.is_empty() {
        println!("No records found");
        return;
    }
    println!("Records:");
    for record in records {
        println!(
            "  {:>20}  {:<14}  {}",
            record.id.to_string(),
            record.kind.to_string(),
            summary(&record.payload)
        );
    }
}

pub fn print_record(record: &DecryptedRecord) {
    println!("Record {} ({})", record.id, record.kind);
    match &record.payload {
        SecretPayload::LoginPassword(lp) => {
            println!("  login: {}", lp.login);
            println!("  password: {}", lp.password);
        }
        SecretPayload::Text(note) => println!("{}", note.text),
        SecretPayload::Binary(file) => {
            println!("  file: {} ({} bytes)", file.file_name, file.content.len());
        }
        SecretPayload::BankCard(card) => {
            println!("  number: {}", card.number);
            println!("  holder: {}", card.holder);
            println!("  expiry: {}", card.expiry);
            println!("  cvv: {}", card.cvv);
        }
    }
    if !record.metadata.is_empty() {
        println!("Metadata:");
        print_metadata(&record.metadata);
    }
    println!("Created: {}", record.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("Updated: {}", record.updated_at.format("%Y-%m-%d %H:%M:%S UTC"));
}

pub async fn cmd_record_add(
    ctx: &Context,
    input: RecordInput,
) -> Result<(), Box<dyn std::error::Error>> {
    let (payload, tags) = payload_from_input(input)?;
    let metadata = tags_to_metadata(&tags)?;
    let (vault, _client) = setup_vault(ctx).await?;

    let kind = payload.kind();
    let id = vault.create(payload, metadata)?;

    println!("✓ {} record added (id: {})", kind, id);
    println!("  Run `keeper sync` to upload it");

    Ok(())
}

pub async fn cmd_record_list(ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let (vault, _client) = setup_vault(ctx).await?;
    print_record_list(&vault.list()?);
    Ok(())
}

pub async fn cmd_record_show(
    ctx: &Context,
    id: i64,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (vault, _client) = setup_vault(ctx).await?;
    let record = vault.get(DataId(id))?;

    match (output, &record.payload) {
        (Some(path), SecretPayload::Binary(file)) => {
            std::fs::write(path, &file.content)?;
            println!("✓ Wrote {} bytes to {}", file.content.len(), path.display());
        }
        (Some(_), _) => {
            return Err(format!(
                "Record {} is a {} record; --output only applies to {} records",
                id,
                record.kind,
                SecretKind::Binary
            )
            .into());
        }
        (None, _) => print_record(&record),
    }

    Ok(())
}

pub async fn cmd_record_update(
    ctx: &Context,
    id: i64,
    input: RecordInput,
) -> Result<(), Box<dyn std::error::Error>> {
    let (payload, tags) = payload_from_input(input)?;
    // No tags given keeps the existing metadata.
    let metadata = if tags.tags.is_empty() {
        None
    } else {
        Some(tags_to_metadata(&tags)?)
    };
    let (vault, _client) = setup_vault(ctx).await?;

    vault.update(DataId(id), payload, metadata)?;

    println!("✓ Record {} updated", id);
    println!("  Run `keeper sync` to upload it");

    Ok(())
}

pub async fn cmd_record_delete(ctx: &Context, id: i64) -> Result<(), Box<dyn std::error::Error>> {
    let (vault, mut client) = setup_vault(ctx).await?;

    vault.delete(&mut client, DataId(id)).await?;

    println!("✓ Record {} deleted", id);

    Ok(())
}
