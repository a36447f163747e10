use std::sync::Arc;

use ackl_crypto::{Ed25519Signer, SignedPayload, Signer, SignerError, SigningRequest};
use ackl_ledger::{
    AcknowledgmentService, AcknowledgmentStatus, IntegrityResult, MigrationReport, RebuildReport,
};
use ackl_store::PgLedgerRepository;
use ackl_types::{Actor, LedgerRecord, RecordId};
use async_trait::async_trait;
use colored::Colorize;
use serde::Serialize;

use crate::cli::*;
use crate::config::AppConfig;

type Service = AcknowledgmentService<PgLedgerRepository, dyn Signer>;

/// Stands in for the signer when no key is configured; only `ack` signs.
struct NoSigningKey;

#[async_trait]
impl Signer for NoSigningKey {
    async fn sign(&self, _: &SigningRequest) -> Result<SignedPayload, SignerError> {
        Err(SignerError::Unavailable(
            "no signing key configured (set signing_key_hex or ACKL_SIGNING_KEY)".into(),
        ))
    }
}

pub async fn run_command(cli: Cli, config: AppConfig) -> anyhow::Result<()> {
    let service = connect(&config).await?;
    let format = cli.format;

    match cli.command {
        Command::Verify => {
            let result = service.verify_chain_integrity().await?;
            emit(format, &result, render_integrity)?;
            if !result.valid {
                anyhow::bail!("ledger chain is broken");
            }
        }
        Command::Rebuild => {
            let report = service.rebuild_chain().await?;
            emit(format, &report, render_rebuild)?;
        }
        Command::Migrate(args) => {
            let report = service.migrate_hash_version(args.to).await?;
            emit(format, &report, render_migration)?;
        }
        Command::Ack(args) => {
            let mut actor = Actor::new(args.actor_id, args.email);
            if let Some(name) = args.name {
                actor = actor.with_display_name(name);
            }
            let record = service
                .create_acknowledgment(&args.subject, &actor, args.referer.as_deref())
                .await?;
            emit(format, &record, render_record)?;
        }
        Command::Status(args) => {
            let status = service
                .get_acknowledgment_status(&args.subject, &args.actor_id)
                .await?;
            emit(format, &status, render_status)?;
        }
        Command::List(args) => {
            let records = match (args.subject, args.actor) {
                (Some(subject), _) => service.list_by_subject(&subject).await?,
                (None, Some(actor)) => service.list_by_actor(&actor).await?,
                (None, None) => anyhow::bail!("pass --subject or --actor"),
            };
            emit(format, &records, |records: &Vec<LedgerRecord>| render_list(records))?;
        }
    }
    Ok(())
}

async fn connect(config: &AppConfig) -> anyhow::Result<Service> {
    let repository = PgLedgerRepository::connect(&config.store_config()).await?;
    let signer: Arc<dyn Signer> = match config.signing_key()? {
        Some(key) => Arc::new(Ed25519Signer::new(key)),
        None => {
            tracing::debug!("no signing key configured; ack is disabled");
            Arc::new(NoSigningKey)
        }
    };
    Ok(AcknowledgmentService::new(
        Arc::new(repository),
        signer,
        config.ledger.clone(),
    ))
}

fn emit<T: Serialize>(
    format: OutputFormat,
    value: &T,
    text: impl Fn(&T) -> String,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => println!("{}", text(value)),
    }
    Ok(())
}

fn render_integrity(result: &IntegrityResult) -> String {
    if result.valid {
        format!(
            "{} {}\n  Records: {}",
            "✓".green().bold(),
            result.details,
            result.total_records.to_string().bold()
        )
    } else {
        let at = result
            .break_at_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "?".into());
        format!(
            "{} Chain broken at record {}\n  {}\n  Records: {}",
            "✗".red().bold(),
            at.yellow().bold(),
            result.details,
            result.total_records
        )
    }
}

fn render_rebuild(report: &RebuildReport) -> String {
    if report.is_noop() {
        return format!(
            "{} Chain already consistent ({} records)",
            "✓".green(),
            report.total_records
        );
    }
    format!(
        "{} Relinked {} of {} records: {}",
        "✓".green().bold(),
        report.relinked.len().to_string().bold(),
        report.total_records,
        join_ids(&report.relinked)
    )
}

fn render_migration(report: &MigrationReport) -> String {
    format!(
        "{} Migrated to {}\n  Upgraded: {} of {}\n  Relinked: {}",
        "✓".green().bold(),
        report.target.to_string().cyan(),
        report.upgraded.len(),
        report.total_records,
        report.relinked.len()
    )
}

fn render_record(record: &LedgerRecord) -> String {
    let link = record
        .back_link
        .as_ref()
        .map(|d| d.short().to_string())
        .unwrap_or_else(|| "genesis".into());
    format!(
        "{} {} acknowledged {}\n  Record: {}  Signed: {}  Hash: {}  Link: {}",
        "✓".green().bold(),
        record.actor_id.bold(),
        record.subject_id.yellow(),
        record.id.to_string().bold(),
        record.signed_at.to_rfc3339(),
        record.hash_algorithm_version.to_string().cyan(),
        link.dimmed()
    )
}

fn render_status(status: &AcknowledgmentStatus) -> String {
    match (status.record_id, status.signed_at) {
        (Some(id), Some(signed_at)) => format!(
            "{} {} acknowledged {} (record {}, {})",
            "✓".green().bold(),
            status.actor_id.bold(),
            status.subject_id.yellow(),
            id,
            signed_at.to_rfc3339()
        ),
        _ => format!(
            "{} {} has not acknowledged {}",
            "✗".red(),
            status.actor_id.bold(),
            status.subject_id.yellow()
        ),
    }
}

fn render_list(records: &[LedgerRecord]) -> String {
    if records.is_empty() {
        return "No acknowledgments.".into();
    }
    records
        .iter()
        .map(|r| {
            format!(
                "{}  {}  {}  {}",
                format!("#{}", r.id).yellow(),
                r.subject_id,
                r.actor_id.bold(),
                r.signed_at.to_rfc3339().dimmed()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn join_ids(ids: &[RecordId]) -> String {
    ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use ackl_types::{Digest, HashAlgorithmVersion};
    use chrono::TimeZone;

    use super::*;

    fn plain() {
        colored::control::set_override(false);
    }

    fn record() -> LedgerRecord {
        LedgerRecord {
            id: RecordId::new(7),
            subject_id: "doc".into(),
            actor_id: "ada".into(),
            actor_email: "ada@example.com".into(),
            actor_display_name: None,
            signed_at: chrono::Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            payload_digest: "pd".into(),
            signature_value: "sig".into(),
            nonce: "n".into(),
            referer: None,
            back_link: Some(Digest::new("abcdefghijkl")),
            created_at: chrono::Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 1).unwrap(),
            hash_algorithm_version: HashAlgorithmVersion::V2,
            subject_deleted_at: None,
        }
    }

    #[test]
    fn integrity_text() {
        plain();
        let ok = IntegrityResult {
            valid: true,
            total_records: 3,
            break_at_id: None,
            break_kind: None,
            details: "Chain integrity verified successfully".into(),
        };
        assert!(render_integrity(&ok).contains("Records: 3"));

        let broken = IntegrityResult {
            valid: false,
            break_at_id: Some(RecordId::new(2)),
            ..ok
        };
        assert!(render_integrity(&broken).contains("Chain broken at record 2"));
    }

    #[test]
    fn rebuild_text() {
        plain();
        let noop = RebuildReport {
            total_records: 4,
            relinked: vec![],
        };
        assert!(render_rebuild(&noop).contains("already consistent (4 records)"));
        let fixed = RebuildReport {
            total_records: 4,
            relinked: vec![RecordId::new(2), RecordId::new(3)],
        };
        assert!(render_rebuild(&fixed).ends_with("2, 3"));
    }

    #[test]
    fn record_and_list_text() {
        plain();
        let text = render_record(&record());
        assert!(text.contains("ada acknowledged doc"));
        assert!(text.contains("Link: abcdefgh"));
        assert_eq!(render_list(&[]), "No acknowledgments.");
        assert!(render_list(&[record()]).starts_with("#7"));
    }

    #[test]
    fn status_text() {
        plain();
        let pending = AcknowledgmentStatus {
            subject_id: "doc".into(),
            actor_id: "ada".into(),
            acknowledged: false,
            record_id: None,
            signed_at: None,
        };
        assert_eq!(render_status(&pending), "✗ ada has not acknowledged doc");
    }

    #[tokio::test]
    async fn missing_key_refuses_to_sign() {
        let request = SigningRequest {
            subject_id: "doc".into(),
            actor: Actor::new("ada", "ada@example.com"),
            signed_at: chrono::Utc::now(),
            nonce: "n".into(),
        };
        assert!(matches!(
            NoSigningKey.sign(&request).await,
            Err(SignerError::Unavailable(_))
        ));
    }
}
