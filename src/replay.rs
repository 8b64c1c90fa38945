//! Replay pipeline
//!
//! Drives a CSV of transactions through a fresh group on an in-memory store
//! and writes the requested report to the output. This is the end-to-end
//! harness behind the CLI binary: it exercises identity, group creation,
//! membership, the atomic transaction batches and the netting engine.
//!
//! Row users become group members on first sight. The replay operator that
//! owns the group takes part in no transaction and therefore shows up in the
//! balances report with a zero balance.
//!
//! Recoverable row errors (malformed records, rejected transactions) are
//! logged and skipped; processing continues with the next row. Fatal errors
//! (unreadable input, report write failures) abort the run.

use crate::cli::{CliArgs, ReportType};
use crate::core::service::LedgerService;
use crate::io::csv_format::{
    convert_csv_record, write_balances_csv, write_settlements_csv, CsvRecord,
};
use crate::store::memory::{MemoryStore, StaticIdentity};
use crate::store::traits::{DocRef, Document, DocumentStore, Write as StoreWrite};
use crate::types::error::LedgerError;
use crate::types::group::{GroupMember, UserId};
use crate::types::money::Currency;
use crate::types::transaction::Transaction;
use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;
use tracing::warn;

/// Run the replay described by the CLI arguments
///
/// Builds a tokio runtime, replays the input file through a fresh in-memory
/// group and writes the selected report to `output`.
///
/// # Errors
///
/// Returns [`LedgerError::IoError`] if the input cannot be read or the
/// runtime cannot be built, and propagates any fatal ledger error.
pub fn run(args: &CliArgs, output: &mut dyn Write) -> Result<(), LedgerError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .build()
        .map_err(|e| LedgerError::IoError {
            message: format!("failed to create tokio runtime: {e}"),
        })?;

    runtime.block_on(replay(args, output))
}

async fn replay(args: &CliArgs, output: &mut dyn Write) -> Result<(), LedgerError> {
    let currency = Currency::from(args.currency);

    let file = std::fs::File::open(&args.input_file).map_err(|e| LedgerError::IoError {
        message: format!("failed to open '{}': {e}", args.input_file.display()),
    })?;
    let mut reader = csv::Reader::from_reader(file);

    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let service = LedgerService::new(
        Arc::clone(&store),
        Arc::new(StaticIdentity::signed_in("replay-operator", "Replay Operator")),
    );
    let group_id = service.create_group("Replay", None, currency).await?;

    let mut known: HashSet<UserId> = HashSet::new();
    for (index, result) in reader.deserialize::<CsvRecord>().enumerate() {
        // Header occupies line 1.
        let line = index as u64 + 2;

        let record = match result {
            Ok(record) => record,
            Err(error) => {
                warn!(line, %error, "skipping malformed row");
                continue;
            }
        };
        let transaction = match convert_csv_record(record, currency) {
            Ok(transaction) => transaction,
            Err(error) => {
                warn!(line, %error, "skipping row");
                continue;
            }
        };

        ensure_members(&service, &group_id, &transaction, &mut known).await?;
        if let Err(error) = service.create_transaction(&group_id, transaction, &[]).await {
            warn!(line, %error, "transaction rejected");
        }
    }

    match args.report {
        ReportType::Balances => {
            let members = service.members(&group_id).await?;
            write_balances_csv(&members, currency, output)
        }
        ReportType::Settlements => {
            let settlements = service.settle_up(&group_id).await?;
            write_settlements_csv(&settlements, currency, output)
        }
    }
}

/// Add any row user not yet part of the group as a fresh member
async fn ensure_members(
    service: &LedgerService,
    group_id: &str,
    transaction: &Transaction,
    known: &mut HashSet<UserId>,
) -> Result<(), LedgerError> {
    let mut batch = Vec::new();

    for user in std::iter::once(&transaction.from).chain(transaction.to.keys()) {
        if !known.insert(user.clone()) {
            continue;
        }
        let doc = DocRef::Member(group_id.to_string(), user.clone());
        if service.store().get(&doc).await?.is_none() {
            batch.push(StoreWrite::Set {
                doc,
                data: Document::Member(GroupMember::new(user.clone(), user.clone(), None)),
            });
        }
    }

    if !batch.is_empty() {
        service.store().commit(batch).await?;
    }
    Ok(())
}
