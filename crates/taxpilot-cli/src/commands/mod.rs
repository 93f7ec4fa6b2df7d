//! CLI subcommands.

pub mod batch;
pub mod config;
pub mod process;
pub mod status;

use std::path::Path;

use anyhow::Context;
use uuid::Uuid;

use taxpilot_core::store::{InvoiceStore, MemoryStore};

/// Load a ledger snapshot file into the in-memory store.
pub(crate) fn load_ledger(path: &Path) -> anyhow::Result<MemoryStore> {
    if !path.exists() {
        anyhow::bail!("Ledger file not found: {}", path.display());
    }
    MemoryStore::load(path).with_context(|| format!("failed to load ledger {}", path.display()))
}

/// Pick the acting user. An explicit `--user` wins; otherwise the selected
/// invoices must all belong to clients with one owner, who acts.
pub(crate) async fn resolve_user(
    store: &MemoryStore,
    invoice_ids: &[Uuid],
    explicit: Option<Uuid>,
) -> anyhow::Result<Uuid> {
    if let Some(user) = explicit {
        return Ok(user);
    }

    let mut owners: Vec<Uuid> = Vec::new();
    for id in invoice_ids {
        let invoice = store.invoice(*id).await?;
        let client = store.client(invoice.client_id).await?;
        if !owners.contains(&client.owner_id) {
            owners.push(client.owner_id);
        }
    }

    match owners.as_slice() {
        [owner] => Ok(*owner),
        [] => anyhow::bail!("No invoices selected"),
        _ => anyhow::bail!("Ledger spans multiple owners; pass --user to pick one"),
    }
}
