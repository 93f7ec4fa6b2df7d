//! In-memory invoice store with JSON snapshot persistence.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::categorize::CategorizationResult;
use crate::error::StoreError;
use crate::models::invoice::{Client, ExtractedFields, Invoice, InvoiceStatus};
use crate::validate::duplicate::DuplicateCandidate;

use super::{
    ActivityEntry, DecisionUpdate, DuplicateQuery, FieldConfidenceRecord, InvoiceStore,
    MonthlySummary,
};

/// Serializable view of the ledger for file-backed CLI runs.
///
/// Only clients and invoices persist; activity and confidence records are
/// per-process audit data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    #[serde(default)]
    pub clients: Vec<Client>,

    #[serde(default)]
    pub invoices: Vec<Invoice>,
}

#[derive(Default)]
struct StoreInner {
    invoices: HashMap<Uuid, Invoice>,
    clients: HashMap<Uuid, Client>,
    activities: Vec<ActivityEntry>,
    field_confidence: Vec<FieldConfidenceRecord>,
    summaries: HashMap<(Uuid, i32, u32), MonthlySummary>,
}

/// Thread-safe in-memory [`InvoiceStore`].
///
/// Locks are never held across await points, so the store is safe to share
/// across concurrently processed invoices in a batch.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<StoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded from a snapshot.
    pub fn from_snapshot(snapshot: LedgerSnapshot) -> Self {
        let inner = StoreInner {
            clients: snapshot.clients.into_iter().map(|c| (c.id, c)).collect(),
            invoices: snapshot.invoices.into_iter().map(|i| (i.id, i)).collect(),
            ..StoreInner::default()
        };
        Self {
            inner: RwLock::new(inner),
        }
    }

    /// Load a snapshot from a JSON file.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path)?;
        let snapshot: LedgerSnapshot = serde_json::from_str(&content)?;
        Ok(Self::from_snapshot(snapshot))
    }

    /// Write the current ledger back to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let snapshot = self.snapshot()?;
        let content = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Current clients and invoices, sorted by id for stable output.
    pub fn snapshot(&self) -> Result<LedgerSnapshot, StoreError> {
        let inner = self.read()?;
        let mut clients: Vec<Client> = inner.clients.values().cloned().collect();
        let mut invoices: Vec<Invoice> = inner.invoices.values().cloned().collect();
        clients.sort_by_key(|c| c.id);
        invoices.sort_by_key(|i| i.id);
        Ok(LedgerSnapshot { clients, invoices })
    }

    /// Insert or replace a client.
    pub fn upsert_client(&self, client: Client) -> Result<(), StoreError> {
        self.write()?.clients.insert(client.id, client);
        Ok(())
    }

    /// Insert or replace an invoice.
    pub fn upsert_invoice(&self, invoice: Invoice) -> Result<(), StoreError> {
        self.write()?.invoices.insert(invoice.id, invoice);
        Ok(())
    }

    /// Confidence records for one invoice, in append order.
    pub fn field_confidence(
        &self,
        invoice_id: Uuid,
    ) -> Result<Vec<FieldConfidenceRecord>, StoreError> {
        Ok(self
            .read()?
            .field_confidence
            .iter()
            .filter(|r| r.invoice_id == invoice_id)
            .cloned()
            .collect())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StoreInner>, StoreError> {
        self.inner.read().map_err(|e| StoreError::Lock(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StoreInner>, StoreError> {
        self.inner.write().map_err(|e| StoreError::Lock(e.to_string()))
    }
}

#[async_trait]
impl InvoiceStore for MemoryStore {
    async fn invoice(&self, id: Uuid) -> Result<Invoice, StoreError> {
        self.read()?
            .invoices
            .get(&id)
            .cloned()
            .ok_or(StoreError::InvoiceNotFound(id))
    }

    async fn client(&self, id: Uuid) -> Result<Client, StoreError> {
        self.read()?
            .clients
            .get(&id)
            .cloned()
            .ok_or(StoreError::ClientNotFound(id))
    }

    async fn save_extraction(
        &self,
        invoice_id: Uuid,
        fields: &ExtractedFields,
        confidence: f32,
    ) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        let invoice = inner
            .invoices
            .get_mut(&invoice_id)
            .ok_or(StoreError::InvoiceNotFound(invoice_id))?;
        invoice.extracted = Some(fields.clone());
        invoice.confidence_score = Some(confidence);
        invoice.updated_at = Utc::now();
        Ok(())
    }

    async fn save_categorization(
        &self,
        invoice_id: Uuid,
        result: &CategorizationResult,
    ) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        let invoice = inner
            .invoices
            .get_mut(&invoice_id)
            .ok_or(StoreError::InvoiceNotFound(invoice_id))?;
        invoice.categorization = Some(result.clone());
        invoice.updated_at = Utc::now();
        Ok(())
    }

    async fn apply_decision(&self, update: DecisionUpdate) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        let invoice = inner
            .invoices
            .get_mut(&update.invoice_id)
            .ok_or(StoreError::InvoiceNotFound(update.invoice_id))?;

        invoice.status = update.status;
        if let Some(confidence) = update.confidence_score {
            invoice.confidence_score = Some(confidence);
        }
        if let Some(notes) = update.review_notes {
            invoice.review_notes = Some(notes);
        }
        if let Some(approved_by) = update.approved_by {
            invoice.approved_by = Some(approved_by);
        }
        if let Some(approved_at) = update.approved_at {
            invoice.approved_at = Some(approved_at);
        }
        invoice.updated_at = Utc::now();
        Ok(())
    }

    async fn duplicate_candidates(
        &self,
        query: &DuplicateQuery,
    ) -> Result<Vec<DuplicateCandidate>, StoreError> {
        let Some(vendor_gstin) = query.vendor_gstin.as_deref() else {
            return Ok(Vec::new());
        };

        let inner = self.read()?;
        Ok(inner
            .invoices
            .values()
            .filter(|i| {
                i.client_id == query.client_id
                    && i.id != query.exclude
                    && i.status != InvoiceStatus::Rejected
                    && i.vendor_gstin.as_deref() == Some(vendor_gstin)
            })
            .map(|i| DuplicateCandidate {
                id: i.id,
                invoice_number: i.invoice_number.clone(),
                invoice_date: i.invoice_date,
                total_amount: i.total_amount,
                vendor_name: i.vendor_name.clone(),
            })
            .collect())
    }

    async fn append_activity(&self, entry: ActivityEntry) -> Result<(), StoreError> {
        self.write()?.activities.push(entry);
        Ok(())
    }

    async fn activities(&self, invoice_id: Uuid) -> Result<Vec<ActivityEntry>, StoreError> {
        Ok(self
            .read()?
            .activities
            .iter()
            .filter(|a| a.entity_id == invoice_id)
            .cloned()
            .collect())
    }

    async fn append_field_confidence(
        &self,
        records: &[FieldConfidenceRecord],
    ) -> Result<(), StoreError> {
        self.write()?.field_confidence.extend_from_slice(records);
        Ok(())
    }

    async fn bump_monthly_summary(
        &self,
        client_id: Uuid,
        period: NaiveDate,
        gst_amount: Decimal,
    ) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        let summary = inner
            .summaries
            .entry((client_id, period.year(), period.month()))
            .or_insert_with(|| MonthlySummary {
                client_id,
                year: period.year(),
                month: period.month(),
                invoices_approved: 0,
                gst_amount: Decimal::ZERO,
            });
        summary.invoices_approved += 1;
        summary.gst_amount += gst_amount;
        Ok(())
    }

    async fn monthly_summary(
        &self,
        client_id: Uuid,
        year: i32,
        month: u32,
    ) -> Result<Option<MonthlySummary>, StoreError> {
        Ok(self.read()?.summaries.get(&(client_id, year, month)).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn client() -> Client {
        Client {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "Menon & Associates".to_string(),
            gstin: Some("27AABCU9603R1ZN".to_string()),
            state: Some("Maharashtra".to_string()),
        }
    }

    fn invoice_for(client_id: Uuid, number: &str, vendor_gstin: Option<&str>) -> Invoice {
        let mut invoice = Invoice::new(Uuid::new_v4(), client_id, Decimal::from(1180));
        invoice.invoice_number = Some(number.to_string());
        invoice.invoice_date = NaiveDate::from_ymd_opt(2025, 8, 1);
        invoice.vendor_gstin = vendor_gstin.map(str::to_string);
        invoice
    }

    #[tokio::test]
    async fn test_missing_invoice_is_not_found() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        let err = store.invoice(id).await.unwrap_err();
        assert!(matches!(err, StoreError::InvoiceNotFound(found) if found == id));
    }

    #[tokio::test]
    async fn test_duplicate_candidates_filter() {
        let store = MemoryStore::new();
        let client = client();
        let client_id = client.id;
        store.upsert_client(client).unwrap();

        let subject = invoice_for(client_id, "INV-2025-0042", Some("27AAPFU0939F1ZV"));
        let same_vendor = invoice_for(client_id, "INV-2025-0041", Some("27AAPFU0939F1ZV"));
        let other_vendor = invoice_for(client_id, "INV-2025-0040", Some("29AAPFU0939F1ZR"));
        let mut rejected = invoice_for(client_id, "INV-2025-0039", Some("27AAPFU0939F1ZV"));
        rejected.status = InvoiceStatus::Rejected;

        for invoice in [&subject, &same_vendor, &other_vendor, &rejected] {
            store.upsert_invoice((*invoice).clone()).unwrap();
        }

        let candidates = store
            .duplicate_candidates(&DuplicateQuery {
                client_id,
                vendor_gstin: subject.vendor_gstin.clone(),
                exclude: subject.id,
            })
            .await
            .unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, same_vendor.id);

        // No vendor GSTIN means no candidates at all.
        let none = store
            .duplicate_candidates(&DuplicateQuery {
                client_id,
                vendor_gstin: None,
                exclude: subject.id,
            })
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_apply_decision_leaves_unset_fields_alone() {
        let store = MemoryStore::new();
        let client = client();
        let mut invoice = invoice_for(client.id, "INV-2025-0042", None);
        invoice.confidence_score = Some(0.88);
        invoice.review_notes = Some("previous notes".to_string());
        store.upsert_client(client).unwrap();
        store.upsert_invoice(invoice.clone()).unwrap();

        store
            .apply_decision(DecisionUpdate {
                invoice_id: invoice.id,
                status: InvoiceStatus::Review,
                confidence_score: None,
                review_notes: None,
                approved_by: None,
                approved_at: None,
            })
            .await
            .unwrap();

        let stored = store.invoice(invoice.id).await.unwrap();
        assert_eq!(stored.status, InvoiceStatus::Review);
        assert_eq!(stored.confidence_score, Some(0.88));
        assert_eq!(stored.review_notes.as_deref(), Some("previous notes"));
    }

    #[tokio::test]
    async fn test_monthly_summary_accumulates() {
        let store = MemoryStore::new();
        let client_id = Uuid::new_v4();
        let august = NaiveDate::from_ymd_opt(2025, 8, 1).unwrap();

        store
            .bump_monthly_summary(client_id, august, Decimal::from(180))
            .await
            .unwrap();
        store
            .bump_monthly_summary(client_id, august, Decimal::from(90))
            .await
            .unwrap();

        let summary = store
            .monthly_summary(client_id, 2025, 8)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.invoices_approved, 2);
        assert_eq!(summary.gst_amount, Decimal::from(270));

        assert!(store
            .monthly_summary(client_id, 2025, 7)
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_snapshot_file_roundtrip() {
        let store = MemoryStore::new();
        let client = client();
        let invoice = invoice_for(client.id, "INV-2025-0042", Some("27AAPFU0939F1ZV"));
        store.upsert_client(client.clone()).unwrap();
        store.upsert_invoice(invoice.clone()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");

        store.save(&path).unwrap();
        let loaded = MemoryStore::load(&path).unwrap();

        let snapshot = loaded.snapshot().unwrap();
        assert_eq!(snapshot.clients.len(), 1);
        assert_eq!(snapshot.invoices.len(), 1);
        assert_eq!(snapshot.invoices[0].id, invoice.id);
        assert_eq!(
            snapshot.invoices[0].invoice_number.as_deref(),
            Some("INV-2025-0042")
        );
    }
}
