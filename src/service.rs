//! Service layer: validate, dispatch to the executor, then persist
//!
//! The local store only ever holds confirmed state. A status change is
//! validated first (rejections never reach the executor), dispatched once,
//! and written back only after the executor confirmed it.
use super::command::CommandPayload;
use super::config::StoreConfig;
use super::error::ServiceError;
use super::executor::CommandExecutor;
use super::installment::{InstallmentRecord, Status, TimeStamp};
use super::merge::{PageInfo, SchedulePage, ScheduleView, merge};
use super::utils;
use super::validator::{self, FieldBag};
use chrono::Utc;
use sled::Batch;
use std::sync::Arc;

/// Ordered ids of one loan's schedule plus the last page seen.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Default)]
struct StoredSchedule {
    #[n(0)]
    ids: Vec<String>,
    #[n(1)]
    last_page: Option<PageInfo>,
}

/// A command the executor confirmed, as kept in the local audit trail.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedCommand {
    #[n(0)]
    pub digest: String, // sha256 of the cbor payload
    #[n(1)]
    pub request_id: String,
    #[n(2)]
    pub reference: String,
    #[n(3)]
    pub confirmed_at: TimeStamp<Utc>,
    #[n(4)]
    pub logic_note: String,
    #[n(5)]
    pub payload: CommandPayload,
}

fn record_key(id: &str) -> String {
    format!("inst/{id}")
}

fn schedule_key(loan_id: &str) -> String {
    format!("loan/{loan_id}")
}

fn history_prefix(id: &str) -> String {
    format!("cmd/{id}/")
}

fn to_cbor<T: minicbor::Encode<()>>(value: &T) -> anyhow::Result<Vec<u8>> {
    Ok(minicbor::to_vec(value)?)
}

pub struct RepaymentService<E> {
    instance: Arc<sled::Db>,
    executor: E,
    flush_on_write: bool,
}

impl<E: CommandExecutor> RepaymentService<E> {
    pub fn new(instance: Arc<sled::Db>, executor: E) -> Self {
        Self {
            instance,
            executor,
            flush_on_write: false,
        }
    }

    pub fn open(config: &StoreConfig, executor: E) -> Result<Self, ServiceError> {
        let db = config.open()?;
        Ok(Self {
            instance: Arc::new(db),
            executor,
            flush_on_write: config.should_flush_on_write(),
        })
    }

    fn commit(&self, batch: Batch) -> Result<(), ServiceError> {
        self.instance.apply_batch(batch)?;
        if self.flush_on_write {
            self.instance.flush()?;
        }
        Ok(())
    }

    fn load_stored_schedule(&self, loan_id: &str) -> Result<StoredSchedule, ServiceError> {
        match self.instance.get(schedule_key(loan_id))? {
            Some(bytes) => Ok(minicbor::decode(bytes.as_ref())?),
            None => Ok(StoredSchedule::default()),
        }
    }

    // Persists the records appended to `view` since it held `held` entries.
    fn save_appended(
        &self,
        loan_id: &str,
        view: &ScheduleView,
        held: usize,
    ) -> Result<(), ServiceError> {
        let mut batch = Batch::default();
        for record in view.appended_since(held) {
            batch.insert(record_key(record.id()).as_bytes(), to_cbor(record)?);
        }
        let stored = StoredSchedule {
            ids: view.records().iter().map(|r| r.id().to_string()).collect(),
            last_page: view.page_info(),
        };
        batch.insert(schedule_key(loan_id).as_bytes(), to_cbor(&stored)?);
        self.commit(batch)
    }

    /// Load one installment as last confirmed.
    pub fn load_installment(&self, id: &str) -> Result<InstallmentRecord, ServiceError> {
        match self.instance.get(record_key(id))? {
            Some(bytes) => Ok(minicbor::decode(bytes.as_ref())?),
            None => Err(ServiceError::NotFound(id.to_string())),
        }
    }

    /// The stored schedule of a loan, in the order it was merged.
    pub fn schedule(&self, loan_id: &str) -> Result<ScheduleView, ServiceError> {
        let stored = self.load_stored_schedule(loan_id)?;
        let records = stored
            .ids
            .iter()
            .map(|id| self.load_installment(id))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ScheduleView::from_records(records)?.with_page_info(stored.last_page))
    }

    /// Store a freshly generated schedule. Ids already held are left alone.
    pub fn insert_schedule(
        &self,
        loan_id: &str,
        records: Vec<InstallmentRecord>,
    ) -> Result<ScheduleView, ServiceError> {
        let mut view = self.schedule(loan_id)?;
        let held = view.len();
        let page_info = view.page_info();
        let merged = merge(view.records(), &records)?;
        view = ScheduleView::from_records(merged)?.with_page_info(page_info);

        self.save_appended(loan_id, &view, held)?;
        log::info!(
            "loan {loan_id}: stored {} scheduled installments",
            view.len() - held
        );
        Ok(view)
    }

    /// Merge one fetched page into the stored schedule of `loan_id`.
    pub fn absorb_page(
        &self,
        loan_id: &str,
        page: SchedulePage,
    ) -> Result<ScheduleView, ServiceError> {
        let mut view = self.schedule(loan_id)?;
        let held = view.len();
        view.absorb(page)?;

        self.save_appended(loan_id, &view, held)?;
        Ok(view)
    }

    /// Request a status change for one installment.
    ///
    /// Returns the record as confirmed by the executor. On any error the
    /// stored record is exactly what it was before the call.
    pub fn change_status(
        &self,
        installment_id: &str,
        requested: Status,
        fields: &FieldBag,
    ) -> Result<InstallmentRecord, ServiceError> {
        let mut record = self.load_installment(installment_id)?;

        let command = validator::validate(&record, requested, fields).inspect_err(|err| {
            log::warn!(
                "installment {installment_id}: {} -> {requested} rejected: {err}",
                record.status()
            )
        })?;
        let (digest, _) = command.build()?;
        let request_id = utils::new_request_id()?;

        let receipt = self
            .executor
            .execute(&request_id, &command)
            .inspect_err(|err| {
                log::warn!("installment {installment_id}: request {request_id} failed: {err}")
            })?;

        record.apply_confirmed(&command).inspect_err(|err| {
            log::error!("installment {installment_id}: confirmed change not applied locally: {err}")
        })?;

        let confirmed = ConfirmedCommand {
            digest,
            request_id,
            reference: receipt.reference,
            confirmed_at: receipt.confirmed_at,
            logic_note: command.logic_note.clone(),
            payload: command.payload,
        };
        let sequence = self.instance.generate_id()?;

        // Batch insert: the updated record and its audit entry
        let mut batch = Batch::default();
        batch.insert(record_key(installment_id).as_bytes(), to_cbor(&record)?);
        batch.insert(
            format!("{}{sequence:020}", history_prefix(installment_id)).as_bytes(),
            to_cbor(&confirmed)?,
        );
        self.commit(batch)?;

        log::info!(
            "installment {installment_id}: {} confirmed as {} ({})",
            confirmed.logic_note,
            confirmed.reference,
            confirmed.request_id
        );
        Ok(record)
    }

    /// Confirmed commands for one installment, oldest first.
    pub fn command_history(&self, installment_id: &str) -> Result<Vec<ConfirmedCommand>, ServiceError> {
        self.instance
            .scan_prefix(history_prefix(installment_id))
            .map(|entry| -> Result<ConfirmedCommand, ServiceError> {
                let (_, bytes) = entry?;
                Ok(minicbor::decode(bytes.as_ref())?)
            })
            .collect()
    }
}
