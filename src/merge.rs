//! Incremental schedule merging
//!
//! Pages fetched from the remote API are folded into the collection already
//! held, keyed by installment id. The policy is append-only: a record that
//! is already present is never replaced, even if the refetched copy carries
//! a different status. That supports "load next page" but not live resync;
//! a record that changed on the server after it was first fetched stays
//! stale until the whole schedule is reloaded.

use crate::error::MergeError;
use crate::installment::InstallmentRecord;
use std::collections::HashMap;

/// Pagination metadata, passed through untouched.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
    #[n(0)]
    pub page: u32,
    #[n(1)]
    pub total_pages: u32,
    #[n(2)]
    pub total_entries: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulePage {
    pub records: Vec<InstallmentRecord>,
    pub info: PageInfo,
}

/// A merged, ordered schedule plus the identity index used to dedupe it.
#[derive(Debug, Clone, Default)]
pub struct ScheduleView {
    records: Vec<InstallmentRecord>,
    index: HashMap<String, usize>, // id -> position in `records`
    last_page: Option<PageInfo>,
}

fn check_ids(records: &[InstallmentRecord]) -> Result<(), MergeError> {
    match records.iter().position(|record| record.id().is_empty()) {
        Some(position) => Err(MergeError::MissingId { position }),
        None => Ok(()),
    }
}

/// Appends the records of `incoming` whose id is not yet in `existing`.
///
/// Order is preserved on both sides and an id repeated inside `incoming`
/// keeps its first occurrence, so merging the same page twice is a no-op.
/// `existing` is returned as-is: if it already holds an id twice the merge
/// fails with [`MergeError::DuplicateId`] instead of collapsing it.
pub fn merge(
    existing: &[InstallmentRecord],
    incoming: &[InstallmentRecord],
) -> Result<Vec<InstallmentRecord>, MergeError> {
    let mut view = ScheduleView::from_records(existing.to_vec())?;
    view.extend(incoming)?;
    Ok(view.records)
}

impl ScheduleView {
    pub fn new() -> Self {
        Self::default()
    }
    /// Wraps an already merged collection. Ids must be present and unique.
    pub fn from_records(records: Vec<InstallmentRecord>) -> Result<Self, MergeError> {
        check_ids(&records)?;

        let mut index = HashMap::with_capacity(records.len());
        for (position, record) in records.iter().enumerate() {
            if index.insert(record.id().to_string(), position).is_some() {
                return Err(MergeError::DuplicateId {
                    id: record.id().to_string(),
                    position,
                });
            }
        }
        Ok(Self {
            records,
            index,
            last_page: None,
        })
    }
    pub fn with_page_info(mut self, info: Option<PageInfo>) -> Self {
        self.last_page = info;
        self
    }

    // validates the whole batch first so a bad page leaves the view untouched
    fn extend(&mut self, incoming: &[InstallmentRecord]) -> Result<usize, MergeError> {
        check_ids(incoming)?;

        let before = self.records.len();
        for record in incoming {
            match self.index.get(record.id()) {
                Some(&position) => {
                    let held = &self.records[position];
                    if held.status() != record.status() {
                        log::debug!(
                            "installment {} kept as {} although the page reports {}",
                            record.id(),
                            held.status(),
                            record.status()
                        );
                    }
                }
                None => {
                    self.index.insert(record.id().to_string(), self.records.len());
                    self.records.push(record.clone());
                }
            }
        }

        Ok(self.records.len() - before)
    }

    /// Merges one fetched page and returns how many records it appended.
    pub fn absorb(&mut self, page: SchedulePage) -> Result<usize, MergeError> {
        let appended = self.extend(&page.records)?;
        log::info!(
            "absorbed page {}/{}: {} new of {} fetched",
            page.info.page,
            page.info.total_pages,
            appended,
            page.records.len()
        );
        self.last_page = Some(page.info);
        Ok(appended)
    }

    /// Records appended after the first `held` entries.
    pub fn appended_since(&self, held: usize) -> &[InstallmentRecord] {
        &self.records[held.min(self.records.len())..]
    }

    pub fn records(&self) -> &[InstallmentRecord] {
        &self.records
    }
    pub fn into_records(self) -> Vec<InstallmentRecord> {
        self.records
    }
    pub fn get(&self, id: &str) -> Option<&InstallmentRecord> {
        self.index.get(id).map(|&position| &self.records[position])
    }
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }
    pub fn len(&self) -> usize {
        self.records.len()
    }
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
    pub fn page_info(&self) -> Option<PageInfo> {
        self.last_page
    }
    /// True until a page reporting itself as the last one has been absorbed.
    pub fn has_more(&self) -> bool {
        match self.last_page {
            Some(info) => info.page < info.total_pages,
            None => true,
        }
    }
    /// The page number to request next, or `None` once everything is loaded.
    pub fn next_page(&self) -> Option<u32> {
        if !self.has_more() {
            return None;
        }
        Some(self.last_page.map_or(1, |info| info.page + 1))
    }
}
