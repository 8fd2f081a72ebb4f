//! Validated status-change commands and the payload the executor receives
use crate::installment::{Amount, FieldName, PaymentMethod, Status, TimeStamp};
use chrono::Utc;

/// Normalised request body. Dates are absolute UTC instants and amounts are
/// minor units, so the executor never has to guess at a format.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct CommandPayload {
    #[n(0)]
    pub id: String, // installment id
    #[n(1)]
    pub status: Status,
    #[n(2)]
    pub amount: Option<Amount>,
    #[n(3)]
    pub payment_date: Option<TimeStamp<Utc>>,
    #[n(4)]
    pub payment_method: Option<PaymentMethod>,
    #[n(5)]
    pub penalty_amount: Option<Amount>,
    #[n(6)]
    pub penalty_reason: Option<String>,
    #[n(7)]
    pub penalty_applied_date: Option<TimeStamp<Utc>>,
    #[n(8)]
    pub transaction_id: Option<String>,
    #[n(9)]
    pub collected_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCommand {
    /// Status the record held when the command was validated.
    pub from: Status,
    /// Fields the firing rule required, in table order.
    pub required: &'static [FieldName],
    pub payload: CommandPayload,
    pub logic_note: String,
}

impl CommandPayload {
    pub fn new(id: impl Into<String>, status: Status) -> Self {
        Self {
            id: id.into(),
            status,
            amount: None,
            payment_date: None,
            payment_method: None,
            penalty_amount: None,
            penalty_reason: None,
            penalty_applied_date: None,
            transaction_id: None,
            collected_by: None,
        }
    }
}

impl ValidatedCommand {
    pub fn installment_id(&self) -> &str {
        &self.payload.id
    }
    pub fn status(&self) -> Status {
        self.payload.status
    }
    pub fn requires(&self, field: FieldName) -> bool {
        self.required.contains(&field)
    }
    /// Only rules that demand the penalty fields may set a penalty. Penalty
    /// inputs supplied as optional extras go to the executor but are not
    /// mirrored locally.
    pub fn introduces_penalty(&self) -> bool {
        self.requires(FieldName::PenaltyAmount)
    }
    /// True when the command collects money: the rule demands a payment date
    /// and the installment was still owed. Moves out of a settled status
    /// (reclassification, reversal) record no new repayment.
    pub fn records_payment(&self) -> bool {
        self.requires(FieldName::PaymentDate) && !self.from.is_settled()
    }
    // encodes the payload to cbor and returns its sha256 alongside the bytes
    pub fn build(&self) -> anyhow::Result<(String, Vec<u8>)> {
        let cbor = minicbor::to_vec(&self.payload)?;
        let hash = sha256::digest(&cbor);

        Ok((hash, cbor))
    }
}
