//! Installment records and the closed vocabularies they are built from
use crate::command::ValidatedCommand;
use crate::error::ValidationError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::fmt;
use std::str::FromStr;

#[derive(
    minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub enum Status {
    #[n(0)]
    Pending,
    #[n(1)]
    Paid,
    #[n(2)]
    PartiallyPaid,
    #[n(3)]
    Overdue,
    #[n(4)]
    AdvancePaid,
    #[n(5)]
    OverduePaid,
    #[n(6)]
    Waived,
}

#[derive(
    minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub enum PaymentMethod {
    #[n(0)]
    Cash,
    #[n(1)]
    Cheque,
    #[n(2)]
    BankTransfer,
    #[n(3)]
    Upi,
    #[n(4)]
    Card,
    #[n(5)]
    Online,
}

/// Names of the inputs a transition may carry. Declaration order is the
/// canonical order used when normalising a field bag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldName {
    PaymentDate,
    Amount,
    PaymentMethod,
    PenaltyAmount,
    PenaltyReason,
    PenaltyAppliedDate,
    TransactionId,
    CollectedBy,
}

/// Money in minor units (two decimal places). Never negative.
#[derive(
    minicbor::Encode,
    minicbor::Decode,
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
)]
#[cbor(array)]
pub struct Amount(#[n(0)] u64);

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Penalty {
    #[n(0)]
    pub amount: Amount,
    #[n(1)]
    pub reason: String,
    #[n(2)]
    pub applied_date: TimeStamp<Utc>,
}

// one recorded payment event. entries are never edited once pushed
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct RepaymentEntry {
    #[n(0)]
    pub amount: Amount,
    #[n(1)]
    pub payment_date: TimeStamp<Utc>,
    #[n(2)]
    pub payment_method: Option<PaymentMethod>,
    #[n(3)]
    pub status: Status,
    #[n(4)]
    pub transaction_id: Option<String>,
    #[n(5)]
    pub collected_by: Option<String>,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct InstallmentRecord {
    #[n(0)]
    id: String,
    #[n(1)]
    loan_id: String, // back reference only, the loan lives elsewhere
    #[n(2)]
    due_date: TimeStamp<Utc>,
    #[n(3)]
    installment_number: u32,
    #[n(4)]
    amount: Amount,
    #[n(5)]
    original_amount: Amount,
    #[n(6)]
    status: Status,
    #[n(7)]
    penalty: Option<Penalty>,
    #[n(8)]
    repayments: Vec<RepaymentEntry>,
    #[n(9)]
    logic_note: Option<String>,
}

/// Why a confirmed command could not be applied to a record.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    #[error("command targets installment {command} but was applied to {record}")]
    WrongInstallment { record: String, command: String },
    #[error("command was validated against {expected} but the record is now {actual}")]
    StatusMoved { expected: Status, actual: Status },
}

impl Status {
    pub const ALL: [Status; 7] = [
        Status::Pending,
        Status::Paid,
        Status::PartiallyPaid,
        Status::Overdue,
        Status::AdvancePaid,
        Status::OverduePaid,
        Status::Waived,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Status::Pending => "Pending",
            Status::Paid => "Paid",
            Status::PartiallyPaid => "PartiallyPaid",
            Status::Overdue => "Overdue",
            Status::AdvancePaid => "AdvancePaid",
            Status::OverduePaid => "OverduePaid",
            Status::Waived => "Waived",
        }
    }
    /// True once nothing more is owed on the installment.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            Status::Paid | Status::AdvancePaid | Status::OverduePaid | Status::Waived
        )
    }
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 6] = [
        PaymentMethod::Cash,
        PaymentMethod::Cheque,
        PaymentMethod::BankTransfer,
        PaymentMethod::Upi,
        PaymentMethod::Card,
        PaymentMethod::Online,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Cash",
            PaymentMethod::Cheque => "Cheque",
            PaymentMethod::BankTransfer => "BankTransfer",
            PaymentMethod::Upi => "Upi",
            PaymentMethod::Card => "Card",
            PaymentMethod::Online => "Online",
        }
    }
}

impl FieldName {
    pub const ALL: [FieldName; 8] = [
        FieldName::PaymentDate,
        FieldName::Amount,
        FieldName::PaymentMethod,
        FieldName::PenaltyAmount,
        FieldName::PenaltyReason,
        FieldName::PenaltyAppliedDate,
        FieldName::TransactionId,
        FieldName::CollectedBy,
    ];

    /// The wire name used by form layers and the remote API.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldName::PaymentDate => "paymentDate",
            FieldName::Amount => "amount",
            FieldName::PaymentMethod => "paymentMethod",
            FieldName::PenaltyAmount => "penaltyAmount",
            FieldName::PenaltyReason => "penaltyReason",
            FieldName::PenaltyAppliedDate => "penaltyAppliedDate",
            FieldName::TransactionId => "transactionId",
            FieldName::CollectedBy => "collectedBy",
        }
    }
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldName::Amount | FieldName::PenaltyAmount)
    }
    pub fn is_date(&self) -> bool {
        matches!(self, FieldName::PaymentDate | FieldName::PenaltyAppliedDate)
    }
}

// Lowercases and drops separators so "PARTIALLY_PAID", "Partially Paid"
// and "partiallyPaid" all compare equal.
fn squash(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = squash(s);
        Status::ALL
            .into_iter()
            .find(|status| squash(status.label()) == key)
            .ok_or_else(|| format!("unknown installment status {s:?}"))
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = squash(s);
        PaymentMethod::ALL
            .into_iter()
            .find(|method| squash(method.label()) == key)
            .ok_or_else(|| ValidationError::InvalidPaymentMethod(s.to_string()))
    }
}

impl FromStr for FieldName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldName::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownField(s.to_string()))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Amount {
    pub const fn from_minor(minor: u64) -> Self {
        Self(minor)
    }
    pub fn minor_units(&self) -> u64 {
        self.0
    }
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }
}

/// Why a string is not an [`Amount`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountParseError {
    /// Not a plain non-negative decimal, or too large for minor units.
    NotANumber,
    /// A valid decimal with more fractional digits than minor units hold.
    TooPrecise,
}

impl FromStr for Amount {
    type Err = AmountParseError;

    /// Accepts plain decimals with at most two fractional digits. Signs,
    /// exponents and separators are rejected, so "-5" never parses.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (whole, frac) = match s.split_once('.') {
            Some((whole, frac)) => (whole, frac),
            None => (s, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(AmountParseError::NotANumber);
        }
        if !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
            return Err(AmountParseError::NotANumber);
        }
        if frac.len() > 2 {
            return Err(AmountParseError::TooPrecise);
        }

        let whole: u64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| AmountParseError::NotANumber)?
        };
        let mut cents: u64 = if frac.is_empty() {
            0
        } else {
            frac.parse().map_err(|_| AmountParseError::NotANumber)?
        };
        if frac.len() == 1 {
            cents *= 10;
        }

        whole
            .checked_mul(100)
            .and_then(|minor| minor.checked_add(cents))
            .map(Amount)
            .ok_or(AmountParseError::NotANumber)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Option<Self> {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .single()
            .map(Self)
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }
    /// Reads RFC 3339, `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DD`. Forms without an
    /// offset are taken as UTC so the result is always an absolute instant.
    pub fn parse(raw: &str) -> Option<Self> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(Self(dt.with_timezone(&Utc)));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
            return Some(Self(naive.and_utc()));
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| Self(naive.and_utc()))
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

impl InstallmentRecord {
    /// A freshly scheduled installment. It starts `Pending` with `amount`
    /// equal to the scheduled EMI.
    pub fn new(
        id: impl Into<String>,
        loan_id: impl Into<String>,
        installment_number: u32,
        due_date: TimeStamp<Utc>,
        original_amount: Amount,
    ) -> Self {
        Self {
            id: id.into(),
            loan_id: loan_id.into(),
            due_date,
            installment_number,
            amount: original_amount,
            original_amount,
            status: Status::Pending,
            penalty: None,
            repayments: vec![],
            logic_note: None,
        }
    }
    /// Hydrates the status from a confirmed server snapshot. Only meant for
    /// building records out of fetched pages; local changes go through
    /// [`InstallmentRecord::apply_confirmed`].
    pub fn with_confirmed_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }
    pub fn with_confirmed_amount(mut self, amount: Amount) -> Self {
        self.amount = amount;
        self
    }
    pub fn with_confirmed_penalty(mut self, penalty: Penalty) -> Self {
        self.penalty = Some(penalty);
        self
    }
    pub fn with_confirmed_repayments(mut self, repayments: Vec<RepaymentEntry>) -> Self {
        self.repayments = repayments;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn loan_id(&self) -> &str {
        &self.loan_id
    }
    pub fn due_date(&self) -> &TimeStamp<Utc> {
        &self.due_date
    }
    pub fn installment_number(&self) -> u32 {
        self.installment_number
    }
    pub fn amount(&self) -> Amount {
        self.amount
    }
    pub fn original_amount(&self) -> Amount {
        self.original_amount
    }
    pub fn status(&self) -> Status {
        self.status
    }
    pub fn penalty(&self) -> Option<&Penalty> {
        self.penalty.as_ref()
    }
    pub fn repayments(&self) -> &[RepaymentEntry] {
        &self.repayments
    }
    pub fn logic_note(&self) -> Option<&str> {
        self.logic_note.as_deref()
    }
    /// Sum of every recorded payment, saturating on overflow.
    pub fn total_repaid(&self) -> Amount {
        self.repayments
            .iter()
            .fold(Amount::default(), |acc, entry| {
                acc.checked_add(entry.amount).unwrap_or(Amount(u64::MAX))
            })
    }

    /// Mirrors a command the executor has confirmed onto the local record.
    ///
    /// The status moves to the command's target and a supplied amount
    /// replaces `amount`. A penalty is set (superseding any earlier one) only
    /// when the rule required the penalty fields, and one repayment entry is
    /// appended only when the command collects a payment. Nothing is touched
    /// if the command belongs to another installment or was validated against
    /// a status the record no longer has.
    pub fn apply_confirmed(&mut self, command: &ValidatedCommand) -> Result<(), ApplyError> {
        let payload = &command.payload;

        if payload.id != self.id {
            return Err(ApplyError::WrongInstallment {
                record: self.id.clone(),
                command: payload.id.clone(),
            });
        }
        if command.from != self.status {
            return Err(ApplyError::StatusMoved {
                expected: command.from,
                actual: self.status,
            });
        }

        if let Some(amount) = payload.amount {
            self.amount = amount;
        }

        if command.introduces_penalty() {
            if let (Some(amount), Some(reason), Some(applied_date)) = (
                payload.penalty_amount,
                payload.penalty_reason.as_ref(),
                payload.penalty_applied_date.as_ref(),
            ) {
                self.penalty = Some(Penalty {
                    amount,
                    reason: reason.clone(),
                    applied_date: applied_date.clone(),
                });
            }
        }

        // rules without an amount (Pending -> Paid/AdvancePaid) settle at the scheduled amount
        if command.records_payment() {
            if let Some(payment_date) = payload.payment_date.as_ref() {
                self.repayments.push(RepaymentEntry {
                    amount: payload.amount.unwrap_or(self.amount),
                    payment_date: payment_date.clone(),
                    payment_method: payload.payment_method,
                    status: payload.status,
                    transaction_id: payload.transaction_id.clone(),
                    collected_by: payload.collected_by.clone(),
                });
            }
        }

        self.status = payload.status;
        self.logic_note = Some(command.logic_note.clone());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_encoding() {
        let original = TimeStamp::new();

        let encoding = minicbor::to_vec(original.clone()).unwrap();
        let decode: TimeStamp<Utc> = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn amount_parsing() {
        assert_eq!("100".parse::<Amount>(), Ok(Amount(10_000)));
        assert_eq!("100.5".parse::<Amount>(), Ok(Amount(10_050)));
        assert_eq!("0.07".parse::<Amount>(), Ok(Amount(7)));
        assert_eq!(".5".parse::<Amount>(), Ok(Amount(50)));
        assert!("-5".parse::<Amount>().is_err());
        assert!("1e3".parse::<Amount>().is_err());
        assert_eq!("1.234".parse::<Amount>(), Err(AmountParseError::TooPrecise));
        assert_eq!("-1.234".parse::<Amount>(), Err(AmountParseError::NotANumber));
        assert!(".".parse::<Amount>().is_err());
        assert!("99999999999999999999".parse::<Amount>().is_err());
        assert_eq!(Amount(10_050).to_string(), "100.50");
    }

    #[test]
    fn status_parses_server_spellings() {
        assert_eq!("PARTIALLY_PAID".parse::<Status>(), Ok(Status::PartiallyPaid));
        assert_eq!("Overdue Paid".parse::<Status>(), Ok(Status::OverduePaid));
        assert_eq!("advance-paid".parse::<Status>(), Ok(Status::AdvancePaid));
        assert!("settled".parse::<Status>().is_err());
    }

    #[test]
    fn dates_normalise_to_utc() {
        let offset = TimeStamp::parse("2024-06-15T10:30:00+05:30").unwrap();
        let utc = TimeStamp::new_with(2024, 6, 15, 5, 0, 0).unwrap();
        assert_eq!(offset, utc);

        let day = TimeStamp::parse("2024-06-15").unwrap();
        assert_eq!(day, TimeStamp::new_with(2024, 6, 15, 0, 0, 0).unwrap());
        assert!(TimeStamp::parse("15/06/2024").is_none());
    }

    #[test]
    fn record_encoding() {
        let due = TimeStamp::new_with(2024, 7, 1, 0, 0, 0).unwrap();
        let record = InstallmentRecord::new("inst_1", "loan_1", 1, due, Amount(500_000))
            .with_confirmed_status(Status::Overdue);

        let encoding = minicbor::to_vec(&record).unwrap();
        let decode: InstallmentRecord = minicbor::decode(&encoding).unwrap();

        assert_eq!(record, decode);
    }
}
