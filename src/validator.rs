//! Transition validation
//!
//! Turns a proposed status change plus the raw inputs a form collected into
//! either a [`ValidatedCommand`] or a structured rejection. Nothing here
//! performs I/O, reads the clock or retries; callers own dispatch.

use crate::command::{CommandPayload, ValidatedCommand};
use crate::error::ValidationError;
use crate::installment::{
    Amount, AmountParseError, FieldName, InstallmentRecord, PaymentMethod, Status, TimeStamp,
};
use crate::rules::{self, Decision, Rule};
use chrono::Utc;
use std::collections::BTreeMap;

/// Raw inputs keyed by field name, as a form or batch caller supplied them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldBag {
    values: BTreeMap<FieldName, String>,
}

impl FieldBag {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with(mut self, field: FieldName, value: impl Into<String>) -> Self {
        self.values.insert(field, value.into());
        self
    }
    pub fn insert(&mut self, field: FieldName, value: impl Into<String>) {
        self.values.insert(field, value.into());
    }
    pub fn remove(&mut self, field: FieldName) -> Option<String> {
        self.values.remove(&field)
    }
    /// Builds a bag from wire names such as `"paymentDate"`.
    pub fn from_pairs<'a>(
        pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, ValidationError> {
        let mut bag = Self::new();
        for (key, value) in pairs {
            bag.insert(key.parse()?, value);
        }
        Ok(bag)
    }
    /// The trimmed value, or `None` when absent or blank.
    pub fn get(&self, field: FieldName) -> Option<&str> {
        self.values
            .get(&field)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }
    /// The value exactly as supplied, or `None` when absent or blank.
    pub fn verbatim(&self, field: FieldName) -> Option<&str> {
        self.values
            .get(&field)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn allowed_rule(
    record: &InstallmentRecord,
    requested: Status,
) -> Result<&'static Rule, ValidationError> {
    match rules::lookup(record.status(), requested) {
        Decision::Allowed(rule) => Ok(rule),
        Decision::Rejected(_) => Err(ValidationError::UnknownTransition {
            from: record.status(),
            to: requested,
        }),
    }
}

fn parse_amount(field: FieldName, raw: &str) -> Result<Amount, ValidationError> {
    let value = raw.to_string();
    raw.parse::<Amount>().map_err(|err| match err {
        AmountParseError::NotANumber => ValidationError::InvalidNumber { field, value },
        AmountParseError::TooPrecise => ValidationError::InvalidPrecision { field, value },
    })
}

fn parse_date(field: FieldName, raw: &str) -> Result<TimeStamp<Utc>, ValidationError> {
    TimeStamp::parse(raw).ok_or_else(|| ValidationError::InvalidDate {
        field,
        value: raw.to_string(),
    })
}

// Writes one supplied field into the payload, parsing it on the way.
// Parsed fields are read trimmed; reference ids are kept as supplied.
fn normalise_field(
    payload: &mut CommandPayload,
    field: FieldName,
    fields: &FieldBag,
) -> Result<(), ValidationError> {
    let Some(raw) = fields.get(field) else {
        return Ok(());
    };
    match field {
        FieldName::PaymentDate => payload.payment_date = Some(parse_date(field, raw)?),
        FieldName::Amount => payload.amount = Some(parse_amount(field, raw)?),
        FieldName::PaymentMethod => payload.payment_method = Some(raw.parse::<PaymentMethod>()?),
        FieldName::PenaltyAmount => payload.penalty_amount = Some(parse_amount(field, raw)?),
        FieldName::PenaltyReason => payload.penalty_reason = Some(raw.to_string()),
        FieldName::PenaltyAppliedDate => {
            payload.penalty_applied_date = Some(parse_date(field, raw)?)
        }
        FieldName::TransactionId => {
            payload.transaction_id = fields.verbatim(field).map(str::to_string)
        }
        FieldName::CollectedBy => payload.collected_by = fields.verbatim(field).map(str::to_string),
    }
    Ok(())
}

fn command_for(rule: &Rule, record: &InstallmentRecord, payload: CommandPayload) -> ValidatedCommand {
    ValidatedCommand {
        from: record.status(),
        required: rule.required,
        payload,
        logic_note: format!("{} -> {}: {}", rule.from, rule.to, rule.note),
    }
}

/// Checks a proposed transition and builds the command for it.
///
/// Required fields are checked in table order and the first absent one is
/// reported. Then every supplied field, required or optional, is parsed in
/// canonical order and the first malformed one is reported.
pub fn validate(
    record: &InstallmentRecord,
    requested: Status,
    fields: &FieldBag,
) -> Result<ValidatedCommand, ValidationError> {
    let rule = allowed_rule(record, requested)?;

    if let Some(missing) = rule.required.iter().find(|field| fields.get(**field).is_none()) {
        return Err(ValidationError::MissingField(*missing));
    }

    let mut payload = CommandPayload::new(record.id(), requested);
    for field in FieldName::ALL {
        normalise_field(&mut payload, field, fields)?;
    }

    Ok(command_for(rule, record, payload))
}

/// Same contract as [`validate`] but collects every problem instead of
/// stopping at the first, so a form can mark all bad inputs at once.
pub fn validate_all(
    record: &InstallmentRecord,
    requested: Status,
    fields: &FieldBag,
) -> Result<ValidatedCommand, Vec<ValidationError>> {
    let rule = allowed_rule(record, requested).map_err(|err| vec![err])?;

    let mut errors: Vec<ValidationError> = rule
        .required
        .iter()
        .filter(|field| fields.get(**field).is_none())
        .map(|field| ValidationError::MissingField(*field))
        .collect();

    let mut payload = CommandPayload::new(record.id(), requested);
    for field in FieldName::ALL {
        if let Err(err) = normalise_field(&mut payload, field, fields) {
            errors.push(err);
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(command_for(rule, record, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: Status) -> InstallmentRecord {
        let due = TimeStamp::new_with(2024, 7, 1, 0, 0, 0).unwrap();
        InstallmentRecord::new("inst_1", "loan_1", 3, due, Amount::from_minor(250_000))
            .with_confirmed_status(status)
    }

    #[test]
    fn blank_values_count_as_missing() {
        let fields = FieldBag::new()
            .with(FieldName::PaymentDate, "   ")
            .with(FieldName::PaymentMethod, "cash");

        let err = validate(&record(Status::Pending), Status::Paid, &fields).unwrap_err();
        assert_eq!(err, ValidationError::MissingField(FieldName::PaymentDate));
    }

    #[test]
    fn optional_fields_are_recorded_verbatim() {
        let fields = FieldBag::new()
            .with(FieldName::PaymentDate, "2024-06-30")
            .with(FieldName::PaymentMethod, "Bank Transfer")
            .with(FieldName::TransactionId, " TXN-0042 ")
            .with(FieldName::CollectedBy, "agent_7 ");

        let cmd = validate(&record(Status::Pending), Status::Paid, &fields).unwrap();
        assert_eq!(cmd.payload.transaction_id.as_deref(), Some(" TXN-0042 "));
        assert_eq!(cmd.payload.collected_by.as_deref(), Some("agent_7 "));
        assert_eq!(cmd.payload.payment_method, Some(PaymentMethod::BankTransfer));
        assert!(cmd.logic_note.starts_with("Pending -> Paid"));
    }

    #[test]
    fn blank_transaction_id_is_dropped() {
        let fields = FieldBag::new()
            .with(FieldName::PaymentDate, "2024-06-30")
            .with(FieldName::PaymentMethod, "cash")
            .with(FieldName::TransactionId, "  ");

        let cmd = validate(&record(Status::Pending), Status::Paid, &fields).unwrap();
        assert!(cmd.payload.transaction_id.is_none());
    }

    #[test]
    fn third_decimal_place_is_a_precision_error() {
        let fields = FieldBag::new()
            .with(FieldName::PaymentDate, "2024-06-30")
            .with(FieldName::PaymentMethod, "cash")
            .with(FieldName::Amount, "100.125");

        let err = validate(&record(Status::Pending), Status::Paid, &fields).unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidPrecision {
                field: FieldName::Amount,
                value: "100.125".into()
            }
        );
        assert_eq!(err.field(), Some(FieldName::Amount));
    }

    #[test]
    fn negative_optional_amount_is_rejected() {
        let fields = FieldBag::new()
            .with(FieldName::PaymentDate, "2024-06-30")
            .with(FieldName::PaymentMethod, "cash")
            .with(FieldName::Amount, "-10");

        let err = validate(&record(Status::Pending), Status::Paid, &fields).unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidNumber {
                field: FieldName::Amount,
                value: "-10".into()
            }
        );
    }

    #[test]
    fn validate_all_reports_every_problem() {
        let fields = FieldBag::new()
            .with(FieldName::PaymentMethod, "barter")
            .with(FieldName::PenaltyAmount, "abc");

        let errors = validate_all(&record(Status::Overdue), Status::Paid, &fields).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::MissingField(FieldName::PaymentDate),
                ValidationError::MissingField(FieldName::Amount),
                ValidationError::InvalidPaymentMethod("barter".into()),
                ValidationError::InvalidNumber {
                    field: FieldName::PenaltyAmount,
                    value: "abc".into()
                },
            ]
        );
    }

    #[test]
    fn from_pairs_rejects_unknown_names() {
        let err = FieldBag::from_pairs([("paymentDate", "2024-06-30"), ("tip", "5")]).unwrap_err();
        assert_eq!(err, ValidationError::UnknownField("tip".into()));

        let bag = FieldBag::from_pairs([("penaltyReason", "late")]).unwrap();
        assert_eq!(bag.get(FieldName::PenaltyReason), Some("late"));
    }
}
