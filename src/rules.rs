//! The transition rule table
//!
//! Which status changes are permitted, and which fields each one needs,
//! depends on both endpoints. Reaching `AdvancePaid` from `Paid` needs only
//! a date while reaching it from `Pending` also needs a payment method, so
//! the table is keyed on the ordered `(from, to)` pair rather than on the
//! destination alone. Every pair not listed here is rejected.

use crate::installment::{FieldName, Status};

pub const REJECTED_REASON: &str = "transition not permitted";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub from: Status,
    pub to: Status,
    /// Required inputs in the order they are checked and reported.
    pub required: &'static [FieldName],
    /// Human readable summary, carried on the command as its logic note.
    pub note: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allowed(&'static Rule),
    Rejected(&'static str),
}

use FieldName::*;

const PAYMENT: &[FieldName] = &[PaymentDate, Amount, PaymentMethod];
const DATED_METHOD: &[FieldName] = &[PaymentDate, PaymentMethod];
const PENALTY: &[FieldName] = &[PenaltyAmount, PenaltyReason, PenaltyAppliedDate];
const AMOUNT_AND_PENALTY: &[FieldName] =
    &[Amount, PenaltyAmount, PenaltyReason, PenaltyAppliedDate];
const REVERSAL: &[FieldName] = &[
    PaymentDate,
    Amount,
    PenaltyAmount,
    PenaltyReason,
    PenaltyAppliedDate,
];
const DATED_AMOUNT: &[FieldName] = &[PaymentDate, Amount];

pub const RULES: &[Rule] = &[
    Rule {
        from: Status::Pending,
        to: Status::PartiallyPaid,
        required: PAYMENT,
        note: "pending installment received a part payment",
    },
    Rule {
        from: Status::Pending,
        to: Status::OverduePaid,
        required: PAYMENT,
        note: "pending installment settled after its due date",
    },
    Rule {
        from: Status::Pending,
        to: Status::Overdue,
        required: PENALTY,
        note: "pending installment marked overdue, penalty applied",
    },
    Rule {
        from: Status::Pending,
        to: Status::Paid,
        required: DATED_METHOD,
        note: "pending installment paid in full at the scheduled amount",
    },
    Rule {
        from: Status::Pending,
        to: Status::AdvancePaid,
        required: DATED_METHOD,
        note: "pending installment paid ahead of its due date",
    },
    Rule {
        from: Status::Paid,
        to: Status::PartiallyPaid,
        required: REVERSAL,
        note: "paid installment reopened as partially paid, penalty applied on the shortfall",
    },
    Rule {
        from: Status::Paid,
        to: Status::AdvancePaid,
        required: &[PaymentDate],
        note: "paid installment reclassified as paid in advance, only the date changes",
    },
    Rule {
        from: Status::PartiallyPaid,
        to: Status::Paid,
        required: DATED_AMOUNT,
        note: "remaining balance of a partial payment collected",
    },
    Rule {
        from: Status::PartiallyPaid,
        to: Status::Overdue,
        required: AMOUNT_AND_PENALTY,
        note: "partially paid installment went overdue, penalty applied",
    },
    Rule {
        from: Status::PartiallyPaid,
        to: Status::OverduePaid,
        required: AMOUNT_AND_PENALTY,
        note: "partially paid installment settled late, penalty applied",
    },
    Rule {
        from: Status::PartiallyPaid,
        to: Status::AdvancePaid,
        required: DATED_AMOUNT,
        note: "remaining balance of a partial payment collected before the due date",
    },
    Rule {
        from: Status::Overdue,
        to: Status::Paid,
        required: PAYMENT,
        note: "overdue installment paid",
    },
    Rule {
        from: Status::Overdue,
        to: Status::PartiallyPaid,
        required: PAYMENT,
        note: "overdue installment received a part payment",
    },
    Rule {
        from: Status::Overdue,
        to: Status::AdvancePaid,
        required: PAYMENT,
        note: "overdue installment recorded as paid in advance",
    },
    Rule {
        from: Status::Overdue,
        to: Status::OverduePaid,
        required: PAYMENT,
        note: "overdue installment settled together with its penalty",
    },
];

impl Rule {
    /// Every field this rule accepts but does not require, in canonical order.
    pub fn optional(&self) -> Vec<FieldName> {
        FieldName::ALL
            .into_iter()
            .filter(|field| !self.required.contains(field))
            .collect()
    }
    pub fn requires(&self, field: FieldName) -> bool {
        self.required.contains(&field)
    }
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed(_))
    }
    pub fn rule(&self) -> Option<&'static Rule> {
        match self {
            Decision::Allowed(rule) => Some(rule),
            Decision::Rejected(_) => None,
        }
    }
}

pub fn rule(from: Status, to: Status) -> Option<&'static Rule> {
    RULES.iter().find(|rule| rule.from == from && rule.to == to)
}

/// Total over `Status x Status`.
pub fn lookup(from: Status, to: Status) -> Decision {
    match rule(from, to) {
        Some(rule) => Decision::Allowed(rule),
        None => Decision::Rejected(REJECTED_REASON),
    }
}

/// Statuses reachable from `from`, in table order. Empty for `Waived`.
pub fn next_statuses(from: Status) -> Vec<Status> {
    RULES
        .iter()
        .filter(|rule| rule.from == from)
        .map(|rule| rule.to)
        .collect()
}
