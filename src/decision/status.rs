//! Consistency validation: a decision's status is derived from its agreements
//!
//! The backend reports both a status and per-participant agreements, and the
//! two disagree often enough that the status is recomputed rather than
//! trusted. Corrections are applied in place and reported, never rejected.

use super::types::{AgreementValue, Decision, Status};
use std::collections::BTreeMap;

/// Derive a status from agreement values.
///
/// `Not Present` entries are ignored. Returns `None` when nobody present
/// expressed a stance, in which case the existing status stands.
pub fn compute_status(agreements: &BTreeMap<String, AgreementValue>) -> Option<Status> {
    let present: Vec<AgreementValue> = agreements
        .values()
        .copied()
        .filter(|v| *v != AgreementValue::NotPresent)
        .collect();

    if present.is_empty() {
        return None;
    }

    if present.contains(&AgreementValue::No) {
        Some(Status::Unresolved)
    } else if present.contains(&AgreementValue::Partial) {
        Some(Status::NeedsClarification)
    } else if present.iter().all(|v| *v == AgreementValue::Yes) {
        Some(Status::Agreed)
    } else {
        Some(Status::NeedsClarification)
    }
}

/// A status rewrite performed by [`enforce_status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCorrection {
    pub title: String,
    pub meeting_reference: String,
    pub from: Status,
    pub to: Status,
}

/// Make `decision.status` agree with its agreements.
///
/// Returns the correction when the status had to change. Applying this
/// twice is the same as applying it once.
pub fn enforce_status(decision: &mut Decision) -> Option<StatusCorrection> {
    let expected = compute_status(&decision.agreements)?;
    if expected == decision.status {
        return None;
    }

    let correction = StatusCorrection {
        title: decision.title.clone(),
        meeting_reference: decision.meeting_reference.clone(),
        from: decision.status,
        to: expected,
    };

    tracing::warn!(
        title = %decision.title,
        from = %decision.status,
        to = %expected,
        "Fixed status inconsistency"
    );

    decision.status = expected;
    Some(correction)
}

/// Owned variant of [`enforce_status`].
pub fn validate(mut decision: Decision) -> (Decision, Option<StatusCorrection>) {
    let correction = enforce_status(&mut decision);
    (decision, correction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::types::Significance;
    use AgreementValue::*;

    fn decision(status: Status, agreements: &[(&str, AgreementValue)]) -> Decision {
        let mut d = Decision::new("Technical Architecture", Significance::CRITICAL, status, "Use Postgres");
        for (name, value) in agreements {
            d.agreements.insert(name.to_string(), *value);
        }
        d
    }

    fn validated_status(status: Status, agreements: &[(&str, AgreementValue)]) -> Status {
        validate(decision(status, agreements)).0.status
    }

    #[test]
    fn all_yes_is_agreed() {
        assert_eq!(
            validated_status(Status::Unresolved, &[("A", Yes), ("B", Yes)]),
            Status::Agreed
        );
    }

    #[test]
    fn yes_and_partial_needs_clarification() {
        assert_eq!(
            validated_status(Status::Agreed, &[("A", Yes), ("B", Partial)]),
            Status::NeedsClarification
        );
    }

    #[test]
    fn no_overrides_partial() {
        assert_eq!(
            validated_status(Status::NeedsClarification, &[("A", Partial), ("B", No)]),
            Status::Unresolved
        );
    }

    #[test]
    fn not_present_is_excluded() {
        assert_eq!(
            validated_status(Status::NeedsClarification, &[("A", Yes), ("B", NotPresent)]),
            Status::Agreed
        );
        assert_eq!(
            validated_status(Status::Agreed, &[("A", Partial), ("B", NotPresent)]),
            Status::NeedsClarification
        );
    }

    #[test]
    fn nobody_present_leaves_status_unchanged() {
        for status in [Status::Agreed, Status::NeedsClarification, Status::Unresolved] {
            assert_eq!(
                validated_status(status, &[("A", NotPresent), ("B", NotPresent)]),
                status
            );
            assert_eq!(validated_status(status, &[]), status);
        }
    }

    #[test]
    fn correction_is_reported() {
        let (d, correction) = validate(decision(Status::Agreed, &[("A", No)]));
        assert_eq!(d.status, Status::Unresolved);
        let correction = correction.expect("status should have been corrected");
        assert_eq!(correction.from, Status::Agreed);
        assert_eq!(correction.to, Status::Unresolved);
        assert_eq!(correction.title, "Use Postgres");
    }

    #[test]
    fn consistent_decision_is_untouched() {
        let (_, correction) = validate(decision(Status::NeedsClarification, &[("A", Partial)]));
        assert!(correction.is_none());
    }

    #[test]
    fn validation_is_idempotent() {
        let values = [Yes, Partial, No, NotPresent];
        let statuses = [Status::Agreed, Status::NeedsClarification, Status::Unresolved];
        for status in statuses {
            for a in values {
                for b in values {
                    let once = validate(decision(status, &[("A", a), ("B", b)])).0;
                    let (twice, second) = validate(once.clone());
                    assert_eq!(once, twice);
                    assert!(second.is_none());
                }
            }
        }
    }
}
