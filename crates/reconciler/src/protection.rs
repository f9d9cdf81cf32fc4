//! Partial-failure filter
//!
//! Decides which unmatched destination records must survive the run.

use contracts::{Event, Origin, ProtectionReason};

/// Reason an unmatched destination event must not be deleted, if any.
///
/// Events without origin were added out-of-band; events whose origin group
/// (or individual upstream record) failed to refresh may still be valid.
pub fn protection_for<F>(event: &Event, fetch_failed: F) -> Option<ProtectionReason>
where
    F: Fn(&Origin) -> bool,
{
    match &event.origin {
        None => Some(ProtectionReason::NoOrigin),
        Some(origin) if fetch_failed(origin) => Some(ProtectionReason::FetchFailed {
            group_id: origin.group_id.clone(),
        }),
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_group(group: &str) -> Event {
        Event {
            id: Some("M2".into()),
            origin: Some(Origin::new(group, Some("900".into()))),
            ..Default::default()
        }
    }

    #[test]
    fn test_no_origin_is_protected() {
        let event = Event {
            id: Some("M2".into()),
            ..Default::default()
        };
        assert_eq!(
            protection_for(&event, |_| false),
            Some(ProtectionReason::NoOrigin)
        );
    }

    #[test]
    fn test_failed_group_is_protected() {
        let reason = protection_for(&from_group("L1"), |o| o.group_id == "L1");
        assert_eq!(
            reason,
            Some(ProtectionReason::FetchFailed {
                group_id: "L1".into()
            })
        );
    }

    #[test]
    fn test_healthy_group_is_not_protected() {
        assert_eq!(protection_for(&from_group("L2"), |o| o.group_id == "L1"), None);
    }
}
