use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeZone, Utc};

use crate::{
    error::{Result, TemporalError},
    item::Timestamp,
};

/// Policy for resolving wall-clock inputs that lack an explicit UTC offset.
///
/// `spec.md` §4.2 and §9: existing behavior implies `AssumeUtc` as the
/// default; every constructor in this crate that accepts a `Policy` defaults
/// to it unless the caller overrides it explicitly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Policy {
    /// Offset-less input is rejected with [`TemporalError::UnspecifiedKind`].
    Reject,
    /// Offset-less input is stamped as UTC.
    #[default]
    AssumeUtc,
    /// Offset-less input is interpreted as local wall-clock time, then
    /// converted to UTC.
    AssumeLocal,
}

/// A wall-clock instant as it might arrive from a caller: either carrying an
/// explicit offset (always unambiguous) or naive (ambiguous without a
/// [`Policy`]).
#[derive(Clone, Copy, Debug)]
pub enum WallClock {
    WithOffset(DateTime<FixedOffset>),
    Naive(NaiveDateTime),
}

impl From<DateTime<Utc>> for WallClock {
    fn from(dt: DateTime<Utc>) -> Self {
        WallClock::WithOffset(dt.fixed_offset())
    }
}

impl From<NaiveDateTime> for WallClock {
    fn from(dt: NaiveDateTime) -> Self {
        WallClock::Naive(dt)
    }
}

/// Converts a possibly-ambiguous wall-clock input to a canonical UTC
/// [`Timestamp`] per `policy`.
pub fn to_utc(input: WallClock, policy: Policy) -> Result<Timestamp> {
    let utc = match input {
        WallClock::WithOffset(dt) => dt.with_timezone(&Utc),
        WallClock::Naive(naive) => match policy {
            Policy::Reject => return Err(TemporalError::UnspecifiedKind),
            Policy::AssumeUtc => DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc),
            Policy::AssumeLocal => Local
                .from_local_datetime(&naive)
                .single()
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc)),
        },
    };
    Ok(Timestamp::from_datetime(utc))
}

/// Normalizes a `[from, to]` range, failing [`TemporalError::InvalidRange`]
/// if `from > to` after normalization.
pub fn normalize_range(
    from: WallClock,
    to: WallClock,
    policy: Policy,
) -> Result<(Timestamp, Timestamp)> {
    let from = to_utc(from, policy)?;
    let to = to_utc(to, policy)?;
    if from > to {
        return Err(TemporalError::InvalidRange { from, to });
    }
    Ok((from, to))
}

/// Convenience: ticks of a normalized wall-clock input.
pub fn ticks(input: WallClock, policy: Policy) -> Result<i64> {
    to_utc(input, policy).map(|ts| ts.ticks())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn naive(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn offset_bearing_is_preserved_as_utc() {
        let dt = Utc::now();
        let ts = to_utc(dt.into(), Policy::Reject).unwrap();
        assert_eq!(ts, Timestamp::from_datetime(dt));
    }

    #[test]
    fn naive_input_rejected_under_reject_policy() {
        let n = naive(2024, 1, 1, 0, 0, 0);
        let err = to_utc(n.into(), Policy::Reject).unwrap_err();
        assert_eq!(err, TemporalError::UnspecifiedKind);
    }

    #[test]
    fn naive_input_stamped_utc_under_assume_utc() {
        let n = naive(2024, 1, 1, 0, 0, 0);
        let ts = to_utc(n.into(), Policy::AssumeUtc).unwrap();
        assert_eq!(ts, Timestamp::from_datetime(DateTime::from_naive_utc_and_offset(n, Utc)));
    }

    #[test]
    fn invalid_range_fails_after_normalization() {
        let early = naive(2024, 1, 1, 0, 0, 0);
        let late = naive(2024, 1, 2, 0, 0, 0);
        let err = normalize_range(late.into(), early.into(), Policy::AssumeUtc).unwrap_err();
        assert!(matches!(err, TemporalError::InvalidRange { .. }));
    }

    #[test]
    fn valid_range_normalizes() {
        let early = naive(2024, 1, 1, 0, 0, 0);
        let late = naive(2024, 1, 2, 0, 0, 0);
        let (f, t) = normalize_range(early.into(), late.into(), Policy::AssumeUtc).unwrap();
        assert!(f < t);
    }
}
