mod normalize;
mod source;

pub use normalize::{normalize_range, ticks, to_utc, Policy, WallClock};
pub use source::TimeSource;
