//! Test-only helpers, not part of the public API.
#![cfg(test)]

use std::{env, fmt::Debug, str::FromStr};

/// Reads `name` from the environment and parses it as `T`, falling back to
/// `default` if unset or unparsable. Lets proptest case counts be scaled in
/// CI without touching test source, mirroring `cmd_util::env::env_config`
/// from the workspace this crate was grown out of.
pub fn env_config<T: Debug + FromStr>(name: &str, default: T) -> T
where
    <T as FromStr>::Err: Debug,
{
    env::var(name).ok().and_then(|s| T::from_str(&s).ok()).unwrap_or(default)
}
