//! Command handlers grouped by subcommand.

pub(crate) mod copy;
pub(crate) mod volumes;
