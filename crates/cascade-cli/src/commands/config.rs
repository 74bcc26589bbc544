//! Config command

use std::path::Path;

use crate::context::{self, Overrides};
use crate::error::Result;

/// Print the effective configuration as TOML
pub fn run_config(path: &Path, overrides: &Overrides) -> Result<()> {
    let config = context::resolve_config(path, overrides)?;
    print!("{}", config.to_toml()?);
    Ok(())
}
