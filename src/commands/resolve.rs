use anyhow::Result;

use crate::paths::resolve_sandbox_path;

pub fn run(path: &str) -> Result<()> {
    println!("{}", resolve_sandbox_path(path));
    Ok(())
}
