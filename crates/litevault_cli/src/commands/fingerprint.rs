//! Fingerprint command implementation.

use std::path::Path;

/// Prints the fingerprint of `file` in `sha256sum` layout.
pub fn run(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let fingerprint = litevault_core::fingerprint(file)?;
    println!("{}  {}", fingerprint, file.display());
    Ok(())
}
