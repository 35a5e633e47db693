//! Verify command implementation.

use super::VaultOptions;
use litevault_core::validate;

/// Checks the database file. Fails (non-zero exit) if it is missing or
/// invalid; the file is never repaired here.
pub fn run(options: &VaultOptions) -> Result<(), Box<dyn std::error::Error>> {
    let config = options.config();
    println!("Verifying database at {:?}", config.db_path);

    if !config.db_path.is_file() {
        return Err(format!("No database found at {:?}", config.db_path).into());
    }
    validate(&config.db_path, &config.required_tables, config.busy_timeout)?;

    println!("✓ Database is valid");
    println!("  Required tables: {}", config.required_tables.join(", "));
    Ok(())
}
