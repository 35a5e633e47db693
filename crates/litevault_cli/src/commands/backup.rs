//! Backup and restore command implementations.

use super::VaultOptions;

/// Rotates generations from the current database.
pub fn run_backup(options: &VaultOptions) -> Result<(), Box<dyn std::error::Error>> {
    let vault = options.open()?;
    let outcome = vault.backup_now()?;

    println!("✓ Backup created successfully");
    println!("  Fingerprint: {}", outcome.fingerprint);
    println!("  Directory: {:?}", vault.local_generations().dir());
    if !outcome.remote_synced {
        println!("  Warning: remote rotation failed; only local generations were updated");
    }
    Ok(())
}

/// Restores the newest local generation.
pub fn run_restore(options: &VaultOptions) -> Result<(), Box<dyn std::error::Error>> {
    let vault = options.open()?;
    if !vault.restore_now()? {
        return Err(format!(
            "No backup available in {}",
            vault.local_generations().dir().display()
        )
        .into());
    }

    let state = vault.current_sync_state()?;
    println!("✓ Database restored successfully");
    println!("  Path: {:?}", options.db_path);
    if let Some(fingerprint) = state.fingerprint {
        println!("  Fingerprint: {fingerprint}");
    }
    Ok(())
}
