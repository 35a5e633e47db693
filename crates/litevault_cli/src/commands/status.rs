//! Status command implementation.

use super::VaultOptions;
use litevault_core::StatusReport;

/// Prints the status report.
pub fn run(options: &VaultOptions, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let vault = options.open()?;
    let status = vault.status()?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&status)?),
        _ => print_text_output(&status),
    }
    Ok(())
}

fn print_text_output(status: &StatusReport) {
    println!("LiteVault Status");
    println!("================");
    println!();
    println!("Database: {}", status.db_path.display());
    match status.size {
        Some(size) if status.exists => println!("  Size:  {}", format_size(size)),
        _ => println!("  (missing)"),
    }
    match status.user_count {
        Some(count) => println!("  Users: {count}"),
        None => println!("  Users: unavailable"),
    }
    println!();
    println!("Sync state:");
    match &status.sync_state.fingerprint {
        Some(fingerprint) => println!("  Last hash:      {fingerprint}"),
        None => println!("  Last hash:      never synced"),
    }
    if let Some(timestamp) = status.sync_state.timestamp {
        println!("  Last timestamp: {timestamp:.3}");
    }
    println!();
    println!("Local generations:");
    if status.generations.is_empty() {
        println!("  (none)");
    }
    for generation in &status.generations {
        println!(
            "  [{}] {} ({})",
            generation.slot,
            generation.path.display(),
            format_size(generation.size)
        );
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} bytes")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
