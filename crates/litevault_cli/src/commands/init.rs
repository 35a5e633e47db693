//! Init command implementation.

use super::VaultOptions;
use litevault_core::RecoveryReport;

/// Runs the recovery cascade and prints the transitions.
pub fn run(options: &VaultOptions, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let vault = options.open()?;
    let report = vault.ensure_available()?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print_text_output(&report),
    }
    Ok(())
}

fn print_text_output(report: &RecoveryReport) {
    for (step, transition) in report.transitions.iter().enumerate() {
        println!(
            "{:>2}. {:<22} -> {:<22} {}",
            step + 1,
            transition.from.to_string(),
            transition.to.to_string(),
            transition.reason
        );
    }
    println!();
    println!("Outcome: {:?}", report.outcome);
}
