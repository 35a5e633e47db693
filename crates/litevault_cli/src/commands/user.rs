//! Add-user command implementation.

use super::VaultOptions;

/// Creates a login, making sure the database and credential table exist.
pub fn run(options: &VaultOptions, username: &str, password: &str) -> Result<(), Box<dyn std::error::Error>> {
    if password.is_empty() {
        return Err("password must not be empty".into());
    }

    let vault = options.open()?;
    vault.ensure_available()?;
    vault.ensure_credential_table()?;

    if vault.ensure_user(username, password)? {
        println!("Created user {username}");
    } else {
        println!("User {username} already exists");
    }
    Ok(())
}
