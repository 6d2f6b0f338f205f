//! User management commands

use anyhow::{bail, Context, Result};
use ledger_core::{Database, PreferredModel};

fn parse_model(model: &str) -> Result<PreferredModel> {
    model
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))
        .context("Valid models: gemini, ollama, hybrid, auto")
}

pub fn cmd_users_add(
    db: &Database,
    username: &str,
    email: &str,
    model: &str,
    ollama_url: Option<&str>,
) -> Result<()> {
    let preferred = parse_model(model)?;
    let id = db
        .create_user(username, email, preferred, ollama_url)
        .context("Failed to create user")?;

    println!("✅ Created user {} (id {}, model {})", username, id, preferred);
    Ok(())
}

pub fn cmd_users_list(db: &Database) -> Result<()> {
    let users = db.list_users().context("Failed to list users")?;
    if users.is_empty() {
        println!("No users yet. Create one with: ledger users add NAME EMAIL");
        return Ok(());
    }

    println!("{:>4}  {:<16} {:<28} {:<8} OLLAMA", "ID", "USERNAME", "EMAIL", "MODEL");
    for user in users {
        println!(
            "{:>4}  {:<16} {:<28} {:<8} {}",
            user.id,
            super::truncate(&user.username, 16),
            super::truncate(&user.email, 28),
            user.preferred_model,
            user.ollama_server_url.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

pub fn cmd_users_set_model(
    db: &Database,
    user_id: i64,
    model: &str,
    ollama_url: Option<&str>,
) -> Result<()> {
    let preferred = parse_model(model)?;
    if !db
        .set_ai_preferences(user_id, preferred, ollama_url)
        .context("Failed to update preferences")?
    {
        bail!("User {} not found", user_id);
    }

    println!("✅ User {} now uses {}", user_id, preferred);
    Ok(())
}
