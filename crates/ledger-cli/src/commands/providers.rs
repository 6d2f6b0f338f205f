//! Provider status command

use anyhow::{anyhow, Context, Result};

use super::Engine;

pub async fn cmd_providers(engine: &Engine, user_id: Option<i64>) -> Result<()> {
    let user = match user_id {
        Some(id) => Some(
            engine
                .db
                .get_user(id)
                .context("Failed to load user")?
                .ok_or_else(|| anyhow!("User {} not found", id))?,
        ),
        None => None,
    };

    for status in engine.orchestrator.provider_status(user.as_ref()).await {
        let icon = if status.available { "✅" } else { "❌" };
        println!("{} {:<7} model {}", icon, status.kind.as_str(), status.model);
        if !status.models.is_empty() {
            println!("   installed: {}", status.models.join(", "));
        }
    }
    Ok(())
}
