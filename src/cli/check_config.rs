use anyhow::Context;
use std::path::Path;
use stevesmom_llm::RouterConfiguration;

pub async fn run(path: &Path) -> anyhow::Result<()> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;

    let config = RouterConfiguration::from_json(&text)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("{} is not a valid router configuration", path.display()))?;

    println!("✅ {} is valid", path.display());
    if let Some(policy) = &config.default_policy {
        println!("  default policy: {}", policy.strategy);
    }
    for (name, update) in &config.providers {
        let state = match update.enabled {
            Some(false) => "disabled",
            Some(true) => "enabled",
            None => "unchanged",
        };
        println!("  provider {name}: {state}");
    }
    Ok(())
}
