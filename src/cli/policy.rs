use anyhow::Context;
use stevesmom_llm::RouterSettings;
use tracing::info;

pub fn run() -> anyhow::Result<()> {
    let settings = RouterSettings::from_env().context("failed to read router settings")?;
    let policy = settings.default_policy();
    policy
        .validate()
        .context("environment describes an invalid routing policy")?;

    info!(strategy = %policy.strategy, "Resolved default routing policy");
    println!("{}", serde_json::to_string_pretty(&policy)?);
    Ok(())
}
