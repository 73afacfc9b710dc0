use anyhow::Result;
use mctest_core::config::Config;
use mctest_harness::{scenario, Scenario};
use tracing::{error, info};

/// Run the selected scenarios sequentially, reporting every failure.
///
/// A failed scenario does not stop the run; the process exits non-zero
/// if any scenario failed.
pub async fn run(scenarios: Vec<Scenario>, config: Config) -> Result<()> {
    let mut failures = Vec::new();

    for kind in scenarios {
        info!("Running scenario {}", kind.name());
        match scenario::run(kind, &config).await {
            Ok(()) => info!("Scenario {} passed", kind.name()),
            Err(e) => {
                error!("Scenario {} failed: {}", kind.name(), e);
                failures.push((kind.name(), e));
            }
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        let summary = failures
            .iter()
            .map(|(name, e)| format!("{}: {}", name, e))
            .collect::<Vec<_>>()
            .join("; ");
        anyhow::bail!("{} scenario(s) failed: {}", failures.len(), summary)
    }
}
