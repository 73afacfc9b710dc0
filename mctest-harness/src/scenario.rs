//! Behavioral scenarios driven against a live server instance.
//!
//! Each scenario starts its own auto-port instance, wires up a client
//! pool and a sideband probe, asserts, and tears everything down on
//! every exit path (pass, assertion failure, or probe timeout). Failed
//! assertions name the scenario, the instance, and the key involved.

use std::time::Duration;

use mctest_core::config::Config;
use mctest_core::error::{McTestError, Result};
use mctest_core::program::resolve_program;
use mctest_core::strings::{new_test_pair, new_test_strings};
use mctest_protocol::{MetaInfo, Origin};
use tracing::info;

use crate::client::McClient;
use crate::instance::ServerInstance;
use crate::probe::SidebandProbe;
use crate::supervisor::Supervisor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    Set,
    NotPresent,
    Arith,
    SetWithExptime,
}

impl Scenario {
    pub const ALL: [Scenario; 4] = [
        Scenario::Set,
        Scenario::NotPresent,
        Scenario::Arith,
        Scenario::SetWithExptime,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Scenario::Set => "set",
            Scenario::NotPresent => "not-present",
            Scenario::Arith => "arith",
            Scenario::SetWithExptime => "set-with-exptime",
        }
    }
}

/// Run one scenario end to end against a freshly launched instance.
pub async fn run(kind: Scenario, config: &Config) -> Result<()> {
    let program = match &config.server.program {
        Some(path) => path.clone(),
        None => resolve_program(None, "memcached")?,
    };

    let supervisor = Supervisor::new(&config.server);
    let mut instance = ServerInstance::new("memcached", program);
    supervisor.start(&mut instance).await?;

    let result = drive(kind, config, &instance).await;
    let stopped = supervisor.stop(&mut instance).await;
    result.and(stopped)
}

async fn drive(kind: Scenario, config: &Config, instance: &ServerInstance) -> Result<()> {
    let ctx = Ctx {
        scenario: kind.name(),
        instance: instance.name(),
    };
    let port = instance
        .port()
        .ok_or_else(|| McTestError::Client("started instance has no bound port".to_string()))?;
    let address = format!("127.0.0.1:{}", port);

    let mut mc = McClient::new("default");
    mc.add_serverpool("wildcard");
    mc.default_serverpool = Some("wildcard".to_string());
    mc.add_server(address.clone());
    mc.add_accesspoint(address.clone(), "127.0.0.1", port);
    mc.serverpool_add_server("wildcard", &address)?;

    let timeout = Duration::from_secs(config.probe.timeout_secs);
    let mut probe = SidebandProbe::connect("127.0.0.1", port, timeout).await?;

    info!(scenario = kind.name(), port, "running scenario");
    let result = match kind {
        Scenario::Set => set_scenario(&ctx, &mut mc, &mut probe).await,
        Scenario::NotPresent => not_present_scenario(&ctx, &mut mc, &mut probe).await,
        Scenario::Arith => arith_scenario(&ctx, &mut mc, &mut probe).await,
        Scenario::SetWithExptime => set_with_exptime_scenario(&ctx, &mut mc, &mut probe).await,
    };

    let closed = probe.close().await;
    result.and(closed)
}

struct Ctx<'a> {
    scenario: &'a str,
    instance: &'a str,
}

impl Ctx<'_> {
    fn check(&self, cond: bool, key: &str, detail: impl AsRef<str>) -> Result<()> {
        if cond {
            Ok(())
        } else {
            Err(McTestError::Assertion(format!(
                "{} on {}: key {}: {}",
                self.scenario,
                self.instance,
                key,
                detail.as_ref()
            )))
        }
    }

    fn expect_found(&self, key: &str, meta: MetaInfo) -> Result<(u64, u64, Origin)> {
        match meta {
            MetaInfo::Found {
                age,
                exptime,
                origin,
            } => Ok((age, exptime, origin)),
            MetaInfo::NotFound => Err(McTestError::Assertion(format!(
                "{} on {}: key {}: expected metainfo, got NotFound",
                self.scenario, self.instance, key
            ))),
        }
    }
}

/// Freshly written keys report near-zero age, no expiry, and a local
/// (or untracked) writer.
async fn set_scenario(ctx: &Ctx<'_>, mc: &mut McClient, probe: &mut SidebandProbe) -> Result<()> {
    let (key, value) = new_test_pair();
    mc.set(&key, &value).await?;

    let fetched = mc.get(&[&key]).await?;
    ctx.check(
        fetched.get(&key) == Some(&value),
        &key,
        "get did not round-trip the stored value",
    )?;
    ctx.check(mc.errors().is_none(), &key, "client reported soft errors")?;

    let (age, exptime, origin) = ctx.expect_found(&key, probe.get_metainfo(&key).await?)?;
    ctx.check(age <= 1, &key, format!("age {} right after set", age))?;
    ctx.check(exptime == 0, &key, format!("exptime {} with no expiry", exptime))?;
    ctx.check(origin.is_local(), &key, format!("unexpected origin {}", origin))?;
    Ok(())
}

/// A key never written probes as NotFound, not as an error.
async fn not_present_scenario(
    ctx: &Ctx<'_>,
    mc: &mut McClient,
    probe: &mut SidebandProbe,
) -> Result<()> {
    let (key, value) = new_test_pair();
    mc.set(&key, &value).await?;

    let absent_key = format!("{}Z", key);
    let meta = probe.get_metainfo(&absent_key).await?;
    ctx.check(
        meta == MetaInfo::NotFound,
        &absent_key,
        "metainfo for a never-written key",
    )?;

    // The written sibling is still there.
    let (age, _, _) = ctx.expect_found(&key, probe.get_metainfo(&key).await?)?;
    ctx.check(age <= 1, &key, format!("age {} right after set", age))?;
    Ok(())
}

/// Incrementing refreshes the metadata: age restarts from the incr, and
/// the value stays non-expiring.
async fn arith_scenario(ctx: &Ctx<'_>, mc: &mut McClient, probe: &mut SidebandProbe) -> Result<()> {
    let key = new_test_strings(1, 8, 16).remove(0);
    mc.set(&key, "1").await?;

    tokio::time::sleep(Duration::from_secs(5)).await;

    let value = mc.incr(&key, 15).await?;
    ctx.check(value == 16, &key, format!("incr returned {}", value))?;

    let (age, exptime, origin) = ctx.expect_found(&key, probe.get_metainfo(&key).await?)?;
    ctx.check(age <= 1, &key, format!("age {} right after incr", age))?;
    ctx.check(exptime == 0, &key, format!("exptime {} with no expiry", exptime))?;
    ctx.check(origin.is_local(), &key, format!("unexpected origin {}", origin))?;
    Ok(())
}

/// An explicit expiry shows up in the metainfo.
async fn set_with_exptime_scenario(
    ctx: &Ctx<'_>,
    mc: &mut McClient,
    probe: &mut SidebandProbe,
) -> Result<()> {
    let (key, value) = new_test_pair();
    mc.set_with_exptime(&key, &value, 15).await?;

    let (age, exptime, origin) = ctx.expect_found(&key, probe.get_metainfo(&key).await?)?;
    ctx.check(age <= 1, &key, format!("age {} right after set", age))?;
    ctx.check(
        exptime >= 15,
        &key,
        format!("exptime {} below requested 15", exptime),
    )?;
    ctx.check(origin.is_local(), &key, format!("unexpected origin {}", origin))?;
    Ok(())
}
