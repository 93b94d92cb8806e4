//! Forms groups from a string of role tags, one thread per tag.
//!
//! ```text
//! bond OOHHHH
//! bond ABBABB --spec '{"A":1,"B":2}'
//! bond HHHO --timeout-ms 200
//! bond HHOHHO --config bonding.json
//! ```
//!
//! Each released group is printed on its own line, in the order its members
//! ran their sinks. Set `RUST_LOG=bondgate=trace` to watch the barrier.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use std::{fs, thread};

use anyhow::{anyhow, bail, Context, Result};
use bondgate::{BondError, BondingConfig, GroupSpec, Recorder};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bond")]
#[command(about = "Release threads only in complete role groups", long_about = None)]
struct Cli {
    /// One character per thread, each naming that thread's role
    roles: String,

    /// Group spec as a JSON object of role counts [default: {"H":2,"O":1}]
    #[arg(long, conflicts_with = "config")]
    spec: Option<String>,

    /// JSON file holding a spec and barrier settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Give up on an incomplete group after this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
}

impl Cli {
    fn bonding_config(&self) -> Result<BondingConfig<char>> {
        if let Some(json) = &self.spec {
            let spec: GroupSpec<char> = serde_json::from_str(json)
                .with_context(|| format!("invalid group spec {json}"))?;
            return Ok(BondingConfig::new(spec));
        }
        if let Some(path) = &self.config {
            let json = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            return BondingConfig::from_json(&json)
                .with_context(|| format!("invalid config in {}", path.display()));
        }
        Ok(BondingConfig::new(GroupSpec::new([('H', 2), ('O', 1)])?))
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Rejects role strings that could never drain without a timeout.
fn check_roles(spec: &GroupSpec<char>, roles: &[char], timeout: Option<Duration>) -> Result<()> {
    let mut tally: HashMap<char, usize> = HashMap::new();
    for &role in roles {
        if !spec.contains(role) {
            bail!("role {role:?} is not part of the group spec");
        }
        *tally.entry(role).or_default() += 1;
    }

    if timeout.is_some() {
        return Ok(());
    }
    let groups = roles.len() / spec.size();
    for (role, required) in spec.iter() {
        let have = tally.get(&role).copied().unwrap_or(0);
        if have != groups * required || roles.len() % spec.size() != 0 {
            bail!(
                "roles do not split into complete groups ({role:?}: {have}); \
                 pass --timeout-ms to run anyway"
            );
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.bonding_config()?;
    let roles: Vec<char> = cli.roles.chars().collect();
    let timeout = cli.timeout();
    check_roles(&config.spec, &roles, timeout)?;

    let barrier = config.build();
    let log = Recorder::new();

    let outcomes = thread::scope(|s| {
        let handles: Vec<_> = roles
            .iter()
            .map(|&role| {
                let (barrier, log) = (&barrier, &log);
                s.spawn(move || match timeout {
                    Some(timeout) => barrier.arrive_timeout(role, log, timeout),
                    None => barrier.arrive(role, log),
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().map_err(|_| anyhow!("worker thread panicked")))
            .collect::<Result<Vec<_>>>()
    })?;

    for group in log.snapshot().chunks(barrier.spec().size()) {
        println!("{}", group.iter().collect::<String>());
    }

    let timed_out = outcomes
        .iter()
        .filter(|o| matches!(o, Err(BondError::TimedOut)))
        .count();
    if let Some(err) = outcomes
        .into_iter()
        .find_map(|o| o.err().filter(|e| *e != BondError::TimedOut))
    {
        return Err(err).context("arrival failed");
    }
    if timed_out > 0 {
        eprintln!("{timed_out} thread(s) timed out without a complete group");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn water() -> GroupSpec<char> {
        GroupSpec::new([('H', 2), ('O', 1)]).unwrap()
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_roles_and_options() {
        let cli = Cli::try_parse_from([
            "bond",
            "ABB",
            "--spec",
            r#"{"A":1,"B":2}"#,
            "--timeout-ms",
            "250",
        ])
        .unwrap();
        assert_eq!(cli.roles, "ABB");
        assert_eq!(cli.timeout(), Some(Duration::from_millis(250)));
        let config = cli.bonding_config().unwrap();
        assert_eq!(config.spec.required_count('B'), 2);
    }

    #[test]
    fn defaults_to_water() {
        let cli = Cli::try_parse_from(["bond", "HOH"]).unwrap();
        assert_eq!(cli.timeout(), None);
        assert_eq!(cli.bonding_config().unwrap().spec, water());
    }

    #[test]
    fn spec_and_config_conflict() {
        let args = ["bond", "HOH", "--spec", "{}", "--config", "bonding.json"];
        let err = Cli::try_parse_from(args).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn roles_are_required() {
        let err = Cli::try_parse_from(["bond"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn invalid_spec_is_reported() {
        let args = ["bond", "H", "--spec", r#"{"H":0}"#];
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(cli.bonding_config().is_err());
    }

    #[test]
    fn incomplete_groups_need_a_timeout() {
        let spec = water();
        let timeout = Some(Duration::from_millis(10));
        let uneven: Vec<char> = "HHHO".chars().collect();
        let even: Vec<char> = "OOHHHH".chars().collect();

        assert!(check_roles(&spec, &uneven, None).is_err());
        assert!(check_roles(&spec, &uneven, timeout).is_ok());
        assert!(check_roles(&spec, &['X'], timeout).is_err());
        assert!(check_roles(&spec, &even, None).is_ok());
    }
}
