use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};

use updater::checks::composer::ComposerExecutableCheck;
use updater::checks::version_policy::{VersionPolicy, VersionPolicyCheck};
use updater::core::results::{describe, has_errors};
use updater::core::types::Severity;
use updater::cron::{CronOutcome, run_unattended};
use updater::exit_codes;
use updater::io::config::{UpdaterConfig, load_config};
use updater::io::init::{InitOptions, UpdaterPaths, init_updater};
use updater::io::manifest::installed_core_version;
use updater::io::release_feed::load_release_catalog;
use updater::io::report::ReportRenderer;
use updater::io::stager::ComposerStager;
use updater::io::status_store::FileStatusStore;
use updater::logging;
use updater::status::{InvalidationEvent, StatusChecker};

/// Priority of the Composer check; runs before policy checks.
const COMPOSER_CHECK_PRIORITY: i32 = 100;
const VERSION_POLICY_PRIORITY: i32 = 0;

/// Printed by `status --refresh` when the results changed enough to mail
/// the site administrators under `status_check_mail`.
const NOTIFICATION_DUE: &str = "Notification due: status check results changed.";

#[derive(Parser)]
#[command(name = "updater", version, about = "Drupal core update policy engine")]
struct Cli {
    /// Site root containing `.updater/`.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create `.updater/` with default config, empty release metadata and manifest.
    Init {
        /// Overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },
    /// Show status-check results, running the checks if nothing is stored.
    Status {
        /// Only show results of this severity.
        #[arg(long, value_enum)]
        severity: Option<SeverityArg>,
        /// Re-run every check even if results are stored.
        #[arg(long)]
        refresh: bool,
    },
    /// Drop stored status-check results.
    Clear,
    /// Clear stored results if the event makes them stale.
    Invalidate {
        #[arg(value_enum)]
        event: EventArg,
        /// Module name or config key, for events that carry one.
        name: Option<String>,
    },
    /// Run one unattended update.
    Cron,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum SeverityArg {
    Error,
    Warning,
}

impl From<SeverityArg> for Severity {
    fn from(value: SeverityArg) -> Self {
        match value {
            SeverityArg::Error => Severity::Error,
            SeverityArg::Warning => Severity::Warning,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum EventArg {
    ModuleInstalled,
    ModuleUninstalled,
    ConfigChanged,
    PostApply,
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let root = cli.root;
    match cli.command {
        Command::Init { force } => cmd_init(&root, force),
        Command::Status { severity, refresh } => {
            cmd_status(&root, severity.map(Severity::from), refresh)
        }
        Command::Clear => cmd_clear(&root),
        Command::Invalidate { event, name } => cmd_invalidate(&root, event, name),
        Command::Cron => cmd_cron(&root),
    }
}

fn cmd_init(root: &Path, force: bool) -> Result<i32> {
    let paths = init_updater(root, &InitOptions { force })?;
    println!("initialized {}", paths.updater_dir.display());
    Ok(exit_codes::OK)
}

fn cmd_status(root: &Path, severity: Option<Severity>, refresh: bool) -> Result<i32> {
    let paths = UpdaterPaths::new(root);
    let cfg = load_config(&paths.config_path)?;
    let checker = status_checker(&paths, &cfg)?;

    let mut notify = false;
    if refresh {
        (_, notify) = checker.run_with_notice(cfg.status_check_mail)?;
    } else {
        checker.run_if_no_stored_results()?;
    }

    let shown = checker.results(severity)?;
    let report =
        ReportRenderer::new().render_status(shown.as_deref(), checker.last_run_time()?)?;
    print!("{report}");
    if notify {
        println!("{NOTIFICATION_DUE}");
    }

    let all = checker.results(None)?;
    if all.as_deref().is_some_and(has_errors) {
        Ok(exit_codes::ERRORS)
    } else {
        Ok(exit_codes::OK)
    }
}

fn cmd_clear(root: &Path) -> Result<i32> {
    let paths = UpdaterPaths::new(root);
    StatusChecker::new(FileStatusStore::new(&paths.status_path)).clear_stored_results()?;
    Ok(exit_codes::OK)
}

fn cmd_invalidate(root: &Path, event: EventArg, name: Option<String>) -> Result<i32> {
    let named = |kind: &str| name.clone().ok_or_else(|| anyhow!("{kind} requires a name"));
    let event = match event {
        EventArg::ModuleInstalled => InvalidationEvent::ModuleInstalled(named("module-installed")?),
        EventArg::ModuleUninstalled => {
            InvalidationEvent::ModuleUninstalled(named("module-uninstalled")?)
        }
        EventArg::ConfigChanged => InvalidationEvent::ConfigChanged(named("config-changed")?),
        EventArg::PostApply => InvalidationEvent::PostApply,
    };
    let paths = UpdaterPaths::new(root);
    let cleared =
        StatusChecker::new(FileStatusStore::new(&paths.status_path)).handle_event(&event)?;
    println!("{}", if cleared { "cleared" } else { "unchanged" });
    Ok(exit_codes::OK)
}

fn cmd_cron(root: &Path) -> Result<i32> {
    let paths = UpdaterPaths::new(root);
    let cfg = load_config(&paths.config_path)?;
    let stager = ComposerStager::from_config(&paths, &cfg);
    let code = match run_unattended(root, &stager)? {
        CronOutcome::Disabled => {
            println!("unattended updates are disabled");
            exit_codes::OK
        }
        CronOutcome::UpToDate => {
            println!("no update available");
            exit_codes::OK
        }
        CronOutcome::Updated { from, to, warnings } => {
            println!("updated {from} -> {to}");
            for line in describe(&warnings) {
                println!("{line}");
            }
            exit_codes::OK
        }
        CronOutcome::Blocked { results } => {
            println!("update blocked");
            for line in describe(&results) {
                println!("{line}");
            }
            exit_codes::BLOCKED
        }
        CronOutcome::Failed { message } => {
            println!("update failed: {message}");
            exit_codes::BLOCKED
        }
    };
    Ok(code)
}

fn status_checker(
    paths: &UpdaterPaths,
    cfg: &UpdaterConfig,
) -> Result<StatusChecker<FileStatusStore>> {
    let installed = installed_core_version(&paths.installed_path)?;
    let catalog = load_release_catalog(&paths.releases_path)?;
    let policy = VersionPolicy::new(installed, catalog, cfg);

    let mut checker = StatusChecker::new(FileStatusStore::new(&paths.status_path));
    checker.register(
        ComposerExecutableCheck::new(cfg.executables.composer.clone()),
        COMPOSER_CHECK_PRIORITY,
    );
    checker.register(
        VersionPolicyCheck::new(policy, cfg.status_context()),
        VERSION_POLICY_PRIORITY,
    );
    Ok(checker)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init_force() {
        let cli = Cli::parse_from(["updater", "init", "--force"]);
        assert!(matches!(cli.command, Command::Init { force: true }));
        assert_eq!(cli.root, PathBuf::from("."));
    }

    #[test]
    fn parse_status_filters() {
        let cli = Cli::parse_from([
            "updater",
            "--root",
            "/srv/site",
            "status",
            "--severity",
            "warning",
            "--refresh",
        ]);
        assert_eq!(cli.root, PathBuf::from("/srv/site"));
        assert!(matches!(
            cli.command,
            Command::Status {
                severity: Some(SeverityArg::Warning),
                refresh: true
            }
        ));
    }

    #[test]
    fn parse_invalidate_config_key() {
        let cli = Cli::parse_from(["updater", "invalidate", "config-changed", "unattended.level"]);
        match cli.command {
            Command::Invalidate { event, name } => {
                assert_eq!(event, EventArg::ConfigChanged);
                assert_eq!(name.as_deref(), Some("unattended.level"));
            }
            _ => panic!("expected invalidate"),
        }
    }

    #[test]
    fn rejects_unknown_severity() {
        assert!(Cli::try_parse_from(["updater", "status", "--severity", "notice"]).is_err());
    }
}
