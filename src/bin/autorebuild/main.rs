mod display;

use autorebuild::{CodeBuild, GitHub, get_github_token, parse_args, rebuild_pull_requests};
use chrono::Utc;
use display::display_report;

fn handle_clap_help_version(clap_err: &clap::Error) -> ! {
    use clap::error::ErrorKind;
    match clap_err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            print!("{clap_err}");
            std::process::exit(0);
        }
        _ => {
            eprint!("{clap_err}");
            std::process::exit(2);
        }
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (spec, options) = match parse_args(std::env::args()) {
        Ok(result) => result,
        Err(err) => {
            if let Some(clap_err) = err.downcast_ref::<clap::Error>() {
                handle_clap_help_version(clap_err);
            } else {
                return Err(err);
            }
        }
    };

    init_tracing(options.verbose);

    let forge = GitHub::new(&options.api_url, get_github_token(), options.timeout)?;
    let builder = CodeBuild::from_env(options.region.clone(), options.timeout).await;

    let now = Utc::now();
    let report = rebuild_pull_requests(&spec, &forge, &builder, now).await?;

    display_report(
        &report,
        spec.dry_run,
        options.verbose,
        now,
        &mut std::io::stdout(),
    )?;

    if report.has_failures() {
        anyhow::bail!(
            "{} of {} builds could not be started",
            report.failures().count(),
            report.tasks.len()
        );
    }

    Ok(())
}
