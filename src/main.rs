use anyhow::{Context, Result};
use cleancloud::{
    aws, azure,
    cli::{
        commands::scan::{ProviderKind, ScanArgs},
        Command, CommandLineArgs, GlobalArgs,
    },
    config::Config,
    doctor::run_doctor,
    filtering::{filter_findings_by_tags, IgnoreTagRule},
    policy::{self, EXIT_ERROR, EXIT_PERMISSION_ERROR, EXIT_POLICY_VIOLATION},
    reporter::{self, ScanSummary},
    scanner::ScanError,
};
use tokio::runtime::Builder;
use tracing::error;
use tracing_subscriber::{
    filter::LevelFilter, fmt, prelude::__tracing_subscriber_SubscriberExt, registry,
    util::SubscriberInitExt,
};

fn main() -> Result<()> {
    let args = CommandLineArgs::parse_args();

    let runtime = Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create Tokio runtime")?;
    let exit_code = runtime.block_on(async_main(args));
    std::process::exit(exit_code);
}

fn setup_logging(global_args: &GlobalArgs) {
    let level = LevelFilter::from_level(global_args.log_level());
    let all_targets = global_args.verbose > 2;

    let filter = if all_targets {
        tracing_subscriber::filter::Targets::new().with_default(LevelFilter::TRACE)
    } else {
        // Per-target filtering, chatty only for this crate.
        tracing_subscriber::filter::Targets::new()
            .with_default(LevelFilter::ERROR)
            .with_target("cleancloud", level)
    };

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_ansi(false)
        .without_time();
    registry().with(fmt_layer).with(filter).init();
}

async fn async_main(args: CommandLineArgs) -> i32 {
    setup_logging(&args.global_args);

    match args.command {
        Command::Scan(scan_args) => run_scan_command(&args.global_args, &scan_args).await,
        Command::Doctor(doctor_args) => run_doctor(&doctor_args).await,
    }
}

async fn run_scan_command(global_args: &GlobalArgs, scan_args: &ScanArgs) -> i32 {
    match scan_and_report(global_args, scan_args).await {
        Ok(exit_code) => exit_code,
        Err(ScanError::Permission(message)) => {
            error!("permission error: {message}");
            EXIT_PERMISSION_ERROR
        }
        Err(ScanError::FatalTarget { target, source }) => {
            error!("target {target} failed: {source}");
            EXIT_ERROR
        }
        Err(ScanError::Other(err)) => {
            error!("{err:#}");
            EXIT_ERROR
        }
    }
}

async fn scan_and_report(
    global_args: &GlobalArgs,
    scan_args: &ScanArgs,
) -> Result<i32, ScanError> {
    let config = Config::load(scan_args.config.as_deref()).map_err(ScanError::Other)?;
    let progress_enabled = global_args.use_progress();

    let report = match scan_args.provider {
        ProviderKind::Aws => {
            aws::scan_with_region_selection(scan_args, &config, progress_enabled).await?
        }
        ProviderKind::Azure => {
            azure::scan_with_subscription_selection(scan_args, &config, progress_enabled).await?
        }
    };

    // CLI --ignore-tag overrides config-file tag filtering.
    let ignore_rules: Vec<IgnoreTagRule> = if !scan_args.ignore_tag.is_empty() {
        scan_args
            .ignore_tag
            .iter()
            .map(|spec| IgnoreTagRule::parse(spec))
            .collect::<Result<_>>()
            .map_err(ScanError::Other)?
    } else {
        config.ignore_tag_rules()
    };
    let filtered = filter_findings_by_tags(report.findings.clone(), &ignore_rules);

    let summary = ScanSummary::build(&report, &filtered.kept, filtered.ignored.len());
    reporter::run(global_args, &filtered.kept, &summary, &scan_args.output_args)
        .map_err(ScanError::Other)?;

    let exit_code = policy::determine_exit_code(
        &filtered.kept,
        scan_args.fail_on_findings,
        scan_args.fail_on_confidence.map(Into::into),
    );
    if exit_code == EXIT_POLICY_VIOLATION {
        error!("policy violation detected");
    }
    Ok(exit_code)
}
