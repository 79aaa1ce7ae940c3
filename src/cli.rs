use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use drivefetch::{
    api::{ApiClient, ApiConfig, DEFAULT_ENDPOINT},
    application::DEFAULT_LOG_HISTORY,
    DownloadOrchestrator, RunEvent, RunReport,
};
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Exit code used when a second interrupt abandons the run.
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Batch download files listed as `path<TAB>url` rows through a link-resolution service.
#[derive(Debug, Parser)]
#[command(name = "drivefetch", version)]
#[command(about = "Batch download files through a link-resolution service", long_about = None)]
#[command(after_help = "Ctrl-C stops dispatching new items and waits for downloads in flight; \
a second Ctrl-C exits immediately with status 130.")]
pub struct Cli {
    /// Tab separated intake file; `-` or nothing reads stdin.
    pub intake: Option<PathBuf>,

    /// Directory the files are saved under.
    #[arg(short, long, default_value = "downloads")]
    pub dest: PathBuf,

    /// Number of items processed at the same time.
    #[arg(short, long, default_value_t = 5, value_parser = clap::value_parser!(u16).range(1..=20))]
    pub workers: u16,

    /// Resolution endpoint receiving the source url as a form POST.
    #[arg(long, env = "DRIVEFETCH_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Timeout of the resolution request, in seconds.
    #[arg(long, default_value_t = 30)]
    pub resolve_timeout: u64,

    /// Idle timeout of a download, in seconds.
    #[arg(long, default_value_t = 60)]
    pub download_timeout: u64,

    /// Number of log lines kept in the run history.
    #[arg(long, default_value_t = DEFAULT_LOG_HISTORY)]
    pub log_history: usize,

    /// Print the final report as JSON on stdout; log lines go to stderr.
    #[arg(long)]
    pub json: bool,

    /// Enable debug tracing for this crate.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn api_config(&self) -> ApiConfig {
        ApiConfig {
            endpoint: self.endpoint.clone(),
            resolve_timeout: Duration::from_secs(self.resolve_timeout),
            download_timeout: Duration::from_secs(self.download_timeout),
            ..ApiConfig::default()
        }
    }
}

async fn read_intake(source: Option<&PathBuf>) -> Result<String> {
    match source {
        Some(path) if path.as_os_str() != "-" => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading intake {}", path.display())),
        _ => {
            let mut text = String::new();
            tokio::io::stdin()
                .read_to_string(&mut text)
                .await
                .context("reading intake from stdin")?;
            Ok(text)
        }
    }
}

fn print_event(event: RunEvent, json: bool) {
    if let RunEvent::Log(line) = event {
        if json {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    /// First signal: stop dispatching, let running items finish.
    Drain,
    /// Signal while already draining.
    Abort,
}

fn on_interrupt(cancel: &CancellationToken) -> Interrupt {
    if cancel.is_cancelled() {
        Interrupt::Abort
    } else {
        cancel.cancel();
        Interrupt::Drain
    }
}

/// Run one batch and return the process exit code.
pub async fn run(cli: Cli) -> Result<i32> {
    let intake = read_intake(cli.intake.as_ref()).await?;
    let api = ApiClient::new(cli.api_config()).context("invalid resolution endpoint")?;
    tracing::debug!(endpoint = %api.endpoint(), "resolution endpoint");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = DownloadOrchestrator::new(api)
        .with_log_history(cli.log_history)
        .with_events(tx)
        .start_run(&intake, &cli.dest, usize::from(cli.workers));

    let cancel = handle.cancellation_token();
    let mut finished = std::pin::pin!(handle.wait());
    let outcome = loop {
        tokio::select! {
            outcome = &mut finished => break outcome,
            Some(event) = rx.recv() => print_event(event, cli.json),
            _ = tokio::signal::ctrl_c() => match on_interrupt(&cancel) {
                Interrupt::Drain => {
                    eprintln!("interrupt received; waiting for downloads in flight (Ctrl-C again to quit)");
                }
                Interrupt::Abort => {
                    eprintln!("second interrupt; exiting without waiting");
                    std::process::exit(INTERRUPTED_EXIT_CODE);
                }
            },
        }
    };
    while let Ok(event) = rx.try_recv() {
        print_event(event, cli.json);
    }

    let report: RunReport = outcome?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(if report.stats.failed == 0 { 0 } else { 2 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["drivefetch", "links.tsv"]).unwrap();
        assert_eq!(cli.intake, Some(PathBuf::from("links.tsv")));
        assert_eq!(cli.dest, PathBuf::from("downloads"));
        assert_eq!(cli.workers, 5);
        assert_eq!(cli.log_history, DEFAULT_LOG_HISTORY);
        assert!(!cli.json);
    }

    #[test]
    fn workers_out_of_range() {
        assert!(Cli::try_parse_from(["drivefetch", "-w", "0"]).is_err());
        assert!(Cli::try_parse_from(["drivefetch", "-w", "21"]).is_err());
        let cli = Cli::try_parse_from(["drivefetch", "-w", "20"]).unwrap();
        assert_eq!(cli.workers, 20);
    }

    #[test]
    fn second_interrupt_aborts() {
        let cancel = CancellationToken::new();
        assert_eq!(on_interrupt(&cancel), Interrupt::Drain);
        assert!(cancel.is_cancelled());
        assert_eq!(on_interrupt(&cancel), Interrupt::Abort);
        assert_eq!(on_interrupt(&cancel), Interrupt::Abort);
    }

    #[test]
    fn help_mentions_interrupts() {
        let help = Cli::command().render_help().to_string();
        assert!(help.contains("second Ctrl-C"));
    }

    #[test]
    fn api_config_from_args() {
        let cli = Cli::try_parse_from([
            "drivefetch",
            "--endpoint",
            "http://localhost:8080/resolve",
            "--resolve-timeout",
            "5",
            "--download-timeout",
            "90",
        ])
        .unwrap();
        let config = cli.api_config();
        assert_eq!(config.endpoint, "http://localhost:8080/resolve");
        assert_eq!(config.resolve_timeout, Duration::from_secs(5));
        assert_eq!(config.download_timeout, Duration::from_secs(90));
        assert_eq!(config.form_field, "q");
    }
}
