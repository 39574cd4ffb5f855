use std::{io::Write, path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use videosync_engine::{Action, EngineConfig, EventSink, Gateway, JobEvent, JobRequest};
use videosync_observability::safe_eprintln;

#[derive(Parser)]
#[command(name = "videosync-tools")]
#[command(about = "Drive the VideoSync worker from a terminal", long_about = None)]
#[command(version)]
struct Cli {
    /// Data dir (cache, logs, settings). Defaults to VIDEOSYNC_DATA_DIR.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the interpreter, entry script and model dir a job would use
    Resolve,
    /// Run one worker action; flags after `--` are passed to the worker
    Run {
        /// Worker action name, e.g. test_asr or generate_single_tts
        #[arg(long)]
        action: String,
        #[arg(last = true)]
        args: Vec<String>,
    },
    /// List packages missing from the worker runtime
    CheckDeps,
    /// Install the worker's requirements into its runtime
    RepairDeps,
    /// Copy an input file into the cache and print the entry
    Cache { path: PathBuf },
}

/// One JSON object per line on stdout.
struct StdoutSink;

impl EventSink for StdoutSink {
    fn emit(&self, event: JobEvent) {
        print_json(&event);
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(s) => {
            let mut out = std::io::stdout().lock();
            let _ = writeln!(out, "{s}");
        }
        Err(e) => safe_eprintln!("serialize output failed: {e}"),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(e) => {
            safe_eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    if let Some(dir) = &cli.data_dir {
        std::env::set_var("VIDEOSYNC_DATA_DIR", dir);
    }
    let config = EngineConfig::from_env().context("load engine config failed")?;
    std::fs::create_dir_all(config.logs_dir()).context("create logs dir failed")?;
    let gateway = Arc::new(Gateway::new(config, Arc::new(StdoutSink)));

    match cli.command {
        Commands::Resolve => match gateway.resolve_runtime() {
            Ok(rt) => {
                print_json(&rt);
                Ok(ExitCode::SUCCESS)
            }
            Err(e) => {
                print_json(&json!({"error": e.to_payload()}));
                Ok(ExitCode::from(2))
            }
        },
        Commands::Run { action, args } => {
            let action = Action::from_worker_name(&action)
                .ok_or_else(|| anyhow!("unknown action: {action}"))?;
            let request = JobRequest::new(action).raw_args(args);

            let killer = {
                let gateway = gateway.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        safe_eprintln!("interrupt: killing worker");
                        gateway.kill();
                    }
                })
            };
            let res = gateway.run(request).await;
            killer.abort();

            match res {
                Ok(result) => {
                    let ok = result.success;
                    print_json(&json!({"result": result}));
                    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
                }
                Err(e) => {
                    print_json(&json!({"error": e.to_payload()}));
                    Ok(ExitCode::from(2))
                }
            }
        }
        Commands::CheckDeps => {
            let report = gateway.check_dependencies().await?;
            let ok = report.all_present();
            print_json(&report);
            Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Commands::RepairDeps => {
            let outcome = gateway.repair_dependencies().await?;
            let ok = outcome.success;
            print_json(&outcome);
            Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Commands::Cache { path } => {
            let entry = gateway.cache_input(&path).await?;
            print_json(&entry);
            Ok(ExitCode::SUCCESS)
        }
    }
}
