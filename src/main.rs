use anyhow::{Context, Result};
use clap::Parser;
use cvmscraper::{
    config::Settings,
    fetch,
    pipeline::{self, StatementJob},
    process::{Dialect, SourceLocator},
};
use reqwest::Client;
use std::{
    collections::HashMap,
    fs::File,
    io::{BufWriter, Write},
    process::ExitCode,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // ─── 1) config + logging ─────────────────────────────────────────
    let settings = Settings::parse();

    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));
    fmt::Subscriber::builder().with_env_filter(env).init();
    info!("startup");

    settings.validate()?;
    let statements = settings.selected_statements();

    // ─── 2) run directories ──────────────────────────────────────────
    let mut run_dirs = HashMap::new();
    for family in settings.families() {
        let dir = settings
            .run_dir(family)
            .with_context(|| format!("preparing {} run directory", family))?;
        info!(%family, dir = %dir.display(), "run directory ready");
        run_dirs.insert(family, dir);
    }

    // ─── 3) download + extract archives ──────────────────────────────
    let mut retrieval_failures = Vec::new();
    if settings.skip_download {
        info!("skipping download; using files already in the run directories");
    } else {
        let client = Client::new();
        for family in settings.families() {
            let years = settings.years_for(family)?;
            let got = fetch::retrieve_family(&client, family, years, &run_dirs[&family]).await?;
            info!(
                %family,
                fetched = got.fetched,
                already_present = got.already_present,
                extracted = got.extracted_files,
                failed = got.failures.len(),
                "retrieval finished"
            );
            retrieval_failures.extend(got.failures);
        }
    }

    // ─── 4) process each statement type ──────────────────────────────
    let jobs = statements
        .iter()
        .map(|&statement| -> Result<StatementJob> {
            let family = statement.family();
            let dir = run_dirs[&family].clone();
            Ok(StatementJob {
                statement,
                locator: SourceLocator::new(dir.clone(), settings.years_for(family)?),
                out_dir: dir,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let dialect = Dialect::default();
    let summaries =
        tokio::task::spawn_blocking(move || pipeline::run_all(&jobs, &dialect)).await?;

    // ─── 5) report ───────────────────────────────────────────────────
    println!();
    for failure in &retrieval_failures {
        println!("retrieval error: {}", failure);
    }
    for summary in &summaries {
        print!("{}", summary);
    }

    if let Some(path) = &settings.summary_json {
        let file = File::create(path)
            .with_context(|| format!("creating summary file {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &summaries)
            .with_context(|| format!("writing summary file {}", path.display()))?;
        writer.flush()?;
        info!(path = %path.display(), "summary written");
    }

    let mut code = ExitCode::SUCCESS;
    if let Some(minimum) = settings.min_rows {
        for summary in summaries.iter().filter(|s| !s.meets_minimum(minimum)) {
            error!(
                statement = %summary.statement,
                rows = summary.output.as_ref().map_or(0, |o| o.rows),
                minimum,
                "fewer rows than required"
            );
            code = ExitCode::FAILURE;
        }
    }
    if summaries.iter().all(|s| !s.exported()) {
        warn!("no statement type produced output");
    }

    info!("all done");
    Ok(code)
}
