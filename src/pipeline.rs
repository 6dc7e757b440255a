use crate::affiliation::{AffiliationLookup, AffiliationTable};
use crate::cli::RunArgs;
use crate::config::{Config, Platform};
use crate::fetch::{Fetcher, UreqClient};
use crate::metrics::{rank_contributors, summarize, top_half};
use crate::model::{DateWindow, ProjectOutcome, ProjectReport};
use crate::report::{output_json, output_table, write_csv_file};
use crate::source::{CommitSource, GerritSource, GithubSource};
use anyhow::Context;
use console::Term;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

pub fn exec(args: RunArgs) -> anyhow::Result<()> {
    let window = DateWindow::parse(&args.start_date, &args.end_date)
        .context("Failed to resolve date window")?;

    let mut config = Config::load(args.config.as_deref()).context("Failed to load config")?;
    apply_overrides(&mut config, &args);
    config
        .validate(args.platform)
        .context("Invalid configuration")?;

    let affiliations_path = config.affiliations_path(args.platform)?;
    let table = AffiliationTable::load(&affiliations_path)
        .with_context(|| format!("Failed to load affiliations from {}", affiliations_path.display()))?;

    let source = build_source(&config, args.platform);
    let projects = source
        .projects()
        .with_context(|| format!("Failed to list {} projects", source.platform()))?;
    info!(platform = source.platform(), count = projects.len(), "collecting metrics");

    let progress = if args.quiet || !Term::stderr().is_term() {
        ProgressBar::hidden()
    } else {
        project_progress(projects.len() as u64)
    };

    let reports = collect_metrics(source.as_ref(), &projects, &window, &table, &progress);
    progress.finish_and_clear();

    write_csv_file(&args.output_file, &reports)
        .with_context(|| format!("Failed to write {}", args.output_file.display()))?;

    if args.json {
        output_json(&reports, args.platform, &window)?;
        eprintln!("Metrics have been written to {}", args.output_file.display());
    } else {
        if !args.quiet {
            output_table(&reports);
        }
        println!("Metrics have been written to {}", args.output_file.display());
    }

    Ok(())
}

fn apply_overrides(config: &mut Config, args: &RunArgs) {
    if let Some(token) = &args.github_token {
        config.github.token = Some(token.clone());
    }
    if let Some(path) = &args.affiliations {
        match args.platform {
            Platform::Github => config.github.affiliations_file = Some(path.clone()),
            Platform::Gerrit => config.gerrit.affiliations_file = Some(path.clone()),
        }
    }
}

fn build_source(config: &Config, platform: Platform) -> Box<dyn CommitSource> {
    let client = UreqClient::new(config.retry.timeout());
    match platform {
        Platform::Github => Box::new(GithubSource::new(
            client,
            &config.github.api_url,
            &config.github.org,
            config.github.token.clone(),
        )),
        Platform::Gerrit => Box::new(GerritSource::new(
            Fetcher::new(client, config.retry),
            &config.gerrit.base_url,
            config.gerrit.projects.clone(),
        )),
    }
}

fn project_progress(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb
}

/// Fetch and aggregate every project in order. A project that cannot be read
/// becomes an error entry; the remaining projects are still processed.
pub fn collect_metrics<L: AffiliationLookup + ?Sized>(
    source: &dyn CommitSource,
    projects: &[String],
    window: &DateWindow,
    table: &L,
    progress: &ProgressBar,
) -> Vec<ProjectReport> {
    let mut reports = Vec::with_capacity(projects.len());

    for project in projects {
        progress.set_message(project.clone());
        info!(project = %project, "fetching commits");

        let report = match source.commits(project, window) {
            Ok(records) => {
                if records.is_empty() {
                    info!(project = %project, "no commits found");
                }
                let (total, ranked) = rank_contributors(&records);
                let metrics = summarize(total, &ranked, table);
                let mut report = ProjectReport::new(project.clone(), ProjectOutcome::Metrics(metrics));
                report.top_contributors = top_half(&ranked).iter().map(|c| c.author.clone()).collect();
                report
            }
            Err(err) => {
                warn!(project = %project, error = %err, "error processing project");
                ProjectReport::new(project.clone(), ProjectOutcome::error(err.to_string()))
            }
        };

        reports.push(report);
        progress.inc(1);
    }

    reports
}
