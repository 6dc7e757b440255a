use crate::config::Platform;
use crate::error::Result;
use crate::model::{DateWindow, MetricsOutput, ProjectOutcome, ProjectReport, SCHEMA_VERSION};
use chrono::Utc;
use console::style;
use std::fs::File;
use std::io::Write;
use std::path::Path;

pub const CSV_HEADER: [&str; 6] = [
    "Repository/Project",
    "Total Commits",
    "Total Committers",
    "Total Committer Companies",
    "Committers 50% of Commits",
    "Committer Companies 50% of Commits",
];

/// Write one header row and one row per project. Error rows carry only the
/// project name and the message, so readers must accept short rows.
pub fn write_csv<W: Write>(writer: W, reports: &[ProjectReport]) -> Result<()> {
    let mut csv = csv::WriterBuilder::new().flexible(true).from_writer(writer);
    csv.write_record(CSV_HEADER)?;

    for report in reports {
        match &report.outcome {
            ProjectOutcome::Metrics(m) => csv.write_record([
                report.name.clone(),
                m.total_commits.to_string(),
                m.total_contributors.to_string(),
                m.total_contributor_affiliations.to_string(),
                m.top_half_contributor_count.to_string(),
                m.top_half_contributor_affiliations.to_string(),
            ])?,
            ProjectOutcome::Error { error } => {
                csv.write_record([report.name.as_str(), error.as_str()])?
            }
        }
    }

    csv.flush()?;
    Ok(())
}

pub fn write_csv_file<P: AsRef<Path>>(path: P, reports: &[ProjectReport]) -> Result<()> {
    let file = File::create(path.as_ref())?;
    write_csv(file, reports)
}

pub fn output_json(reports: &[ProjectReport], platform: Platform, window: &DateWindow) -> anyhow::Result<()> {
    let output = MetricsOutput {
        version: SCHEMA_VERSION,
        generated_at: Utc::now(),
        platform: platform.to_string(),
        start_date: window.start(),
        end_date: window.end(),
        projects: reports.to_vec(),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

pub fn output_table(reports: &[ProjectReport]) {
    println!(
        "{:<32} {:>8} {:>10} {:>10} {:>10} {:>10}",
        style("Project").bold(),
        style("Commits").bold(),
        style("Authors").bold(),
        style("Companies").bold(),
        style("Top 50%").bold(),
        style("Top Cos").bold()
    );
    println!("{}", "─".repeat(86));
    for r in reports {
        match &r.outcome {
            ProjectOutcome::Metrics(m) => println!(
                "{:<32} {:>8} {:>10} {:>10} {:>10} {:>10}",
                r.name,
                m.total_commits,
                m.total_contributors,
                m.total_contributor_affiliations,
                m.top_half_contributor_count,
                m.top_half_contributor_affiliations
            ),
            ProjectOutcome::Error { error } => {
                println!("{:<32} {}", r.name, style(error).red())
            }
        }
    }

    let failed = reports.iter().filter(|r| r.outcome.metrics().is_none()).count();
    if failed > 0 {
        println!("\n{} of {} projects could not be read", style(failed).red(), reports.len());
    }
}
