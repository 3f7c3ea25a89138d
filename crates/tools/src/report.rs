//! Simulated report generation in six fixed stages.

use std::fmt::Write as _;
use std::time::Duration;

use chrono::Utc;
use serde_json::{Value, json};

use asyncops_jobs::{JobContext, JobInputs, JobOutcome};

use crate::simulate;

pub const OPERATION: &str = "report_generation";

const STEPS: [(i64, &str); 6] = [
    (15, "Gathering data sources"),
    (30, "Analyzing metrics"),
    (50, "Generating insights"),
    (70, "Creating visualizations"),
    (85, "Compiling report"),
    (95, "Finalizing document"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRequest {
    pub title: String,
    pub format: String,
    pub include_charts: bool,
}

impl ReportRequest {
    pub fn new(title: &str, format: &str, include_charts: bool) -> Self {
        Self {
            title: title.to_string(),
            format: format.to_string(),
            include_charts,
        }
    }

    pub fn inputs(&self) -> JobInputs {
        let mut inputs = JobInputs::new();
        inputs.insert("title".to_string(), json!(self.title));
        inputs.insert("format".to_string(), json!(self.format));
        inputs.insert("include_charts".to_string(), json!(self.include_charts));
        inputs
    }
}

pub async fn run(ctx: JobContext, request: ReportRequest, step_delay: Duration) -> JobOutcome {
    tracing::info!(job_id = %ctx.job_id(), title = %request.title, "generating report");

    for (progress, stage) in STEPS {
        ctx.checkpoint()?;
        ctx.report_progress(progress, stage);
        ctx.sleep(step_delay).await?;
    }

    Ok(Value::String(render(&request)))
}

/// Markdown body of the finished report.
fn render(request: &ReportRequest) -> String {
    let seed = simulate::seed(&request.title);
    let revenue = simulate::pick(seed, 1, 100_000, 1_000_000);
    let growth = simulate::pick(seed, 2, 5, 25);
    let customers = simulate::pick(seed, 3, 1_000, 10_000);
    let satisfaction = simulate::pick(seed, 4, 80, 98);

    let mut out = String::new();
    let _ = writeln!(out, "# {}", request.title);
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "**Generated:** {}",
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(out, "**Format:** {}", request.format);
    let _ = writeln!(out);
    let _ = writeln!(out, "## Executive Summary");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "This report provides a comprehensive overview of key metrics and insights."
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "## Key Metrics");
    let _ = writeln!(out);
    let _ = writeln!(out, "| Metric | Value |");
    let _ = writeln!(out, "|--------|-------|");
    let _ = writeln!(out, "| Total Revenue | ${revenue} |");
    let _ = writeln!(out, "| Growth Rate | {growth}% |");
    let _ = writeln!(out, "| Active Customers | {customers} |");
    let _ = writeln!(out, "| Satisfaction Score | {satisfaction}% |");
    let _ = writeln!(out);

    if request.include_charts {
        let _ = writeln!(out, "## Visualizations");
        let _ = writeln!(out);
        let _ = writeln!(out, "- Revenue trend (line chart)");
        let _ = writeln!(out, "- Customer distribution (pie chart)");
        let _ = writeln!(out, "- Monthly growth (bar chart)");
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "## Recommendations");
    let _ = writeln!(out);
    let _ = writeln!(out, "1. Focus on customer retention strategies");
    let _ = writeln!(out, "2. Expand into emerging markets");
    let _ = writeln!(out, "3. Optimize operational efficiency");
    out
}
