//! Command-line front end for the research brief pipeline.
//!
//! Wires the HTTP provider adapters from environment configuration, runs one
//! request end-to-end, and prints the resulting brief (or the raw run report
//! with `--json`). Exits non-zero when the run terminated through the error
//! handler.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use research_brief::providers::{
    HttpPageFetcher, MemoryHistoryStore, OpenAiChatModel, TavilySearch,
};
use research_brief::{BriefRequest, Pipeline, PipelineConfig, ResearchDepth, RunReport};

#[derive(Parser, Debug)]
#[command(
    name = "research-brief",
    about = "Generate a schema-validated, evidence-linked research brief",
    version
)]
struct Args {
    /// Research topic
    topic: String,

    /// Research depth: shallow, moderate, or deep
    #[arg(short, long, default_value = "moderate")]
    depth: String,

    /// User identifier (for follow-up context)
    #[arg(short, long, default_value = "cli-user")]
    user: String,

    /// Treat this as a follow-up to the user's prior briefs
    #[arg(long)]
    follow_up: bool,

    /// Additional context or requirements for the planner
    #[arg(long)]
    context: Option<String>,

    /// Print the full run report as JSON instead of rendered text
    #[arg(long)]
    json: bool,
}

fn render(report: &RunReport) {
    let brief = &report.brief;

    println!("# {}\n", brief.topic);
    if let Some(reason) = &brief.failure_reason {
        println!("ERROR: {reason}\n");
    }
    println!("## Executive Summary\n\n{}\n", brief.executive_summary);
    println!("## Synthesis\n\n{}\n", brief.synthesis);

    println!("## Key Insights\n");
    for insight in &brief.key_insights {
        println!("- {insight}");
    }

    println!("\n## References\n");
    for (i, reference) in brief.references.iter().enumerate() {
        println!(
            "{}. {} ({:.0}% relevant)\n   {}",
            i + 1,
            reference.title,
            reference.relevance_score * 100.0,
            reference.url
        );
    }

    if !report.failures.is_empty() {
        println!("\n## Warnings\n");
        for failure in &report.failures {
            println!("- [{:?} at {}] {}", failure.kind, failure.stage, failure.detail);
        }
    }

    println!(
        "\nGenerated in {:.1}s ({} sources, run {})",
        report.execution_time.as_secs_f64(),
        brief.references.len(),
        report.run_id
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let depth: ResearchDepth = args.depth.parse().map_err(anyhow::Error::msg)?;

    let config = PipelineConfig::from_env();
    let fetcher = HttpPageFetcher::new(config.fetch_timeout, config.max_content_chars);

    let pipeline = Pipeline::builder()
        .model(Arc::new(OpenAiChatModel::from_env().context("language model setup failed")?))
        .search(Arc::new(
            TavilySearch::from_env()
                .context("search provider setup failed")?
                .with_max_results(config.max_sources_per_query as u32),
        ))
        .fetcher(Arc::new(fetcher))
        .history(Arc::new(MemoryHistoryStore::new()))
        .config(config)
        .build()
        .context("pipeline construction failed")?;

    let mut request =
        BriefRequest::new(args.topic, args.user).with_depth(depth).with_follow_up(args.follow_up);
    if let Some(context) = args.context {
        request = request.with_additional_context(context);
    }

    let report = pipeline.run(request).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        render(&report);
    }

    if report.brief.is_error() {
        std::process::exit(1);
    }
    Ok(())
}
