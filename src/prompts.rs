//! Prompt templates for every generation call in the pipeline.
//!
//! Each template embeds the task framing and the input digests; schema
//! enforcement (JSON-only instruction plus the schema document) is layered
//! on by the language-model adapter, and corrective retry instructions by
//! the structured-output wrapper.

use chrono::Utc;

use crate::schemas::{ContextSummary, FetchedPage, FinalBrief, ResearchDepth, SourceSummary};

/// Truncate to a character budget, marking the cut.
fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let cut: String = text.chars().take(limit).collect();
    format!("{cut}...")
}

/// Prompt builders for the research brief pipeline.
pub struct BriefPrompts;

impl BriefPrompts {
    fn current_date() -> String {
        Utc::now().format("%Y-%m-%d").to_string()
    }

    /// Digest of prior briefs fed into context summarization.
    pub fn history_digest(history: &[FinalBrief]) -> String {
        history
            .iter()
            .map(|brief| {
                format!(
                    "Topic: {}\nKey insights: {}\nExecutive summary: {}",
                    brief.topic,
                    brief.key_insights.join(", "),
                    truncate_chars(&brief.executive_summary, 200),
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Compact rendering of a context summary for downstream prompts.
    pub fn context_digest(context: &ContextSummary) -> String {
        format!(
            "Previous topics: {}\nKey findings: {}\nContinuity: {}",
            context.prior_topics.join(", "),
            context.key_findings.join(", "),
            context.condensed_context,
        )
    }

    /// Condense prior interactions into a `context_summary` artifact.
    pub fn context_summary(topic: &str, history_digest: &str) -> String {
        format!(
            "You are an expert research assistant. Summarize the user's previous \
             research interactions to provide context for a new request.\n\
             Focus on key topics and findings from previous research, recurring \
             interests, and how the new research might build on previous work. \
             Be concise but comprehensive.\n\n\
             Previous research:\n{history_digest}\n\n\
             New research topic: {topic}"
        )
    }

    /// Turn a topic into a `research_plan` artifact.
    pub fn plan(
        topic: &str,
        depth: ResearchDepth,
        context: Option<&ContextSummary>,
        additional_context: Option<&str>,
    ) -> String {
        let mut prompt = format!(
            "You are an expert research planner. Today's date is {date}.\n\
             Create a research plan for the topic below: search queries covering \
             multiple angles and source types (academic, news, reports), a \
             rationale, the number of sources you expect to need, and the key \
             focus areas.\n\n\
             Research topic: {topic}\n\
             Research depth: {depth}",
            date = Self::current_date(),
        );

        if let Some(extra) = additional_context {
            prompt.push_str(&format!("\nAdditional requirements: {extra}"));
        }
        if let Some(context) = context {
            prompt.push_str(&format!(
                "\n\nPrevious research context:\n{}",
                Self::context_digest(context)
            ));
        }

        prompt
    }

    /// Summarize one fetched page into a `source_summary` artifact.
    pub fn source_summary(topic: &str, page: &FetchedPage, content_limit: usize) -> String {
        format!(
            "You are an expert research analyst. Summarize the web content below \
             in relation to the research topic: extract the key information, \
             assess relevance to the topic from 0.0 to 1.0, identify key points, \
             and note the source type and any stated author or publication date. \
             Be objective and stick to what the source says.\n\n\
             Research topic: {topic}\n\
             Source URL: {url}\n\
             Source title: {title}\n\
             Source content:\n{content}",
            url = page.url,
            title = page.title,
            content = truncate_chars(&page.content, content_limit),
        )
    }

    /// Combine all source summaries into a `final_brief` artifact.
    pub fn synthesis(
        topic: &str,
        summaries: &[SourceSummary],
        context: Option<&ContextSummary>,
    ) -> String {
        let summaries_digest = summaries
            .iter()
            .enumerate()
            .map(|(i, s)| {
                format!(
                    "Source {n}: {title}\nURL: {url}\nRelevance: {score:.2}\n\
                     Summary: {summary}\nKey points: {points}",
                    n = i + 1,
                    title = s.title,
                    url = s.url,
                    score = s.relevance_score,
                    summary = s.summary,
                    points = s.key_points.join(", "),
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut prompt = format!(
            "You are an expert research analyst. Synthesize the source summaries \
             below into a comprehensive research brief: an executive summary, a \
             detailed synthesis organized into logical sections, and the key \
             insights. Be thorough, objective, and well-organized.\n\n\
             Research topic: {topic}"
        );

        if let Some(context) = context {
            prompt.push_str(&format!(
                "\n\nPrevious research context:\n{}",
                Self::context_digest(context)
            ));
        }

        prompt.push_str(&format!("\n\nSource summaries:\n{summaries_digest}"));
        prompt
    }
}
