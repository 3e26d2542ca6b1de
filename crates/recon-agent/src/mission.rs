//! Mission execution
//!
//! One mission runs the full loop: plan, research, curate, synthesize,
//! act, persist. Individual tool failures are recorded in the trace and
//! skipped; synthesis failure, cancellation and a completely dry research
//! phase fail the mission. The relational log is written first and is the
//! authoritative copy; vector ingestion failures only warn.

use crate::error::{MissionError, Result};
use crate::events::{EventSink, MissionEvent};
use crate::intel::{extract_product, has_price_intent, IntelPool};
use crate::plan::{PlanStep, Planner, ToolKind};
use crate::prompts::{synthesis_prompt, SYNTHESIS_PROMPT_OVERHEAD};
use chrono::Datelike;
use recon_llm::{GenerateOptions, LlmClient, LlmError};
use recon_memory::MemoryIngestor;
use recon_persist::{title_from_input, PersistClient};
use recon_tools::{validate_mission_input, ActionDispatcher, PageScraper, SearchClient, ToolError};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Serialize)]
pub struct TraceEntry {
    pub tool: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MissionOutcome {
    pub mission_id: i64,
    pub conversation_id: i64,
    pub report: String,
    pub trace: Vec<TraceEntry>,
}

pub struct MissionExecutor {
    llm: Arc<dyn LlmClient>,
    search: Arc<dyn SearchClient>,
    scraper: Arc<dyn PageScraper>,
    actions: Arc<dyn ActionDispatcher>,
    persist: PersistClient,
    ingestor: Arc<MemoryIngestor>,
    planner: Planner,
    llm_options: GenerateOptions,
}

impl MissionExecutor {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        search: Arc<dyn SearchClient>,
        scraper: Arc<dyn PageScraper>,
        actions: Arc<dyn ActionDispatcher>,
        persist: PersistClient,
        ingestor: Arc<MemoryIngestor>,
    ) -> Self {
        let planner = Planner::new(Arc::clone(&llm));
        Self {
            llm,
            search,
            scraper,
            actions,
            persist,
            ingestor,
            planner,
            llm_options: GenerateOptions::default(),
        }
    }

    /// Run a mission to completion, narrating through the sink. Exactly
    /// one terminal event is emitted: `complete` on success, `error` on
    /// any failure (including rejected input and cancellation).
    pub async fn run(
        &self,
        objective: &str,
        conversation_id: Option<i64>,
        sink: &EventSink,
    ) -> Result<MissionOutcome> {
        let result = self.run_inner(objective, conversation_id, sink).await;
        match &result {
            Ok(outcome) => {
                sink.emit(MissionEvent::Complete {
                    report: outcome.report.clone(),
                })
                .await;
            }
            Err(err) => {
                sink.emit(MissionEvent::Error {
                    error: err.to_string(),
                    context: Some("Mission execution failed".to_string()),
                })
                .await;
            }
        }
        result
    }

    async fn run_inner(
        &self,
        objective: &str,
        conversation_id: Option<i64>,
        sink: &EventSink,
    ) -> Result<MissionOutcome> {
        // Rejected input never touches the mission log.
        validate_mission_input(objective)
            .map_err(|e| MissionError::InvalidInput(e.to_string()))?;

        let conversation = match conversation_id {
            Some(id) => self
                .persist
                .conversations()
                .get(id)
                .await?
                .ok_or_else(|| MissionError::InvalidInput(format!("unknown conversation: {}", id)))?,
            None => self.persist.conversations().create().await?,
        };
        self.persist
            .conversations()
            .ensure_title(conversation.id, objective)
            .await?;

        let log = self.persist.missions().create(conversation.id, objective).await?;
        self.persist.missions().mark_in_progress(log.id).await?;

        match self.execute(objective, conversation.id, log.id, sink).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                let reason = err.to_string();
                if let Err(persist_err) = self.persist.missions().fail(log.id, &reason).await {
                    warn!(error = %persist_err, "failed to record mission failure");
                }
                Err(err)
            }
        }
    }

    async fn execute(
        &self,
        objective: &str,
        conversation_id: i64,
        mission_id: i64,
        sink: &EventSink,
    ) -> Result<MissionOutcome> {
        let mut trace: Vec<TraceEntry> = Vec::new();
        let mut pool = IntelPool::new();

        self.checkpoint(sink)?;
        sink.emit(thinking("Analyzing mission objective...")).await;

        sink.emit(thinking("Generating execution plan...")).await;
        let mut plan = self.planner.plan(objective).await;
        if plan.is_empty() {
            warn!("empty plan, falling back to a direct search of the objective");
            plan = vec![PlanStep {
                ordinal: 1,
                tool: ToolKind::WebSearch,
                args: json!({ "query": objective }),
                thought: "Direct search of the objective.".to_string(),
            }];
        }

        let research_steps: Vec<PlanStep> =
            plan.iter().filter(|s| s.tool.is_research()).cloned().collect();
        let action_steps: Vec<PlanStep> =
            plan.iter().filter(|s| s.tool.is_action()).cloned().collect();

        // analyze + plan + research + curate + synthesize + actions
        let total = 2 + research_steps.len() + 2 + action_steps.len();
        let mut progress = ProgressCounter::new(total);
        progress.advance(sink).await;
        sink.emit(thinking(&format!("Plan generated with {} steps", plan.len()))).await;
        progress.advance(sink).await;

        for step in &research_steps {
            self.checkpoint(sink)?;
            let tool = step.tool.as_str();
            sink.emit(MissionEvent::ToolStart {
                tool: tool.to_string(),
                args: display_args(&step.args),
            })
            .await;
            progress.advance(sink).await;

            match self.run_research_step(step, objective, conversation_id).await {
                Ok((origin, result)) => {
                    pool.append(tool, &origin, &result);
                    trace.push(TraceEntry {
                        tool: tool.to_string(),
                        status: Some("Gathered".to_string()),
                        result: None,
                    });
                    sink.emit(MissionEvent::ToolComplete {
                        tool: tool.to_string(),
                        summary: summarize(&result, 150),
                        error: None,
                    })
                    .await;
                }
                Err(e) => {
                    warn!(tool, error = %e, "research step failed, continuing");
                    trace.push(TraceEntry {
                        tool: tool.to_string(),
                        status: Some("Error".to_string()),
                        result: Some(summarize(&e.to_string(), 100)),
                    });
                    sink.emit(MissionEvent::ToolComplete {
                        tool: tool.to_string(),
                        summary: format!("Error: {}", summarize(&e.to_string(), 100)),
                        error: Some(true),
                    })
                    .await;
                }
            }
        }

        // A pricing mission must not reach synthesis without price
        // evidence; run the dedicated rephrasing sweep if nothing came in.
        if has_price_intent(objective) && !pool.has_price_evidence() {
            self.checkpoint(sink)?;
            let product = extract_product(objective);
            let year = chrono::Utc::now().year();
            let origin = format!("{} price {}", product, year);
            sink.emit(MissionEvent::ToolStart {
                tool: ToolKind::WebSearch.as_str().to_string(),
                args: json!({ "query": summarize(&origin, 100) }),
            })
            .await;
            match self.search.search_prices(&product, year).await {
                Ok(result) => {
                    pool.append(ToolKind::WebSearch.as_str(), &origin, &result);
                    trace.push(TraceEntry {
                        tool: ToolKind::WebSearch.as_str().to_string(),
                        status: Some("Gathered".to_string()),
                        result: None,
                    });
                    sink.emit(MissionEvent::ToolComplete {
                        tool: ToolKind::WebSearch.as_str().to_string(),
                        summary: summarize(&result, 150),
                        error: None,
                    })
                    .await;
                }
                Err(e) => {
                    warn!(error = %e, "price sweep failed, continuing");
                    trace.push(TraceEntry {
                        tool: ToolKind::WebSearch.as_str().to_string(),
                        status: Some("Error".to_string()),
                        result: Some(summarize(&e.to_string(), 100)),
                    });
                    sink.emit(MissionEvent::ToolComplete {
                        tool: ToolKind::WebSearch.as_str().to_string(),
                        summary: format!("Error: {}", summarize(&e.to_string(), 100)),
                        error: Some(true),
                    })
                    .await;
                }
            }
        }

        if pool.is_empty() {
            return Err(MissionError::Planning(
                "no intelligence gathered; planning and fallback research both failed".to_string(),
            ));
        }

        self.checkpoint(sink)?;
        sink.emit(thinking("Processing gathered intelligence...")).await;
        progress.advance(sink).await;
        let budget = self
            .llm
            .max_payload_bytes()
            .saturating_sub(SYNTHESIS_PROMPT_OVERHEAD);
        let intel = pool.materialize(budget);

        self.checkpoint(sink)?;
        sink.emit(thinking("Synthesizing final report...")).await;
        progress.advance(sink).await;
        let report = match self
            .llm
            .generate(&synthesis_prompt(&intel), &self.llm_options)
            .await
        {
            Ok(report) => report,
            Err(LlmError::PayloadTooLarge { size, limit }) => {
                warn!(size, limit, "synthesis payload rejected, retrying with a tightened pool");
                let tightened = pool.materialize_summary(budget / 4);
                self.llm
                    .generate(&synthesis_prompt(&tightened), &self.llm_options)
                    .await
                    .map_err(|e| MissionError::Synthesis(e.to_string()))?
            }
            Err(e) => return Err(MissionError::Synthesis(e.to_string())),
        };

        for step in &action_steps {
            self.checkpoint(sink)?;
            let action = step.tool.as_str();
            let title = step
                .args
                .get("title")
                .and_then(|t| t.as_str())
                .unwrap_or("Market Intelligence Report")
                .to_string();
            sink.emit(MissionEvent::ActionStart {
                action: action.to_string(),
                title: summarize(&title, 100),
            })
            .await;
            progress.advance(sink).await;

            match self.run_action_step(step, &title, &report).await {
                Ok(result) => {
                    trace.push(TraceEntry {
                        tool: action.to_string(),
                        status: None,
                        result: Some(summarize(&result, 100)),
                    });
                    sink.emit(MissionEvent::ActionComplete {
                        action: action.to_string(),
                        result: summarize(&result, 100),
                        error: None,
                    })
                    .await;
                }
                Err(e) => {
                    warn!(action, error = %e, "action failed, mission continues");
                    trace.push(TraceEntry {
                        tool: action.to_string(),
                        status: Some("Error".to_string()),
                        result: Some(summarize(&e.to_string(), 100)),
                    });
                    sink.emit(MissionEvent::ActionComplete {
                        action: action.to_string(),
                        result: format!("Error: {}", summarize(&e.to_string(), 100)),
                        error: Some(true),
                    })
                    .await;
                }
            }
        }

        self.checkpoint(sink)?;
        self.persist.missions().complete(mission_id, &report).await?;

        let report_title = format!("Report #{}: {}", mission_id, title_from_input(objective));
        if let Err(e) = self.ingestor.ingest(&report_title, &report, conversation_id).await {
            warn!(
                error = %e,
                "vector ingestion of the report failed; relational copy is authoritative"
            );
        }

        progress.finish(sink).await;
        sink.emit(thinking("Mission complete!")).await;

        Ok(MissionOutcome {
            mission_id,
            conversation_id,
            report,
            trace,
        })
    }

    fn checkpoint(&self, sink: &EventSink) -> Result<()> {
        if sink.is_cancelled() {
            Err(MissionError::Cancelled)
        } else {
            Ok(())
        }
    }

    async fn run_research_step(
        &self,
        step: &PlanStep,
        objective: &str,
        conversation_id: i64,
    ) -> std::result::Result<(String, String), ToolError> {
        match step.tool {
            ToolKind::WebSearch => {
                let query = step
                    .args
                    .get("query")
                    .and_then(|q| q.as_str())
                    .unwrap_or(objective)
                    .to_string();
                let result = self.search.search(&query).await?;
                Ok((query, result))
            }
            ToolKind::WebResearch => {
                let url = step
                    .args
                    .get("url")
                    .and_then(|u| u.as_str())
                    .ok_or_else(|| ToolError::ScrapeFailed("plan step has no url".to_string()))?;
                let result = self.scraper.scrape(url, conversation_id).await?;
                Ok((url.to_string(), result))
            }
            ToolKind::SaveToNotion | ToolKind::DispatchEmail => Err(ToolError::SearchFailed(
                "action tool dispatched in the research phase".to_string(),
            )),
        }
    }

    async fn run_action_step(
        &self,
        step: &PlanStep,
        title: &str,
        report: &str,
    ) -> std::result::Result<String, ToolError> {
        match step.tool {
            ToolKind::SaveToNotion => self.actions.save_to_notebook(title, report).await,
            ToolKind::DispatchEmail => {
                let to = step
                    .args
                    .get("to")
                    .and_then(|t| t.as_str())
                    .map(str::to_string)
                    .or_else(|| self.actions.default_email_to())
                    .ok_or_else(|| {
                        ToolError::ActionFailed("no email recipient configured".to_string())
                    })?;
                let subject = step
                    .args
                    .get("subject")
                    .and_then(|s| s.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Research report: {}", title));
                self.actions.dispatch_email(&to, &subject, report).await
            }
            ToolKind::WebSearch | ToolKind::WebResearch => Err(ToolError::ActionFailed(
                "research tool dispatched in the action phase".to_string(),
            )),
        }
    }
}

/// Monotonic progress emitter.
struct ProgressCounter {
    step: usize,
    total: usize,
}

impl ProgressCounter {
    fn new(total: usize) -> Self {
        Self { step: 0, total }
    }

    async fn advance(&mut self, sink: &EventSink) {
        self.step = (self.step + 1).min(self.total);
        sink.emit(MissionEvent::Progress {
            step: self.step,
            total: self.total,
            percentage: ((self.step * 100) / self.total.max(1)) as u8,
        })
        .await;
    }

    async fn finish(&mut self, sink: &EventSink) {
        self.step = self.total;
        sink.emit(MissionEvent::Progress {
            step: self.total,
            total: self.total,
            percentage: 100,
        })
        .await;
    }
}

fn thinking(content: &str) -> MissionEvent {
    MissionEvent::Thinking {
        content: content.to_string(),
    }
}

fn summarize(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}

fn display_args(args: &Value) -> Value {
    let mut display = serde_json::Map::new();
    if let Some(query) = args.get("query").and_then(|q| q.as_str()) {
        display.insert("query".to_string(), json!(summarize(query, 100)));
    } else if let Some(url) = args.get("url").and_then(|u| u.as_str()) {
        display.insert("url".to_string(), json!(url));
    }
    Value::Object(display)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarize_truncates_with_ellipsis() {
        assert_eq!(summarize("short", 10), "short");
        let long = summarize(&"x".repeat(200), 150);
        assert_eq!(long.chars().count(), 153);
        assert!(long.ends_with("..."));
    }

    #[test]
    fn display_args_prefers_query_and_truncates() {
        let args = json!({ "query": "q".repeat(300) });
        let display = display_args(&args);
        let shown = display["query"].as_str().unwrap();
        assert!(shown.chars().count() <= 103);

        let args = json!({ "url": "https://example.com/pricing" });
        assert_eq!(display_args(&args)["url"], "https://example.com/pricing");
    }
}
