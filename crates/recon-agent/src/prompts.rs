//! Prompt templates for planning, synthesis and intent analysis.

/// Room reserved for the synthesis template and instructions when sizing
/// the intel pool against the gateway payload ceiling.
pub const SYNTHESIS_PROMPT_OVERHEAD: usize = 4 * 1024;

pub fn plan_prompt(user_input: &str) -> String {
    format!(
        r#"You are a research mission commander. Produce a multi-step execution plan as JSON.
Output ONLY a valid JSON list of objects, no preamble.

TOOLS AVAILABLE:
- web_research: scrapes a URL. Required arg: {{"url": "string"}}
- web_search: general keyword search. Required arg: {{"query": "string"}}
- save_to_notion: archives findings. Required args: {{"title": "string", "content": "string"}}
- dispatch_email: sends results. Required args: {{"content": "string"}}

RULES:
1. The 'content' arguments of save_to_notion and dispatch_email must not be empty;
   use a placeholder instruction such as "Synthesize all findings into the final report here."
2. Pair every site-specific web_research step with a general web_search as plan B.
3. For pricing missions, generate at least 3-5 web_search steps with different
   query variations ("{{product}} price 2025", "{{product}} cost 2025",
   "{{product}} MSRP", "where to buy {{product}}", ...), and end the plan with
   archiving and emailing the numbers found.
4. Each step is an object {{"step": <int>, "tool": <tool name>, "args": <object>, "thought": <string>}}.

Mission: {user_input}
"#
    )
}

pub fn synthesis_prompt(intel_pool: &str) -> String {
    format!(
        r#"You are a senior market analyst. Analyze the DATA POOL and write a structured market intelligence report.

PROCESSING RULES:
1. Deduplicate product names by grouping obvious variations together.
2. Categorize each price by type: one-time purchase, hourly/subscription rate,
   MSRP/official, bulk/enterprise, marketplace/reseller, promotional/sale.
3. Drop malformed entries and flag obvious outliers instead of repeating them.
4. Only use data from the DATA POOL. If no price was found for a product,
   state "Price data not found" rather than guessing.

OUTPUT FORMAT:
# Market Intelligence Report

## Confirmed Pricing
A table with columns: Product | Price Type | Price | Source | Notes.

## Analysis
Price ranges per product, best values, and notable findings.

DATA POOL:
{intel_pool}
"#
    )
}

pub fn intent_prompt(user_input: &str) -> String {
    format!(
        "In one short sentence, state the core research goal of the following request. \
         Do not start executing it.\n\nRequest: {}",
        user_input
    )
}
