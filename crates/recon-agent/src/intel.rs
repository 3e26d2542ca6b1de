//! Intel pool curation
//!
//! Evidence gathered during a mission accumulates here and must fit the
//! LLM gateway's payload ceiling at synthesis time. Pricing evidence is
//! the product of the whole exercise, so truncation always sacrifices
//! general records before price-bearing ones.

use regex::{Regex, RegexSet};
use std::sync::LazyLock;

/// Per-record content cap applied on append.
pub const RECORD_CAP_CHARS: usize = 2000;

/// Price-bearing records are never truncated below this many bytes.
const PRICE_FLOOR_BYTES: usize = 300;

static PRICE_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"\$\s?\d",
        r"(?i)\b(?:usd|eur|gbp)\b",
        r"[€£]\s?\d",
        r"(?i)(?:price|pricing|msrp|cost)\D{0,12}\d",
    ])
    .expect("price patterns compile")
});

static PRICE_FINDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:[$€£]\s?\d[\d,.]*|\d[\d,.]*\s?(?:usd|eur|gbp)\b|(?:price|pricing|msrp|cost)\D{0,12}\d[\d,.]*)",
    )
    .expect("price finder compiles")
});

const PRICE_INTENT_KEYWORDS: &[&str] = &["price", "pricing", "cost", "msrp", "how much"];

/// True when the text carries something that looks like a monetary value.
pub fn contains_price_signal(text: &str) -> bool {
    PRICE_PATTERNS.is_match(text)
}

/// True when the objective itself is asking about pricing.
pub fn has_price_intent(objective: &str) -> bool {
    let lower = objective.to_lowercase();
    PRICE_INTENT_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

const PRODUCT_STOPWORDS: &[&str] = &[
    "find", "get", "search", "what", "is", "are", "the", "a", "an", "for", "of", "in", "on",
    "current", "latest", "price", "prices", "pricing", "cost", "costs", "msrp", "how", "much",
    "buy", "and",
];

/// Strip intent words and year tokens from a pricing objective to get the
/// product phrase the price search should target.
pub fn extract_product(objective: &str) -> String {
    let product: Vec<&str> = objective
        .split_whitespace()
        .filter(|word| {
            let bare = word.trim_matches(|c: char| !c.is_alphanumeric());
            if bare.is_empty() {
                return false;
            }
            if let Ok(year) = bare.parse::<u32>() {
                if (1900..=2099).contains(&year) {
                    return false;
                }
            }
            !PRODUCT_STOPWORDS.contains(&bare.to_lowercase().as_str())
        })
        .collect();

    if product.is_empty() {
        objective.trim().to_string()
    } else {
        product.join(" ")
    }
}

#[derive(Debug, Clone)]
pub struct IntelRecord {
    pub source_tool: String,
    pub origin: String,
    pub content: String,
    pub price_bearing: bool,
}

/// Per-mission, in-memory evidence pool. Append order is preserved.
#[derive(Debug, Default)]
pub struct IntelPool {
    records: Vec<IntelRecord>,
}

impl IntelPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record, capping its content and classifying it.
    pub fn append(&mut self, source_tool: &str, origin: &str, content: &str) {
        let capped = clamp_chars(content, RECORD_CAP_CHARS);
        let price_bearing = contains_price_signal(&capped);
        self.records.push(IntelRecord {
            source_tool: source_tool.to_string(),
            origin: origin.to_string(),
            content: capped,
            price_bearing,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn has_price_evidence(&self) -> bool {
        self.records.iter().any(|r| r.price_bearing)
    }

    /// Produce the text the synthesis prompt embeds. The result always
    /// fits `budget` bytes:
    /// 1. everything verbatim if it already fits;
    /// 2. otherwise all price-bearing records (longest truncated first,
    ///    down to a floor) plus whatever general records still fit;
    /// 3. if price records alone cannot fit, a distilled price summary;
    /// 4. with no price data, general records dropped from the tail.
    pub fn materialize(&self, budget: usize) -> String {
        let full = render(self.records.iter().map(|r| (r, r.content.as_str())));
        if full.len() <= budget {
            return full;
        }

        if self.has_price_evidence() {
            if let Some(text) = self.fit_with_price_priority(budget) {
                return text;
            }
            return clamp_bytes(&self.price_summary(), budget);
        }

        // General records only: drop latest arrivals until it fits.
        let mut kept = self.records.len();
        loop {
            let text = render(self.records[..kept].iter().map(|r| (r, r.content.as_str())));
            if text.len() <= budget || kept <= 1 {
                return clamp_bytes(&text, budget);
            }
            kept -= 1;
        }
    }

    /// Tightened materialization used when the gateway still rejects the
    /// synthesis payload: straight to the price summary when price data
    /// exists, otherwise a hard clamp.
    pub fn materialize_summary(&self, budget: usize) -> String {
        if self.has_price_evidence() {
            clamp_bytes(&self.price_summary(), budget)
        } else {
            self.materialize(budget)
        }
    }

    fn fit_with_price_priority(&self, budget: usize) -> Option<String> {
        // Working copy of price contents; general slots start empty.
        let mut contents: Vec<Option<String>> = self
            .records
            .iter()
            .map(|r| r.price_bearing.then(|| r.content.clone()))
            .collect();

        let size = |contents: &[Option<String>]| {
            render(
                self.records
                    .iter()
                    .zip(contents)
                    .filter_map(|(r, c)| c.as_deref().map(|c| (r, c))),
            )
            .len()
        };

        // Shrink price records longest-first until they fit or bottom out.
        loop {
            let current = size(&contents);
            if current <= budget {
                break;
            }
            let overshoot = current - budget;
            let longest = contents
                .iter_mut()
                .filter_map(|c| c.as_mut())
                .filter(|c| c.len() > PRICE_FLOOR_BYTES)
                .max_by_key(|c| c.len());
            match longest {
                Some(content) => {
                    let target = content.len().saturating_sub(overshoot).max(PRICE_FLOOR_BYTES);
                    *content = clamp_bytes(content, target);
                }
                None => return None,
            }
        }

        // Re-admit general records in append order while they fit; the
        // first overflow drops the rest of the tail.
        for (idx, record) in self.records.iter().enumerate() {
            if record.price_bearing {
                continue;
            }
            contents[idx] = Some(record.content.clone());
            if size(&contents) > budget {
                contents[idx] = None;
                break;
            }
        }

        Some(render(
            self.records
                .iter()
                .zip(&contents)
                .filter_map(|(r, c)| c.as_deref().map(|c| (r, c))),
        ))
    }

    /// Distilled `(source, snippet around the price)` list.
    pub fn price_summary(&self) -> String {
        let mut lines = vec!["PRICE SUMMARY (extracted)".to_string()];
        for record in self.records.iter().filter(|r| r.price_bearing) {
            let snippet = match PRICE_FINDER.find(&record.content) {
                Some(m) => snippet_around(&record.content, m.start(), m.end(), 60),
                None => clamp_chars(&record.content, 120),
            };
            lines.push(format!(
                "- {}: {}",
                record.origin,
                snippet.split_whitespace().collect::<Vec<_>>().join(" ")
            ));
        }
        lines.join("\n")
    }
}

fn render<'a>(parts: impl Iterator<Item = (&'a IntelRecord, &'a str)>) -> String {
    parts
        .map(|(record, content)| {
            format!("--- [{}] {}\n{}", record.source_tool, record.origin, content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn clamp_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

fn clamp_bytes(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

fn snippet_around(text: &str, start: usize, end: usize, margin: usize) -> String {
    let mut from = start.saturating_sub(margin);
    while from > 0 && !text.is_char_boundary(from) {
        from -= 1;
    }
    let mut to = (end + margin).min(text.len());
    while to < text.len() && !text.is_char_boundary(to) {
        to += 1;
    }
    text[from..to].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUDGET_28K: usize = 28 * 1024;

    fn pool_with(records: &[(&str, &str, &str)]) -> IntelPool {
        let mut pool = IntelPool::new();
        for (tool, origin, content) in records {
            pool.append(tool, origin, content);
        }
        pool
    }

    #[test]
    fn classification_spots_currency_patterns() {
        assert!(contains_price_signal("the card sells for $30,000 street"));
        assert!(contains_price_signal("around 28000 USD at launch"));
        assert!(contains_price_signal("MSRP: 1499 at release"));
        assert!(contains_price_signal("€1.200 im Handel"));
        assert!(!contains_price_signal("no numbers mentioned anywhere here"));
    }

    #[test]
    fn price_intent_detection() {
        assert!(has_price_intent("Find NVIDIA H100 GPU pricing 2024"));
        assert!(has_price_intent("how much is an MI300X"));
        assert!(!has_price_intent("Summarize AMD MI300 specs"));
    }

    #[test]
    fn product_extraction_strips_intent_words_and_years() {
        assert_eq!(
            extract_product("Find NVIDIA H100 GPU pricing 2024"),
            "NVIDIA H100 GPU"
        );
        assert_eq!(extract_product("how much is the RTX 5090"), "RTX 5090");
    }

    #[test]
    fn append_caps_record_length() {
        let mut pool = IntelPool::new();
        pool.append("web_search", "q", &"x".repeat(5000));
        let text = pool.materialize(BUDGET_28K);
        assert!(text.len() < 2100);
    }

    #[test]
    fn small_pool_is_emitted_verbatim() {
        let pool = pool_with(&[
            ("web_search", "H100 price", "listed at $30,000 by a reseller"),
            ("web_research", "https://example.com", "general background text"),
        ]);
        let text = pool.materialize(BUDGET_28K);
        assert!(text.contains("$30,000"));
        assert!(text.contains("general background text"));
        assert!(text.contains("[web_search] H100 price"));
    }

    #[test]
    fn price_records_survive_pressure_over_general_ones() {
        let mut pool = IntelPool::new();
        pool.append("web_search", "padding-1", &"general filler ".repeat(130));
        pool.append("web_search", "price-hit", "vendor quote: $30,000 per unit");
        pool.append("web_search", "padding-2", &"more filler ".repeat(130));

        let text = pool.materialize(2100);
        assert!(text.len() <= 2100);
        assert!(text.contains("$30,000"));
    }

    #[test]
    fn all_price_overflow_falls_back_to_summary() {
        let mut pool = IntelPool::new();
        for i in 0..100 {
            let content = format!("offer {} at $30,0{:02} per unit. {}", i, i, "pad ".repeat(480));
            pool.append("web_search", &format!("query-{}", i), &content);
        }

        let text = pool.materialize(BUDGET_28K);
        assert!(text.len() <= BUDGET_28K);
        assert!(text.starts_with("PRICE SUMMARY"));
    }

    #[test]
    fn general_only_overflow_drops_the_tail_first() {
        let mut pool = IntelPool::new();
        pool.append("web_search", "first", &"aa ".repeat(400));
        pool.append("web_search", "second", &"bb ".repeat(400));
        pool.append("web_search", "third", &"cc ".repeat(400));

        let text = pool.materialize(1500);
        assert!(text.len() <= 1500);
        assert!(text.contains("first"));
        assert!(!text.contains("[web_search] third"));
    }

    #[test]
    fn materialize_respects_every_budget() {
        let pool = pool_with(&[
            ("web_search", "a", "price is $100 for the base model"),
            ("web_research", "https://b.example", "long general description of the market"),
            ("web_search", "c", "competitor lists it at $250"),
        ]);
        for budget in [64usize, 200, 500, 4096, BUDGET_28K] {
            let text = pool.materialize(budget);
            assert!(text.len() <= budget, "budget {} violated: {}", budget, text.len());
        }
    }

    #[test]
    fn price_summary_keeps_source_and_value() {
        let pool = pool_with(&[(
            "web_search",
            "H100 price 2024",
            "Multiple retailers confirm the NVIDIA H100 sells for $30,000 in volume.",
        )]);
        let summary = pool.price_summary();
        assert!(summary.contains("H100 price 2024"));
        assert!(summary.contains("$30,000"));
    }

    #[test]
    fn tightened_materialization_forces_summary_mode() {
        let pool = pool_with(&[
            ("web_search", "q1", "unit price $500 quoted here with plenty of prose around it"),
            ("web_search", "q2", "general chatter with no numbers"),
        ]);
        let text = pool.materialize_summary(BUDGET_28K);
        assert!(text.starts_with("PRICE SUMMARY"));
        assert!(text.contains("$500"));
    }
}
