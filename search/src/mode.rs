//! Search modes and their per-mode budgets (§4.9, §6 mode aliases).

/// The four modes the classifier can route a query to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// No search; answer directly from the conversation.
    Chat,
    /// Single-pass web search (`speed`).
    Web,
    /// Multi-query search with a short research agent (`balanced`).
    DeepSearch,
    /// Exhaustive multi-iteration research agent (`quality`).
    DeepResearch,
}

impl SearchMode {
    /// Parses the transport-level mode aliases from §6.
    #[must_use]
    pub fn parse_alias(raw: &str) -> Option<Self> {
        match raw.to_lowercase().as_str() {
            "chat" | "simple" | "conversation" => Some(Self::Chat),
            "search" | "web" | "web_search" | "speed" => Some(Self::Web),
            "deep_search" | "deep" | "balanced" => Some(Self::DeepSearch),
            "deep_research" | "research" | "quality" => Some(Self::DeepResearch),
            _ => None,
        }
    }

    /// The tuning budget this mode drives the research agent with.
    #[must_use]
    pub fn tuning(self) -> ModeTuning {
        match self {
            Self::Chat => ModeTuning {
                mode: self,
                max_results: 0,
                queries: 0,
                iterations: 0,
                agent_max_steps: 0,
                mandatory_reasoning_preamble: false,
                scrape_top_n: 0,
                rerank_top_k: 0,
            },
            Self::Web => ModeTuning {
                mode: self,
                max_results: 8,
                queries: 1,
                iterations: 1,
                agent_max_steps: 1,
                mandatory_reasoning_preamble: false,
                scrape_top_n: 3,
                rerank_top_k: 6,
            },
            Self::DeepSearch => ModeTuning {
                mode: self,
                max_results: 8,
                queries: 3,
                iterations: 2,
                agent_max_steps: 4,
                mandatory_reasoning_preamble: true,
                scrape_top_n: 5,
                rerank_top_k: 8,
            },
            Self::DeepResearch => ModeTuning {
                mode: self,
                max_results: 10,
                queries: 5,
                iterations: 3,
                agent_max_steps: 8,
                mandatory_reasoning_preamble: true,
                scrape_top_n: 8,
                rerank_top_k: 12,
            },
        }
    }
}

/// Per-mode parameters for the multi-query search + research-agent stage.
#[derive(Debug, Clone, Copy)]
pub struct ModeTuning {
    /// Which mode these numbers belong to.
    pub mode: SearchMode,
    /// Search-provider results requested per query.
    pub max_results: usize,
    /// Number of distinct queries generated per round.
    pub queries: usize,
    /// Number of query-generation rounds.
    pub iterations: usize,
    /// Research agent's ReAct step budget (speed: 1, balanced: 4, quality:
    /// 6-10; here 8 for the upper end of quality).
    pub agent_max_steps: usize,
    /// Whether the agent must emit a reasoning preamble before its first
    /// tool call.
    pub mandatory_reasoning_preamble: bool,
    /// How many top-ranked results to scrape.
    pub scrape_top_n: usize,
    /// How many reranked results to keep for synthesis.
    pub rerank_top_k: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_resolve_to_the_right_mode() {
        assert_eq!(SearchMode::parse_alias("speed"), Some(SearchMode::Web));
        assert_eq!(SearchMode::parse_alias("balanced"), Some(SearchMode::DeepSearch));
        assert_eq!(SearchMode::parse_alias("quality"), Some(SearchMode::DeepResearch));
        assert_eq!(SearchMode::parse_alias("simple"), Some(SearchMode::Chat));
        assert_eq!(SearchMode::parse_alias("unknown"), None);
    }

    #[test]
    fn quality_budget_exceeds_speed_budget() {
        let speed = SearchMode::Web.tuning();
        let quality = SearchMode::DeepResearch.tuning();
        assert!(quality.agent_max_steps > speed.agent_max_steps);
        assert!(quality.iterations > speed.iterations);
    }
}
