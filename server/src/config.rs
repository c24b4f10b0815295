//! Configuration (§6 environment variable list) plus the CLI surface
//! that can override the bind address and memory root for local runs.

use std::path::PathBuf;

use clap::Parser;
use dr_graph::GraphSettings;
use dr_graph::ModeConfig;
use dr_search::Blocklists;

/// Binds and data-root overrides; everything domain-specific comes from
/// the environment (§6), not from flags, since the env list is the part
/// of the contract a deployment actually needs to vary.
#[derive(Debug, Parser)]
#[command(name = "dr-server", about = "Deep research engine server")]
pub struct Cli {
    /// Address to bind the HTTP/WebSocket listener on.
    #[arg(long, env = "DR_SERVER_BIND", default_value = "0.0.0.0:8080")]
    pub bind: String,

    /// Root directory for per-session agent-file trees (§3 draft artifact tree).
    #[arg(long, env = "DR_SERVER_MEMORY_ROOT", default_value = "./dr-data/memory")]
    pub memory_root: PathBuf,

    /// Verbosity shorthand; repeat for more (`-v` debug, `-vv` trace).
    /// `RUST_LOG` takes precedence when set.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Per-mode iteration/concurrency budgets, read from §6's
/// `{SPEED,BALANCED,QUALITY}_MAX_{ITERATIONS,CONCURRENT}` plus the
/// `DEEP_RESEARCH_*` variables that tune the full graph run.
#[derive(Debug, Clone, Copy)]
pub struct ModeBudgets {
    pub speed: (usize, usize),
    pub balanced: (usize, usize),
    pub quality: (usize, usize),
    pub deep_research: ModeConfig,
    pub num_agents: usize,
    /// `DEEP_RESEARCH_SUPERVISOR_MAX_ITERATIONS`: reserved for a future
    /// independent cap on the mandatory-finalisation supervisor loop;
    /// `dr-graph`'s executor currently shares one `max_iterations` budget
    /// between researcher cycles and supervisor finalisation (see
    /// DESIGN.md), so this is read and carried but not yet consumed.
    pub supervisor_max_iterations: usize,
}

/// Everything the domain layer needs, assembled from the environment
/// (§6). `RUST_LOG` is read separately by `init_tracing`, since it's
/// ambient rather than part of the domain contract.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub searxng_instance_url: Option<String>,
    pub tavily_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub chat_history_limit: usize,
    pub sources_limit: usize,
    pub blocklists: Blocklists,
    pub mode_budgets: ModeBudgets,
}

fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_list(name: &str) -> Vec<String> {
    std::env::var(name)
        .ok()
        .map(|raw| {
            raw.split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

impl AppConfig {
    /// Reads every §6 environment variable, falling back to the graph
    /// crate's own `ModeConfig::default()` / `GraphSettings::default()`
    /// numbers where a variable is unset.
    #[must_use]
    pub fn from_env() -> Self {
        let default_mode_config = ModeConfig::default();
        let default_settings = GraphSettings::default();

        Self {
            searxng_instance_url: std::env::var("SEARXNG_INSTANCE_URL").ok(),
            tavily_api_key: std::env::var("TAVILY_API_KEY").ok(),
            openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
            openai_base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            chat_history_limit: env_usize("CHAT_HISTORY_LIMIT", 50),
            sources_limit: env_usize("SOURCES_LIMIT", 20),
            blocklists: Blocklists {
                domains: env_list("SEARCH_BLOCKED_DOMAINS"),
                keywords: env_list("SEARCH_BLOCKED_KEYWORDS"),
            },
            mode_budgets: ModeBudgets {
                speed: (
                    env_usize("SPEED_MAX_ITERATIONS", 1),
                    env_usize("SPEED_MAX_CONCURRENT", 1),
                ),
                balanced: (
                    env_usize("BALANCED_MAX_ITERATIONS", 2),
                    env_usize("BALANCED_MAX_CONCURRENT", 3),
                ),
                quality: (
                    env_usize("QUALITY_MAX_ITERATIONS", default_mode_config.max_iterations),
                    env_usize("QUALITY_MAX_CONCURRENT", default_mode_config.max_concurrent),
                ),
                deep_research: ModeConfig {
                    max_iterations: env_usize(
                        "DEEP_RESEARCH_DEFAULT_MAX_ITERATIONS",
                        default_mode_config.max_iterations,
                    ),
                    max_concurrent: default_mode_config.max_concurrent,
                    max_supervisor_calls: env_usize(
                        "DEEP_RESEARCH_MAX_SUPERVISOR_CALLS",
                        default_mode_config.max_supervisor_calls,
                    ),
                    agent_max_steps: env_usize(
                        "DEEP_RESEARCH_AGENT_MAX_STEPS",
                        default_mode_config.agent_max_steps,
                    ),
                },
                num_agents: env_usize("DEEP_RESEARCH_NUM_AGENTS", default_settings.num_agents),
                supervisor_max_iterations: env_usize(
                    "DEEP_RESEARCH_SUPERVISOR_MAX_ITERATIONS",
                    default_mode_config.max_iterations,
                ),
            },
        }
    }
}
