//! Resilient LLM invocation layer.
//!
//! Composition, innermost to outermost: a backend call, wrapped in a bounded
//! retry policy, wrapped in a per-backend circuit breaker, selected by a
//! primary/fallback facade. The breaker only ever observes the final outcome
//! of a whole retry sequence.

pub mod backend;
pub mod breaker;
pub mod chatgpt;
pub mod client;
pub mod copilot;
pub mod retry;

pub use backend::{resolve_env_var, GenerationRequest, LlmBackend};
pub use breaker::{BreakerSettings, CircuitBreaker, CircuitState};
pub use chatgpt::ChatGptBackend;
pub use client::{GuardedBackend, LlmClient};
pub use copilot::CopilotBackend;
pub use retry::{RetryPolicy, Transience};
