//! Application state
//!
//! Shared across all handlers. Everything here is either immutable after
//! startup or safe for concurrent sessions (the breaker registry and the
//! summary sink).

use std::sync::Arc;

use callbridge_config::Settings;
use callbridge_session::{
    AgentConnector, BreakerRegistry, CircuitBreaker, InMemorySummarySink, SummarySink,
    WsAgentConnector,
};
use callbridge_tools::{
    default_dispatcher, FunctionDispatcher, StubMessageStore, StubSchedulingService,
};

/// Peer name under which the speech agent's breaker is registered.
pub const AGENT_PEER: &str = "speech-agent";

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub breakers: Arc<BreakerRegistry>,
    pub connector: Arc<dyn AgentConnector>,
    pub dispatcher: Arc<FunctionDispatcher>,
    pub summaries: Arc<dyn SummarySink>,
}

impl AppState {
    /// State with the production connector and stub tool integrations.
    pub fn new(settings: Settings) -> Self {
        let connector = Arc::new(WsAgentConnector::new(settings.agent.clone()));
        let dispatcher = default_dispatcher(
            Arc::new(StubSchedulingService::new()),
            Arc::new(StubMessageStore::new()),
        );
        Self {
            breakers: Arc::new(BreakerRegistry::new(settings.breaker.clone())),
            settings: Arc::new(settings),
            connector,
            dispatcher: Arc::new(dispatcher),
            summaries: Arc::new(InMemorySummarySink::new()),
        }
    }

    pub fn agent_breaker(&self) -> Arc<CircuitBreaker> {
        self.breakers.for_peer(AGENT_PEER)
    }
}
