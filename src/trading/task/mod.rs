pub mod dispatcher;
pub mod tick_orchestrator;

pub use dispatcher::{DispatchSummary, FanOutDispatcher};
pub use tick_orchestrator::{TickOrchestrator, TickResult, TickStatus};
