pub mod enrichment;
pub mod fitness;
pub mod http;
pub mod marketplace;
pub mod pagination;
pub mod scrobbles;
pub mod token_refresh;
pub mod watch_history;
