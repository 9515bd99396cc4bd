pub mod exchange;
pub mod llm_client;
pub mod macro_source;
pub mod observability;
pub mod persistence;
pub mod sentiment;
