//! Concrete adapters for the capability ports.
//!
//! These live on the collaborator side of the port boundary: the pipeline
//! core never names them, only the traits in [`crate::ports`].

mod memory;
mod openai;
mod page_fetcher;
mod tavily;

pub use memory::MemoryHistoryStore;
pub use openai::OpenAiChatModel;
pub use page_fetcher::HttpPageFetcher;
pub use tavily::TavilySearch;
