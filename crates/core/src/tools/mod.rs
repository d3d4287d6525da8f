//! # Tools
//!
//! External lookup tools used by the research agent.
//!
//! - `search` - Web search client (Google Custom Search)

pub mod search;

pub use search::{
    GoogleSearchClient, SearchError, SearchHit, SearchProvider, SearchResultSet,
    MAX_RESULTS_PER_QUERY,
};
