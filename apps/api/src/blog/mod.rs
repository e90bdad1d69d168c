// Content aggregation: tag statistics, the merged timeline, search-index
// text and mixed-kind loading. Handlers expose tag pages and search.

pub mod handlers;
pub mod loader;
pub mod search;
pub mod tags;
pub mod timeline;
