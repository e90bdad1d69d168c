// Syndication output: Atom feeds over the merged timeline and the sitemap.

pub mod atom;
pub mod handlers;
pub mod sitemap;

pub use atom::{render_feed, FeedSource};
pub use sitemap::render_sitemap;
