pub mod content;
pub mod tag;

pub use content::{
    canonical_path, Blogmark, Content, ContentMeta, ContentRef, Draft, Entry, Kind, Payload,
    Quotation,
};
pub use tag::{join_tags, Tag};
