// Micropub: remote publishing of new Entries.
// A request is authorised, decoded, turned into a Draft and persisted, in
// that order; nothing is decoded before the token checks out.

pub mod auth;
pub mod decode;
pub mod entry;
pub mod handlers;

pub use decode::{parse_payload, MicropubPayload};
pub use entry::construct_entry;
