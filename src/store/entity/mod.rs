//! sea-orm entities backing the local mirror.

pub mod node;
pub mod profile;
pub mod share_link;
pub mod user;
