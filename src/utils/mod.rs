//! Utility modules for the page index.

pub mod date;
pub mod hash;
pub mod natural;
pub mod slug;
