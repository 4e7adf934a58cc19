//! pagetree - content index for flat-file page trees.
//!
//! Discovers pages under a storage root, builds a routed tree, caches the
//! derived index behind a checksum, and serves ordered, filtered,
//! paginated collections over it.
//!
//! ```ignore
//! use pagetree::index::PageService;
//!
//! let service = PageService::open(root, Path::new("site.toml"))?;
//! let index = service.index();
//! match index.dispatch("/blog")? { ... }
//! ```

pub mod cli;
pub mod collection;
pub mod config;
pub mod index;
pub mod logger;
pub mod page;
pub mod utils;
pub mod watch;
