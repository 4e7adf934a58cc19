//! Rendering collaborator interface.
//!
//! Rendering itself happens elsewhere. The index only supplies a stable
//! cache key and a checksum per document so rendered blocks can be reused
//! until the document changes, independently of the index snapshot.

use super::Document;
use crate::log;
use crate::utils::hash::Digest;
use anyhow::Result;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

/// A rendered fragment plus the checksum it was rendered from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedBlock {
    pub content: String,
    pub checksum: String,
}

/// Turns a document into output for a layout.
pub trait Renderer {
    fn render(&self, doc: &Document, layout: &str) -> Result<String>;
}

/// Storage for rendered blocks.
pub trait BlockCache {
    fn get(&self, key: &str) -> Result<Option<RenderedBlock>>;
    fn set(&self, key: &str, block: RenderedBlock) -> Result<()>;
}

/// Process-local [`BlockCache`].
#[derive(Default)]
pub struct MemoryBlockCache {
    blocks: RwLock<FxHashMap<String, RenderedBlock>>,
}

impl MemoryBlockCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blocks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlockCache for MemoryBlockCache {
    fn get(&self, key: &str) -> Result<Option<RenderedBlock>> {
        Ok(self.blocks.read().get(key).cloned())
    }

    fn set(&self, key: &str, block: RenderedBlock) -> Result<()> {
        self.blocks.write().insert(key.to_owned(), block);
        Ok(())
    }
}

/// Cache key of `doc` rendered with `layout`.
pub fn block_key(doc: &Document, layout: &str) -> String {
    Digest::new().part(doc.cache_key()).part(layout).hex()
}

/// Render through `cache`.
///
/// A cached block is reused only while its checksum equals the document id.
/// Cache failures are logged and fall through to a fresh render.
pub fn render_cached(
    doc: &Document,
    layout: &str,
    renderer: &dyn Renderer,
    cache: &dyn BlockCache,
) -> Result<RenderedBlock> {
    let key = block_key(doc, layout);

    match cache.get(&key) {
        Ok(Some(block)) if block.checksum == doc.id => return Ok(block),
        Ok(_) => {}
        Err(err) => log!("error"; "render cache read `{}`: {err:#}", doc.route),
    }

    let block = RenderedBlock {
        content: renderer.render(doc, layout)?,
        checksum: doc.id.clone(),
    };

    if let Err(err) = cache.set(&key, block.clone()) {
        log!("error"; "render cache write `{}`: {err:#}", doc.route);
    }

    Ok(block)
}
