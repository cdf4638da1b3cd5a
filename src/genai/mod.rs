//! 生成式 AI 上下文缓存：创建与删除缓存内容。
//!
//! Generative-AI context cache access.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`ContextCacheService`] | Trait seam the refresh handler depends on |
//! | [`VertexCacheClient`] | Vertex AI `cachedContents` REST implementation |
//! | [`CreateCacheRequest`] | What to cache: document, instruction, name, expiry |
//! | [`CachedContent`] | The cache resource returned by the service |

mod client;
mod types;

pub use client::{ContextCacheService, VertexCacheClient};
pub use types::{CachedContent, Content, CreateCacheRequest, FileData, Part, UsageMetadata};
