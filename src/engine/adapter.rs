//! Native engine adapter stub.
//!
//! The adapter is the integration point for native transfer-engine
//! bindings. Until those are linked, every operation reports the engine as
//! unavailable so the HTTP surface degrades to 503 on transfer endpoints
//! while search, browsing, and library glue keep working.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use super::{
    AddOptions, EngineError, FileManifest, TransferEngine, TransferHandle, TransferSource,
};

#[derive(Debug, Default)]
pub struct NativeEngine;

impl NativeEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TransferEngine for NativeEngine {
    async fn add_transfer(
        &self,
        source: &TransferSource,
        options: AddOptions,
    ) -> Result<Arc<dyn TransferHandle>, EngineError> {
        let kind = match source {
            TransferSource::Magnet(_) => "magnet",
            TransferSource::Metainfo(_) => "metainfo",
        };
        warn!(kind, save_path = %options.save_path.display(), "native engine bindings not linked");
        Err(EngineError::Unavailable(
            "native engine bindings not linked".to_string(),
        ))
    }

    fn parse_metainfo(&self, _bytes: &[u8]) -> Result<FileManifest, EngineError> {
        warn!("native engine bindings not linked");
        Err(EngineError::Unavailable(
            "native engine bindings not linked".to_string(),
        ))
    }
}
