//! Byte transforms applied to serialized snapshots.

use super::{BoxFuture, StorageError, StorageResult};

/// Compresses snapshot JSON before it reaches the object store.
#[cfg(not(target_arch = "wasm32"))]
pub trait Compressor: Send + Sync {
    fn compress(&self, json: &str) -> BoxFuture<'_, StorageResult<Vec<u8>>>;

    fn decompress(&self, bytes: &[u8]) -> BoxFuture<'_, StorageResult<String>>;
}

/// Compresses snapshot JSON before it reaches the object store.
#[cfg(target_arch = "wasm32")]
pub trait Compressor {
    fn compress(&self, json: &str) -> BoxFuture<'_, StorageResult<Vec<u8>>>;

    fn decompress(&self, bytes: &[u8]) -> BoxFuture<'_, StorageResult<String>>;
}

fn utf8(bytes: Vec<u8>) -> StorageResult<String> {
    String::from_utf8(bytes)
        .map_err(|e| StorageError::Compression(format!("Snapshot is not UTF-8: {}", e)))
}

/// Stores the UTF-8 bytes unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughCompressor;

impl Compressor for PassthroughCompressor {
    fn compress(&self, json: &str) -> BoxFuture<'_, StorageResult<Vec<u8>>> {
        let bytes = json.as_bytes().to_vec();
        Box::pin(async move { Ok(bytes) })
    }

    fn decompress(&self, bytes: &[u8]) -> BoxFuture<'_, StorageResult<String>> {
        let bytes = bytes.to_vec();
        Box::pin(async move { utf8(bytes) })
    }
}

/// Zstandard compression at a fixed level.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Default, Clone, Copy)]
pub struct ZstdCompressor;

#[cfg(not(target_arch = "wasm32"))]
impl ZstdCompressor {
    const LEVEL: i32 = 3;
}

#[cfg(not(target_arch = "wasm32"))]
impl Compressor for ZstdCompressor {
    fn compress(&self, json: &str) -> BoxFuture<'_, StorageResult<Vec<u8>>> {
        let result = zstd::stream::encode_all(std::io::Cursor::new(json.as_bytes()), Self::LEVEL)
            .map_err(|e| StorageError::Compression(format!("zstd encode failed: {e}")));
        Box::pin(async move { result })
    }

    fn decompress(&self, bytes: &[u8]) -> BoxFuture<'_, StorageResult<String>> {
        let result = zstd::stream::decode_all(std::io::Cursor::new(bytes))
            .map_err(|e| StorageError::Compression(format!("zstd decode failed: {e}")))
            .and_then(utf8);
        Box::pin(async move { result })
    }
}

/// The compressor used when the host does not pick one.
#[cfg(not(target_arch = "wasm32"))]
pub fn default_compressor() -> Box<dyn Compressor> {
    Box::new(ZstdCompressor)
}

#[cfg(target_arch = "wasm32")]
pub fn default_compressor() -> Box<dyn Compressor> {
    Box::new(PassthroughCompressor)
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use pollster::block_on;

    #[test]
    fn test_zstd_roundtrip() {
        let json = r#"[{"tag":"div","pos":[1.0,2.0],"size":[3.0,4.0],"classname":"note","fullSize":[3.0,4.0]}]"#;
        let compressed = block_on(ZstdCompressor.compress(json)).unwrap();
        assert_ne!(compressed, json.as_bytes());
        assert_eq!(block_on(ZstdCompressor.decompress(&compressed)).unwrap(), json);
    }

    #[test]
    fn test_zstd_rejects_garbage() {
        let result = block_on(ZstdCompressor.decompress(b"definitely not zstd"));
        assert!(matches!(result, Err(StorageError::Compression(_))));
    }

    #[test]
    fn test_passthrough_keeps_bytes() {
        let compressed = block_on(PassthroughCompressor.compress("[]")).unwrap();
        assert_eq!(compressed, b"[]");
        assert_eq!(block_on(PassthroughCompressor.decompress(&compressed)).unwrap(), "[]");
        assert!(block_on(PassthroughCompressor.decompress(&[0xff, 0xfe])).is_err());
    }
}
