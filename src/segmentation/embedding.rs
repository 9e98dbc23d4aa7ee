//! Slice embeddings from the external feature-extraction service.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ndarray::Array4;
use web_time::Instant;

use crate::constants::EMBEDDING_SHAPE;
use crate::error::{Result, ViewerError};
use crate::segmentation::CancellationToken;
use crate::segmentation::protocol::{EmbeddingRequest, EmbeddingResponse};

/// Transport to the embedding endpoint (`POST /imgEmbeddings`).
pub trait EmbeddingService {
    fn fetch(&self, request: &EmbeddingRequest) -> Result<EmbeddingResponse>;
}

/// Validated embedding of one slice, still in its wire encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingHandle {
    pub slice: usize,
    encoded: String,
}

impl EmbeddingHandle {
    /// Validate a base64 blob against the embedding shape.
    pub fn new(slice: usize, encoded: String) -> Result<Self> {
        let bytes = STANDARD.decode(encoded.as_bytes())?;
        let expected = embedding_len() * std::mem::size_of::<f32>();
        if bytes.len() != expected {
            return Err(ViewerError::embedding(format!(
                "expected {} bytes, got {}",
                expected,
                bytes.len()
            )));
        }
        Ok(Self { slice, encoded })
    }

    /// Base64 blob as sent to the worker.
    pub fn encoded(&self) -> &str {
        &self.encoded
    }
}

fn embedding_len() -> usize {
    EMBEDDING_SHAPE.iter().product()
}

/// Decode a base64 little-endian float32 blob into a `[1, 256, 64, 64]` tensor.
pub fn decode_embedding(encoded: &str) -> Result<Array4<f32>> {
    let bytes = STANDARD.decode(encoded.as_bytes())?;
    let values: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    if values.len() != embedding_len() || bytes.len() % 4 != 0 {
        return Err(ViewerError::embedding(format!(
            "expected {} floats, got {} bytes",
            embedding_len(),
            bytes.len()
        )));
    }

    let [a, b, c, d] = EMBEDDING_SHAPE;
    Array4::from_shape_vec((a, b, c, d), values).map_err(|e| ViewerError::embedding(e.to_string()))
}

/// Encode a tensor as a base64 little-endian float32 blob.
pub fn encode_embedding(embedding: &Array4<f32>) -> String {
    let bytes: Vec<u8> = embedding.iter().flat_map(|v| v.to_le_bytes()).collect();
    STANDARD.encode(bytes)
}

/// Fetch the embedding of one slice.
///
/// The token is checked before the request and after the response; a
/// cancellation in between discards the response.
pub fn request_embedding(
    service: &dyn EmbeddingService,
    request: &EmbeddingRequest,
    token: &CancellationToken,
) -> Result<EmbeddingHandle> {
    token.check()?;
    let started = Instant::now();

    let response = service.fetch(request).map_err(|e| match e {
        ViewerError::UpstreamService(_) | ViewerError::Cancelled => e,
        other => ViewerError::upstream(other.to_string()),
    })?;

    token.check()?;
    log::info!(
        "Fetched embedding for slice {} ({}) in {:?}",
        request.slice,
        request.model_variant,
        started.elapsed()
    );
    EmbeddingHandle::new(request.slice, response.img_emb)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::Cell;

    /// Embedding service answering with a constant tensor.
    pub(crate) struct FixedEmbeddings {
        pub calls: Cell<usize>,
        pub fail: bool,
    }

    impl FixedEmbeddings {
        pub(crate) fn new() -> Self {
            Self {
                calls: Cell::new(0),
                fail: false,
            }
        }
    }

    impl EmbeddingService for FixedEmbeddings {
        fn fetch(&self, _request: &EmbeddingRequest) -> Result<EmbeddingResponse> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                return Err(ViewerError::upstream("503 Service Unavailable"));
            }
            let [a, b, c, d] = EMBEDDING_SHAPE;
            Ok(EmbeddingResponse {
                img_emb: encode_embedding(&Array4::from_elem((a, b, c, d), 0.25)),
            })
        }
    }

    fn request() -> EmbeddingRequest {
        EmbeddingRequest {
            path: "ct.nii.gz".to_string(),
            slice: 3,
            ndim: 3,
            min: 0.0,
            max: 100.0,
            model_variant: "vit_h".to_string(),
        }
    }

    #[test]
    fn test_decode_round_trip() {
        let [a, b, c, d] = EMBEDDING_SHAPE;
        let mut tensor = Array4::<f32>::zeros((a, b, c, d));
        tensor[[0, 1, 2, 3]] = 1.5;
        let decoded = decode_embedding(&encode_embedding(&tensor)).unwrap();
        assert_eq!(decoded.shape(), &EMBEDDING_SHAPE);
        assert_eq!(decoded[[0, 1, 2, 3]], 1.5);
    }

    #[test]
    fn test_wrong_size_rejected() {
        let short = STANDARD.encode([0u8; 16]);
        assert!(matches!(decode_embedding(&short), Err(ViewerError::Embedding(_))));
        assert!(EmbeddingHandle::new(0, short).is_err());
        assert!(matches!(decode_embedding("!!"), Err(ViewerError::Base64(_))));
    }

    #[test]
    fn test_request_embedding() {
        let service = FixedEmbeddings::new();
        let handle = request_embedding(&service, &request(), &CancellationToken::new()).unwrap();
        assert_eq!(handle.slice, 3);
        assert_eq!(service.calls.get(), 1);
    }

    #[test]
    fn test_cancelled_request_not_sent() {
        let service = FixedEmbeddings::new();
        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(
            request_embedding(&service, &request(), &token),
            Err(ViewerError::Cancelled)
        ));
        assert_eq!(service.calls.get(), 0);
    }

    #[test]
    fn test_upstream_failure() {
        let service = FixedEmbeddings {
            fail: true,
            ..FixedEmbeddings::new()
        };
        assert!(matches!(
            request_embedding(&service, &request(), &CancellationToken::new()),
            Err(ViewerError::UpstreamService(_))
        ));
    }
}
