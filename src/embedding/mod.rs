//! Fixed-width embedding vectors and similarity math.
//!
//! Memories may carry one embedding each. Vectors are stored in a
//! fixed-width column chosen by dimension class: the networked backend
//! uses native `vector(N)` columns, the embedded backend stores
//! little-endian f32 BLOBs and ranks by cosine in Rust.

use crate::error::{Result, StoreError};

/// Supported embedding dimension classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VectorDimension {
    D384,
    D512,
    D768,
    D1024,
    D1536,
    D3072,
}

/// All supported dimension sizes, ascending.
pub const SUPPORTED_DIMENSIONS: &[usize] = &[384, 512, 768, 1024, 1536, 3072];

impl VectorDimension {
    /// Resolve a dimension class from a vector length.
    pub fn from_len(len: usize) -> Result<Self> {
        match len {
            384 => Ok(VectorDimension::D384),
            512 => Ok(VectorDimension::D512),
            768 => Ok(VectorDimension::D768),
            1024 => Ok(VectorDimension::D1024),
            1536 => Ok(VectorDimension::D1536),
            3072 => Ok(VectorDimension::D3072),
            other => Err(StoreError::UnsupportedDimension(other)),
        }
    }

    /// Vector length for this class.
    pub fn size(self) -> usize {
        match self {
            VectorDimension::D384 => 384,
            VectorDimension::D512 => 512,
            VectorDimension::D768 => 768,
            VectorDimension::D1024 => 1024,
            VectorDimension::D1536 => 1536,
            VectorDimension::D3072 => 3072,
        }
    }

    /// Name of the embedding column holding vectors of this class.
    pub fn column(self) -> &'static str {
        match self {
            VectorDimension::D384 => "dim_384",
            VectorDimension::D512 => "dim_512",
            VectorDimension::D768 => "dim_768",
            VectorDimension::D1024 => "dim_1024",
            VectorDimension::D1536 => "dim_1536",
            VectorDimension::D3072 => "dim_3072",
        }
    }

    /// All dimension classes, ascending by size.
    pub fn all() -> [VectorDimension; 6] {
        [
            VectorDimension::D384,
            VectorDimension::D512,
            VectorDimension::D768,
            VectorDimension::D1024,
            VectorDimension::D1536,
            VectorDimension::D3072,
        ]
    }
}

/// Cosine similarity between two vectors.
///
/// Returns 0.0 for mismatched lengths or zero-norm vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Encode a vector as a little-endian f32 BLOB for the embedded backend.
pub fn vector_to_blob(vector: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(vector.len() * 4);
    for v in vector {
        blob.extend_from_slice(&v.to_le_bytes());
    }
    blob
}

/// Decode a little-endian f32 BLOB back into a vector.
pub fn blob_to_vector(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(StoreError::InvalidInput(format!(
            "embedding blob length {} is not a multiple of 4",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Render a vector as a pgvector literal, e.g. `[0.1,0.2,0.3]`.
pub fn vector_literal(vector: &[f32]) -> String {
    let mut out = String::with_capacity(vector.len() * 8 + 2);
    out.push('[');
    for (i, v) in vector.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&v.to_string());
    }
    out.push(']');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_from_len() {
        assert_eq!(VectorDimension::from_len(384).unwrap().column(), "dim_384");
        assert_eq!(
            VectorDimension::from_len(1536).unwrap().column(),
            "dim_1536"
        );
        assert!(matches!(
            VectorDimension::from_len(100),
            Err(StoreError::UnsupportedDimension(100))
        ));
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let v = vec![0.5, -0.25, 1.0, 0.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_mismatched_len() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_blob_round_trip() {
        let v = vec![0.125, -3.5, 42.0];
        let blob = vector_to_blob(&v);
        assert_eq!(blob.len(), 12);
        assert_eq!(blob_to_vector(&blob).unwrap(), v);
    }

    #[test]
    fn test_blob_rejects_ragged_length() {
        assert!(blob_to_vector(&[0u8, 1, 2]).is_err());
    }

    #[test]
    fn test_vector_literal() {
        assert_eq!(vector_literal(&[1.0, -0.5]), "[1,-0.5]");
    }
}
