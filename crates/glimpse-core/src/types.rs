use serde::{Deserialize, Serialize};

/// Bounding box for a detected face in original-frame pixel coordinates,
/// with optional facial landmarks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceBox {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl FaceBox {
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }
}

/// Face embedding vector (512-dimensional for ArcFace).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "w600k_r50").
    pub model_version: Option<String>,
}

impl Embedding {
    /// Compute cosine similarity between two embeddings.
    ///
    /// Returns a value in [-1, 1]. Higher = more similar.
    pub fn similarity(&self, other: &Embedding) -> f32 {
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 { dot / denom } else { 0.0 }
    }

    /// Compute Euclidean distance between two embeddings.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// A face detected in one frame: bounding box plus its embedding.
/// Recomputed every frame, never persisted.
#[derive(Debug, Clone)]
pub struct DetectedFace {
    pub bbox: FaceBox,
    pub embedding: Embedding,
}

/// A reference face loaded at startup, named after its image file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnownFace {
    pub name: String,
    pub embedding: Embedding,
}

/// Default cosine-similarity threshold for a positive match.
pub const DEFAULT_COSINE_THRESHOLD: f32 = 0.40;

/// Default Euclidean-distance threshold for a positive match.
///
/// For L2-normalized embeddings, d² = 2·(1 − cos), so this lands at
/// roughly the same operating point as [`DEFAULT_COSINE_THRESHOLD`].
pub const DEFAULT_EUCLIDEAN_THRESHOLD: f32 = 1.10;

/// Boolean comparison between a probe embedding and one reference embedding.
///
/// The threshold lives in the predicate, not the call site, so the
/// false-accept/false-reject operating point is tunable in one place.
pub trait MatchPredicate {
    /// True when `probe` and `reference` are close enough to be the same face.
    fn is_match(&self, probe: &Embedding, reference: &Embedding) -> bool;
}

/// Cosine-similarity predicate: match when similarity ≥ threshold.
pub struct CosineMatcher {
    pub threshold: f32,
}

impl Default for CosineMatcher {
    fn default() -> Self {
        Self { threshold: DEFAULT_COSINE_THRESHOLD }
    }
}

impl MatchPredicate for CosineMatcher {
    fn is_match(&self, probe: &Embedding, reference: &Embedding) -> bool {
        probe.similarity(reference) >= self.threshold
    }
}

/// Euclidean-distance predicate: match when distance ≤ threshold.
pub struct EuclideanMatcher {
    pub threshold: f32,
}

impl Default for EuclideanMatcher {
    fn default() -> Self {
        Self { threshold: DEFAULT_EUCLIDEAN_THRESHOLD }
    }
}

impl MatchPredicate for EuclideanMatcher {
    fn is_match(&self, probe: &Embedding, reference: &Embedding) -> bool {
        probe.euclidean_distance(reference) <= self.threshold
    }
}
