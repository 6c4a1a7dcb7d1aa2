//! Known-face gallery: loads reference images from a directory and answers
//! "who is this embedding?" with first-match-wins semantics.

use crate::engine::FaceAnalyzer;
use crate::types::{Embedding, KnownFace, MatchPredicate};
use std::path::{Path, PathBuf};

/// Accepted reference-image extensions (case-insensitive).
const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// The set of reference faces loaded at startup, immutable thereafter.
pub struct Gallery {
    faces: Vec<KnownFace>,
    matcher: Box<dyn MatchPredicate + Send + Sync>,
}

impl Gallery {
    pub fn new(faces: Vec<KnownFace>, matcher: Box<dyn MatchPredicate + Send + Sync>) -> Self {
        Self { faces, matcher }
    }

    /// Load every reference image in `dir` and embed it with `analyzer`.
    ///
    /// Files that fail to decode or contain no detectable face are logged and
    /// skipped. A directory-read failure is logged and yields an empty gallery;
    /// the caller decides whether that is fatal.
    pub fn load<A>(
        dir: &Path,
        analyzer: &mut A,
        matcher: Box<dyn MatchPredicate + Send + Sync>,
    ) -> Self
    where
        A: FaceAnalyzer + ?Sized,
    {
        let paths = match image_files(dir) {
            Ok(paths) => paths,
            Err(e) => {
                tracing::error!(dir = %dir.display(), error = %e, "failed to read known-faces directory");
                return Self::new(Vec::new(), matcher);
            }
        };

        let mut faces = Vec::with_capacity(paths.len());

        for path in &paths {
            let img = match image::open(path) {
                Ok(img) => img.to_rgb8(),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable image");
                    continue;
                }
            };

            let (width, height) = img.dimensions();
            let detected = match analyzer.analyze(img.as_raw(), width, height) {
                Ok(detected) => detected,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping image that failed analysis");
                    continue;
                }
            };

            let Some(face) = detected.into_iter().next() else {
                tracing::warn!(path = %path.display(), "no face detected in image; skipping");
                continue;
            };

            faces.push(KnownFace {
                name: face_name(path),
                embedding: face.embedding,
            });
        }

        tracing::info!(count = faces.len(), dir = %dir.display(), "loaded known faces");
        Self::new(faces, matcher)
    }

    /// Name of the first stored face the probe matches, in load order.
    ///
    /// This is a linear scan with first-match-wins: when two stored
    /// embeddings both satisfy the predicate, the earlier one names the
    /// face. `None` means the probe should be labeled "Unknown".
    pub fn identify(&self, probe: &Embedding) -> Option<&str> {
        self.faces
            .iter()
            .find(|f| self.matcher.is_match(probe, &f.embedding))
            .map(|f| f.name.as_str())
    }

    pub fn names(&self) -> Vec<&str> {
        self.faces.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }
}

/// Enumerate reference images in `dir`, sorted by file name so the
/// first-match tie-break is deterministic across platforms.
fn image_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && has_image_extension(p))
        .collect();
    paths.sort();
    Ok(paths)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.iter().any(|&known| known == ext)
        })
        .unwrap_or(false)
}

/// Face name = file name without directory or extension.
fn face_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineError;
    use crate::types::{CosineMatcher, DetectedFace, FaceBox};
    use image::{Rgb, RgbImage};

    /// Stub analyzer: any non-black image contains one "face" whose embedding
    /// is the mean color of the image; black images contain no face.
    struct ColorAnalyzer;

    impl FaceAnalyzer for ColorAnalyzer {
        fn analyze(
            &mut self,
            rgb: &[u8],
            width: u32,
            height: u32,
        ) -> Result<Vec<DetectedFace>, EngineError> {
            if rgb.iter().all(|&b| b == 0) {
                return Ok(Vec::new());
            }
            let n = (width * height) as f32;
            let mut sums = [0.0f32; 3];
            for px in rgb.chunks_exact(3) {
                for c in 0..3 {
                    sums[c] += px[c] as f32;
                }
            }
            let embedding = Embedding {
                values: sums.iter().map(|s| s / (n * 255.0)).collect(),
                model_version: None,
            };
            Ok(vec![DetectedFace {
                bbox: FaceBox {
                    top: 0.0,
                    right: width as f32,
                    bottom: height as f32,
                    left: 0.0,
                    confidence: 0.99,
                    landmarks: None,
                },
                embedding,
            }])
        }
    }

    fn default_matcher() -> Box<dyn MatchPredicate + Send + Sync> {
        Box::new(CosineMatcher { threshold: 0.9 })
    }

    fn embedding(values: Vec<f32>) -> Embedding {
        Embedding { values, model_version: None }
    }

    fn known(name: &str, values: Vec<f32>) -> KnownFace {
        KnownFace { name: name.into(), embedding: embedding(values) }
    }

    fn save_solid(dir: &Path, name: &str, color: [u8; 3]) {
        RgbImage::from_pixel(8, 8, Rgb(color))
            .save(dir.join(name))
            .unwrap();
    }

    #[test]
    fn test_load_counts_valid_and_skips_rest() {
        let dir = tempfile::tempdir().unwrap();
        save_solid(dir.path(), "alice.jpg", [200, 30, 30]);
        save_solid(dir.path(), "bob.png", [30, 200, 30]);
        save_solid(dir.path(), "blank.png", [0, 0, 0]); // no detectable face
        std::fs::write(dir.path().join("note.txt"), "not an image").unwrap();
        std::fs::write(dir.path().join("broken.jpg"), b"garbage").unwrap();

        let gallery = Gallery::load(dir.path(), &mut ColorAnalyzer, default_matcher());

        assert_eq!(gallery.len(), 2);
        assert_eq!(gallery.names(), vec!["alice", "bob"]);
    }

    #[test]
    fn test_load_single_face_directory() {
        // Known directory = {"alice.jpg" (one face), "note.txt"}
        let dir = tempfile::tempdir().unwrap();
        save_solid(dir.path(), "alice.jpg", [180, 40, 40]);
        std::fs::write(dir.path().join("note.txt"), "skip me").unwrap();

        let gallery = Gallery::load(dir.path(), &mut ColorAnalyzer, default_matcher());
        assert_eq!(gallery.names(), vec!["alice"]);
    }

    #[test]
    fn test_load_extension_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        save_solid(dir.path(), "carol.PNG", [40, 40, 180]);

        let gallery = Gallery::load(dir.path(), &mut ColorAnalyzer, default_matcher());
        assert_eq!(gallery.names(), vec!["carol"]);
    }

    #[test]
    fn test_load_missing_directory_yields_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");

        let gallery = Gallery::load(&missing, &mut ColorAnalyzer, default_matcher());
        assert!(gallery.is_empty());
    }

    #[test]
    fn test_identify_exact_match() {
        let gallery = Gallery::new(
            vec![
                known("alice", vec![1.0, 0.0, 0.0]),
                known("bob", vec![0.0, 1.0, 0.0]),
            ],
            default_matcher(),
        );

        let probe = embedding(vec![0.0, 1.0, 0.0]);
        assert_eq!(gallery.identify(&probe), Some("bob"));
    }

    #[test]
    fn test_identify_far_probe_is_unknown() {
        let gallery = Gallery::new(
            vec![known("alice", vec![1.0, 0.0, 0.0])],
            default_matcher(),
        );

        let probe = embedding(vec![0.0, 0.0, 1.0]);
        assert_eq!(gallery.identify(&probe), None);
    }

    #[test]
    fn test_identify_first_match_wins() {
        // Both entries satisfy the predicate; the earlier one must name the face.
        let gallery = Gallery::new(
            vec![
                known("first", vec![1.0, 0.0, 0.0]),
                known("second", vec![1.0, 0.0, 0.0]),
            ],
            default_matcher(),
        );

        let probe = embedding(vec![1.0, 0.0, 0.0]);
        assert_eq!(gallery.identify(&probe), Some("first"));
    }

    #[test]
    fn test_identify_empty_gallery() {
        let gallery = Gallery::new(Vec::new(), default_matcher());
        assert_eq!(gallery.identify(&embedding(vec![1.0, 0.0])), None);
    }

    #[test]
    fn test_load_order_is_sorted_for_tie_break() {
        // Same color → identical embeddings; sorted file name decides.
        let dir = tempfile::tempdir().unwrap();
        save_solid(dir.path(), "zed.png", [120, 120, 120]);
        save_solid(dir.path(), "amy.png", [120, 120, 120]);

        let gallery = Gallery::load(dir.path(), &mut ColorAnalyzer, default_matcher());
        assert_eq!(gallery.names(), vec!["amy", "zed"]);

        let probe = gallery.faces[0].embedding.clone();
        assert_eq!(gallery.identify(&probe), Some("amy"));
    }

    #[test]
    fn test_face_name_strips_directory_and_extension() {
        assert_eq!(face_name(Path::new("/known/alice.jpg")), "alice");
        assert_eq!(face_name(Path::new("bob.with.dots.png")), "bob.with.dots");
    }

    #[test]
    fn test_has_image_extension() {
        assert!(has_image_extension(Path::new("a.png")));
        assert!(has_image_extension(Path::new("a.JPEG")));
        assert!(has_image_extension(Path::new("a.bmp")));
        assert!(!has_image_extension(Path::new("a.txt")));
        assert!(!has_image_extension(Path::new("a")));
    }
}
