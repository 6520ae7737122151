//! Manual model: a logistic-regression classifier trained per request.
//!
//! Mirrors the second-opinion step of the analysis pipeline. Two local image
//! folders provide the training data (extraction vs root canal); the model is
//! fit from scratch on every qualifying request and never persisted.

use crate::config::ClassifierSettings;
use image::imageops::FilterType;
use image::DynamicImage;
use linfa::prelude::*;
use linfa_logistic::{FittedLogisticRegression, LogisticRegression};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Side length images are resized to before flattening.
pub const IMAGE_SIDE: u32 = 64;

const FEATURES: usize = (IMAGE_SIDE * IMAGE_SIDE) as usize;
const TRAIN_RATIO: f32 = 0.8;
const MAX_ITERATIONS: u64 = 2000;
const SHUFFLE_SEED: u64 = 42;
const MIN_SAMPLES_PER_CLASS: usize = 2;

const EXTRACTION_LABEL: usize = 0;
const ROOTCANAL_LABEL: usize = 1;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("failed to read dataset: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to assemble feature matrix: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// Treatment suggested by the manual model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Treatment {
    Extraction,
    RootCanal,
}

impl fmt::Display for Treatment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Treatment::Extraction => write!(f, "Extraction"),
            Treatment::RootCanal => write!(f, "Root Canal Treatment"),
        }
    }
}

/// A freshly trained model plus its held-out accuracy.
pub struct ManualModel {
    model: FittedLogisticRegression<f64, usize>,
    /// Validation accuracy as an integer percentage.
    pub accuracy_pct: u32,
}

impl ManualModel {
    /// Classify raw uploaded image bytes.
    pub fn classify_bytes(&self, bytes: &[u8]) -> Result<Treatment, ClassifierError> {
        let img = image::load_from_memory(bytes)?;
        let records = Array2::from_shape_vec((1, FEATURES), image_features(&img))?;
        let label = self.model.predict(&records)[0];

        Ok(if label == EXTRACTION_LABEL {
            Treatment::Extraction
        } else {
            Treatment::RootCanal
        })
    }
}

/// Grayscale, resize to 64x64 and flatten row-major to raw 0-255 features.
pub fn image_features(img: &DynamicImage) -> Vec<f64> {
    let gray = img.to_luma8();
    let resized = image::imageops::resize(&gray, IMAGE_SIDE, IMAGE_SIDE, FilterType::Triangle);
    resized.pixels().map(|p| f64::from(p.0[0])).collect()
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            matches!(
                ext.to_ascii_lowercase().as_str(),
                "jpg" | "jpeg" | "png"
            )
        })
        .unwrap_or(false)
}

/// Load every usable image in a class folder as a feature row.
///
/// Unreadable files are skipped with a warning rather than failing the
/// whole training run.
fn load_class_dir(dir: &Path) -> Result<Vec<Vec<f64>>, ClassifierError> {
    let mut rows = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !has_image_extension(&path) {
            continue;
        }

        match image::open(&path) {
            Ok(img) => rows.push(image_features(&img)),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable dataset image");
            }
        }
    }

    Ok(rows)
}

/// Train the manual model from the two configured folders.
///
/// Returns `Ok(None)` when the dataset is absent or too small to produce a
/// meaningful model; the caller reports that as a skipped prediction.
pub fn train(settings: &ClassifierSettings) -> Result<Option<ManualModel>, ClassifierError> {
    if !settings.extraction_dir.is_dir() || !settings.rootcanal_dir.is_dir() {
        tracing::warn!(
            extraction = %settings.extraction_dir.display(),
            rootcanal = %settings.rootcanal_dir.display(),
            "manual model dataset folders not found"
        );
        return Ok(None);
    }

    let extraction = load_class_dir(&settings.extraction_dir)?;
    let rootcanal = load_class_dir(&settings.rootcanal_dir)?;

    if extraction.len() < MIN_SAMPLES_PER_CLASS || rootcanal.len() < MIN_SAMPLES_PER_CLASS {
        tracing::warn!(
            extraction_samples = extraction.len(),
            rootcanal_samples = rootcanal.len(),
            "manual model dataset too small to train"
        );
        return Ok(None);
    }

    let n_samples = extraction.len() + rootcanal.len();
    let mut flat = Vec::with_capacity(n_samples * FEATURES);
    let mut labels = Vec::with_capacity(n_samples);

    for row in &extraction {
        flat.extend_from_slice(row);
        labels.push(EXTRACTION_LABEL);
    }
    for row in &rootcanal {
        flat.extend_from_slice(row);
        labels.push(ROOTCANAL_LABEL);
    }

    let records = Array2::from_shape_vec((n_samples, FEATURES), flat)?;
    let targets = Array1::from(labels);

    let mut rng = StdRng::seed_from_u64(SHUFFLE_SEED);
    let (train, valid) = Dataset::new(records, targets)
        .shuffle(&mut rng)
        .split_with_ratio(TRAIN_RATIO);

    if valid.nsamples() == 0 {
        tracing::warn!("manual model validation split is empty, skipping");
        return Ok(None);
    }

    let model = match LogisticRegression::default()
        .max_iterations(MAX_ITERATIONS)
        .fit(&train)
    {
        Ok(model) => model,
        Err(e) => {
            // A degenerate split (e.g. one class in the training half) is a
            // dataset problem, not a request failure.
            tracing::warn!(error = %e, "manual model training failed, skipping");
            return Ok(None);
        }
    };

    let predicted = model.predict(&valid);
    let accuracy = match predicted.confusion_matrix(&valid) {
        Ok(cm) => cm.accuracy(),
        Err(e) => {
            tracing::warn!(error = %e, "manual model validation failed, skipping");
            return Ok(None);
        }
    };

    let accuracy_pct = (accuracy * 100.0) as u32;
    tracing::info!(
        samples = n_samples,
        accuracy_pct,
        "trained manual model"
    );

    Ok(Some(ManualModel {
        model,
        accuracy_pct,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassifierSettings;
    use image::{GrayImage, Luma};
    use std::path::PathBuf;

    fn write_gray_image(path: &Path, base: u8, salt: u8) {
        let img = GrayImage::from_fn(32, 32, |x, y| {
            Luma([base.wrapping_add(((x + y) as u8 ^ salt) % 16)])
        });
        img.save(path).expect("failed to write test image");
    }

    fn synthetic_dataset(samples_per_class: usize) -> (tempfile::TempDir, ClassifierSettings) {
        let root = tempfile::tempdir().expect("failed to create temp dir");
        let extraction_dir = root.path().join("extraction");
        let rootcanal_dir = root.path().join("rootcanal");
        std::fs::create_dir_all(&extraction_dir).unwrap();
        std::fs::create_dir_all(&rootcanal_dir).unwrap();

        for i in 0..samples_per_class {
            // Dark images for extraction, bright for root canal.
            write_gray_image(
                &extraction_dir.join(format!("ex_{}.png", i)),
                20,
                i as u8,
            );
            write_gray_image(
                &rootcanal_dir.join(format!("rc_{}.png", i)),
                220,
                i as u8,
            );
        }

        let settings = ClassifierSettings {
            extraction_dir,
            rootcanal_dir,
        };
        (root, settings)
    }

    fn png_bytes(base: u8) -> Vec<u8> {
        let img = GrayImage::from_fn(32, 32, |x, _| Luma([base.wrapping_add((x % 8) as u8)]));
        let mut bytes = std::io::Cursor::new(Vec::new());
        img.write_to(&mut bytes, image::ImageOutputFormat::Png)
            .unwrap();
        bytes.into_inner()
    }

    #[test]
    fn features_are_flattened_to_expected_length() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(100, 50, Luma([128])));
        let features = image_features(&img);
        assert_eq!(features.len(), FEATURES);
        assert!(features.iter().all(|&v| (0.0..=255.0).contains(&v)));
    }

    #[test]
    fn extension_filter_matches_original_set() {
        assert!(has_image_extension(Path::new("a.jpg")));
        assert!(has_image_extension(Path::new("a.JPeG")));
        assert!(has_image_extension(Path::new("a.PNG")));
        assert!(!has_image_extension(Path::new("a.gif")));
        assert!(!has_image_extension(Path::new("noext")));
    }

    #[test]
    fn missing_folders_skip_training() {
        let settings = ClassifierSettings {
            extraction_dir: PathBuf::from("/nonexistent/extraction"),
            rootcanal_dir: PathBuf::from("/nonexistent/rootcanal"),
        };
        assert!(train(&settings).unwrap().is_none());
    }

    #[test]
    fn undersized_dataset_skips_training() {
        let (_guard, settings) = synthetic_dataset(1);
        assert!(train(&settings).unwrap().is_none());
    }

    #[test]
    fn unreadable_dataset_image_is_skipped() {
        let (_guard, settings) = synthetic_dataset(8);
        std::fs::write(
            settings.extraction_dir.join("bad.jpg"),
            b"not actually a jpeg",
        )
        .unwrap();

        let model = train(&settings)
            .expect("training errored")
            .expect("training skipped");
        assert!(model.accuracy_pct > 50);
    }

    #[test]
    fn separable_dataset_trains_and_classifies() {
        let (_guard, settings) = synthetic_dataset(8);

        let model = train(&settings)
            .expect("training errored")
            .expect("training skipped");
        assert!(model.accuracy_pct > 50, "accuracy {}", model.accuracy_pct);

        let dark = model.classify_bytes(&png_bytes(20)).unwrap();
        assert_eq!(dark, Treatment::Extraction);

        let bright = model.classify_bytes(&png_bytes(220)).unwrap();
        assert_eq!(bright, Treatment::RootCanal);
    }

    #[test]
    fn treatment_labels_match_report_wording() {
        assert_eq!(Treatment::Extraction.to_string(), "Extraction");
        assert_eq!(Treatment::RootCanal.to_string(), "Root Canal Treatment");
    }
}
