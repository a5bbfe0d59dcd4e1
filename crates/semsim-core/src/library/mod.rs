pub mod source;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ndarray::Array2;
use tracing::{debug, info, warn};

use crate::consts::{NOMINAL_SOURCE_HEIGHT, NOMINAL_SOURCE_WIDTH};
use crate::error::{Result, SimError};

pub use source::{CalibrationSource, CatalogEntry, DirectorySource, MemorySource};

/// A decoded calibration raster and the magnification it was captured at.
#[derive(Debug)]
pub struct SourceImage {
    pub data: Array2<f32>,
    pub magnification: f64,
    pub origin: PathBuf,
}

impl SourceImage {
    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    /// `(width, height)`.
    pub fn size(&self) -> (usize, usize) {
        (self.width(), self.height())
    }
}

/// Result of a library lookup.
#[derive(Clone, Debug)]
pub struct ResolvedImage {
    pub image: Arc<SourceImage>,
    pub effective_magnification: f64,
}

type PairKey = (String, String);

/// Index of calibration images by sample, detector and magnification.
///
/// Images are decoded on first use and kept for the lifetime of the library.
pub struct CalibrationLibrary {
    source: Box<dyn CalibrationSource>,
    /// Entries per (sample, detector), sorted by ascending magnification.
    index: BTreeMap<PairKey, Vec<CatalogEntry>>,
    cache: HashMap<PathBuf, Arc<SourceImage>>,
    failed: HashSet<PathBuf>,
}

impl std::fmt::Debug for CalibrationLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalibrationLibrary")
            .field("source", &self.source.describe())
            .field("pairs", &self.index.len())
            .field("cached", &self.cache.len())
            .finish()
    }
}

impl CalibrationLibrary {
    /// Open a calibration tree on disk. A missing root is an error.
    pub fn open(path: &Path) -> Result<Self> {
        Self::from_source(Box::new(DirectorySource::new(path)?))
    }

    pub fn from_source(source: Box<dyn CalibrationSource>) -> Result<Self> {
        let mut index: BTreeMap<PairKey, Vec<CatalogEntry>> = BTreeMap::new();
        for entry in source.catalog()? {
            index
                .entry((entry.sample.clone(), entry.detector.clone()))
                .or_default()
                .push(entry);
        }

        for ((sample, detector), entries) in index.iter_mut() {
            entries.sort_by(|a, b| a.magnification.total_cmp(&b.magnification));
            let before = entries.len();
            entries.dedup_by(|b, a| a.magnification == b.magnification);
            if entries.len() != before {
                warn!(
                    sample = %sample,
                    detector = %detector,
                    dropped = before - entries.len(),
                    "Duplicate magnifications in calibration set, keeping the first"
                );
            }
        }

        let library = Self {
            source,
            index,
            cache: HashMap::new(),
            failed: HashSet::new(),
        };
        library.check_consistency();

        info!(
            source = %library.source.describe(),
            samples = library.samples().len(),
            images = library.index.values().map(Vec::len).sum::<usize>(),
            "Opened calibration library"
        );
        Ok(library)
    }

    /// Detectors of one sample should expose the same magnifications.
    fn check_consistency(&self) {
        for sample in self.samples() {
            let detectors = self.detectors(&sample);
            let Some((first, rest)) = detectors.split_first() else {
                continue;
            };
            let expected = self.magnifications(&sample, first);
            for detector in rest {
                if self.magnifications(&sample, detector) != expected {
                    warn!(
                        sample = %sample,
                        detector = %detector,
                        reference = %first,
                        "Detectors expose different magnification sets"
                    );
                }
            }
        }
    }

    pub fn describe(&self) -> String {
        self.source.describe()
    }

    /// Sample names in sorted order.
    pub fn samples(&self) -> Vec<String> {
        let mut samples: Vec<String> = self.index.keys().map(|(s, _)| s.clone()).collect();
        samples.dedup();
        samples
    }

    /// Detector names of `sample` in sorted order.
    pub fn detectors(&self, sample: &str) -> Vec<String> {
        self.index
            .keys()
            .filter(|(s, _)| s == sample)
            .map(|(_, d)| d.clone())
            .collect()
    }

    /// Captured magnifications in ascending order, excluding undecodable ones.
    pub fn magnifications(&self, sample: &str, detector: &str) -> Vec<f64> {
        self.candidates(sample, detector)
            .map(|e| e.magnification)
            .collect()
    }

    /// Captured magnification closest to `magnification`, without decoding.
    pub fn nearest_magnification(
        &self,
        sample: &str,
        detector: &str,
        magnification: f64,
    ) -> Option<f64> {
        let mags = self.magnifications(sample, detector);
        nearest_index(&mags, magnification).map(|i| mags[i])
    }

    fn candidates<'a>(
        &'a self,
        sample: &str,
        detector: &str,
    ) -> impl Iterator<Item = &'a CatalogEntry> + 'a {
        self.index
            .get(&(sample.to_string(), detector.to_string()))
            .into_iter()
            .flatten()
            .filter(|e| !self.failed.contains(&e.location))
    }

    /// Decoded image at the captured magnification nearest to `magnification`.
    ///
    /// Images that fail to decode are logged once and skipped for the rest
    /// of the session; the next nearest magnification is tried instead.
    pub fn resolve(
        &mut self,
        sample: &str,
        detector: &str,
        magnification: f64,
    ) -> Result<ResolvedImage> {
        if !(magnification.is_finite() && magnification > 0.0) {
            return Err(SimError::InvalidParameter(format!(
                "magnification must be positive, got {magnification}"
            )));
        }

        loop {
            let candidates: Vec<CatalogEntry> =
                self.candidates(sample, detector).cloned().collect();
            let mags: Vec<f64> = candidates.iter().map(|e| e.magnification).collect();
            let Some(i) = nearest_index(&mags, magnification) else {
                return Err(SimError::NotFound {
                    sample: sample.to_string(),
                    detector: detector.to_string(),
                    magnification,
                });
            };

            match self.load(&candidates[i]) {
                Ok(image) => {
                    return Ok(ResolvedImage {
                        effective_magnification: image.magnification,
                        image,
                    });
                }
                Err(e @ SimError::DecodeFailure { .. }) => {
                    warn!(error = %e, "Skipping undecodable calibration image");
                    self.failed.insert(candidates[i].location.clone());
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn load(&mut self, entry: &CatalogEntry) -> Result<Arc<SourceImage>> {
        if let Some(image) = self.cache.get(&entry.location) {
            return Ok(Arc::clone(image));
        }
        let data = self.source.decode(entry)?;
        if data.is_empty() {
            return Err(SimError::DecodeFailure {
                path: entry.location.clone(),
                reason: "image has no pixels".into(),
            });
        }
        debug!(
            path = %entry.location.display(),
            width = data.ncols(),
            height = data.nrows(),
            "Decoded calibration image"
        );
        if data.dim() != (NOMINAL_SOURCE_HEIGHT, NOMINAL_SOURCE_WIDTH) {
            debug!(
                path = %entry.location.display(),
                nominal_width = NOMINAL_SOURCE_WIDTH,
                nominal_height = NOMINAL_SOURCE_HEIGHT,
                "Calibration image differs from the nominal size"
            );
        }
        let image = Arc::new(SourceImage {
            data,
            magnification: entry.magnification,
            origin: entry.location.clone(),
        });
        self.cache.insert(entry.location.clone(), Arc::clone(&image));
        Ok(image)
    }

    /// Decode every image of a sample/detector pair up front. Returns the
    /// number of images now cached for the pair.
    pub fn preload(&mut self, sample: &str, detector: &str) -> Result<usize> {
        let entries: Vec<CatalogEntry> = self.candidates(sample, detector).cloned().collect();
        if entries.is_empty() {
            return Err(SimError::NotFound {
                sample: sample.to_string(),
                detector: detector.to_string(),
                magnification: 0.0,
            });
        }
        let mut loaded = 0;
        for entry in &entries {
            match self.load(entry) {
                Ok(_) => loaded += 1,
                Err(e @ SimError::DecodeFailure { .. }) => {
                    warn!(error = %e, "Skipping undecodable calibration image");
                    self.failed.insert(entry.location.clone());
                }
                Err(e) => return Err(e),
            }
        }
        info!(sample, detector, images = loaded, "Preloaded calibration images");
        Ok(loaded)
    }

    /// Number of decoded images held in memory.
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
}

/// Index of the value in ascending `mags` closest to `target`; ties go to
/// the lower magnification.
pub fn nearest_index(mags: &[f64], target: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &m) in mags.iter().enumerate() {
        let d = (m - target).abs();
        match best {
            Some((_, bd)) if d >= bd => {}
            _ => best = Some((i, d)),
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_prefers_lower_on_tie() {
        let mags = [100.0, 200.0];
        assert_eq!(nearest_index(&mags, 150.0), Some(0));
    }

    #[test]
    fn nearest_of_empty_is_none() {
        assert_eq!(nearest_index(&[], 10.0), None);
    }

    #[test]
    fn nearest_clamps_outside_range() {
        let mags = [100.0, 500.0, 2000.0];
        assert_eq!(nearest_index(&mags, 1.0), Some(0));
        assert_eq!(nearest_index(&mags, 1e9), Some(2));
    }
}
