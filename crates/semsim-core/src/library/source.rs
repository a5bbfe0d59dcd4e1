use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use tracing::debug;

use crate::error::{Result, SimError};
use crate::io::image_io::{is_supported_image, load_intensity};

/// One calibration image as listed by a source, before decoding.
#[derive(Clone, Debug, PartialEq)]
pub struct CatalogEntry {
    pub sample: String,
    pub detector: String,
    pub magnification: f64,
    /// Source-specific locator (a file path for directory sources).
    pub location: PathBuf,
}

/// Where calibration images come from.
pub trait CalibrationSource: Send + Sync {
    /// Short human-readable description (e.g. the root directory).
    fn describe(&self) -> String;

    /// List every available image.
    fn catalog(&self) -> Result<Vec<CatalogEntry>>;

    /// Decode one listed image to intensities in [0.0, 1.0].
    fn decode(&self, entry: &CatalogEntry) -> Result<Array2<f32>>;
}

/// Calibration images laid out as `Images/<Sample>/<Detector>/<Magnification>.<ext>`.
#[derive(Clone, Debug)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    /// `path` may be the directory containing `Images/` or `Images/` itself.
    pub fn new(path: &Path) -> Result<Self> {
        let nested = path.join("Images");
        let root = if nested.is_dir() {
            nested
        } else {
            path.to_path_buf()
        };
        if !root.is_dir() {
            return Err(SimError::LibraryRootMissing(path.to_path_buf()));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl CalibrationSource for DirectorySource {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    fn catalog(&self) -> Result<Vec<CatalogEntry>> {
        let mut entries = Vec::new();
        for (sample, sample_dir) in sorted_subdirs(&self.root)? {
            for (detector, detector_dir) in sorted_subdirs(&sample_dir)? {
                for item in fs::read_dir(&detector_dir)? {
                    let path = item?.path();
                    if !path.is_file() {
                        continue;
                    }
                    match parse_magnification(&path) {
                        Some(magnification) if is_supported_image(&path) => {
                            entries.push(CatalogEntry {
                                sample: sample.clone(),
                                detector: detector.clone(),
                                magnification,
                                location: path,
                            });
                        }
                        _ => debug!(path = %path.display(), "Skipping non-calibration file"),
                    }
                }
            }
        }
        Ok(entries)
    }

    fn decode(&self, entry: &CatalogEntry) -> Result<Array2<f32>> {
        load_intensity(&entry.location)
    }
}

fn sorted_subdirs(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut dirs = Vec::new();
    for item in fs::read_dir(dir)? {
        let path = item?.path();
        if !path.is_dir() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            dirs.push((name.to_string(), path.clone()));
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Magnification encoded as the numeric file stem, e.g. `1000.tif`.
pub fn parse_magnification(path: &Path) -> Option<f64> {
    let stem = path.file_stem()?.to_str()?;
    let value: f64 = stem.trim().parse().ok()?;
    (value.is_finite() && value > 0.0).then_some(value)
}

/// In-memory calibration set, for embedding and tests.
#[derive(Clone, Debug, Default)]
pub struct MemorySource {
    entries: Vec<CatalogEntry>,
    images: HashMap<PathBuf, Option<Array2<f32>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    fn locator(sample: &str, detector: &str, magnification: f64) -> PathBuf {
        PathBuf::from(format!("memory/{sample}/{detector}/{magnification}"))
    }

    /// Add a decoded raster.
    pub fn insert(
        &mut self,
        sample: &str,
        detector: &str,
        magnification: f64,
        data: Array2<f32>,
    ) -> &mut Self {
        self.push(sample, detector, magnification, Some(data))
    }

    /// Add an entry that is listed but fails to decode.
    pub fn insert_undecodable(
        &mut self,
        sample: &str,
        detector: &str,
        magnification: f64,
    ) -> &mut Self {
        self.push(sample, detector, magnification, None)
    }

    fn push(
        &mut self,
        sample: &str,
        detector: &str,
        magnification: f64,
        data: Option<Array2<f32>>,
    ) -> &mut Self {
        let location = Self::locator(sample, detector, magnification);
        self.entries.push(CatalogEntry {
            sample: sample.to_string(),
            detector: detector.to_string(),
            magnification,
            location: location.clone(),
        });
        self.images.insert(location, data);
        self
    }
}

impl CalibrationSource for MemorySource {
    fn describe(&self) -> String {
        format!("in-memory ({} images)", self.entries.len())
    }

    fn catalog(&self) -> Result<Vec<CatalogEntry>> {
        Ok(self.entries.clone())
    }

    fn decode(&self, entry: &CatalogEntry) -> Result<Array2<f32>> {
        match self.images.get(&entry.location) {
            Some(Some(data)) => Ok(data.clone()),
            Some(None) => Err(SimError::DecodeFailure {
                path: entry.location.clone(),
                reason: "corrupt image data".into(),
            }),
            None => Err(SimError::NotFound {
                sample: entry.sample.clone(),
                detector: entry.detector.clone(),
                magnification: entry.magnification,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magnification_from_stem() {
        assert_eq!(parse_magnification(Path::new("a/b/1000.tif")), Some(1000.0));
        assert_eq!(parse_magnification(Path::new("2500.5.png")), Some(2500.5));
        assert_eq!(parse_magnification(Path::new("notes.txt")), None);
        assert_eq!(parse_magnification(Path::new("0.png")), None);
        assert_eq!(parse_magnification(Path::new("-5.png")), None);
    }
}
