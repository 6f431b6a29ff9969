use std::collections::HashMap;
use std::fs::{self, File};
use std::ops::Range;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use ndarray::{Array1, Array2, Array3, ArrayView1, ArrayView3, Axis};
use safetensors::tensor::{Dtype, SafeTensors, TensorView};

use crate::corpus::domain::corpus_error::CorpusError;
use crate::corpus::domain::extracted_corpus::ExtractedCorpus;
use crate::corpus::domain::normalization::{feature_mean, reorient, reorient_row, zero_center};
use crate::corpus::domain::training_set::TrainingSet;
use crate::shared::constants::{LABELS_DATASET, TRAIN_DATA_DATASET};

const FORMAT_KEY: &str = "format";
const FORMAT_TAG: &str = "subalign-training-dump";

/// A memory-mapped training dump.
///
/// The file is a safetensors container holding two f32 datasets:
/// `train_data` with shape `[rows, a, b]` and `labels` with shape `[rows]`.
/// Data is read in place from the mapping; nothing is copied until a batch
/// is requested. Values are stored little-endian, which is also the layout
/// the mapping is read with.
pub struct CorpusDump {
    path: PathBuf,
    mmap: Mmap,
    features: Range<usize>,
    labels: Range<usize>,
    shape: (usize, usize, usize),
}

impl CorpusDump {
    /// Write `corpus` to `path`, replacing any existing dump.
    ///
    /// The file is written next to its destination and renamed into place,
    /// so readers never observe a half-written dump.
    pub fn write(path: &Path, corpus: &ExtractedCorpus) -> Result<(), CorpusError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }

        let features = corpus.features().as_standard_layout();
        let labels = corpus.labels().as_standard_layout();
        let feature_slice = features
            .as_slice()
            .ok_or_else(|| format_error(path, "features are not contiguous"))?;
        let label_slice = labels
            .as_slice()
            .ok_or_else(|| format_error(path, "labels are not contiguous"))?;

        let tensors = vec![
            (
                TRAIN_DATA_DATASET,
                TensorView::new(
                    Dtype::F32,
                    features.shape().to_vec(),
                    bytemuck::cast_slice(feature_slice),
                )
                .map_err(|e| format_error(path, e.to_string()))?,
            ),
            (
                LABELS_DATASET,
                TensorView::new(
                    Dtype::F32,
                    vec![label_slice.len()],
                    bytemuck::cast_slice(label_slice),
                )
                .map_err(|e| format_error(path, e.to_string()))?,
            ),
        ];
        let metadata = Some(HashMap::from([(
            FORMAT_KEY.to_string(),
            FORMAT_TAG.to_string(),
        )]));

        let temp_path = path.with_extension("part");
        let written = safetensors::serialize_to_file(tensors, &metadata, &temp_path)
            .map_err(|e| format_error(&temp_path, e.to_string()))
            .and_then(|()| fs::rename(&temp_path, path).map_err(|e| io_error(path, e)));
        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }

        log::info!(
            "Wrote training dump with {} rows to {}",
            corpus.len(),
            path.display()
        );
        Ok(())
    }

    /// Map an existing dump and validate its datasets.
    pub fn open(path: &Path) -> Result<Self, CorpusError> {
        let file = File::open(path).map_err(|e| io_error(path, e))?;
        // SAFETY: dumps are write-once; nothing rewrites the file while it is mapped.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| io_error(path, e))?;

        let (_, header) =
            SafeTensors::read_metadata(&mmap[..]).map_err(|e| format_error(path, e.to_string()))?;
        if let Some(tag) = header.metadata().as_ref().and_then(|m| m.get(FORMAT_KEY)) {
            if tag != FORMAT_TAG {
                return Err(format_error(path, format!("unexpected format tag '{tag}'")));
            }
        }

        let tensors =
            SafeTensors::deserialize(&mmap[..]).map_err(|e| format_error(path, e.to_string()))?;
        let (features, feature_shape) = locate(&tensors, TRAIN_DATA_DATASET, &mmap, path)?;
        let (labels, label_shape) = locate(&tensors, LABELS_DATASET, &mmap, path)?;

        let shape = match feature_shape.as_slice() {
            [rows, a, b] => (*rows, *a, *b),
            other => {
                return Err(format_error(
                    path,
                    format!("train_data must be 3-D, found shape {other:?}"),
                ))
            }
        };
        if label_shape != [shape.0] {
            return Err(CorpusError::ShapeMismatch(format!(
                "{} has {} feature rows but labels of shape {label_shape:?}",
                path.display(),
                shape.0
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
            mmap,
            features,
            labels,
            shape,
        })
    }

    /// `(rows, a, b)` of the stored feature dataset.
    pub fn shape(&self) -> (usize, usize, usize) {
        self.shape
    }

    pub fn len(&self) -> usize {
        self.shape.0
    }

    pub fn is_empty(&self) -> bool {
        self.shape.0 == 0
    }

    pub fn features(&self) -> Result<ArrayView3<'_, f32>, CorpusError> {
        let floats = self.floats(self.features.clone(), TRAIN_DATA_DATASET)?;
        ArrayView3::from_shape(self.shape, floats)
            .map_err(|e| CorpusError::ShapeMismatch(e.to_string()))
    }

    pub fn labels(&self) -> Result<ArrayView1<'_, f32>, CorpusError> {
        let floats = self.floats(self.labels.clone(), LABELS_DATASET)?;
        Ok(ArrayView1::from(floats))
    }

    fn floats(&self, range: Range<usize>, name: &str) -> Result<&[f32], CorpusError> {
        let bytes = &self.mmap[range];
        if bytes.is_empty() {
            return Ok(&[]);
        }
        bytemuck::try_cast_slice(bytes).map_err(|_| CorpusError::Misaligned {
            path: self.path.clone(),
            name: name.to_string(),
        })
    }
}

/// Byte range and shape of a named f32 dataset within the mapped file.
fn locate(
    tensors: &SafeTensors<'_>,
    name: &str,
    base: &[u8],
    path: &Path,
) -> Result<(Range<usize>, Vec<usize>), CorpusError> {
    let view = tensors
        .tensor(name)
        .map_err(|_| CorpusError::MissingDataset {
            path: path.to_path_buf(),
            name: name.to_string(),
        })?;
    if view.dtype() != Dtype::F32 {
        return Err(format_error(
            path,
            format!("dataset '{name}' has dtype {:?}, expected F32", view.dtype()),
        ));
    }
    let start = view.data().as_ptr() as usize - base.as_ptr() as usize;
    Ok((start..start + view.data().len(), view.shape().to_vec()))
}

fn io_error(path: &Path, source: std::io::Error) -> CorpusError {
    CorpusError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn format_error(path: &Path, reason: impl Into<String>) -> CorpusError {
    CorpusError::Format {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Streams model-ready rows out of a mapped dump.
///
/// Rows are reoriented and zero-centered per batch, using a mean computed
/// once over the mapped data.
pub struct DumpTrainingSet<'a> {
    features: ArrayView3<'a, f32>,
    labels: ArrayView1<'a, f32>,
    mean: Array2<f32>,
}

impl<'a> DumpTrainingSet<'a> {
    pub fn new(dump: &'a CorpusDump) -> Result<Self, CorpusError> {
        let features = dump.features()?;
        let labels = dump.labels()?;
        let mean = match feature_mean(features.view()) {
            Some(mean) => reorient_row(mean.view()),
            None => {
                let (_, a, b) = features.dim();
                Array2::zeros((b, a))
            }
        };
        Ok(Self {
            features,
            labels,
            mean,
        })
    }
}

impl TrainingSet for DumpTrainingSet<'_> {
    fn len(&self) -> usize {
        self.labels.len()
    }

    fn input_shape(&self) -> (usize, usize) {
        let (_, a, b) = self.features.dim();
        (b, a)
    }

    fn batch(&self, indices: &[usize]) -> (Array3<f32>, Array1<f32>) {
        let rows = self.features.select(Axis(0), indices);
        let mut rotated = reorient(rows.view());
        zero_center(&mut rotated, &self.mean);
        (rotated, self.labels.select(Axis(0), indices))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::domain::normalization::normalize;
    use crate::shared::constants::TRAINING_DUMP_FILENAME;

    fn corpus(rows: usize) -> ExtractedCorpus {
        let features = Array3::from_shape_fn((rows, 13, 1), |(n, i, _)| (n * 13 + i) as f32 * 0.5);
        let labels = Array1::from_iter((0..rows).map(|n| (n % 2) as f32));
        ExtractedCorpus::new(features, labels).unwrap()
    }

    #[test]
    fn test_write_then_open_reads_same_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(TRAINING_DUMP_FILENAME);
        let original = corpus(7);
        CorpusDump::write(&path, &original).unwrap();

        let dump = CorpusDump::open(&path).unwrap();
        assert_eq!(dump.shape(), (7, 13, 1));
        assert_eq!(dump.features().unwrap(), original.features().view());
        assert_eq!(dump.labels().unwrap(), original.labels().view());
        assert!(!path.with_extension("part").exists());
    }

    #[test]
    fn test_dump_exposes_named_datasets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(TRAINING_DUMP_FILENAME);
        CorpusDump::write(&path, &corpus(3)).unwrap();

        let bytes = fs::read(&path).unwrap();
        let tensors = SafeTensors::deserialize(&bytes).unwrap();
        let mut names: Vec<String> = tensors.names().into_iter().map(|n| n.to_string()).collect();
        names.sort();
        assert_eq!(names, vec![LABELS_DATASET, TRAIN_DATA_DATASET]);
    }

    #[test]
    fn test_write_overwrites_existing_dump() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(TRAINING_DUMP_FILENAME);
        CorpusDump::write(&path, &corpus(9)).unwrap();
        CorpusDump::write(&path, &corpus(2)).unwrap();
        assert_eq!(CorpusDump::open(&path).unwrap().len(), 2);
    }

    #[test]
    fn test_empty_dump_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(TRAINING_DUMP_FILENAME);
        let empty = ExtractedCorpus::new(Array3::zeros((0, 13, 1)), Array1::zeros(0)).unwrap();
        CorpusDump::write(&path, &empty).unwrap();

        let dump = CorpusDump::open(&path).unwrap();
        assert!(dump.is_empty());
        assert_eq!(dump.features().unwrap().dim(), (0, 13, 1));
        assert!(dump.labels().unwrap().is_empty());
    }

    #[test]
    fn test_failed_write_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(TRAINING_DUMP_FILENAME);
        fs::create_dir_all(path.join("occupied")).unwrap();

        let err = CorpusDump::write(&path, &corpus(4)).unwrap_err();
        assert!(matches!(err, CorpusError::Io { .. }));
        assert!(!path.with_extension("part").exists());
        assert!(path.join("occupied").is_dir());
    }

    #[test]
    fn test_open_missing_file_is_io_error() {
        let err = CorpusDump::open(Path::new("/nonexistent/training_dump.hdf5")).err().unwrap();
        assert!(matches!(err, CorpusError::Io { .. }));
    }

    #[test]
    fn test_open_corrupt_file_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(TRAINING_DUMP_FILENAME);
        fs::write(&path, b"definitely not a tensor container").unwrap();
        let err = CorpusDump::open(&path).err().unwrap();
        assert!(matches!(err, CorpusError::Format { .. }));
    }

    #[test]
    fn test_open_without_labels_is_missing_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(TRAINING_DUMP_FILENAME);
        let data = vec![0f32; 4];
        let view = TensorView::new(Dtype::F32, vec![1, 4, 1], bytemuck::cast_slice(&data)).unwrap();
        safetensors::serialize_to_file(vec![(TRAIN_DATA_DATASET, view)], &None, &path).unwrap();

        let err = CorpusDump::open(&path).err().unwrap();
        assert!(matches!(err, CorpusError::MissingDataset { .. }));
    }

    #[test]
    fn test_streamed_batches_match_in_memory_normalization() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(TRAINING_DUMP_FILENAME);
        let original = corpus(6);
        CorpusDump::write(&path, &original).unwrap();

        let dump = CorpusDump::open(&path).unwrap();
        let set = DumpTrainingSet::new(&dump).unwrap();
        let (expected, _) = normalize(original.features().view()).unwrap();

        assert_eq!(set.input_shape(), (1, 13));
        let (x, y) = set.batch(&[4, 1]);
        assert_eq!(y.to_vec(), vec![0.0, 1.0]);
        for (got, want) in x.iter().zip(expected.select(Axis(0), &[4, 1]).iter()) {
            assert!((got - want).abs() < 1e-4);
        }
    }
}
