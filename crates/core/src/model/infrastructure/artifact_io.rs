use std::collections::HashMap;
use std::fs;
use std::path::Path;

use safetensors::tensor::{Dtype, SafeTensors, TensorView};

use crate::model::domain::model_error::ModelError;

const FORMAT_KEY: &str = "format";
const FORMAT_TAG: &str = "subalign-model";
const DEFINITION_KEY: &str = "definition";

/// One named f32 tensor borrowed for writing.
pub struct NamedTensor<'a> {
    pub name: &'a str,
    pub shape: Vec<usize>,
    pub data: &'a [f32],
}

/// Contents of a model artifact read back from disk.
#[derive(Debug, Default)]
pub struct Artifact {
    pub definition: Option<String>,
    pub tensors: HashMap<String, (Vec<usize>, Vec<f32>)>,
}

impl Artifact {
    pub fn tensor(&self, path: &Path, name: &str) -> Result<&(Vec<usize>, Vec<f32>), ModelError> {
        self.tensors
            .get(name)
            .ok_or_else(|| ModelError::format(path, format!("missing tensor '{name}'")))
    }
}

/// Write an artifact holding an optional definition and any number of tensors.
///
/// Written to `<path>.part` first and renamed into place.
pub fn write_artifact(
    path: &Path,
    definition: Option<&str>,
    tensors: &[NamedTensor<'_>],
) -> Result<(), ModelError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ModelError::io(parent, e))?;
    }

    let views = tensors
        .iter()
        .map(|t| {
            TensorView::new(Dtype::F32, t.shape.clone(), bytemuck::cast_slice(t.data))
                .map(|view| (t.name, view))
                .map_err(|e| ModelError::format(path, e.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut metadata = HashMap::from([(FORMAT_KEY.to_string(), FORMAT_TAG.to_string())]);
    if let Some(definition) = definition {
        metadata.insert(DEFINITION_KEY.to_string(), definition.to_string());
    }

    let temp_path = path.with_extension("part");
    if let Err(e) = safetensors::serialize_to_file(views, &Some(metadata), &temp_path) {
        let _ = fs::remove_file(&temp_path);
        return Err(ModelError::format(&temp_path, e.to_string()));
    }
    fs::rename(&temp_path, path).map_err(|e| ModelError::io(path, e))
}

/// Read an artifact, validating its format tag.
pub fn read_artifact(path: &Path) -> Result<Artifact, ModelError> {
    let bytes = fs::read(path).map_err(|e| ModelError::io(path, e))?;

    let (_, header) =
        SafeTensors::read_metadata(&bytes).map_err(|e| ModelError::format(path, e.to_string()))?;
    let mut metadata = header.metadata().clone().unwrap_or_default();
    if metadata.get(FORMAT_KEY).map(String::as_str) != Some(FORMAT_TAG) {
        return Err(ModelError::format(path, "not a model artifact"));
    }

    let parsed =
        SafeTensors::deserialize(&bytes).map_err(|e| ModelError::format(path, e.to_string()))?;
    let mut tensors = HashMap::new();
    for (name, view) in parsed.tensors() {
        if view.dtype() != Dtype::F32 {
            return Err(ModelError::format(
                path,
                format!("tensor '{name}' is {:?}, expected F32", view.dtype()),
            ));
        }
        let values = view
            .data()
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        tensors.insert(name, (view.shape().to_vec(), values));
    }

    Ok(Artifact {
        definition: metadata.remove(DEFINITION_KEY),
        tensors,
    })
}
