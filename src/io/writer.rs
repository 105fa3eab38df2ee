//! Model serialization
//!
//! Save models to files or bytes. Serialization never validates; callers
//! that want a structural guarantee run [`crate::validate::validate_model`]
//! first, and every transform in this crate already does so on its output.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use prost::Message;

use crate::error::GraftResult;
use crate::proto::ModelProto;

/// Save a model to a file
///
/// # Example
///
/// ```ignore
/// use onnx_graft::io::save_model;
///
/// save_model(&model, "edited.onnx")?;
/// ```
pub fn save_model<P: AsRef<Path>>(model: &ModelProto, path: P) -> GraftResult<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);

    writer.write_all(&model.encode_to_vec())?;
    writer.flush()?;

    Ok(())
}

/// Encode a model to bytes
pub fn model_to_bytes(model: &ModelProto) -> Vec<u8> {
    model.encode_to_vec()
}

/// Size of the encoded model in bytes, without encoding it
pub fn model_size(model: &ModelProto) -> usize {
    model.encoded_len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::reader::load_model;
    use crate::proto::extensions::{make_node, make_tensor_value_info};
    use crate::proto::{GraphProto, OperatorSetIdProto};

    fn create_test_model() -> ModelProto {
        ModelProto {
            ir_version: 8,
            producer_name: "test".to_string(),
            opset_import: vec![OperatorSetIdProto {
                domain: String::new(),
                version: 13,
            }],
            graph: Some(GraphProto {
                name: "test_graph".to_string(),
                node: vec![make_node("Relu", &["X"], &["Y"], "relu_0")],
                input: vec![make_tensor_value_info("X", 1, &[1, 4])],
                output: vec![make_tensor_value_info("Y", 1, &[1, 4])],
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_model_to_bytes_decodes_back() {
        let model = create_test_model();
        let bytes = model_to_bytes(&model);

        assert!(!bytes.is_empty());
        let decoded = ModelProto::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded, model);
    }

    #[test]
    fn test_model_size_matches_encoding() {
        let model = create_test_model();
        assert_eq!(model_size(&model), model_to_bytes(&model).len());
    }

    #[test]
    fn test_save_and_load() {
        let model = create_test_model();
        let path = std::env::temp_dir().join("onnx_graft_writer_test.onnx");

        save_model(&model, &path).unwrap();
        let loaded = load_model(&path).unwrap();
        assert_eq!(loaded, model);

        std::fs::remove_file(&path).ok();
    }
}
