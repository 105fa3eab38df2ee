//! Model I/O
//!
//! Loading and saving serialized models.
//!
//! # Example
//!
//! ```ignore
//! use onnx_graft::io::{load_model, save_model};
//!
//! let model = load_model("input.onnx")?;
//! save_model(&model, "output.onnx")?;
//! ```

pub mod reader;
pub mod writer;

// Re-exports
pub use reader::{get_model_info, load_graph, load_model, load_model_from_bytes, ModelInfo};
pub use writer::{model_size, model_to_bytes, save_model};
