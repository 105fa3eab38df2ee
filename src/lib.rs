//! # onnx-graft
//!
//! Editing engine for serialized ONNX computation graphs.
//!
//! Models are loaded into their protobuf form and transformed as plain data:
//! no runtime, no kernels, just the graph. Every transform takes a model by
//! reference and returns a new one, so a failed edit never leaves a
//! half-rewritten model behind.
//!
//! ## Features
//!
//! - **Validation**: unique names, resolvable references, acyclicity
//! - **Opset reconciliation**: certify or rewrite nodes up to a target
//!   default-domain opset version
//! - **Input splicing**: fold preprocessing (channel reorder, bias
//!   subtraction) into the graph ahead of an input port
//! - **Node elision**: drop single-input single-output nodes and rewire
//!   their consumers
//! - **Graph merging**: combine two models under distinct name prefixes,
//!   optionally wiring one side's tensors into the other's inputs
//!
//! ## Example
//!
//! ```ignore
//! use onnx_graft::prelude::*;
//!
//! let model = load_model("model.onnx")?;
//! let upgraded = reconcile_opset(&model, 13)?;
//! save_model(&upgraded, "model-13.onnx")?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// ============================================================================
// Module declarations
// ============================================================================

pub mod compose;
pub mod elide;
pub mod error;
pub mod graph;
pub mod io;
pub mod opset;
pub mod proto;
pub mod splice;
pub mod tensor;
pub mod traits;
pub mod validate;

// ============================================================================
// Prelude module for convenient imports
// ============================================================================

/// Prelude module - import commonly used types with `use onnx_graft::prelude::*`
pub mod prelude {
    pub use crate::compose::{merge_models, MergeOptions, ModelMerger};
    pub use crate::elide::{elide_node, ElideTarget, NodeElider};
    pub use crate::error::{GraftError, GraftResult};
    pub use crate::graph::GraphContext;
    pub use crate::io::{
        get_model_info, load_model, load_model_from_bytes, model_size, model_to_bytes, save_model,
        ModelInfo,
    };
    pub use crate::opset::{get_opset_version, reconcile_opset, OpsetReconciler};
    pub use crate::proto::onnx::*;
    pub use crate::splice::{
        channel_preprocess_splice, splice_input, ChannelPreprocess, InputSplice, InputSplicer,
        ReorderStrategy,
    };
    pub use crate::traits::{Transformer, TransformerChain};
    pub use crate::validate::{validate_graph, validate_model};
}

// ============================================================================
// Crate-level re-exports
// ============================================================================

pub use error::{GraftError, GraftResult};
pub use traits::Transformer;

// ============================================================================
// Version information
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Lowest default-domain opset version transforms accept as a source
pub const SUPPORTED_OPSET_MIN: i64 = 9;
/// Highest default-domain opset version transforms can target
pub const SUPPORTED_OPSET_MAX: i64 = 17;
