//! Core transform abstraction
//!
//! Every editing operation in this crate is a pure function from one model
//! to a new model. [`Transformer`] packages such an operation as a value so
//! pipelines can be assembled as data, and [`TransformerChain`] sequences
//! them.

use crate::error::GraftResult;
use crate::proto::ModelProto;

/// A pure model-to-model transform
///
/// Implementations never mutate the input; on error the caller's model is
/// untouched.
///
/// # Example
///
/// ```ignore
/// use onnx_graft::prelude::*;
///
/// let pipeline = TransformerChain::new()
///     .add(OpsetReconciler::new(13))
///     .add(NodeElider::by_name("softmax_0"));
///
/// let edited = pipeline.transform(&model)?;
/// ```
pub trait Transformer {
    /// Short name for diagnostics
    fn name(&self) -> &str;

    /// Produce the transformed model
    fn transform(&self, model: &ModelProto) -> GraftResult<ModelProto>;
}

/// Applies transformers in sequence, feeding each the previous output
#[derive(Default)]
pub struct TransformerChain {
    transformers: Vec<Box<dyn Transformer>>,
}

impl TransformerChain {
    /// Create an empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transformer to the chain
    #[allow(clippy::should_implement_trait)]
    pub fn add<T: Transformer + 'static>(mut self, transformer: T) -> Self {
        self.transformers.push(Box::new(transformer));
        self
    }

    /// Number of transformers in the chain
    pub fn len(&self) -> usize {
        self.transformers.len()
    }

    /// Whether the chain is empty
    pub fn is_empty(&self) -> bool {
        self.transformers.is_empty()
    }
}

impl Transformer for TransformerChain {
    fn name(&self) -> &str {
        "TransformerChain"
    }

    fn transform(&self, model: &ModelProto) -> GraftResult<ModelProto> {
        let mut current = model.clone();
        for transformer in &self.transformers {
            tracing::debug!(transformer = transformer.name(), "applying transform");
            current = transformer.transform(&current)?;
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraftError;

    struct StampProducer(&'static str);

    impl Transformer for StampProducer {
        fn name(&self) -> &str {
            "StampProducer"
        }

        fn transform(&self, model: &ModelProto) -> GraftResult<ModelProto> {
            let mut out = model.clone();
            out.producer_name.push_str(self.0);
            Ok(out)
        }
    }

    struct AlwaysFails;

    impl Transformer for AlwaysFails {
        fn name(&self) -> &str {
            "AlwaysFails"
        }

        fn transform(&self, _model: &ModelProto) -> GraftResult<ModelProto> {
            Err(GraftError::MalformedGraph("boom".to_string()))
        }
    }

    #[test]
    fn test_chain_applies_in_order() {
        let chain = TransformerChain::new()
            .add(StampProducer("a"))
            .add(StampProducer("b"));

        let model = ModelProto::default();
        let out = chain.transform(&model).unwrap();
        assert_eq!(out.producer_name, "ab");
        // input untouched
        assert_eq!(model.producer_name, "");
    }

    #[test]
    fn test_chain_stops_at_first_error() {
        let chain = TransformerChain::new()
            .add(StampProducer("a"))
            .add(AlwaysFails)
            .add(StampProducer("b"));

        assert!(chain.transform(&ModelProto::default()).is_err());
    }

    #[test]
    fn test_empty_chain_is_identity() {
        let chain = TransformerChain::new();
        assert!(chain.is_empty());

        let model = ModelProto {
            ir_version: 8,
            ..Default::default()
        };
        assert_eq!(chain.transform(&model).unwrap(), model);
    }
}
