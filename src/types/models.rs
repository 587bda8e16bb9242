//! Model catalog types.

use serde::Serialize;

/// Capability descriptor for one Widn model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelDescriptor {
    /// Model ID.
    pub id: &'static str,

    /// Whether the model supports JSON mode.
    pub supports_json_mode: bool,

    /// Whether the model supports function calling.
    pub supports_function_calling: bool,

    /// Whether the model supports streaming responses.
    pub supports_streaming: bool,

    /// Whether the model accepts image input.
    pub supports_vision: bool,

    /// Context window size in tokens.
    pub context_window_limit: u32,
}

impl ModelDescriptor {
    /// Returns the static model catalog, in catalog order.
    ///
    /// The catalog is defined at startup and requires no network access.
    pub fn catalog() -> Vec<ModelDescriptor> {
        [known::SUGARLOAF, known::VESUVIUS]
            .into_iter()
            .map(|id| ModelDescriptor {
                id,
                supports_json_mode: false,
                supports_function_calling: false,
                supports_streaming: true,
                supports_vision: false,
                context_window_limit: 4096,
            })
            .collect()
    }
}

/// Well-known Widn models.
pub mod known {
    /// Sugarloaf model.
    pub const SUGARLOAF: &str = "sugarloaf";

    /// Vesuvius model.
    pub const VESUVIUS: &str = "vesuvius";
}
