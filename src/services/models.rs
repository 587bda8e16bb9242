//! Models service.

use crate::types::models::ModelDescriptor;

/// Models service exposing the static model catalog.
///
/// The catalog is defined at startup; listing never touches the network and
/// is independent of the completion relay.
#[derive(Debug, Default)]
pub struct ModelsService;

impl ModelsService {
    /// Creates a new models service.
    pub fn new() -> Self {
        Self
    }

    /// Lists the available models, in catalog order.
    pub fn list(&self) -> Vec<ModelDescriptor> {
        ModelDescriptor::catalog()
    }
}
