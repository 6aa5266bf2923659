use crate::core::value::DataMap;
use std::sync::Arc;

/// A pure `data -> data'` transform, as spec.md §3 defines for a route.
/// Purity is a caller contract, not something the engine enforces.
pub type TransformFn = Arc<dyn Fn(&DataMap) -> DataMap + Send + Sync>;

/// Applies an optional transform, passing the payload through unchanged
/// when absent (spec.md §3: "When absent, the payload is passed through
/// after internal-field cleaning").
pub fn apply_transform(transform: Option<&TransformFn>, data: &DataMap) -> DataMap {
    match transform {
        Some(f) => f(data),
        None => data.clone(),
    }
}
