//! Layered configuration merge.
//!
//! Layers are folded left to right into a fresh [`ConfigLayer`]:
//!
//! - a key seen for the first time is taken as-is,
//! - if both the accumulated and the incoming value are maps, they are merged
//!   recursively,
//! - anything else is replaced by the incoming value.
//!
//! Presence is decided by the key alone. A falsy leaf such as `""`, `0`,
//! `false` or `null` counts as present. Merging never removes a key; header
//! deletion is handled afterwards by [`crate::filter_headers`].

use crate::{ConfigLayer, ConfigValue};

/// Merge `layers` in order, later layers taking precedence.
///
/// `None` entries are skipped. The inputs are only borrowed; the returned
/// layer shares nothing with them.
///
/// ```
/// use fetchtower::{ConfigLayer, merge};
///
/// let base = ConfigLayer::new().with("headers", ConfigLayer::new().with("a", "1"));
/// let extra = ConfigLayer::new().with("headers", ConfigLayer::new().with("b", "2"));
///
/// let merged = merge([Some(&base), None, Some(&extra)]);
/// assert_eq!(
///     merged,
///     ConfigLayer::new().with(
///         "headers",
///         ConfigLayer::new().with("a", "1").with("b", "2"),
///     )
/// );
/// ```
#[must_use]
pub fn merge<'a, I>(layers: I) -> ConfigLayer
where
    I: IntoIterator<Item = Option<&'a ConfigLayer>>,
{
    let mut result = ConfigLayer::new();
    for layer in layers.into_iter().flatten() {
        merge_into(&mut result, layer);
    }
    result
}

impl ConfigLayer {
    /// Shorthand for `merge([Some(self), Some(other)])`
    #[must_use]
    pub fn merged(&self, other: &ConfigLayer) -> ConfigLayer {
        merge([Some(self), Some(other)])
    }
}

/// Overlay `layer` onto the accumulated `target`.
///
/// `target` is always owned by the caller of [`merge`], so mutating it in
/// place never touches an input layer.
fn merge_into(target: &mut ConfigLayer, layer: &ConfigLayer) {
    for (key, incoming) in layer {
        match (target.get_mut(key), incoming) {
            (Some(ConfigValue::Map(existing)), ConfigValue::Map(nested)) => {
                merge_into(existing, nested);
            }
            (Some(existing), _) => *existing = incoming.clone(),
            (None, _) => {
                target.insert(key.clone(), incoming.clone());
            }
        }
    }
}
