use std::io::{Read, Write};

use crate::error::ElementError;
use crate::id::ElementId;

/// A uniquely identified unit of data the store can persist.
///
/// Implementations own their encoding entirely; the store only moves bytes
/// between the element and a file. `load` is called on a "skeleton" value
/// that carries nothing but the id being retrieved.
pub trait Element: Send + Sync + 'static {
    /// The element's identifier. Must be stable for the element's lifetime.
    fn id(&self) -> ElementId;

    /// Populate `self` from a byte stream produced by [`Element::store`].
    fn load(&mut self, reader: &mut dyn Read) -> Result<(), ElementError>;

    /// Write `self` to a byte stream.
    fn store(&self, writer: &mut dyn Write) -> Result<(), ElementError>;
}
