//! Concrete mappers shipped with the library.

mod media_item;

pub use media_item::MediaItemMapper;

use super::ClassMapper;

/// Returns every mapper shipped with the library, in registration order.
pub fn default_mappers() -> Vec<Box<dyn ClassMapper>> {
    vec![Box::new(MediaItemMapper)]
}
