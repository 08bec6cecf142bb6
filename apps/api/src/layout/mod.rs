// Book layout: text sanitizing and wrapping, font resources, page geometry
// and the paginator. Everything here is synchronous and CPU-bound; callers
// on the async side must run it inside tokio::task::spawn_blocking.

pub mod fonts;
pub mod geometry;
#[cfg(test)]
pub mod metrics;
pub mod paginate;
pub mod text;

pub use fonts::{load_font_set, FontError, FontHandle, FontRole, FontSet, LoadedFont};
pub use geometry::{PageGeometry, Side};
pub use paginate::{paginate, Layout, LayoutError, LayoutOptions, PagePlan};
