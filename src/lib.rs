//! Streaming Markdown rendering core: a line parser producing one attributed item per character,
//! a prefix reconciler for rendering handles, a per-glyph layout engine and a selection engine.

pub mod error;
pub mod geometry;
pub mod layout;
pub mod markdown;
pub mod model;
pub mod reconcile;
pub mod selection;
pub mod session;
pub mod stream;
pub mod view;

pub use error::{HostError, StreamError};
pub use geometry::{Point, Rect, Size};
pub use layout::{Decoration, DecorationKind, LayoutEngine, LayoutResult, LayoutStyle, Measure};
pub use markdown::{ParseOptions, parse_markdown, parse_markdown_with};
pub use model::{AttributedChar, Attributes, CharKind};
pub use reconcile::{Entrance, GlyphSurface, Reconciliation, UnitList, reconcile, reconcile_in_place};
pub use selection::{Handle, MenuAnchor, SelectionRange};
pub use session::{Outcome, PointerEvent, SelectionHost, SelectionSession, SelectionView};
pub use stream::{ParseWorker, ParsedText};
pub use view::StreamView;
