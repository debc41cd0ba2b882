//! # TTML ISD: Timed Text Parsing and Intermediate Synchronic Documents
//!
//! This crate parses TTML / IMSC caption documents into an immutable, fully timed document
//! model and generates an ISD (Intermediate Synchronic Document) for any point in time:
//! a render-ready snapshot of exactly what is visible at that instant, with every style
//! inherited, defaulted and normalized.
//!
//! The two primary entry points are:
//! - [`parse_ttml`]: Converts a TTML string into a [`Document`], resolving all timing.
//! - [`Document::generate_isd`]: Builds the [`Isd`] for a given offset in seconds.
//!
//! Lengths in the ISD are expressed as [`ComputedLength`] values, fractions of the root
//! container's width and height, so the snapshot can be produced before the final viewport
//! size is known. Call [`ComputedLength::to_pixels`] when rendering.
//!
//! ## Not a Renderer
//!
//! Layout (line breaking, font metrics, bidi shaping) is out of scope. The ISD carries the
//! *computed* style values a renderer needs and nothing more.
//!
//! ## Examples
//!
//! ```rust
//! use ttml_isd::{StyleName, StyleValue, parse_ttml};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ttml_content = r#"
//!     <tt xmlns="http://www.w3.org/ns/ttml" xmlns:tts="http://www.w3.org/ns/ttml#styling">
//!       <body>
//!         <div>
//!           <p begin="1s" end="3s">Hello <span tts:fontStyle="italic">world</span></p>
//!         </div>
//!       </body>
//!     </tt>
//!     "#;
//!
//!     let document = parse_ttml(ttml_content)?;
//!     assert_eq!(document.media_time_events(), &[0.0, 1.0, 3.0]);
//!
//!     let isd = document.generate_isd(2.0)?;
//!     // The synthesized default region holds body > div > p
//!     let p = &isd.contents[0].contents[0].contents[0].contents[0];
//!     assert_eq!(p.contents[0].text.as_deref(), Some("Hello "));
//!     assert_eq!(
//!         p.contents[1].style(StyleName::FontStyle),
//!         Some(&StyleValue::Keyword("italic".to_owned()))
//!     );
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod isd;
pub mod length;
pub mod model;
pub mod namespaces;
pub mod parser;
pub mod styles;
pub mod timing;

pub use error::{
    CollectingErrorHandler, ErrorHandler, IsdError, Result, Severity, TracingErrorHandler,
};
pub use isd::{Isd, IsdContentElement};
pub use length::{ComputedLength, Dimensions, Length, LengthUnit};
pub use model::{ContentElement, Contents, Document, ElementKind, XmlSpace};
pub use parser::{
    MetadataHandler, ParseOptions, TreeBuilder, XmlAttribute, XmlNode, parse_time_expression,
    parse_ttml, parse_ttml_with,
};
pub use styles::{
    Color, StyleAttributeDefinition, StyleMap, StyleName, StyleValue, lookup_by_alias,
    lookup_by_qname,
};
