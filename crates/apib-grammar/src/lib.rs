//! Structural grammar engine for API Blueprint documents.
//!
//! The engine walks the document line by line, recognising metadata, resource
//! groups, resources, actions and their request/response payloads. Headings are
//! detected in both ATX and setext form and are ignored inside fenced code
//! blocks. The result is a serialisable [`Blueprint`] tree.

mod ast;
mod error;
mod fence;
mod heading;
mod line;
mod parser;
mod payload;

pub use ast::{
    Action, Blueprint, Header, Metadata, Method, Payload, PayloadKind, Resource, ResourceGroup,
};
pub use error::{GrammarError, GrammarResult};
pub use heading::normalize_heading_text;

/// Parse blueprint markdown into its structural tree.
pub fn parse_blueprint(source: &str) -> GrammarResult<Blueprint> {
    parser::BlueprintParser::new(source).run()
}
