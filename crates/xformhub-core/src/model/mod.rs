//! Schema model
//!
//! A [`FormDef`] owns an arena of [`ElementDef`]s addressed by [`ElementId`].
//! Node shape is the closed [`SchemaNode`] variant; the relational mapping of
//! a form is planned separately as a [`TableLayout`].

pub mod diff;
pub mod element;
pub mod form_def;
pub mod layout;
pub mod simple_type;

pub use diff::Differences;
pub use element::{DataType, ElementDef, ElementId, SchemaNode};
pub use form_def::{force_to_int, FormDef};
pub use layout::{ColumnSource, ColumnSpec, TableLayout, TableSpec, ID_COLUMN, PARENT_COLUMN};
pub use simple_type::SimpleType;
