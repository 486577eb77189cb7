//! Directive metadata readers.
//!
//! Federation supergraphs and fusion-annotated schemas carry all of their
//! routing metadata in schema directives. The readers here extract that
//! metadata into typed records, one per directive application, without
//! interpreting it — interpretation is the blueprint builder's job. The only
//! failure mode is a malformed argument (present but of the wrong literal
//! kind, or a missing required argument), which is a fatal [`SchemaError`]:
//! a supergraph with broken metadata cannot be planned against.
//!
//! [`SchemaError`]: crate::error::SchemaError

pub(crate) mod argument;
pub mod fusion;
pub mod join;
