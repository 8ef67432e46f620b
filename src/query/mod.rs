//! The query-translation engine: DSL parsing (§4.3), compilation to the
//! downstream wire syntax (§4.4), and the identifier-escaping primitive that
//! underlies both.

pub mod compiler;
pub mod escaping;
pub mod operators;
pub mod parser;
pub mod plan;
