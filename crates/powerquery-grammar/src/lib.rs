//! Lexing and error-tolerant parsing of the Power Query (M) formula
//! language.
//!
//! The parser can be interrupted by a syntax error and still expose a
//! well-formed partial tree: completed nodes and in-flight context nodes
//! share one id address space inside a [`NodeIdMap`], and every query
//! downstream works over [`XorNode`] views so it is indifferent to
//! whether parsing finished. See the `powerquery-analysis` crate for the
//! position-driven inspections built on top.

pub mod cancellation;
pub mod context;
pub mod error;
pub mod grammar;
pub mod lexer;
pub mod node;
pub mod node_id_map;
pub mod parser;
pub mod state;
pub mod token;
pub mod xor_node;

pub use cancellation::CancellationToken;
pub use cancellation::Cancelled;
pub use context::ContextNode;
pub use error::CommonError;
pub use error::LexError;
pub use error::LexErrorKind;
pub use error::ParseError;
pub use error::ParseErrorKind;
pub use lexer::TokenSet;
pub use lexer::tokenize;
pub use node::AstNode;
pub use node::Constant;
pub use node::LeafData;
pub use node::LiteralKind;
pub use node::NodeId;
pub use node::NodeKind;
pub use node::PrimitiveTypeKind;
pub use node_id_map::NodeIdMap;
pub use parser::EntryPoint;
pub use parser::ParseFailure;
pub use parser::ParserKind;
pub use parser::parse;
pub use state::Checkpoint;
pub use state::ParseState;
pub use token::Keyword;
pub use token::Position;
pub use token::Token;
pub use token::TokenKind;
pub use token::TokenPosition;
pub use token::TokenRange;
pub use xor_node::XorNode;
