//! Parsing and inspection engine for the Power Query (M) formula
//! language.
//!
//! Given raw source text the engine produces either a complete syntax
//! tree or a partial tree annotated with a parse error, and answers
//! positional questions against it: what is in scope at the cursor, what
//! is the inferred type of a node, and what identifiers, keywords,
//! primitive types, or record fields can complete here.
//!
//! ```
//! use powerquery::Position;
//! use powerquery::Settings;
//! use powerquery::try_lex_parse;
//!
//! let settings = Settings::new();
//! let task = try_lex_parse(&settings, "let a = 1, b = a + 1 in b");
//! assert!(task.is_parse_stage_ok());
//!
//! let inspection = task
//!     .inspect(&settings, Position::new(0, 25))
//!     .expect("the task carries a tree");
//! let scope = inspection.scope.expect("scope should resolve");
//! assert!(scope.contains_key("a") && scope.contains_key("b"));
//! ```

mod settings;
mod task;

pub use powerquery_analysis::ActiveNode;
pub use powerquery_analysis::ActiveNodeLeafKind;
pub use powerquery_analysis::Autocomplete;
pub use powerquery_analysis::ExternalTypeResolver;
pub use powerquery_analysis::FieldAccessItem;
pub use powerquery_analysis::Inspection;
pub use powerquery_analysis::InspectionState;
pub use powerquery_analysis::inspect_xor;
pub use powerquery_analysis::LanguageConstant;
pub use powerquery_analysis::NoResolver;
pub use powerquery_analysis::NodeScope;
pub use powerquery_analysis::ScopeItem;
pub use powerquery_analysis::TraversalStrategy;
pub use powerquery_analysis::Type;
pub use powerquery_analysis::TypeKind;
pub use powerquery_grammar::CancellationToken;
pub use powerquery_grammar::CommonError;
pub use powerquery_grammar::EntryPoint;
pub use powerquery_grammar::Keyword;
pub use powerquery_grammar::LexError;
pub use powerquery_grammar::NodeId;
pub use powerquery_grammar::NodeIdMap;
pub use powerquery_grammar::NodeKind;
pub use powerquery_grammar::ParseError;
pub use powerquery_grammar::ParseErrorKind;
pub use powerquery_grammar::ParserKind;
pub use powerquery_grammar::Position;
pub use powerquery_grammar::PrimitiveTypeKind;
pub use powerquery_grammar::Token;
pub use powerquery_grammar::TokenKind;
pub use settings::Settings;
pub use task::LexParseTask;
pub use task::LexTask;
pub use task::ParseErrorTask;
pub use task::ParseOk;
pub use task::ParseTask;
pub use task::TaskResultKind;
pub use task::TaskStage;
pub use task::try_lex;
pub use task::try_lex_parse;
pub use task::try_parse;
