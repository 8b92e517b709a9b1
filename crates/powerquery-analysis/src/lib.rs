//! Position-driven inspection of Power Query (M) parse trees.
//!
//! Every analysis here runs equally over completed trees and the partial
//! trees a failed parse leaves behind: a cursor position is resolved to
//! its enclosing-node ancestry, and scope resolution, type inference, and
//! the four autocomplete analyses walk that ancestry through the node-id
//! map built by `powerquery-grammar`.

pub mod active_node;
pub mod autocomplete;
pub mod inspection;
pub mod scope;
pub mod traversal;
pub mod types;

pub use active_node::ActiveNode;
pub use active_node::ActiveNodeLeafKind;
pub use active_node::active_node;
pub use autocomplete::Autocomplete;
pub use autocomplete::FieldAccessItem;
pub use autocomplete::LanguageConstant;
pub use inspection::Inspection;
pub use inspection::InspectionState;
pub use inspection::inspect;
pub use scope::NodeScope;
pub use scope::ScopeItem;
pub use traversal::TraversalStrategy;
pub use traversal::try_traverse_ast;
pub use traversal::try_traverse_xor;
pub use types::ExtendedType;
pub use types::ExternalTypeResolver;
pub use types::FunctionParameter;
pub use types::NoResolver;
pub use types::Type;
pub use types::TypeKind;
pub use types::inspect_xor;
