// Shipped transformation rules. Each rule validates its configuration at
// construction and registers for a closed set of node kinds.

pub mod method_call_to_property;
pub mod remove_unused_loop_key;
pub mod rename_class;
pub mod simplify_if_else_same_content;

pub use method_call_to_property::{MethodCallToPropertyRule, MethodToPropertyMapping};
pub use remove_unused_loop_key::RemoveUnusedLoopKeyRule;
pub use rename_class::{ClassRename, RenameClassRule};
pub use simplify_if_else_same_content::SimplifyIfElseSameContentRule;
