// Core transformation model: nodes, semantic types, scopes, the type
// resolution engine, and the rule dispatch machinery.

pub mod diff;
pub mod matcher;
pub mod node;
pub mod resolver;
pub mod rules;
pub mod scope;
pub mod types;
pub mod version;
