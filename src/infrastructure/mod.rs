// Infrastructure implementations for Recast: the syn front end, the
// span-splicing printer, the class index and analyzer, source collection,
// configuration, worker resources, and the worker client.

pub mod analyzer;
pub mod config;
pub mod loader;
pub mod memory;
pub mod parser;
pub mod printer;
pub mod worker;
