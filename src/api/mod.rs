// Wire protocol and the coordinator side of the parallel run.

pub mod protocol;
pub mod server;
