

pub mod server;

pub use server::{ConceptRagMcpServer, run_server};
