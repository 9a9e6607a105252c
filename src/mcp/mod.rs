pub mod dispatcher;
pub mod host;
pub mod registry;
pub mod rpc;
pub mod types;
