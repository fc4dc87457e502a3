pub mod chains;
pub mod config;
pub mod eip1193;
pub mod environment;
pub mod rpc;

pub use chains::load_chain_registry;
pub use config::StoreAdapterConfig;
pub use eip1193::Eip1193Adapter;
pub use environment::StaticEnvironment;
pub use rpc::{JsonRpcClient, JsonRpcConnector};
