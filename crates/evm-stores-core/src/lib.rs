pub mod adapter;
pub mod chain;
pub mod domain;
pub mod error;
mod notify;
pub mod ports;
pub mod registry;
pub mod state_machine;
pub mod store;
pub mod view;

pub use adapter::{
    classify_provider, ListenerSet, Negotiated, ProviderAdapter, ProviderClass, ProviderSource,
};
pub use chain::{
    json_chain_id, parse_chain_id_str, ChainData, ChainIdRaw, ChainRegistry, Explorer,
    NativeCurrency,
};
pub use domain::{
    clamp_selected_index, ConnectReport, ConnectionSnapshot, PartialUpdate, ProviderEvent,
    ProviderEventKind, ProviderKind, StoreWarning, WalletKind, WalletMarkers,
};
pub use error::StoreError;
pub use notify::{Observer, SubscriptionId};
pub use ports::{AmbientEnvironment, EndpointConnector, PortError, ProviderListener, ProviderPort};
pub use registry::{StoreRegistry, DEFAULT_STORE_NAME};
pub use state_machine::{
    connection_transition, ConnectionAction, ConnectionStatus, StateTransition, TransitionError,
};
pub use store::EvmStore;
pub use view::{DerivedView, ViewSummary};
