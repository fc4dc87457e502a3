use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionStatus {
    #[default]
    Uninitialized,
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionAction {
    Init,
    BeginConnect,
    ConnectSucceeded,
    ConnectFailed,
    ProviderUpdated,
    Disconnect,
    ProviderDisconnected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTransition {
    pub from: ConnectionStatus,
    pub to: ConnectionStatus,
    pub action: ConnectionAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal connection transition: {from:?} --{action:?}-->")]
pub struct TransitionError {
    pub from: ConnectionStatus,
    pub action: ConnectionAction,
}

pub fn connection_transition(
    from: ConnectionStatus,
    action: ConnectionAction,
) -> Result<(ConnectionStatus, StateTransition), TransitionError> {
    use ConnectionAction as A;
    use ConnectionStatus as S;

    let to = match (from, action) {
        (_, A::Init) => S::Disconnected,
        (_, A::Disconnect) => S::Disconnected,
        (S::Disconnected | S::Connecting, A::BeginConnect) => S::Connecting,
        // reconnects keep the live connection published until they commit
        (S::Connected, A::BeginConnect) => S::Connected,
        (S::Connecting | S::Connected, A::ConnectSucceeded) => S::Connected,
        (S::Connecting, A::ConnectFailed) => S::Disconnected,
        (S::Connected, A::ConnectFailed) => S::Connected,
        (S::Connected, A::ProviderUpdated) => S::Connected,
        (S::Connected, A::ProviderDisconnected) => S::Disconnected,
        _ => return Err(TransitionError { from, action }),
    };

    Ok((to, StateTransition { from, to, action }))
}
