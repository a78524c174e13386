//! Session and todo services, both fronted by the [`AccessGate`].
//!
//! [`Services::from_config`] wires the token manager, the configured store
//! backend and the gate together; the binary and the integration tests both
//! start from it.

mod gate;
mod session;
mod todo;

pub use gate::AccessGate;
pub use session::{SessionService, TokenPair};
pub use todo::TodoService;

use std::sync::Arc;

use tracing::info;

use crate::auth::{OsRandom, TokenManager};
use crate::config::Config;
use crate::error::AppError;
use crate::store::{self, StoreHandle};

#[derive(Clone)]
pub struct Services {
    pub sessions: SessionService,
    pub todos: TodoService,
}

impl Services {
    pub fn new(tokens: Arc<TokenManager>, store: StoreHandle) -> Self {
        let gate = AccessGate::new(Arc::clone(&tokens), store.clone());
        Self {
            sessions: SessionService::new(gate.clone(), tokens, store.clone()),
            todos: TodoService::new(gate, store),
        }
    }

    /// Build from resolved config.  Fails when `TODOKEEP_SECRET` is unset or
    /// the store backend cannot be opened.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let key = config
            .signing_key
            .as_ref()
            .ok_or_else(|| AppError::Config("TODOKEEP_SECRET is not set".into()))?;
        let tokens = TokenManager::new(key.as_bytes(), config.auth.clone(), Arc::new(OsRandom))
            .map_err(|e| AppError::Config(format!("token manager: {e}")))?;

        let backend = store::open_backend(&config.store.backend, &config.data_dir)?;
        let handle = StoreHandle::new(backend, config.store.timeout);

        info!(
            issuer = %config.auth.issuer,
            backend = handle.backend(),
            timeout_ms = config.store.timeout.as_millis() as u64,
            "services ready"
        );
        Ok(Self::new(Arc::new(tokens), handle))
    }
}
