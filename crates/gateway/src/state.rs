//! Shared application state: the one value passed to every HTTP handler,
//! the cron runner, and tool callbacks (teacher: `crates/gateway/src/state.rs`
//! `AppState`, trimmed to this spec's surface).

use std::sync::Arc;

use sa_domain::config::Config;
use sa_domain::error::Result;
use sa_providers::registry::ProviderRegistry;
use sa_store::StateStore;
use sa_tools::{build_registry, ProcessManager, ToolRegistry};

use crate::runtime::runs::RunStore;
use crate::runtime::session_lock::SessionLockMap;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub providers: Arc<ProviderRegistry>,
    pub store: Arc<StateStore>,
    pub tools: Arc<ToolRegistry>,
    pub processes: Arc<ProcessManager>,
    pub session_locks: Arc<SessionLockMap>,
    /// In-memory run records for the `/agent/runs` introspection surface.
    pub run_store: Arc<RunStore>,
    /// SHA-256 hash of the configured API bearer token. `None` means dev
    /// mode — no auth is enforced on the HTTP surface.
    pub api_key_hash: Option<Vec<u8>>,
}

impl AppState {
    pub async fn bootstrap(config: Config) -> Result<Self> {
        let config = Arc::new(config);

        tokio::fs::create_dir_all(&config.workspace.data_dir).await.ok();
        let store = StateStore::load(&config.workspace.data_dir).await?;

        let providers = Arc::new(ProviderRegistry::from_config(&config.llm));
        let processes = Arc::new(ProcessManager::new(config.tools.exec.clone()));
        let tools = Arc::new(build_registry(
            config.tools.clone(),
            config.workspace.root.clone(),
            processes.clone(),
        ));

        Ok(Self {
            api_key_hash: resolve_api_key_hash(&config.server.api_key_env),
            config,
            providers,
            store,
            tools,
            processes,
            session_locks: Arc::new(SessionLockMap::new()),
            run_store: Arc::new(RunStore::new()),
        })
    }

    /// `true` iff the request's presented key (already trimmed) matches the
    /// configured token. Dev mode (`api_key_hash = None`) always admits.
    pub fn authorize(&self, presented: Option<&str>) -> bool {
        let Some(expected_hash) = &self.api_key_hash else {
            return true;
        };
        let Some(presented) = presented else {
            return false;
        };
        use sha2::{Digest, Sha256};
        use subtle::ConstantTimeEq;
        let presented_hash = Sha256::digest(presented.as_bytes());
        presented_hash.as_slice().ct_eq(expected_hash).into()
    }
}

fn resolve_api_key_hash(env_var: &str) -> Option<Vec<u8>> {
    let key = std::env::var(env_var).ok().filter(|v| !v.is_empty())?;
    use sha2::{Digest, Sha256};
    Some(Sha256::digest(key.as_bytes()).to_vec())
}
