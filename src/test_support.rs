use tokio::sync::Mutex as AsyncMutex;

const ENV_PREFIX: &str = "SECTIONGEN_";

/// Process-wide lock for tests that mutate environment variables.
/// Use `.blocking_lock()` in sync tests and `.lock().await` in async tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Clears every `SECTIONGEN_*` variable and restores the previous values on drop.
/// Take `ENV_LOCK` before creating one.
pub struct ScopedEnv {
    saved: Vec<(String, String)>,
}

impl ScopedEnv {
    pub fn clean() -> Self {
        let saved: Vec<(String, String)> = std::env::vars()
            .filter(|(name, _)| name.starts_with(ENV_PREFIX))
            .collect();
        for (name, _) in &saved {
            std::env::remove_var(name);
        }
        Self { saved }
    }

    pub fn set(&self, name: &str, value: &str) {
        debug_assert!(name.starts_with(ENV_PREFIX));
        std::env::set_var(name, value);
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        let touched: Vec<String> = std::env::vars()
            .map(|(name, _)| name)
            .filter(|name| name.starts_with(ENV_PREFIX))
            .collect();
        for name in touched {
            std::env::remove_var(name);
        }
        for (name, value) in &self.saved {
            std::env::set_var(name, value);
        }
    }
}
