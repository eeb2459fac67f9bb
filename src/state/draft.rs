use crate::state::versions::DraftHooks;
use parking_lot::Mutex;

/// Inbound view of the editor that owns the working draft.
pub trait DraftSource: Send + Sync {
    /// Code currently in the editor, sent as generation context.
    fn current_code(&self) -> Option<String>;

    /// True while the draft holds edits not yet reflected in its baseline.
    fn is_dirty(&self) -> bool;
}

/// In-process working draft. Code pushed through [`DraftHooks`] becomes the
/// new baseline; only [`MemoryDraft::edit`] makes it dirty.
#[derive(Debug, Default)]
pub struct MemoryDraft {
    inner: Mutex<DraftInner>,
}

#[derive(Debug, Default)]
struct DraftInner {
    code: Option<String>,
    baseline: Option<String>,
    version_id: Option<String>,
    saved: Vec<String>,
    auto_applied: usize,
    code_updates: usize,
}

impl MemoryDraft {
    pub fn new(code: Option<String>) -> Self {
        Self {
            inner: Mutex::new(DraftInner {
                baseline: code.clone(),
                code,
                ..DraftInner::default()
            }),
        }
    }

    /// A user edit.
    pub fn edit(&self, code: impl Into<String>) {
        self.inner.lock().code = Some(code.into());
    }

    /// Drops unsaved edits, returning to the baseline.
    pub fn revert(&self) {
        let mut inner = self.inner.lock();
        inner.code = inner.baseline.clone();
    }

    pub fn code(&self) -> Option<String> {
        self.inner.lock().code.clone()
    }

    pub fn version_id(&self) -> Option<String> {
        self.inner.lock().version_id.clone()
    }

    /// Code handed to auto-save, oldest first.
    pub fn saved(&self) -> Vec<String> {
        self.inner.lock().saved.clone()
    }

    pub fn auto_applied_count(&self) -> usize {
        self.inner.lock().auto_applied
    }

    pub fn code_update_count(&self) -> usize {
        self.inner.lock().code_updates
    }
}

impl DraftSource for MemoryDraft {
    fn current_code(&self) -> Option<String> {
        self.code()
    }

    fn is_dirty(&self) -> bool {
        let inner = self.inner.lock();
        inner.code != inner.baseline
    }
}

impl DraftHooks for MemoryDraft {
    fn code_updated(&self, code: &str) {
        if code.is_empty() {
            return;
        }
        let mut inner = self.inner.lock();
        inner.code = Some(code.to_string());
        inner.baseline = Some(code.to_string());
        inner.code_updates += 1;
    }

    fn auto_applied(&self) {
        self.inner.lock().auto_applied += 1;
    }

    fn auto_save(&self, code: &str) {
        self.inner.lock().saved.push(code.to_string());
    }

    fn version_changed(&self, version_id: Option<&str>) {
        self.inner.lock().version_id = version_id.map(str::to_string);
    }
}
