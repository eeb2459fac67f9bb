//! Code versions derived from the conversation log, and the pointers that
//! decide which one is previewed and which one lives in the working draft.

use crate::types::Message;
use crate::util::excerpt;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeVersion {
    /// Id of the assistant message that produced the code.
    pub id: String,
    /// 1-based, gapless, in log order.
    pub version_number: usize,
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub excerpt: String,
}

/// Every assistant message carrying a code snapshot, numbered in log order.
pub fn derive_versions(messages: &[Message], excerpt_chars: usize) -> Vec<CodeVersion> {
    messages
        .iter()
        .filter(|message| message.is_assistant())
        .filter_map(|message| {
            message
                .code_snapshot
                .as_ref()
                .map(|code| (message, code))
        })
        .enumerate()
        .map(|(index, (message, code))| CodeVersion {
            id: message.id.clone(),
            version_number: index + 1,
            code: code.clone(),
            created_at: message.created_at,
            excerpt: excerpt(&message.content, excerpt_chars),
        })
        .collect()
}

/// Side effects on the external working draft, dispatched after state is updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftEffect {
    CodeUpdated(String),
    AutoApplied,
    AutoSave(String),
    VersionChanged(Option<String>),
}

/// Outbound collaborators that own the working draft.
pub trait DraftHooks: Send + Sync {
    /// Also called from the consumer task when a reply carries code, with
    /// cancellation held off until it returns. Must not call back into the session.
    fn code_updated(&self, code: &str);

    fn auto_applied(&self) {}

    fn auto_save(&self, _code: &str) {}

    fn version_changed(&self, _version_id: Option<&str>) {}
}

impl DraftEffect {
    pub fn dispatch(&self, hooks: &dyn DraftHooks) {
        match self {
            Self::CodeUpdated(code) => hooks.code_updated(code),
            Self::AutoApplied => hooks.auto_applied(),
            Self::AutoSave(code) => hooks.auto_save(code),
            Self::VersionChanged(id) => hooks.version_changed(id.as_deref()),
        }
    }
}

/// Hooks that ignore everything.
pub struct NoDraftHooks;

impl DraftHooks for NoDraftHooks {
    fn code_updated(&self, _code: &str) {}
}

#[derive(Debug, Default, Clone)]
pub struct VersionSelector {
    selected_version_id: Option<String>,
    active_version_id: Option<String>,
    observed_count: usize,
    pending_restore: Option<String>,
}

impl VersionSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with `version_id` marked active; its code is pushed to the
    /// draft on the first evaluation that can see it.
    pub fn with_initial_version(version_id: impl Into<String>) -> Self {
        let version_id = version_id.into();
        Self {
            active_version_id: Some(version_id.clone()),
            pending_restore: Some(version_id),
            ..Self::default()
        }
    }

    pub fn selected_version_id(&self) -> Option<&str> {
        self.selected_version_id.as_deref()
    }

    pub fn active_version_id(&self) -> Option<&str> {
        self.active_version_id.as_deref()
    }

    pub fn is_active_version(&self, version_id: &str) -> bool {
        self.active_version_id.as_deref() == Some(version_id)
    }

    /// Moves the preview pointer only.
    pub fn select(&mut self, version_id: Option<String>) {
        self.selected_version_id = version_id;
    }

    pub fn selected_version<'a>(&self, versions: &'a [CodeVersion]) -> Option<&'a CodeVersion> {
        let selected = self.selected_version_id.as_deref()?;
        versions.iter().find(|version| version.id == selected)
    }

    /// Code under the preview pointer, else the externally supplied current code.
    pub fn preview_code<'a>(
        &self,
        versions: &'a [CodeVersion],
        current_code: Option<&'a str>,
    ) -> Option<&'a str> {
        self.selected_version(versions)
            .map(|version| version.code.as_str())
            .or(current_code)
    }

    pub fn apply(&mut self, versions: &[CodeVersion], version_id: &str) -> Vec<DraftEffect> {
        let Some(version) = versions.iter().find(|version| version.id == version_id) else {
            tracing::warn!(version_id, "apply requested for unknown version");
            return Vec::new();
        };

        self.active_version_id = Some(version.id.clone());
        self.selected_version_id = None;
        vec![
            DraftEffect::CodeUpdated(version.code.clone()),
            DraftEffect::VersionChanged(Some(version.id.clone())),
        ]
    }

    /// Treats `count` versions as already seen, so none of them counts as new.
    pub fn rebase(&mut self, count: usize) {
        self.observed_count = count;
    }

    /// Runs the auto-apply policy against a freshly derived version list.
    pub fn evaluate(&mut self, versions: &[CodeVersion], is_dirty: bool) -> Vec<DraftEffect> {
        let mut effects = Vec::new();
        let grew = versions.len() > self.observed_count;
        self.observed_count = versions.len();

        if grew && self.selected_version_id.take().is_some() {
            tracing::debug!("new version arrived; leaving preview");
        }

        let Some(latest) = versions.last() else {
            return effects;
        };
        if is_dirty || self.selected_version_id.is_some() {
            return effects;
        }

        if let Some(restore_id) = self.pending_restore.take() {
            match versions.iter().find(|version| version.id == restore_id) {
                Some(version) => effects.push(DraftEffect::CodeUpdated(version.code.clone())),
                None => {
                    tracing::warn!(version_id = %restore_id, "initial version not found; clearing");
                    self.active_version_id = None;
                    effects.push(DraftEffect::VersionChanged(None));
                }
            }
        }

        let is_first_version = versions.len() == 1 && self.active_version_id.is_none();
        if (is_first_version || grew) && !self.is_active_version(&latest.id) {
            tracing::info!(
                version_id = %latest.id,
                version_number = latest.version_number,
                "auto-applying latest version"
            );
            self.active_version_id = Some(latest.id.clone());
            self.selected_version_id = None;
            effects.push(DraftEffect::CodeUpdated(latest.code.clone()));
            effects.push(DraftEffect::AutoApplied);
            effects.push(DraftEffect::AutoSave(latest.code.clone()));
            effects.push(DraftEffect::VersionChanged(Some(latest.id.clone())));
        }

        effects
    }
}
