use crate::types::GenerationRequest;
use crate::util::env_flag;

const DEBUG_PAYLOAD_ENV: &str = "SECTIONGEN_DEBUG_PAYLOAD";
const MAX_LOGGED_CODE_CHARS: usize = 200;

pub fn debug_payload_enabled() -> bool {
    env_flag(DEBUG_PAYLOAD_ENV, false)
}

pub fn emit_debug_payload(request_url: &str, request: &GenerationRequest) {
    let code_preview = request
        .current_code
        .as_deref()
        .map(|code| crate::util::excerpt(code, MAX_LOGGED_CODE_CHARS));
    tracing::debug!(
        target: "sectiongen::payload",
        url = request_url,
        conversation_id = %request.conversation_id,
        content = %request.content,
        current_code = ?code_preview,
        continue_generation = request.continue_generation,
        "generation request payload"
    );
}

pub fn emit_record_dropped(payload: &str, parse_error: &serde_json::Error) {
    tracing::trace!(
        target: "sectiongen::stream",
        error = %parse_error,
        data = payload,
        "dropped unparseable stream record"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_payload_enabled_accepts_true_variants() {
        let _env_lock = crate::test_support::ENV_LOCK.blocking_lock();
        let env = crate::test_support::ScopedEnv::clean();
        assert!(!debug_payload_enabled());
        env.set(DEBUG_PAYLOAD_ENV, "1");
        assert!(debug_payload_enabled());
        env.set(DEBUG_PAYLOAD_ENV, "TRUE");
        assert!(debug_payload_enabled());
        env.set(DEBUG_PAYLOAD_ENV, "off");
        assert!(!debug_payload_enabled());
    }
}
