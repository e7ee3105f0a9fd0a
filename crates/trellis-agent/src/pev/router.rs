use super::state::PevState;
use super::{EXECUTE, PLAN, SYNTHESIZE};

/// Pick the node after verification.
///
/// `final_answer` wins over everything. An empty plan goes back to planning
/// only when the newest history entry is a failure note.
pub fn route_after_verify(state: &PevState) -> &'static str {
    if state.final_answer.is_some() {
        return SYNTHESIZE;
    }
    if state.plan.is_empty() {
        if state.last_attempt_failed() {
            PLAN
        } else {
            SYNTHESIZE
        }
    } else {
        EXECUTE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pev::state::HistoryEntry;

    #[test]
    fn test_final_answer_takes_precedence() {
        let mut state = PevState::new("g");
        state.plan = vec!["pending".into()];
        state.history = vec![HistoryEntry::verification_failed("x")];
        state.final_answer = Some("done".into());
        assert_eq!(route_after_verify(&state), SYNTHESIZE);
    }

    #[test]
    fn test_failure_with_empty_plan_replans() {
        let mut state = PevState::new("g");
        state.history = vec![
            HistoryEntry::Verified("a".into()),
            HistoryEntry::verification_failed("b"),
        ];
        assert_eq!(route_after_verify(&state), PLAN);
    }

    #[test]
    fn test_empty_plan_after_success_synthesizes() {
        let mut state = PevState::new("g");
        state.history = vec![
            HistoryEntry::verification_failed("a"),
            HistoryEntry::Verified("b".into()),
        ];
        assert_eq!(route_after_verify(&state), SYNTHESIZE);
        assert_eq!(route_after_verify(&PevState::new("g")), SYNTHESIZE);
    }

    #[test]
    fn test_pending_steps_execute() {
        let mut state = PevState::new("g");
        state.plan = vec!["next".into()];
        state.history = vec![HistoryEntry::Verified("a".into())];
        assert_eq!(route_after_verify(&state), EXECUTE);
    }
}
