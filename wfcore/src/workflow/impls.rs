use std::ops::{Deref, DerefMut};

use crate::{
    ac::Role,
    condition,
    workflow::*,
};

macro_rules! vec_newtype {
    ($name:ident, $item:ty) => {
        impl From<Vec<$item>> for $name {
            fn from(items: Vec<$item>) -> Self {
                Self(items)
            }
        }

        impl<const N: usize> From<[$item; N]> for $name {
            fn from(items: [$item; N]) -> Self {
                Self(items.into())
            }
        }

        impl From<$name> for Vec<$item> {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl Deref for $name {
            type Target = Vec<$item>;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl DerefMut for $name {
            fn deref_mut(&mut self) -> &mut Self::Target {
                &mut self.0
            }
        }
    };
}

vec_newtype!(WorkflowDefinitions, WorkflowDefinition);
vec_newtype!(WorkflowStates, WorkflowState);
vec_newtype!(WorkflowTransitions, WorkflowTransition);
vec_newtype!(StateActions, StateAction);

impl WorkflowState {
    /// Due timestamp for a step entering this state at `from`, if the
    /// state carries a positive SLA.  A deadline beyond the range of a
    /// timestamp is treated as none.
    pub fn due_ts(&self, from: i64) -> Option<i64> {
        self.sla_hours
            .filter(|hours| *hours > 0)
            .and_then(|hours| hours.checked_mul(3600))
            .and_then(|secs| from.checked_add(secs))
    }

    pub fn action_by_key(&self, action_key: &str) -> Option<&StateAction> {
        self.actions.as_ref()?
            .iter()
            .find(|action| action.action_key == action_key)
    }

    /// The actions the role may invoke, in display order.
    pub fn available_actions(&self, role: Role) -> Vec<&StateAction> {
        self.actions.iter()
            .flat_map(|actions| actions.iter())
            .filter(|action| action.can_be_executed_by(role))
            .collect()
    }

    pub fn default_action(&self) -> Option<&StateAction> {
        self.actions.as_ref()?
            .iter()
            .find(|action| action.is_default)
    }
}

impl StateAction {
    pub fn can_be_executed_by(&self, role: Role) -> bool {
        match self.requires_role {
            Some(required) => role.satisfies(required),
            None => true,
        }
    }
}

impl WorkflowTransition {
    pub fn has_condition(&self) -> bool {
        match &self.condition_expr {
            Some(Value::Object(obj)) => !obj.is_empty(),
            Some(Value::Null) | None => false,
            Some(_) => true,
        }
    }

    pub fn evaluate_condition(&self, context: &Metadata) -> bool {
        condition::evaluate(self.condition_expr.as_ref(), context)
    }
}

impl WorkflowGraph {
    pub fn id(&self) -> i64 {
        self.definition.id
    }

    /// The state flagged initial.  Should more than one be flagged the
    /// earliest declared wins.
    pub fn initial_state(&self) -> Option<&WorkflowState> {
        self.states.iter().find(|state| state.is_initial)
    }

    pub fn state(&self, id: i64) -> Option<&WorkflowState> {
        self.states.iter().find(|state| state.id == id)
    }

    pub fn state_by_key(&self, state_key: &str) -> Option<&WorkflowState> {
        self.states.iter().find(|state| state.state_key == state_key)
    }

    pub fn final_states(&self) -> Vec<&WorkflowState> {
        self.states.iter()
            .filter(|state| state.is_final)
            .collect()
    }

    pub fn contains_state(&self, id: i64) -> bool {
        self.state(id).is_some()
    }

    /// Auto-advance transitions leaving the state, in declaration order.
    pub fn auto_transitions_from(
        &self,
        state_id: i64,
    ) -> impl Iterator<Item = &WorkflowTransition> {
        self.transitions.iter()
            .filter(move |t| t.auto_advance && t.from_state_id == Some(state_id))
    }

    /// The first auto-advance transition out of the state whose
    /// condition holds for the context.
    pub fn auto_advance_from(
        &self,
        state_id: i64,
        context: &Metadata,
    ) -> Option<&WorkflowTransition> {
        self.auto_transitions_from(state_id)
            .find(|t| t.evaluate_condition(context))
    }

    pub fn action(&self, state_id: i64, action_key: &str) -> Option<&StateAction> {
        self.state(state_id)?.action_by_key(action_key)
    }

    pub fn available_actions(&self, state_id: i64, role: Role) -> Vec<&StateAction> {
        self.state(state_id)
            .map(|state| state.available_actions(role))
            .unwrap_or_default()
    }

    pub fn default_action(&self, state_id: i64) -> Option<&StateAction> {
        self.state(state_id)?.default_action()
    }
}


#[cfg(test)]
mod test {
    use serde_json::json;
    use crate::{
        ac::Role,
        workflow::Metadata,
    };
    use super::testing::graph;

    fn ctx(value: serde_json::Value) -> Metadata {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn lookups() {
        let graph = graph();
        assert_eq!(graph.initial_state().map(|s| s.id), Some(1));
        assert_eq!(graph.state_by_key("review").map(|s| s.id), Some(3));
        assert_eq!(graph.state_by_key("nope"), None);
        assert_eq!(
            graph.final_states().iter().map(|s| s.state_key.as_str()).collect::<Vec<_>>(),
            ["approved"],
        );
        assert!(graph.contains_state(4));
        assert!(!graph.contains_state(5));
        assert_eq!(graph.action(2, "approve").and_then(|a| a.next_state_id), Some(4));
        assert_eq!(graph.action(2, "delegate"), None);
        assert_eq!(graph.default_action(2).map(|a| a.action_key.as_str()), Some("approve"));
    }

    #[test]
    fn role_gating() {
        let graph = graph();
        let keys = |role| graph.available_actions(2, role)
            .into_iter()
            .map(|a| a.action_key.as_str())
            .collect::<Vec<_>>();
        assert_eq!(keys(Role::Viewer), ["reject"]);
        assert_eq!(keys(Role::Editor), ["approve", "reject"]);
        assert_eq!(keys(Role::Admin), ["approve", "reject"]);
        assert!(graph.available_actions(3, Role::Editor).is_empty());
    }

    #[test]
    fn auto_advance_first_match() {
        let graph = graph();
        assert_eq!(graph.auto_transitions_from(1).count(), 2);
        assert_eq!(graph.auto_transitions_from(2).count(), 0);
        let large = ctx(json!({"amount": 5000}));
        let small = ctx(json!({"amount": 10}));
        assert_eq!(graph.auto_advance_from(1, &large).map(|t| t.to_state_id), Some(3));
        assert_eq!(graph.auto_advance_from(1, &small).map(|t| t.to_state_id), Some(2));
        assert_eq!(graph.auto_advance_from(2, &small), None);
    }

    #[test]
    fn sla_due() {
        let mut graph = graph();
        assert_eq!(graph.states[1].due_ts(100), None);
        graph.states[1].sla_hours = Some(48);
        assert_eq!(graph.states[1].due_ts(100), Some(100 + 48 * 3600));
        graph.states[1].sla_hours = Some(0);
        assert_eq!(graph.states[1].due_ts(100), None);
        graph.states[1].sla_hours = Some(i64::MAX / 1000);
        assert_eq!(graph.states[1].due_ts(100), None);
        graph.states[1].sla_hours = Some(1);
        assert_eq!(graph.states[1].due_ts(i64::MAX - 10), None);
    }
}
