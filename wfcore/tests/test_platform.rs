use mockall::predicate::eq;
use wfcore::{
    ac::Role,
    approval::{
        ApprovalInstance,
        ApprovalStep,
        StepStatus,
    },
    platform::WFPlatform,
    workflow::{
        StateAction,
        WorkflowDefinition,
        WorkflowState,
        WorkflowTransition,
    },
};
use test_wf::core::MockPlatform;

// The graph assembly lives in the default methods of the platform trait,
// so it is exercised here against the mock rather than in a module test.
#[async_std::test]
async fn workflow_graph_assembly() -> anyhow::Result<()> {
    let mut platform = MockPlatform::new();
    platform.expect_get_workflow_definition()
        .times(1)
        .with(eq(1), eq(7))
        .returning(|_, _| Ok(Some(serde_json::from_str::<WorkflowDefinition>(r#"{
            "id": 7,
            "tenant_id": 1,
            "name": "invoices",
            "version": 2,
            "is_active": true,
            "created_by": 100,
            "created_ts": 0,
            "updated_ts": 0
        }"#).unwrap())));
    platform.expect_list_workflow_states()
        .times(1)
        .with(eq(7))
        .returning(|_| Ok(serde_json::from_str::<Vec<WorkflowState>>(r#"[{
            "id": 11,
            "workflow_id": 7,
            "state_key": "start",
            "label": "Start",
            "is_initial": true,
            "is_final": false
        }, {
            "id": 12,
            "workflow_id": 7,
            "state_key": "pending",
            "label": "Pending",
            "is_initial": false,
            "is_final": false,
            "sla_hours": 24
        }, {
            "id": 13,
            "workflow_id": 7,
            "state_key": "done",
            "label": "Done",
            "is_initial": false,
            "is_final": true
        }]"#).unwrap().into()));
    platform.expect_list_state_actions_for_workflow()
        .times(1)
        .with(eq(7))
        .returning(|_| Ok(serde_json::from_str::<Vec<StateAction>>(r#"[{
            "id": 21,
            "state_id": 12,
            "action_key": "approve",
            "action_label": "Approve",
            "next_state_id": 13,
            "requires_role": "editor",
            "display_order": 1,
            "is_default": true
        }, {
            "id": 22,
            "state_id": 12,
            "action_key": "reject",
            "action_label": "Reject",
            "next_state_id": null,
            "requires_role": null,
            "display_order": 2,
            "is_default": false
        }]"#).unwrap().into()));
    platform.expect_list_workflow_transitions()
        .times(1)
        .with(eq(7))
        .returning(|_| Ok(serde_json::from_str::<Vec<WorkflowTransition>>(r#"[{
            "id": 31,
            "workflow_id": 7,
            "from_state_id": 11,
            "to_state_id": 12,
            "action_key": "submit",
            "requires_comment": false,
            "auto_advance": true
        }]"#).unwrap().into()));

    let graph = platform.as_dyn()
        .get_workflow_graph(1, 7)
        .await?
        .expect("graph assembled");
    assert_eq!(graph.id(), 7);
    assert_eq!(graph.initial_state().map(|s| s.id), Some(11));
    assert_eq!(graph.state_by_key("done").map(|s| s.id), Some(13));

    // actions are attached to the state that owns them, states without
    // any get an empty set rather than nothing
    let start = graph.state(11).expect("start state");
    assert_eq!(start.actions.as_ref().map(|a| a.len()), Some(0));
    let pending = graph.state(12).expect("pending state");
    assert_eq!(pending.actions.as_ref().map(|a| a.len()), Some(2));
    assert_eq!(
        graph.available_actions(12, Role::Viewer)
            .iter()
            .map(|a| a.action_key.as_str())
            .collect::<Vec<_>>(),
        ["reject"],
    );
    assert_eq!(graph.default_action(12).map(|a| a.id), Some(21));
    assert_eq!(graph.auto_transitions_from(11).count(), 1);
    Ok(())
}

#[async_std::test]
async fn workflow_graph_missing() -> anyhow::Result<()> {
    let mut platform = MockPlatform::new();
    platform.expect_get_workflow_definition()
        .times(1)
        .returning(|_, _| Ok(None));
    platform.expect_list_workflow_states()
        .never();
    assert!(platform.get_workflow_graph(2, 7).await?.is_none());
    Ok(())
}

#[async_std::test]
async fn instance_with_steps() -> anyhow::Result<()> {
    let mut platform = MockPlatform::new();
    platform.expect_instance_get_latest_for_document()
        .times(1)
        .with(eq(1), eq(5))
        .returning(|_, _| Ok(Some(serde_json::from_str::<ApprovalInstance>(r#"{
            "id": 3,
            "tenant_id": 1,
            "document_id": 5,
            "workflow_id": 7,
            "current_state_id": 12,
            "status": "active",
            "started_by": 100,
            "started_ts": 1000,
            "completed_ts": null,
            "due_ts": 87400,
            "metadata": {"amount": 1500},
            "created_ts": 1000,
            "updated_ts": 1000,
            "steps": null
        }"#).unwrap())));
    platform.expect_list_steps_for_instance()
        .times(1)
        .with(eq(3))
        .returning(|_| Ok(serde_json::from_str::<Vec<ApprovalStep>>(r#"[{
            "id": 9,
            "instance_id": 3,
            "state_id": 12,
            "assigned_to": 100,
            "delegated_to": 200,
            "status": "pending",
            "action_taken": null,
            "comment": null,
            "assigned_ts": 1000,
            "due_ts": 87400,
            "completed_ts": null
        }]"#).unwrap().into()));

    let instance = platform.get_instance_with_steps(1, 5)
        .await?
        .expect("instance found");
    assert!(instance.is_active());
    assert_eq!(instance.metadata["amount"], 1500);
    let steps = instance.steps.expect("steps loaded");
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].status, StepStatus::Pending);
    assert_eq!(steps[0].effective_assignee(), 200);
    assert!(steps[0].is_overdue(87401));

    platform.expect_instance_get_latest_for_document()
        .returning(|_, _| Ok(None));
    assert!(platform.get_instance_with_steps(1, 6).await?.is_none());
    Ok(())
}
