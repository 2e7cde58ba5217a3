use clap::{
    Parser,
    Subcommand,
};
use serde::Serialize;
use std::time::Duration;
use wfcore::{
    ac::{
        Actor,
        Role,
    },
    document::DocumentBackend,
    workflow::{
        Metadata,
        NewState,
        NewStateAction,
        NewTransition,
        NewWorkflowDefinition,
        WorkflowDefinitionPatch,
    },
};
use wfctrl::{
    error::PlatformError,
    platform::{
        Builder,
        Platform,
        TransitionRequest,
    },
};

#[derive(Debug, Parser)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[command(flatten)]
    builder: Builder,
    #[clap(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(arg_required_else_help = true)]
    Document {
        #[command(subcommand)]
        cmd: DocumentCmd,
    },
    #[command(arg_required_else_help = true)]
    Workflow {
        #[command(subcommand)]
        cmd: WorkflowCmd,
    },
    #[command(arg_required_else_help = true)]
    Approval {
        #[command(subcommand)]
        cmd: ApprovalCmd,
    },
    /// Time out pending steps past their due time.
    Sweep {
        /// Keep sweeping, pausing this many seconds between passes.
        #[clap(long)]
        interval: Option<u64>,
    },
}

#[derive(Debug, Subcommand)]
enum DocumentCmd {
    #[command(arg_required_else_help = true)]
    Add {
        tenant_id: i64,
        file_name: String,
    },
}

#[derive(Debug, Subcommand)]
enum WorkflowCmd {
    #[command(arg_required_else_help = true)]
    Create {
        tenant_id: i64,
        author_id: i64,
        name: String,
        #[clap(long)]
        description: Option<String>,
        #[clap(long)]
        version: Option<i64>,
    },
    #[command(arg_required_else_help = true)]
    List {
        tenant_id: i64,
    },
    #[command(arg_required_else_help = true)]
    Show {
        tenant_id: i64,
        id: i64,
    },
    #[command(arg_required_else_help = true)]
    Update {
        tenant_id: i64,
        user_id: i64,
        id: i64,
        #[clap(long)]
        name: Option<String>,
        #[clap(long)]
        description: Option<String>,
        #[clap(long)]
        version: Option<i64>,
        #[clap(long)]
        active: Option<bool>,
    },
    #[command(arg_required_else_help = true)]
    Delete {
        tenant_id: i64,
        user_id: i64,
        id: i64,
    },
    #[command(arg_required_else_help = true)]
    Validate {
        tenant_id: i64,
        id: i64,
    },
    #[command(arg_required_else_help = true)]
    AddState {
        tenant_id: i64,
        workflow_id: i64,
        state_key: String,
        label: String,
        #[clap(long, action)]
        initial: bool,
        #[clap(long = "final", action)]
        is_final: bool,
        #[clap(long)]
        sla_hours: Option<i64>,
        #[clap(long)]
        notification_template: Option<String>,
    },
    #[command(arg_required_else_help = true)]
    AddTransition {
        tenant_id: i64,
        workflow_id: i64,
        to_state_id: i64,
        action_key: String,
        #[clap(long = "from")]
        from_state_id: Option<i64>,
        #[clap(long)]
        label: Option<String>,
        /// Condition expression as JSON.
        #[clap(long, value_parser = parse_json)]
        condition: Option<serde_json::Value>,
        #[clap(long, action)]
        requires_comment: bool,
        #[clap(long, action)]
        auto_advance: bool,
    },
    #[command(arg_required_else_help = true)]
    AddAction {
        tenant_id: i64,
        workflow_id: i64,
        state_id: i64,
        action_key: String,
        label: String,
        #[clap(long = "next")]
        next_state_id: Option<i64>,
        #[clap(long, value_enum)]
        requires_role: Option<Role>,
        #[clap(long, default_value_t = 0)]
        display_order: i64,
        #[clap(long = "default", action)]
        is_default: bool,
    },
}

#[derive(Debug, Subcommand)]
enum ApprovalCmd {
    #[command(arg_required_else_help = true)]
    Start {
        tenant_id: i64,
        actor_id: i64,
        document_id: i64,
        workflow_id: i64,
        /// Evaluation context as a JSON object.
        #[clap(long, value_parser = parse_metadata)]
        metadata: Option<Metadata>,
    },
    #[command(arg_required_else_help = true)]
    Act {
        tenant_id: i64,
        actor_id: i64,
        #[clap(value_enum)]
        role: Role,
        document_id: i64,
        action_key: String,
        #[clap(long)]
        comment: Option<String>,
        #[clap(long, value_parser = parse_metadata)]
        metadata: Option<Metadata>,
        #[clap(long)]
        delegate_to: Option<i64>,
    },
    #[command(arg_required_else_help = true)]
    Delegate {
        tenant_id: i64,
        actor_id: i64,
        document_id: i64,
        user_id: i64,
    },
    #[command(arg_required_else_help = true)]
    Show {
        tenant_id: i64,
        document_id: i64,
    },
    #[command(arg_required_else_help = true)]
    History {
        tenant_id: i64,
        document_id: i64,
    },
    #[command(arg_required_else_help = true)]
    Pending {
        tenant_id: i64,
        user_id: i64,
    },
}

fn parse_json(s: &str) -> Result<serde_json::Value, String> {
    serde_json::from_str(s).map_err(|e| e.to_string())
}

fn parse_metadata(s: &str) -> Result<Metadata, String> {
    serde_json::from_str(s).map_err(|e| format!("metadata must be a JSON object: {e}"))
}

fn print(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn failure(e: PlatformError) -> anyhow::Error {
    anyhow::anyhow!("{}: {e}", e.kind())
}

#[async_std::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Cli::parse();
    stderrlog::new()
        .module(module_path!())
        .module("wfcore")
        .module("wfdb_sqlite")
        .verbosity((args.verbose as usize) + 1)
        .timestamp(stderrlog::Timestamp::Second)
        .init()?;

    let platform = args.builder
        .build()
        .await
        .map_err(anyhow::Error::from_boxed)?;

    match args.command {
        Commands::Document { cmd } => {
            parse_document(&platform, cmd).await?;
        },
        Commands::Workflow { cmd } => {
            parse_workflow(&platform, cmd).await?;
        },
        Commands::Approval { cmd } => {
            parse_approval(&platform, cmd).await?;
        },
        Commands::Sweep { interval } => {
            sweep(&platform, interval).await?;
        },
    }

    Ok(())
}

async fn parse_document(
    platform: &Platform,
    arg: DocumentCmd,
) -> anyhow::Result<()> {
    match arg {
        DocumentCmd::Add { tenant_id, file_name } => {
            let id = platform.wf_platform.add_document(tenant_id, &file_name).await?;
            println!("created document id {id} for tenant {tenant_id}");
        }
    }
    Ok(())
}

async fn parse_workflow(
    platform: &Platform,
    arg: WorkflowCmd,
) -> anyhow::Result<()> {
    match arg {
        WorkflowCmd::Create { tenant_id, author_id, name, description, version } => {
            let graph = platform.create_workflow_definition(
                tenant_id,
                author_id,
                &NewWorkflowDefinition {
                    name,
                    description,
                    version,
                    .. Default::default()
                },
            ).await.map_err(failure)?;
            print(&graph)?;
        }
        WorkflowCmd::List { tenant_id } => {
            print(&platform.list_workflow_definitions(tenant_id).await.map_err(failure)?)?;
        }
        WorkflowCmd::Show { tenant_id, id } => {
            let mut graph = platform.get_workflow_graph(tenant_id, id).await.map_err(failure)?;
            graph.definition = graph.presented_definition();
            print(&graph)?;
        }
        WorkflowCmd::Update { tenant_id, user_id, id, name, description, version, active } => {
            let definition = platform.update_workflow_definition(
                tenant_id,
                user_id,
                id,
                &WorkflowDefinitionPatch {
                    name,
                    description,
                    version,
                    graph_json: None,
                    is_active: active,
                },
            ).await.map_err(failure)?;
            print(&definition)?;
        }
        WorkflowCmd::Delete { tenant_id, user_id, id } => {
            platform.delete_workflow_definition(tenant_id, user_id, id).await.map_err(failure)?;
            println!("deleted workflow {id}");
        }
        WorkflowCmd::Validate { tenant_id, id } => {
            let report = platform.validate_workflow(tenant_id, id).await.map_err(failure)?;
            print(&report)?;
            if !report.is_valid() {
                anyhow::bail!("workflow {id} has {} error(s)", report.errors.len());
            }
        }
        WorkflowCmd::AddState {
            tenant_id,
            workflow_id,
            state_key,
            label,
            initial,
            is_final,
            sla_hours,
            notification_template,
        } => {
            let state = platform.add_state(tenant_id, workflow_id, &NewState {
                state_key,
                label,
                is_initial: initial,
                is_final,
                sla_hours,
                notification_template,
            }).await.map_err(failure)?;
            print(&state)?;
        }
        WorkflowCmd::AddTransition {
            tenant_id,
            workflow_id,
            to_state_id,
            action_key,
            from_state_id,
            label,
            condition,
            requires_comment,
            auto_advance,
        } => {
            let transition = platform.add_transition(tenant_id, workflow_id, &NewTransition {
                from_state_id,
                to_state_id,
                action_key,
                action_label: label,
                condition_expr: condition,
                requires_comment,
                auto_advance,
            }).await.map_err(failure)?;
            print(&transition)?;
        }
        WorkflowCmd::AddAction {
            tenant_id,
            workflow_id,
            state_id,
            action_key,
            label,
            next_state_id,
            requires_role,
            display_order,
            is_default,
        } => {
            let action = platform.add_state_action(tenant_id, workflow_id, &NewStateAction {
                state_id,
                action_key,
                action_label: label,
                next_state_id,
                requires_role,
                display_order,
                is_default,
            }).await.map_err(failure)?;
            print(&action)?;
        }
    }
    Ok(())
}

async fn parse_approval(
    platform: &Platform,
    arg: ApprovalCmd,
) -> anyhow::Result<()> {
    match arg {
        ApprovalCmd::Start { tenant_id, actor_id, document_id, workflow_id, metadata } => {
            // the role plays no part in starting an approval
            let actor = Actor::new(actor_id, Role::Undefined);
            let instance = platform.start_approval(
                tenant_id,
                actor,
                document_id,
                workflow_id,
                metadata,
            ).await.map_err(failure)?;
            print(&instance)?;
        }
        ApprovalCmd::Act {
            tenant_id,
            actor_id,
            role,
            document_id,
            action_key,
            comment,
            metadata,
            delegate_to,
        } => {
            let request = TransitionRequest {
                action_key,
                comment,
                metadata,
                delegated_to: delegate_to,
            };
            let instance = platform.execute_transition(
                tenant_id,
                Actor::new(actor_id, role),
                document_id,
                &request,
            ).await.map_err(failure)?;
            print(&instance)?;
        }
        ApprovalCmd::Delegate { tenant_id, actor_id, document_id, user_id } => {
            let step = platform.delegate_step(tenant_id, actor_id, document_id, user_id)
                .await
                .map_err(failure)?;
            print(&step)?;
        }
        ApprovalCmd::Show { tenant_id, document_id } => {
            print(&platform.get_approval_instance(tenant_id, document_id).await.map_err(failure)?)?;
        }
        ApprovalCmd::History { tenant_id, document_id } => {
            print(&platform.get_approval_history(tenant_id, document_id).await.map_err(failure)?)?;
        }
        ApprovalCmd::Pending { tenant_id, user_id } => {
            print(&platform.get_pending_approvals(tenant_id, user_id).await.map_err(failure)?)?;
        }
    }
    Ok(())
}

async fn sweep(
    platform: &Platform,
    interval: Option<u64>,
) -> anyhow::Result<()> {
    loop {
        let now = chrono::Utc::now().timestamp();
        let swept = platform.sweep_overdue_steps(now).await.map_err(failure)?;
        log::info!("timed out {} overdue step(s)", swept.len());
        print(&swept)?;
        match interval {
            Some(secs) => async_std::task::sleep(Duration::from_secs(secs)).await,
            None => break,
        }
    }
    Ok(())
}
