//! Subcommand handlers.

use std::sync::Arc;

use futures::future::join_all;
use widgetdash_client::{
    resolve, Dashboard, DashboardError, GatewayClient, GatewayError, WidgetInstance,
};
use widgetdash_core::error::CoreError;
use widgetdash_core::models::{group_by_source, AttachWidget, User, UserWidget};
use widgetdash_core::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Dashboard(#[from] DashboardError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("{0}")]
    Usage(String),
}

/// Shared handles passed to every subcommand.
pub struct Context {
    pub gateway: Arc<GatewayClient>,
    pub dashboard: Arc<Dashboard>,
}

// ---- session ----

pub async fn login(ctx: &Context, email: &str, password: &str) -> Result<(), CliError> {
    let user = ctx.gateway.login(email, password).await?;
    println!("Logged in as {} <{}>", user.name, user.email);
    Ok(())
}

pub async fn register(
    ctx: &Context,
    name: &str,
    email: &str,
    password: &str,
    confirmation: &str,
) -> Result<(), CliError> {
    let user = ctx.gateway.register(name, email, password, confirmation).await?;
    println!("Account created. Logged in as {} <{}>", user.name, user.email);
    Ok(())
}

pub async fn logout(ctx: &Context) -> Result<(), CliError> {
    if !ctx.gateway.session().has_credential() {
        println!("Not logged in.");
        return Ok(());
    }
    let result = ctx.gateway.logout().await;
    println!("Logged out.");
    if let Err(e) = result {
        tracing::warn!(error = %e, "Backend logout failed; local session cleared anyway");
    }
    Ok(())
}

pub async fn whoami(ctx: &Context) -> Result<(), CliError> {
    let user = ctx.gateway.profile().await?;
    print_user(&user);
    Ok(())
}

fn print_user(user: &User) {
    println!("{} <{}>", user.name, user.email);
    println!("  id: {}", user.id);
    println!("  widgets: {}", user.widget_ids.len());
}

// ---- dashboard ----

pub async fn catalog(ctx: &Context) -> Result<(), CliError> {
    let definitions = ctx.dashboard.available_widgets().await?;
    if definitions.is_empty() {
        println!("No widgets available.");
        return Ok(());
    }

    let active = definitions.into_iter().filter(|d| d.is_active).collect();
    for (source, group) in group_by_source(active) {
        println!("== {} ==", source.label());
        for definition in group {
            match &definition.description {
                Some(description) => {
                    println!("  [{}] {} - {description}", definition.id, definition.name)
                }
                None => println!("  [{}] {}", definition.id, definition.name),
            }
        }
    }
    Ok(())
}

pub async fn show(ctx: &Context) -> Result<(), CliError> {
    load(ctx).await?;
    print_dashboard(&ctx.dashboard).await;
    Ok(())
}

pub async fn add(ctx: &Context, widget_id: DbId, position: Option<i32>) -> Result<(), CliError> {
    let input = AttachWidget {
        settings: None,
        position,
    };
    ctx.dashboard.attach_widget(widget_id, &input).await?;
    println!("Added widget {widget_id}.");
    print_dashboard(&ctx.dashboard).await;
    Ok(())
}

pub async fn remove(ctx: &Context, id: DbId) -> Result<(), CliError> {
    load_list(ctx).await?;
    let instance = WidgetInstance::open(ctx.dashboard.clone(), id).await?;
    let name = instance.widget().name().to_string();
    instance.remove().await?;
    println!("Removed {name}.");
    Ok(())
}

pub async fn refresh(ctx: &Context, id: Option<DbId>) -> Result<(), CliError> {
    load_list(ctx).await?;
    match id {
        Some(id) => {
            let instance = WidgetInstance::open(ctx.dashboard.clone(), id).await?;
            instance.refresh().await;
            println!("{}", instance.panel().await);
        }
        None => {
            let visible = ctx.dashboard.visible_widgets().await;
            join_all(visible.iter().map(|w| ctx.dashboard.fetch_widget_data(w.id()))).await;
            print_dashboard(&ctx.dashboard).await;
        }
    }
    Ok(())
}

pub async fn move_widgets(ctx: &Context, ids: &[DbId]) -> Result<(), CliError> {
    load(ctx).await?;
    ctx.dashboard.reorder_ids(ids).await?;
    let order: Vec<String> = ctx
        .dashboard
        .widgets()
        .await
        .iter()
        .map(|w| format!("{} [{}]", w.name(), w.id()))
        .collect();
    println!("New order: {}", order.join(", "));
    Ok(())
}

pub async fn set(ctx: &Context, id: DbId, assignments: &[String]) -> Result<(), CliError> {
    load_list(ctx).await?;
    let mut instance = WidgetInstance::open(ctx.dashboard.clone(), id).await?;

    if instance.renderer().is_fallback() {
        return Err(CliError::Usage(format!(
            "{} has no editable settings",
            instance.widget().name()
        )));
    }

    for assignment in assignments {
        let (key, value) = assignment.split_once('=').ok_or_else(|| {
            CliError::Usage(format!("Expected KEY=VALUE, got '{assignment}'"))
        })?;
        instance.stage(key.trim(), value)?;
    }

    instance.save_settings().await?;
    println!("{}", instance.panel().await);
    Ok(())
}

pub async fn set_visible(ctx: &Context, id: DbId, is_visible: bool) -> Result<(), CliError> {
    load(ctx).await?;
    let mut instance = WidgetInstance::open(ctx.dashboard.clone(), id).await?;
    instance.set_visible(is_visible).await?;
    let state = if is_visible { "shown" } else { "hidden" };
    println!("{} is now {state}.", instance.widget().name());
    Ok(())
}

// ---- helpers ----

/// Load the widget list; fetches data for visible widgets as a side effect.
async fn load(ctx: &Context) -> Result<(), CliError> {
    ctx.dashboard.refresh_widget_list().await?;
    Ok(())
}

/// Load the widget list only, for commands that fetch their own data.
async fn load_list(ctx: &Context) -> Result<(), CliError> {
    ctx.dashboard.load_widget_list().await?;
    Ok(())
}

async fn print_dashboard(dashboard: &Dashboard) {
    let widgets = dashboard.widgets().await;
    let (visible, hidden): (Vec<UserWidget>, Vec<UserWidget>) =
        widgets.into_iter().partition(|w| w.is_visible);

    if visible.is_empty() {
        println!("No widgets on your dashboard. Run `widgetdash catalog` to find some.");
    }

    for widget in &visible {
        let entry = dashboard.entry(widget.id()).await;
        let panel = resolve(widget.source()).render(widget, entry.as_ref());
        println!("{panel}");
    }

    if !hidden.is_empty() {
        let names: Vec<&str> = hidden.iter().map(UserWidget::name).collect();
        println!("Hidden: {}", names.join(", "));
    }
}
