//! Resolve command - show which partition owns a request path

use super::resumed_worker;
use crate::cli::args::{OutputFormat, ResolveArgs};
use crate::config::Config;
use crate::error::ShelfResult;
use crate::resolve::Resolution;
use crate::ui::{self, UiContext};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ResolveView {
    path: String,
    app: Option<String>,
    scope: Option<String>,
    partition: Option<String>,
    global: bool,
    intercepted: bool,
}

impl ResolveView {
    fn new(path: &str, resolution: Option<Resolution>, global: bool) -> Self {
        let intercepted = resolution
            .as_ref()
            .is_some_and(|r| global || r.in_scope(path));
        Self {
            path: path.to_string(),
            app: resolution.as_ref().map(|r| r.app.clone()),
            scope: resolution.as_ref().map(|r| r.scope.clone()),
            partition: resolution.map(|r| r.partition),
            global,
            intercepted,
        }
    }
}

/// Execute the resolve command
pub async fn execute(args: ResolveArgs, config: &Config) -> ShelfResult<()> {
    let (worker, _, _) = resumed_worker(config, |r| r.state).await?;
    let router = worker.router().await;
    let resolver = router.resolver();

    let path = if args.path.starts_with('/') {
        args.path.clone()
    } else {
        format!("/{}", args.path)
    };

    let view = match resolver.resolve_global(&path) {
        Some(global) => ResolveView::new(&path, Some(global), true),
        None => ResolveView::new(&path, resolver.resolve(&path), false),
    };

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&view)?),
        OutputFormat::Plain => println!("{}", view.partition.as_deref().unwrap_or("-")),
        OutputFormat::Table => {
            let ctx = UiContext::detect();
            ui::key_value(&ctx, "path", &view.path);
            match (&view.app, &view.scope, &view.partition) {
                (Some(app), Some(scope), Some(partition)) => {
                    ui::key_value(&ctx, "app", app);
                    ui::key_value(&ctx, "scope", scope);
                    ui::key_value(&ctx, "partition", partition);
                }
                _ => ui::key_value(&ctx, "app", "(not a registered app)"),
            }
            let verdict = if view.global {
                "yes (global resource)"
            } else if view.intercepted {
                "yes"
            } else {
                "no (passes through)"
            };
            ui::key_value_status(&ctx, "intercepted", verdict, view.intercepted);
        }
    }
    Ok(())
}
