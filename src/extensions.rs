//! Feature extensions and the loader that installs them at startup.
//!
//! Every feature the bot offers lives in an [`Extension`]. Extensions are
//! compiled in and made available by name through an [`ExtensionCatalog`];
//! [`load_extensions`] walks [`EXTENSION_NAMES`] in order, and a failure in
//! one extension never stops the others from loading.

use crate::{
    bot::Data,
    database::Databases,
    error::{Error, Result, bot_error, report_event_error},
};
use async_trait::async_trait;
use serenity::all::{Context as SerenityContext, FullEvent};
use std::{collections::HashMap, fmt, sync::Arc};

pub type Command = poise::Command<Data, Error>;
pub type ExtensionFactory = fn() -> Arc<dyn Extension>;

/// Load order. Later extensions may rely on settings created by earlier ones.
pub const EXTENSION_NAMES: &[&str] = &[
    "pimp_my_bot",
    "olddb",
    "control",
    "alliance",
    "alliance_member_operations",
    "bot_operations",
    "logsystem",
    "support_operations",
    "gift_operations",
    "changes",
    "w",
    "wel",
    "other_features",
    "bear_trap",
    "bear_trap_schedule",
    "id_channel",
    "backup_operations",
    "bear_trap_editor",
    "bear_trap_templates",
    "bear_trap_wizard",
    "attendance",
    "attendance_report",
    "minister_schedule",
    "minister_menu",
    "minister_archive",
    "registration",
];

#[async_trait]
pub trait Extension: Send + Sync {
    /// One-time initialization, run while the bot starts up.
    async fn setup(&self, _databases: &Databases) -> Result<()> {
        Ok(())
    }

    /// Commands to register. Called for every client that gets built, so it
    /// must return fresh values each time.
    fn commands(&self) -> Vec<Command> {
        Vec::new()
    }

    async fn on_event(
        &self,
        _ctx: &SerenityContext,
        _event: &FullEvent,
        _data: &Data,
    ) -> Result<()> {
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct ExtensionCatalog {
    factories: HashMap<&'static str, ExtensionFactory>,
}

impl ExtensionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &'static str, factory: ExtensionFactory) -> &mut Self {
        if self.factories.insert(name, factory).is_some() {
            tracing::warn!(
                extension = name,
                "Extension registered twice, keeping the last one"
            );
        }
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    fn instantiate(&self, name: &str) -> Result<Arc<dyn Extension>> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| bot_error(format!("extension `{name}` is not registered in this build")))
    }
}

impl fmt::Debug for ExtensionCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("ExtensionCatalog").field("extensions", &names).finish()
    }
}

#[derive(Clone)]
pub struct LoadedExtension {
    pub name: &'static str,
    pub extension: Arc<dyn Extension>,
}

/// Extensions that loaded successfully, in load order.
#[derive(Clone, Default)]
pub struct LoadedExtensions {
    entries: Vec<LoadedExtension>,
}

impl LoadedExtensions {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|entry| entry.name)
    }

    pub fn commands(&self) -> Vec<Command> {
        self.entries
            .iter()
            .flat_map(|entry| entry.extension.commands())
            .collect()
    }

    /// Hands `event` to every extension. Errors are reported per extension
    /// and never stop delivery to the rest.
    pub async fn dispatch(&self, ctx: &SerenityContext, event: &FullEvent, data: &Data) {
        for entry in &self.entries {
            if let Err(error) = entry.extension.on_event(ctx, event, data).await {
                report_event_error(event, Some(entry.name), &error);
            }
        }
    }
}

impl fmt::Debug for LoadedExtensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[derive(Debug)]
pub struct FailedExtension {
    pub name: &'static str,
    pub error: Error,
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: LoadedExtensions,
    pub failed: Vec<FailedExtension>,
}

impl LoadReport {
    pub fn failed_names(&self) -> Vec<&'static str> {
        self.failed.iter().map(|failure| failure.name).collect()
    }
}

#[tracing::instrument(skip(databases))]
pub async fn load_extensions(
    catalog: &ExtensionCatalog,
    names: &[&'static str],
    databases: &Databases,
) -> LoadReport {
    let mut report = LoadReport::default();

    for &name in names {
        match load_extension(catalog, name, databases).await {
            Ok(extension) => {
                tracing::debug!(extension = name, "Extension loaded");
                report.loaded.entries.push(LoadedExtension { name, extension });
            }
            Err(error) => {
                tracing::error!(
                    extension = name,
                    error = %error,
                    "✗ Failed to load extension {name}"
                );
                report.failed.push(FailedExtension { name, error });
            }
        }
    }

    if !report.failed.is_empty() {
        tracing::warn!(
            count = report.failed.len(),
            "⚠️  {} extension(s) failed to load",
            report.failed.len()
        );
        for failure in &report.failed {
            tracing::warn!("   • {}", failure.name);
        }
        tracing::warn!("Bot will continue with reduced functionality.");
    }

    tracing::info!(
        loaded = report.loaded.len(),
        failed = report.failed.len(),
        "Extension loading finished"
    );
    report
}

async fn load_extension(
    catalog: &ExtensionCatalog,
    name: &str,
    databases: &Databases,
) -> Result<Arc<dyn Extension>> {
    let extension = catalog.instantiate(name)?;
    extension.setup(databases).await?;
    Ok(extension)
}
