//! Command dispatch: each subcommand loads what it needs and prints results.

use std::io;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_complete::{generate, Shell};
use colored::Colorize;
use tracing::{debug, instrument};

use crate::application::{ApplicationError, ExportElement, ExportPlanner, TreeSynchronizer};
use crate::cli::args::{Cli, Commands, ConfigCommands, EditCommands, SourceArgs};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::config::{global_config_path, local_config_path, Settings};
use crate::domain::validator::validate;
use crate::domain::{HeadingCatalog, Journal, MergeRules, StructureBuilder};
use crate::infrastructure::di::ServiceContainer;

/// Run the parsed command line.
pub fn execute(cli: &Cli) -> CliResult<()> {
    let project_dir = project_dir(cli);
    let Some(command) = &cli.command else {
        return Err(CliError::Usage(
            "no command given, run with --help for usage".to_string(),
        ));
    };

    match command {
        Commands::Config { command } => cmd_config(command, project_dir.as_deref()),
        Commands::Completion { shell } => {
            cmd_completion(*shell);
            Ok(())
        }
        _ => {
            let settings = Settings::load(project_dir.as_deref())?;
            let container = ServiceContainer::new(settings);
            dispatch(&container, command)
        }
    }
}

fn dispatch(container: &ServiceContainer, command: &Commands) -> CliResult<()> {
    match command {
        Commands::Tree { args, raw } => cmd_tree(container, args, *raw),
        Commands::Toc { args } => cmd_toc(container, args),
        Commands::Headings { args } => cmd_headings(container, args),
        Commands::Check { args } => cmd_check(container, args),
        Commands::Edit { args, command } => cmd_edit(container, args, command),
        Commands::Config { .. } | Commands::Completion { .. } => Ok(()),
    }
}

fn project_dir(cli: &Cli) -> Option<PathBuf> {
    cli.project_dir
        .clone()
        .or_else(|| std::env::current_dir().ok())
}

/// Configured rules with command-line overrides applied on top.
pub fn resolve_rules(settings: &Settings, args: &SourceArgs) -> CliResult<MergeRules> {
    let mut rules = settings.to_merge_rules()?;
    if let Some(max_depth) = args.max_depth {
        rules.max_depth = max_depth;
    }
    for (level, style) in &args.exclusions {
        rules = rules
            .exclude_style(*level, style.clone())
            .map_err(ApplicationError::from)?;
    }
    if args.no_consolidate {
        rules.consolidate = false;
    }
    rules.validate().map_err(ApplicationError::from)?;
    Ok(rules)
}

/// Load source and journal and regenerate the tree, reporting stale edits.
#[instrument(level = "debug", skip(container))]
fn open(container: &ServiceContainer, args: &SourceArgs) -> CliResult<TreeSynchronizer> {
    let rules = resolve_rules(&container.settings, args)?;
    let source = container.store.load_source(&args.source)?;
    let journal = match &args.journal {
        Some(path) => container.store.load_journal(path)?,
        None => Journal::new(),
    };
    let sync = TreeSynchronizer::with_journal(source, rules, journal)?;
    for stale in sync.warnings() {
        output::warning(stale);
    }
    debug!(report = ?sync.report(), "tree ready");
    Ok(sync)
}

fn cmd_tree(container: &ServiceContainer, args: &SourceArgs, raw: bool) -> CliResult<()> {
    if raw {
        let source = container.store.load_source(&args.source)?;
        let tree = StructureBuilder::new()
            .build(&source)
            .map_err(ApplicationError::from)?;
        output::info(&output::topic_tree(&tree, tree.root()));
        return Ok(());
    }

    let sync = open(container, args)?;
    let tree = sync.tree();
    output::info(&output::topic_tree(tree, tree.root()));

    let clipboard: Vec<_> = tree.clipboard_roots().collect();
    if !clipboard.is_empty() {
        output::header("Clipboard");
        for id in clipboard {
            output::info(&output::topic_tree(tree, id));
        }
    }
    Ok(())
}

fn cmd_toc(container: &ServiceContainer, args: &SourceArgs) -> CliResult<()> {
    let sync = open(container, args)?;
    let planner = ExportPlanner::new(container.settings.export_options())?;
    let plan = planner.plan(sync.tree());

    output::header(&plan.title);
    for entry in &plan.entries {
        let indent = "  ".repeat(entry.depth.saturating_sub(1));
        let line = match &entry.element {
            ExportElement::TopicHead => format!("{indent}{} {}", entry.toc_index, entry.navtitle),
            ExportElement::TopicRef { href } => format!(
                "{indent}{} {}  {}",
                entry.toc_index,
                entry.navtitle,
                href.dimmed()
            ),
        };
        output::info(&line);
    }
    Ok(())
}

fn cmd_headings(container: &ServiceContainer, args: &SourceArgs) -> CliResult<()> {
    let rules = resolve_rules(&container.settings, args)?;
    let source = container.store.load_source(&args.source)?;
    let catalog = HeadingCatalog::from_source(&source);
    if catalog.is_empty() {
        output::info("no headings");
        return Ok(());
    }

    for level in catalog.levels() {
        let marker = if level > rules.max_depth {
            " (merged by depth)"
        } else {
            ""
        };
        output::header(&format!("Level {level}{marker}"));
        for entry in catalog.entries(&rules).filter(|entry| entry.level == level) {
            let style = if entry.excluded {
                format!("{} [excluded]", entry.style.yellow())
            } else {
                entry.style.to_string()
            };
            output::detail(&format!("{style} ({})", entry.titles.len()));
            for title in entry.titles {
                output::detail(&format!("  {title}"));
            }
        }
    }
    Ok(())
}

fn cmd_check(container: &ServiceContainer, args: &SourceArgs) -> CliResult<()> {
    let sync = open(container, args)?;
    let report = validate(sync.tree());
    if report.is_valid() {
        output::success(&format!(
            "tree is consistent ({} nodes, {} stale edits)",
            sync.tree().len(),
            sync.warnings().len()
        ));
        return Ok(());
    }
    for issue in &report.issues {
        output::failure(issue);
    }
    Err(CliError::Invalid(report.issues.len()))
}

fn cmd_edit(container: &ServiceContainer, args: &SourceArgs, command: &EditCommands) -> CliResult<()> {
    let Some(journal_path) = args.journal.as_deref() else {
        return Err(CliError::Usage("edit requires --journal <FILE>".to_string()));
    };

    if let EditCommands::Log = command {
        return show_log(container, journal_path);
    }

    let mut sync = open(container, args)?;
    match command {
        EditCommands::Cut { node } => output::action("Cut", &sync.cut(*node)?),
        EditCommands::Paste {
            node,
            into,
            index,
            after,
        } => {
            let resolved = match (into, after) {
                (Some(parent), _) => sync.paste_into(*node, *parent, *index)?,
                (None, Some(sibling)) => sync.paste_after(*node, *sibling)?,
                (None, None) => {
                    return Err(CliError::InvalidArgs(
                        "paste needs --into or --after".to_string(),
                    ))
                }
            };
            output::action("Pasted", &resolved);
        }
        EditCommands::Promote { node } => output::action("Promoted", &sync.promote(*node)?),
        EditCommands::Demote { node } => output::action("Demoted", &sync.demote(*node)?),
        EditCommands::Undo => {
            let last = sync.journal().applied().last().map(|entry| entry.command.clone());
            if !sync.undo()? {
                output::warning("nothing to undo");
                return Ok(());
            }
            if let Some(command) = last {
                output::action("Undone", &command);
            }
        }
        EditCommands::Redo => {
            if !sync.redo()? {
                output::warning("nothing to redo");
                return Ok(());
            }
            let index = sync.journal().cursor() - 1;
            match sync.warnings().iter().find(|stale| stale.index == index) {
                Some(stale) => output::warning(stale),
                None => {
                    if let Some(entry) = sync.journal().applied().last() {
                        output::action("Redone", &entry.command);
                    }
                }
            }
        }
        EditCommands::Log => {}
    }

    container.store.save_journal(journal_path, sync.journal())?;
    debug!(path = %journal_path.display(), "journal saved");
    Ok(())
}

fn show_log(container: &ServiceContainer, journal_path: &Path) -> CliResult<()> {
    let journal = container.store.load_journal(journal_path)?;
    if journal.is_empty() {
        output::info("journal is empty");
        return Ok(());
    }
    for (position, entry) in journal.entries().iter().enumerate() {
        let line = format!("#{:<4} {}", entry.sequence, entry.command);
        if position < journal.cursor() {
            output::info(&format!("* {line}"));
        } else {
            output::info(&format!("  {}", line.dimmed()));
        }
    }
    Ok(())
}

fn cmd_config(command: &ConfigCommands, project_dir: Option<&Path>) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            let settings = Settings::load(project_dir)?;
            output::info(&settings.to_toml()?);
        }
        ConfigCommands::Path => {
            let exists = |path: &Path| if path.exists() { "" } else { " (not found)" };
            match global_config_path() {
                Some(path) => {
                    output::detail(&format!("Global: {}{}", path.display(), exists(&path)))
                }
                None => output::detail("Global: (no config directory)"),
            }
            if let Some(dir) = project_dir {
                let path = local_config_path(dir);
                output::detail(&format!("Local:  {}{}", path.display(), exists(&path)));
            }
        }
        ConfigCommands::Template => output::info(&Settings::template()),
    }
    Ok(())
}

fn cmd_completion(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
}
