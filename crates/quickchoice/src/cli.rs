//! Command-line surface over the choice tree.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::app::executor::VALUE_VARIABLE;
use crate::app::runtime::QuickChoice;
use crate::domain::model::{Choice, Variables};
use crate::domain::section::try_resolve_section_end;
use crate::domain::tree::{self, ChoiceLookup};
use crate::infra::config::Config;
use crate::infra::picker::{Picker, ScriptedPicker, TerminalPicker};

#[derive(Debug, Parser)]
#[command(name = "quickchoice", version, about = "Run templates, captures, and macros against a notes vault")]
pub struct Cli {
    /// Vault root; overrides the configured one.
    #[arg(long, global = true)]
    vault: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the choice tree
    List,
    /// Print the registered commands
    Commands,
    /// Run a choice by id (or by name with --by-name)
    Run(RunArgs),
    /// Print the last line index of the section containing LINE
    Section(SectionArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    key: String,
    #[arg(long)]
    by_name: bool,
    /// Pre-bind the `value` variable instead of prompting for it.
    #[arg(long)]
    value: Option<String>,
    /// Answer prompts from this list, in order, instead of reading stdin.
    #[arg(long = "answer", value_name = "ANSWER")]
    answers: Vec<String>,
}

#[derive(Debug, Args)]
struct SectionArgs {
    file: PathBuf,
    /// 0-based line index.
    line: usize,
    #[arg(long)]
    subsections: bool,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Section(args) => print_section_end(&args),
            Command::List => {
                let app = start(self.vault, Arc::new(TerminalPicker::new()))?;
                let choices = app.store().read(|settings| settings.choices.clone());
                let mut out = std::io::stdout().lock();
                for line in render_tree(&choices) {
                    writeln!(out, "{line}")?;
                }
                Ok(())
            }
            Command::Commands => {
                let app = start(self.vault, Arc::new(TerminalPicker::new()))?;
                let mut out = std::io::stdout().lock();
                for (id, name) in app.registry().entries() {
                    writeln!(out, "{id}\t{name}")?;
                }
                Ok(())
            }
            Command::Run(args) => {
                let picker: Arc<dyn Picker> = if args.answers.is_empty() {
                    Arc::new(TerminalPicker::new())
                } else {
                    Arc::new(ScriptedPicker::new(args.answers.clone()))
                };
                let app = start(self.vault, picker)?;
                let lookup = if args.by_name {
                    ChoiceLookup::Name(&args.key)
                } else {
                    ChoiceLookup::Id(&args.key)
                };
                let choice = app
                    .store()
                    .read(|settings| tree::find_choice(&settings.choices, lookup).cloned())?;

                let mut variables = Variables::new();
                if let Some(value) = args.value {
                    variables.insert(VALUE_VARIABLE.to_string(), value);
                }
                app.executor().execute_with(&choice, &mut variables).await
            }
        }
    }
}

fn start(vault: Option<PathBuf>, picker: Arc<dyn Picker>) -> Result<QuickChoice> {
    let config = Config::load(vault)?;
    QuickChoice::start(config, picker)
}

fn print_section_end(args: &SectionArgs) -> Result<()> {
    let contents = fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let lines: Vec<&str> = contents.lines().collect();
    let end = try_resolve_section_end(&lines, args.line, args.subsections)?;
    println!("{end}");
    Ok(())
}

/// One line per choice, indented by depth; `*` marks registered commands.
pub fn render_tree(roots: &[Choice]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut stack: Vec<(usize, &Choice)> = roots.iter().rev().map(|choice| (0, choice)).collect();
    while let Some((depth, choice)) = stack.pop() {
        let marker = if choice.command { "*" } else { " " };
        lines.push(format!(
            "{marker} {}{} [{}] {}",
            "  ".repeat(depth),
            choice.name,
            choice.kind(),
            choice.id()
        ));
        stack.extend(choice.children().iter().rev().map(|child| (depth + 1, child)));
    }
    lines
}
