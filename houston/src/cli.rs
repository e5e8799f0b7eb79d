//! The `hu` command: assemble context, generate a script, optionally run it.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use dialoguer::Confirm;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::core::prompt::DEFAULT_GOAL;
use crate::core::types::ScriptSpecification;
use crate::exit_codes;
use crate::generate::ScriptGenerator;
use crate::io::cache::{Cache, FileCache};
use crate::io::cmd::ShellCmdRunner;
use crate::io::completion::OpenAiCompleter;
use crate::io::config::{API_KEY_ENV, HoustonConfig, RunMode, load_config};
use crate::io::context::{ContextCall, ContextEngine, discover_context_files};
use crate::io::init::{HoustonPaths, init_home};
use crate::io::process::Echo;
use crate::io::reporter::Reporter;
use crate::io::script::{ScriptRunner, with_interpreter_directive};
use crate::io::system::{list_files, os_description};
use crate::io::trust::TrustModel;

const SEPARATOR: &str = "============================";

#[derive(Debug, Parser)]
#[command(
    name = "hu",
    version,
    about = "Generate a shell script from a natural-language goal"
)]
pub struct Cli {
    /// What the script should do.
    pub goal: Vec<String>,

    /// Run the generated script without asking for confirmation.
    #[arg(short = 'y', long)]
    pub force: bool,

    /// Only print the generated script; never run it. Wins over --force.
    #[arg(short = 'n', long)]
    pub dry: bool,

    /// Shell used to run the generated script.
    #[arg(long)]
    pub shell: Option<String>,

    /// Shell used to evaluate `${...}` markers in context files and -r commands.
    #[arg(long)]
    pub context_shell: Option<String>,

    /// Completion model.
    #[arg(long)]
    pub model: Option<String>,

    /// Token budget for the completion.
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Add the named context `<home>/<NAME>.ctxt`, optionally with arguments.
    #[arg(short = 'c', long = "context", value_name = "NAME[:ARGS]")]
    pub contexts: Vec<String>,

    /// Provide a file's name and content as context.
    #[arg(short = 'f', value_name = "FILE", value_parser = existing_file)]
    pub files: Vec<PathBuf>,

    /// Run a command and provide its output as context.
    #[arg(short = 'r', value_name = "CMD")]
    pub commands: Vec<String>,

    /// Provide the files below the working directory as context.
    #[arg(short = 't')]
    pub tree: bool,

    /// Depth limit for the file tree (implies -t).
    #[arg(long, value_name = "N")]
    pub tree_depth: Option<usize>,

    /// Write the script to FILE.
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Print only the generated script.
    #[arg(long)]
    pub minimal: bool,

    /// Neither read nor write the completion cache.
    #[arg(long)]
    pub no_cache: bool,

    /// Print the specification and prompt; enable debug tracing.
    #[arg(long)]
    pub debug: bool,
}

fn existing_file(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    if path.is_file() {
        Ok(path)
    } else {
        Err(format!("file '{value}' does not exist"))
    }
}

/// Problems that map to [`exit_codes::INVALID_CONFIG`].
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("no API key: set {API_KEY_ENV} or openai.api_key in {}", .0.display())]
    MissingApiKey(PathBuf),
}

/// Exit code for an error returned by [`run`].
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<SetupError>().is_some() {
        exit_codes::INVALID_CONFIG
    } else {
        exit_codes::FAILURE
    }
}

/// Execute `hu`. Returns the process exit code.
#[instrument(skip_all)]
pub fn run(cli: &Cli) -> Result<i32> {
    let reporter = Arc::new(if cli.minimal {
        Reporter::quiet()
    } else {
        Reporter::new()
    });

    let paths = HoustonPaths::discover()?;
    let init = init_home(&paths).context("initialize houston home")?;
    if init.created_config(&paths) {
        reporter.info(format!(
            "Default config file created at {}",
            paths.config_path.display()
        ));
    }

    let config = load_config(&paths.config_path)
        .map_err(|err| SetupError::InvalidConfig(format!("{err:#}")))?;
    let api_key = config
        .api_key(std::env::var(API_KEY_ENV).ok())
        .ok_or_else(|| SetupError::MissingApiKey(paths.config_path.clone()))?;

    if cli.force && cli.dry {
        reporter.warn("Both --force and --dry were given; the script will not run.");
    }
    let mode = RunMode::resolve(config.default_run_mode, cli.force, cli.dry);
    let settings = Settings::resolve(cli, &config);
    debug!(?mode, shell = %settings.shell, model = %settings.model, "settings resolved");

    let cwd = std::env::current_dir().context("resolve current directory")?;
    let spec = assemble_spec(cli, &settings, &paths, &cwd, &reporter)?;

    let cache = if cli.no_cache || !config.cache.enabled {
        Cache::none()
    } else {
        Cache::File(FileCache::new(
            &paths.cache_dir,
            config.cache.size_limit_bytes,
            reporter.clone(),
        ))
    };
    let completer = OpenAiCompleter::new(api_key, &config.openai)?;
    let generator = ScriptGenerator::new(completer, cache, &settings.model, settings.max_tokens);

    if cli.debug {
        let request = generator.request_for(&spec);
        reporter.info(format!("{spec:#?}"));
        reporter.info(format!("Model: {}", settings.model));
        reporter.info(format!("Max Tokens: {}", settings.max_tokens));
        reporter.info(format!("Generated prompt:\n```\n{}\n```", request.prompt));
        if let Some(suffix) = &request.suffix {
            reporter.info(format!("Generated suffix:\n```\n{suffix}\n```"));
        }
    }

    reporter.info(format!("Generating {} script...", settings.shell));
    let script = generator.generate(&spec)?;

    if cli.minimal {
        print!("{script}");
    } else {
        reporter.info(format!(
            "Here is a {} script that should do the trick:",
            settings.shell
        ));
        println!("{SEPARATOR}");
        println!("{}", script.trim());
        println!("{SEPARATOR}");
    }

    let should_run = match mode {
        RunMode::Dry => false,
        RunMode::Force => true,
        RunMode::Ask => confirm("Do you want me to run it for you?", &reporter),
    };

    let exit_code = if should_run {
        reporter.info("Ok, let's go!");
        let result = ScriptRunner::new(&settings.shell, reporter.clone()).run(&script, &[])?;
        reporter.info(format!("Script finished with exit code {}", result.exit_code));
        result.exit_code
    } else {
        reporter.info("Let me know if you need anything else!");
        exit_codes::OK
    };

    if let Some(output) = &cli.output {
        let save = mode == RunMode::Dry
            || should_run
            || confirm(
                &format!("Do you still want to save the script to {}?", output.display()),
                &reporter,
            );
        if save {
            fs::write(output, with_interpreter_directive(&script, &settings.shell))
                .with_context(|| format!("write {}", output.display()))?;
            reporter.info(format!("The script was written to {}", output.display()));
        }
    }

    Ok(exit_code)
}

/// Command-line overrides applied over the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Settings {
    shell: String,
    context_shell: String,
    model: String,
    max_tokens: u32,
}

impl Settings {
    fn resolve(cli: &Cli, config: &HoustonConfig) -> Self {
        Self {
            shell: cli
                .shell
                .clone()
                .unwrap_or_else(|| config.default_shell.clone()),
            context_shell: cli
                .context_shell
                .clone()
                .unwrap_or_else(|| config.default_context_shell.clone()),
            model: cli
                .model
                .clone()
                .unwrap_or_else(|| config.openai.model.clone()),
            max_tokens: cli.max_tokens.unwrap_or(config.openai.max_tokens),
        }
    }
}

/// Collect the goal and all requirement sources into a specification.
fn assemble_spec(
    cli: &Cli,
    settings: &Settings,
    paths: &HoustonPaths,
    cwd: &Path,
    reporter: &Arc<Reporter>,
) -> Result<ScriptSpecification> {
    let goal = cli.goal.join(" ").trim().to_string();
    let goal = if goal.is_empty() {
        DEFAULT_GOAL.to_string()
    } else {
        goal
    };

    let mut requirements = vec![format!("Must work on {}", os_description())];

    if !cli.commands.is_empty() {
        let runner =
            ScriptRunner::new(&settings.context_shell, reporter.clone()).with_echo(Echo::NONE);
        for command in &cli.commands {
            let result = runner
                .run(command, &[])
                .with_context(|| format!("run `{command}`"))?;
            if !result.success() {
                reporter.warn(format!(
                    "Command `{command}` exited with code {}",
                    result.exit_code
                ));
            }
            requirements.push(format!(
                "Output of run `{command}` is: `{}`",
                result.stdout.trim_end()
            ));
        }
    }

    if cli.tree || cli.tree_depth.is_some() {
        requirements.push(tree_requirement(cwd, cli.tree_depth));
    }

    for file in &cli.files {
        let content =
            fs::read_to_string(file).with_context(|| format!("read {}", file.display()))?;
        let name = file
            .file_name()
            .map_or_else(|| file.display().to_string(), |n| n.to_string_lossy().into_owned());
        requirements.push(format!("Content of file {name}:\n ```{content}```"));
    }

    let calls: Vec<ContextCall> = cli.contexts.iter().map(|raw| ContextCall::parse(raw)).collect();
    let files = discover_context_files(cwd, paths, &calls, reporter);
    let engine = ContextEngine::new(
        ShellCmdRunner::new(&settings.context_shell),
        TrustModel::new(&paths.home, &paths.trust_path),
        reporter.clone(),
    );
    let contexts = engine.evaluate(&files)?;
    requirements.extend(contexts.texts);

    Ok(ScriptSpecification {
        lang: settings.shell.clone(),
        goal,
        requirements,
    })
}

fn tree_requirement(root: &Path, depth: Option<usize>) -> String {
    let depth_info = depth
        .map(|depth| format!(" (limited to depth {depth})"))
        .unwrap_or_default();
    let listing: Vec<String> = list_files(root, depth)
        .iter()
        .map(|path| path.to_string_lossy().replace('\\', "/"))
        .collect();
    format!(
        "an overview of all files in the current directory{depth_info}: {}",
        listing.join("\n")
    )
}

/// Ask a yes/no question; anything but an explicit yes is a no.
fn confirm(prompt: &str, reporter: &Reporter) -> bool {
    match Confirm::new().with_prompt(prompt).default(false).interact_opt() {
        Ok(answer) => answer.unwrap_or(false),
        Err(err) => {
            reporter.warn(format!("Could not read confirmation: {err}"));
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("hu").chain(args.iter().copied())).expect("parse")
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_goal_and_flags() {
        let cli = parse(&[
            "-y",
            "-n",
            "-c",
            "docker:web 8080",
            "-r",
            "uname -a",
            "--tree-depth",
            "2",
            "--shell",
            "zsh",
            "list",
            "open",
            "ports",
        ]);
        assert_eq!(cli.goal, vec!["list", "open", "ports"]);
        assert!(cli.force && cli.dry);
        assert_eq!(cli.contexts, vec!["docker:web 8080"]);
        assert_eq!(cli.commands, vec!["uname -a"]);
        assert_eq!(cli.tree_depth, Some(2));
        assert_eq!(cli.shell.as_deref(), Some("zsh"));
    }

    #[test]
    fn missing_input_file_is_rejected() {
        let result = Cli::try_parse_from(["hu", "-f", "/definitely/not/here.txt", "goal"]);
        assert!(result.is_err());
    }

    #[test]
    fn settings_prefer_command_line_values() {
        let config = HoustonConfig {
            default_shell: "fish".to_string(),
            ..HoustonConfig::default()
        };
        let cli = parse(&["--model", "other", "--context-shell", "sh"]);
        let settings = Settings::resolve(&cli, &config);
        assert_eq!(settings.shell, "fish");
        assert_eq!(settings.context_shell, "sh");
        assert_eq!(settings.model, "other");
        assert_eq!(settings.max_tokens, config.openai.max_tokens);
    }

    #[test]
    fn setup_errors_map_to_invalid_config() {
        let err = anyhow::Error::new(SetupError::InvalidConfig("bad".to_string()));
        assert_eq!(exit_code_for(&err), exit_codes::INVALID_CONFIG);
        let err = anyhow::anyhow!("network down");
        assert_eq!(exit_code_for(&err), exit_codes::FAILURE);
    }

    #[test]
    fn tree_requirement_lists_relative_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(temp.path().join("src")).expect("mkdir");
        fs::write(temp.path().join("src/main.rs"), "").expect("write");
        fs::write(temp.path().join("README.md"), "").expect("write");

        assert_eq!(
            tree_requirement(temp.path(), None),
            "an overview of all files in the current directory: README.md\nsrc/main.rs"
        );
        assert_eq!(
            tree_requirement(temp.path(), Some(0)),
            "an overview of all files in the current directory (limited to depth 0): README.md"
        );
    }

    #[cfg(unix)]
    #[test]
    fn assembles_requirements_from_all_sources() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = HoustonPaths::new(temp.path().join("home"));
        init_home(&paths).expect("init");
        fs::write(paths.named_context("greet"), "Greeting: ${echo hello $1}").expect("ctxt");
        let work = temp.path().join("work");
        fs::create_dir_all(&work).expect("mkdir");
        let notes = work.join("notes.txt");
        fs::write(&notes, "remember").expect("write");

        let cli = parse(&[
            "-r",
            "echo from-r",
            "-f",
            &notes.to_string_lossy(),
            "-c",
            "greet:Ada",
        ]);
        let settings = Settings {
            shell: "bash".to_string(),
            context_shell: "sh".to_string(),
            model: "m".to_string(),
            max_tokens: 16,
        };
        let reporter = Arc::new(Reporter::quiet());

        let spec = assemble_spec(&cli, &settings, &paths, &work, &reporter).expect("spec");

        assert_eq!(spec.lang, "bash");
        assert_eq!(spec.goal, DEFAULT_GOAL);
        assert!(spec.requirements[0].starts_with("Must work on "));
        assert_eq!(
            &spec.requirements[1..],
            &[
                "Output of run `echo from-r` is: `from-r`".to_string(),
                "Content of file notes.txt:\n ```remember```".to_string(),
                "Greeting: hello Ada".to_string(),
            ]
        );
        assert_eq!(reporter.warning_count(), 0);
    }
}
