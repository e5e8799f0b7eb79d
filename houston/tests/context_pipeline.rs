//! End-to-end engine tests: context discovery and trust, template evaluation,
//! prompt assembly and the completion cache, wired the way `hu` wires them.

use std::fs;
use std::sync::Arc;

use houston::core::types::ScriptSpecification;
use houston::generate::ScriptGenerator;
use houston::io::cache::{Cache, FileCache};
use houston::io::cmd::CommandResult;
use houston::io::context::{ContextCall, ContextEngine, ContextError, discover_context_files};
use houston::io::reporter::Reporter;
use houston::io::trust::TrustModel;
use houston::test_support::{MapCmdRunner, ScriptedCompleter, TestHome};

fn engine(home: &TestHome, runner: MapCmdRunner, reporter: &Arc<Reporter>) -> ContextEngine<MapCmdRunner> {
    ContextEngine::new(
        runner,
        TrustModel::new(&home.paths.home, &home.paths.trust_path),
        reporter.clone(),
    )
}

#[test]
fn trusted_context_reaches_the_prompt_and_untrusted_is_skipped() {
    let home = TestHome::new().expect("home");
    let project = home.root().join("projects").join("app");
    let work = project.join("src");
    fs::create_dir_all(&work).expect("mkdir");
    fs::write(project.join(".houston"), "Git branch: ${git branch --show-current}").expect("write");
    fs::write(work.join("houston.ctxt"), "Secret: ${cat ~/.ssh/id_rsa}").expect("write");
    home.write_context("db", "Database: ${echo $1}").expect("ctxt");
    home.trust(&format!("{}/projects/*", home.root().display()))
        .expect("trust");

    let reporter = Arc::new(Reporter::quiet());
    let runner = MapCmdRunner::new()
        .with("git branch --show-current", CommandResult::ok("main\n"))
        .with("echo $1", CommandResult::ok("postgres\n"));
    let engine = engine(&home, runner, &reporter);

    let files = discover_context_files(
        &work,
        &home.paths,
        &[ContextCall::parse("db:postgres")],
        &reporter,
    );
    let report = engine.evaluate(&files).expect("evaluate");

    assert_eq!(
        report.texts,
        vec!["Git branch: main".to_string(), "Database: postgres".to_string()]
    );
    assert_eq!(report.untrusted, vec![work.join("houston.ctxt")]);
    assert_eq!(reporter.warning_count(), 1);

    let spec = ScriptSpecification {
        lang: "bash".to_string(),
        goal: "back up the database".to_string(),
        requirements: report.texts,
    };
    let cache = Cache::File(FileCache::new(
        &home.paths.cache_dir,
        1024 * 1024,
        reporter.clone(),
    ));
    let generator = ScriptGenerator::new(
        ScriptedCompleter::new(&["pg_dump app > app.sql\n"]),
        cache,
        "test-model",
        256,
    );

    let script = generator.generate(&spec).expect("generate");
    assert_eq!(script, "pg_dump app > app.sql\n");
    let again = generator.generate(&spec).expect("cached");
    assert_eq!(again, script);

    let prompts = generator.completer().prompts();
    assert_eq!(prompts.len(), 1);
    assert_eq!(
        prompts[0],
        "# A bash script to back up the database\n\
         #\n\
         # Additional Requirements & Information\n\
         # - Git branch: main\n\
         # - Database: postgres\n\
         #\n\
         # Start of script:\n"
    );
}

#[test]
fn failing_context_command_aborts_with_location() {
    let home = TestHome::new().expect("home");
    fs::write(
        &home.paths.default_context_path,
        "first line\nkernel: ${uname -r}\n",
    )
    .expect("write");
    let reporter = Arc::new(Reporter::quiet());
    let runner = MapCmdRunner::new().with("uname -r", CommandResult::failed(2, "uname: boom"));
    let engine = engine(&home, runner, &reporter);

    let files = discover_context_files(home.root(), &home.paths, &[], &reporter);
    let err = engine.evaluate(&files).unwrap_err();

    let rendered = format!("{err:#}");
    assert!(rendered.contains("line 2"), "{rendered}");
    assert!(rendered.contains("exit code 2"), "{rendered}");
    assert!(rendered.contains("uname: boom"), "{rendered}");
    assert!(matches!(
        err.downcast_ref::<ContextError>(),
        Some(ContextError::Template { line: 2, .. })
    ));
}

#[cfg(unix)]
#[test]
fn shell_runner_evaluates_real_commands() {
    use houston::io::cmd::ShellCmdRunner;

    let home = TestHome::new().expect("home");
    home.write_context("greet", "Hello ${echo \"$1\"}, today is ${printf '%s' weekday}")
        .expect("ctxt");
    let reporter = Arc::new(Reporter::quiet());
    let engine = ContextEngine::new(
        ShellCmdRunner::new("sh"),
        TrustModel::new(&home.paths.home, &home.paths.trust_path),
        reporter.clone(),
    );

    let files = discover_context_files(
        home.root(),
        &home.paths,
        &[ContextCall::parse("greet:World")],
        &reporter,
    );
    let report = engine.evaluate(&files).expect("evaluate");

    assert_eq!(
        report.texts,
        vec!["Hello World, today is weekday".to_string()]
    );
}
