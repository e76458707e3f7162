use std::io::{self, BufRead, Write};
use std::sync::Arc;

use triage_core::audit::{
    AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, TracingAuditSink,
};
use triage_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use triage_core::domain::path::{OwnerId, RecordId};
use triage_core::domain::tree::{Node, TreeId};
use triage_core::errors::{ApplicationError, DomainError, InterfaceError};
use tokio::runtime::Runtime;
use triage_core::traversal::{Choice, Session};
use triage_db::SqlTreeStore;
use uuid::Uuid;

use crate::commands::{
    build_runtime, fetch_stored, load_tree, open_store, CommandResult, Failure, TreeSource,
};

#[derive(Debug, Clone)]
pub struct WalkArgs {
    pub source: TreeSource,
    pub tree_id: Option<String>,
    pub answers: Vec<String>,
    pub owner: Option<String>,
    pub submit: bool,
}

pub fn run(args: WalkArgs) -> CommandResult {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    run_with_io(args, stdin.lock(), &mut stdout)
}

/// Walks one tree to a result, reading answers from `input` once the
/// pre-supplied ones run out. The transcript goes to `output`; the returned
/// result carries the JSON outcome line.
pub fn run_with_io<R, W>(args: WalkArgs, input: R, output: &mut W) -> CommandResult
where
    R: BufRead,
    W: Write,
{
    let config = match AppConfig::load(LoadOptions {
        overrides: ConfigOverrides {
            default_tree_id: args.tree_id,
            owner_id: args.owner,
            submit_paths: args.submit.then_some(true),
            ..ConfigOverrides::default()
        },
        ..LoadOptions::default()
    }) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "walk",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    match walk(&config, &args.source, args.answers, input, output) {
        Ok(message) => CommandResult::success("walk", message),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("walk", error_class, message, exit_code)
        }
    }
}

fn walk<R, W>(
    config: &AppConfig,
    source: &TreeSource,
    answers: Vec<String>,
    input: R,
    output: &mut W,
) -> Result<String, Failure>
where
    R: BufRead,
    W: Write,
{
    let runtime = build_runtime()?;
    if *source != TreeSource::Store && !config.session.submit_paths {
        return walk_with_store(&runtime, config, source, None, answers, input, output);
    }

    let (pool, store) = runtime.block_on(open_store(config))?;
    let walked = walk_with_store(&runtime, config, source, Some(&store), answers, input, output);
    runtime.block_on(pool.close());
    walked
}

/// Runs a walk against an already open store, which serves both the tree
/// fetch and the path submission.
fn walk_with_store<R, W>(
    runtime: &Runtime,
    config: &AppConfig,
    source: &TreeSource,
    store: Option<&SqlTreeStore>,
    answers: Vec<String>,
    input: R,
    output: &mut W,
) -> Result<String, Failure>
where
    R: BufRead,
    W: Write,
{
    let requested = TreeId(config.session.default_tree_id.clone());
    let tree = match (source, store) {
        (TreeSource::Store, Some(store)) => runtime.block_on(fetch_stored(store, &requested))?,
        _ => load_tree(source, &requested, config, runtime)?,
    };
    let tree_id = tree.id.clone();
    let mut session = Session::start(Arc::new(tree)).map_err(|error| {
        ("tree_invalid", format!("decision tree `{tree_id}` is malformed: {error}"), 6u8)
    })?;

    let correlation_id = Uuid::new_v4().to_string();
    let sink = TracingAuditSink;
    drive(&mut session, answers, input, output, &sink, &correlation_id)?;

    let mut message = verdict_summary(&session)?;
    if config.session.submit_paths {
        let Some(store) = store else {
            return Err(("internal", "path submission needs an open store".to_string(), 1));
        };
        let owner_id = OwnerId(config.session.owner_id.clone());
        let submitted = runtime.block_on(session.submit(store, &owner_id));
        record_submission(&sink, &session, &correlation_id, &submitted);
        let record_id = submitted.map_err(|error| ("path_submit", error.to_string(), 7u8))?;
        writeln!(output, "Path recorded as {}.", record_id.0).map_err(output_failure)?;
        message = format!("{message} (path recorded as {})", record_id.0);
    }

    Ok(message)
}

/// Presents questions until the session reaches a result, then renders it.
///
/// Rejected answers are shown and the same question is asked again. Typing
/// `reset` returns to the first question with an empty path.
pub(crate) fn drive<R, W, S>(
    session: &mut Session,
    answers: Vec<String>,
    input: R,
    output: &mut W,
    sink: &S,
    correlation_id: &str,
) -> Result<(), Failure>
where
    R: BufRead,
    W: Write,
    S: AuditSink,
{
    let depth = session.tree().depth();
    let mut scripted = answers.into_iter();
    let mut lines = input.lines();

    while !session.is_complete() {
        render_question(output, session, depth).map_err(output_failure)?;

        let answer = match scripted.next() {
            Some(answer) => {
                writeln!(output, "> {answer}").map_err(output_failure)?;
                answer
            }
            None => match lines.next() {
                Some(Ok(line)) => line,
                Some(Err(error)) => {
                    return Err(("input", format!("failed to read answer: {error}"), 1));
                }
                None => {
                    return Err((
                        "walk_incomplete",
                        format!(
                            "input ended at `{}` after {} answered questions",
                            session.current_id(),
                            session.path().len()
                        ),
                        8,
                    ));
                }
            },
        };

        let answer = answer.trim();
        if answer.is_empty() {
            continue;
        }
        if answer.eq_ignore_ascii_case("reset") {
            session.reset();
            writeln!(output, "Starting over.\n").map_err(output_failure)?;
            continue;
        }

        if let Err(error) = session.choose_with_audit(&parse_choice(answer), sink, correlation_id) {
            let detail = error.to_string();
            let interface =
                ApplicationError::from(DomainError::from(error)).into_interface(correlation_id);
            if let InterfaceError::Internal { message, .. } = &interface {
                return Err(("internal", message.clone(), 1));
            }
            writeln!(output, "  ! {} ({detail})\n", interface.user_message())
                .map_err(output_failure)?;
        }
    }

    render_result(output, session).map_err(output_failure)
}

/// A positive number picks an option by its 1-based position; anything else
/// is matched against option labels.
fn parse_choice(answer: &str) -> Choice {
    match answer.parse::<usize>() {
        Ok(number) if number >= 1 => Choice::Index(number - 1),
        _ => Choice::Label(answer.to_string()),
    }
}

fn render_question<W: Write>(output: &mut W, session: &Session, depth: usize) -> io::Result<()> {
    let Ok(Node::Question(question)) = session.current_node() else {
        return Ok(());
    };

    writeln!(output, "Question {} of up to {depth}", session.question_number())?;
    writeln!(output, "{}", question.prompt)?;
    if let Some(help_text) = question.help_text.as_deref().map(str::trim) {
        if !help_text.is_empty() {
            writeln!(output, "  ({help_text})")?;
        }
    }
    for (index, option) in question.options.iter().enumerate() {
        writeln!(output, "  {}) {}", index + 1, option.label)?;
    }

    let history = session.history();
    if !history.is_empty() {
        writeln!(output, "Your path so far:")?;
        for (prompt, label) in history {
            writeln!(output, "  - {prompt} {label}")?;
        }
    }

    writeln!(output, "Answer with a number or the option text (`reset` starts over):")
}

fn render_result<W: Write>(output: &mut W, session: &Session) -> io::Result<()> {
    let Ok(Node::Result(result)) = session.current_node() else {
        return Ok(());
    };

    writeln!(output)?;
    writeln!(output, "== {} [{}] ==", result.title, result.verdict.as_str())?;
    if !result.summary.is_empty() {
        writeln!(output, "{}", result.summary)?;
    }
    writeln!(output)?;
    writeln!(output, "Why this recommendation?")?;
    writeln!(output, "{}", result.description)?;
    if !result.next_steps.is_empty() {
        writeln!(output)?;
        writeln!(output, "Next steps:")?;
        for step in &result.next_steps {
            writeln!(output, "  - {step}")?;
        }
    }
    Ok(())
}

fn verdict_summary(session: &Session) -> Result<String, Failure> {
    match session.current_node() {
        Ok(Node::Result(result)) => Ok(format!(
            "{}: {} after {} answered questions",
            result.verdict.as_str(),
            result.title,
            session.path().len()
        )),
        Ok(Node::Question(question)) => {
            Err(("internal", format!("walk stopped at question `{}`", question.id), 1))
        }
        Err(error) => Err(("internal", error.to_string(), 1)),
    }
}

fn record_submission<S, E>(
    sink: &S,
    session: &Session,
    correlation_id: &str,
    submitted: &Result<RecordId, E>,
) where
    S: AuditSink,
    E: std::fmt::Display,
{
    let context = AuditContext::new(
        Some(session.tree().id.clone()),
        Some(session.id().to_string()),
        correlation_id,
        "cli-walk",
    );
    let event = match submitted {
        Ok(record_id) => {
            AuditEvent::new(&context, "path.submitted", AuditCategory::Store, AuditOutcome::Success)
                .with_metadata("record_id", record_id.0.clone())
        }
        Err(error) => {
            AuditEvent::new(&context, "path.submitted", AuditCategory::Store, AuditOutcome::Failed)
                .with_metadata("error", error.to_string())
        }
    };
    sink.emit(event.with_metadata("entries", session.path().len().to_string()));
}

fn output_failure(error: io::Error) -> Failure {
    ("output", format!("failed to write transcript: {error}"), 1)
}
