use anyhow::{bail, Context, Result};
use sectiongen::api::GenerationClient;
use sectiongen::config::Config;
use sectiongen::history;
use sectiongen::state::{GenerationHandle, MemoryDraft, Session};
use sectiongen::types::Role;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: sectiongen <conversation-id> [--history FILE] [--code FILE]";
const PROGRESS_INTERVAL: Duration = Duration::from_millis(50);

type InputLines = Lines<BufReader<Stdin>>;

struct Args {
    conversation_id: String,
    history: Option<PathBuf>,
    code: Option<PathBuf>,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self> {
        let mut conversation_id = None;
        let mut history = None;
        let mut code = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--history" => {
                    let Some(path) = args.next() else {
                        bail!("--history needs a file\n{USAGE}");
                    };
                    history = Some(PathBuf::from(path));
                }
                "--code" => {
                    let Some(path) = args.next() else {
                        bail!("--code needs a file\n{USAGE}");
                    };
                    code = Some(PathBuf::from(path));
                }
                "-h" | "--help" => bail!("{USAGE}"),
                flag if flag.starts_with("--") => bail!("unknown option {flag}\n{USAGE}"),
                _ if conversation_id.is_none() => conversation_id = Some(arg),
                _ => bail!("unexpected argument {arg}\n{USAGE}"),
            }
        }

        let Some(conversation_id) = conversation_id else {
            bail!("{USAGE}");
        };
        Ok(Self {
            conversation_id,
            history,
            code,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = Args::parse(std::env::args().skip(1))?;
    let config = Config::load()?;
    config.validate()?;

    let initial_code = match &args.code {
        Some(path) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("failed to read code file {}", path.display()))?,
        ),
        None => None,
    };
    let draft = Arc::new(MemoryDraft::new(initial_code));
    let client = GenerationClient::new(&config)?;
    let session = Session::builder(&args.conversation_id, Arc::new(client))
        .config(&config)
        .draft_source(draft.clone())
        .hooks(draft.clone())
        .build();

    if let Some(path) = &args.history {
        let messages = history::for_conversation(
            history::load_history_file(path)?,
            &args.conversation_id,
        );
        println!("loaded {} messages", messages.len());
        session.load_messages(messages);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    if let Some(handle) = session.maybe_auto_generate() {
        println!("resuming the last unanswered message");
        follow(&session, handle, &mut lines).await?;
    }

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (command, argument) = match line.split_once(' ') {
            Some((command, argument)) => (command, Some(argument.trim())),
            None => (line, None),
        };

        match command {
            "/quit" | "/exit" => break,
            "/stop" => println!("nothing is streaming"),
            "/retry" => match session.retry_failed_message() {
                Some(handle) => follow(&session, handle, &mut lines).await?,
                None => println!("nothing to retry"),
            },
            "/versions" => print_versions(&session),
            "/apply" => match version_id_for(&session, argument) {
                Some(id) => {
                    session.apply_version(&id);
                    println!("applied {id}");
                }
                None => println!("usage: /apply N"),
            },
            "/preview" => {
                match argument {
                    None => session.select_version(None),
                    Some(_) => match version_id_for(&session, argument) {
                        Some(id) => session.select_version(Some(&id)),
                        None => {
                            println!("usage: /preview [N]");
                            continue;
                        }
                    },
                }
                match session.preview_code() {
                    Some(code) => println!("{code}"),
                    None => println!("(no code)"),
                }
            }
            "/code" => match draft.code() {
                Some(code) => println!("{code}"),
                None => println!("(no code)"),
            },
            "/clear" => {
                session.clear_conversation();
                println!("conversation cleared");
            }
            _ => match session.send_message(line) {
                Some(handle) => follow(&session, handle, &mut lines).await?,
                None => println!("message ignored"),
            },
        }
    }

    session.close();
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Echoes the streaming buffer until the generation resolves. `/stop` cancels it.
async fn follow(session: &Session, handle: GenerationHandle, lines: &mut InputLines) -> Result<()> {
    let mut printed = 0;
    let mut ticker = tokio::time::interval(PROGRESS_INTERVAL);
    let mut input_open = true;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                printed = print_progress(&session.streaming_content(), printed)?;
                if handle.is_finished() {
                    break;
                }
            }
            line = lines.next_line(), if input_open => match line? {
                Some(line) if line.trim() == "/stop" => session.stop_streaming(),
                Some(_) => println!("\n(still generating; /stop to cancel)"),
                None => {
                    input_open = false;
                    session.stop_streaming();
                }
            },
        }
    }

    handle.join().await.context("generation task panicked")?;
    report_outcome(session, printed)
}

fn print_progress(buffer: &str, printed: usize) -> Result<usize> {
    if buffer.len() <= printed || !buffer.is_char_boundary(printed) {
        return Ok(printed);
    }
    let mut stdout = std::io::stdout();
    write!(stdout, "{}", &buffer[printed..])?;
    stdout.flush()?;
    Ok(buffer.len())
}

fn report_outcome(session: &Session, printed: usize) -> Result<()> {
    let snapshot = session.snapshot();

    if let Some(error) = &snapshot.last_error {
        println!();
        match &snapshot.failed_turn {
            Some(turn) if turn.is_retryable() => println!("error: {error} (/retry to resend)"),
            _ => println!("error: {error}"),
        }
        return Ok(());
    }

    if let Some(reply) = snapshot.messages.last().filter(|m| m.role == Role::Assistant) {
        let rest = reply.content.get(printed..).unwrap_or(reply.content.as_str());
        let mut stdout = std::io::stdout();
        writeln!(stdout, "{rest}")?;
        if let Some(version) = session.latest_version().filter(|v| v.id == reply.id) {
            writeln!(stdout, "[version {} ready]", version.version_number)?;
        }
    }
    Ok(())
}

fn print_versions(session: &Session) {
    let versions = session.versions();
    if versions.is_empty() {
        println!("no versions yet");
        return;
    }
    let selected = session.selected_version_id();
    for version in versions {
        let marker = if session.is_active_version(&version.id) {
            '*'
        } else if selected.as_deref() == Some(version.id.as_str()) {
            '>'
        } else {
            ' '
        };
        println!(
            "{marker} v{} {} {}",
            version.version_number,
            version.created_at.format("%Y-%m-%d %H:%M"),
            version.excerpt
        );
    }
}

fn version_id_for(session: &Session, argument: Option<&str>) -> Option<String> {
    let number: usize = argument?.trim_start_matches('v').parse().ok()?;
    session
        .versions()
        .into_iter()
        .find(|version| version.version_number == number)
        .map(|version| version.id)
}
