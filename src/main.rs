use std::io::{self, Write};
use std::process::ExitCode;

use chat_stream::commands::{parse_repl_command, ReplCommand, HELP_TEXT};
use chat_stream::logging::init_tracing;
use chat_stream::{
    Attachment, ChatConfig, SessionController, SessionError, SessionObserver, Transcript,
    TurnOutcome, TurnState, UserInput,
};
use chat_types::Role;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::error;

/// Streams the open reply to stdout as it grows.
#[derive(Default)]
struct StdoutEcho {
    printed: usize,
    tool_status: Option<String>,
}

impl SessionObserver for StdoutEcho {
    fn on_transcript(&mut self, transcript: &Transcript) {
        let Some(message) = transcript.last().filter(|m| m.role == Role::Assistant) else {
            return;
        };

        let mut stdout = io::stdout().lock();
        if message.content.is_empty() && message.tool_status != self.tool_status {
            if let Some(status) = &message.tool_status {
                let tool = message.tool_name.as_deref().unwrap_or("tool");
                let _ = writeln!(stdout, "[{tool}: {status}]");
            }
            self.tool_status = message.tool_status.clone();
        }
        if let Some(fresh) = message.content.get(self.printed..) {
            if !fresh.is_empty() {
                let _ = write!(stdout, "{fresh}");
                self.printed = message.content.len();
            }
        }
        let _ = stdout.flush();
    }

    fn on_state(&mut self, state: TurnState) {
        if state == TurnState::Sending {
            self.printed = 0;
            self.tool_status = None;
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_tracing();
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "chat_stream exited");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), SessionError> {
    let config = ChatConfig::from_env()?;
    let mut controller = SessionController::from_config(&config)?;
    controller.subscribe(Box::new(StdoutEcho::default()));

    let cancel = controller.cancel_handle();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if !cancel.cancel() {
                std::process::exit(130);
            }
        }
    });

    println!("chat_stream: {} via {}", config.model, config.base_url);
    println!("Type /help for commands.");

    let mut staged: Option<Attachment> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        let Ok(Some(line)) = lines.next_line().await else {
            break;
        };

        match parse_repl_command(&line) {
            Some(ReplCommand::Quit) => break,
            Some(command) => {
                if let Err(err) = run_command(&mut controller, &mut staged, command) {
                    println!("error: {err}");
                }
            }
            None => {
                let input = UserInput {
                    text: line,
                    attachment: staged.take(),
                };
                if input.is_empty() {
                    continue;
                }
                match controller.submit(input).await {
                    Ok(TurnOutcome::Completed { metrics }) => {
                        println!();
                        println!(
                            "[{:.2} tok/s, context {}/{}]",
                            metrics.tokens_per_second,
                            controller.session().context_usage,
                            config.context_limit
                        );
                    }
                    Ok(TurnOutcome::Cancelled) => println!("\n[cancelled]"),
                    Err(err) => println!("\nerror: {err}"),
                }
            }
        }
    }

    Ok(())
}

fn run_command(
    controller: &mut SessionController,
    staged: &mut Option<Attachment>,
    command: ReplCommand,
) -> Result<(), SessionError> {
    match command {
        ReplCommand::Help => println!("{HELP_TEXT}"),
        ReplCommand::New => {
            controller.new_chat()?;
            staged.take();
            println!("[new chat]");
        }
        ReplCommand::Sessions => {
            let sessions = controller.sessions()?;
            if sessions.is_empty() {
                println!("[no stored chats]");
            }
            for summary in sessions {
                println!(
                    "{}  {}  ({} messages)",
                    summary.id, summary.title, summary.message_count
                );
            }
        }
        ReplCommand::Resume(id) => {
            controller.resume(&id)?;
            for message in controller.transcript().messages() {
                println!("{}: {}", message.role.as_str(), message.content);
            }
        }
        ReplCommand::Delete(id) => {
            if controller.delete_session(&id)? {
                println!("[deleted {id}]");
            } else {
                println!("[no stored chat {id}]");
            }
        }
        ReplCommand::Attach(path) => {
            let body = std::fs::read_to_string(&path)
                .map_err(|err| SessionError::InvalidUpload(format!("{path}: {err}")))?;
            let attachment = Attachment::from_upload_result(&body)?;
            println!("[attached {path}]");
            *staged = Some(attachment);
        }
        ReplCommand::Unknown(command) => println!("unknown command: {command}"),
        ReplCommand::Quit => {}
    }
    Ok(())
}
