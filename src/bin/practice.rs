//! ExamCraft · terminal practice client
//!
//! Streams a reading set from a running backend, shows the passage as it is
//! written, then runs the comprehension questions on stdin.
//!
//!   examcraft-practice --exam-type goethe --difficulty b2
//!   examcraft-practice --levels --exam-type ielts

use std::io::{self, BufRead, Write};
use std::time::Duration;

use clap::Parser;

use examcraft_backend::client::{ielts_band, ContentClient, ReadingSession, ReadingState, StreamEnd};
use examcraft_backend::config::load_app_config_from_env;
use examcraft_backend::protocol::StreamEvent;
use examcraft_backend::telemetry;

#[derive(Parser)]
#[command(name = "examcraft-practice", about = "Reading practice against an ExamCraft backend")]
#[command(version)]
struct Cli {
    /// Backend base URL
    #[arg(long, default_value = "http://127.0.0.1:3000")]
    server: String,

    /// Exam type (ielts or goethe)
    #[arg(short, long, default_value = "ielts")]
    exam_type: String,

    /// Level id, e.g. band-7-8 or b2; the exam default when omitted
    #[arg(short, long)]
    difficulty: Option<String>,

    /// List the exam's levels and exit
    #[arg(long)]
    levels: bool,

    /// Show the material without asking the questions
    #[arg(long)]
    no_quiz: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init_client_tracing();
    let cli = Cli::parse();
    let config = load_app_config_from_env();

    let client = ContentClient::new(cli.server.clone());
    if cli.levels {
        print_levels(&client, &cli.exam_type).await?;
        return Ok(());
    }

    let mut session = ReadingSession::new(client, Duration::from_millis(config.client.unimplemented_redirect_ms));
    let teardown = session.teardown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            teardown.cancel();
        }
    });

    let end = session.start(&cli.exam_type, cli.difficulty.as_deref(), render).await?;
    match end {
        StreamEnd::Completed => {}
        StreamEnd::Unimplemented { message, .. } => {
            eprintln!("\n{message}");
            eprintln!("Back to configuration. Available levels:");
            print_levels(session.client(), &cli.exam_type).await?;
            return Ok(());
        }
        StreamEnd::Failed(message) => {
            eprintln!("\n{message}. Run again to retry.");
            std::process::exit(1);
        }
        StreamEnd::Cancelled => {
            eprintln!("\nCancelled.");
            return Ok(());
        }
        StreamEnd::Disconnected => {
            eprintln!("\nThe server closed the stream early. Run again to retry.");
            std::process::exit(1);
        }
    }

    if !cli.no_quiz {
        quiz(&mut session.state, cli.exam_type == "ielts")?;
    }
    Ok(())
}

fn render(event: &StreamEvent, state: &ReadingState) {
    let mut out = io::stdout().lock();
    let _ = match event {
        StreamEvent::PassageStart => write!(out, "Writing passage"),
        StreamEvent::PassageUpdate { .. } | StreamEvent::QuestionsUpdate { .. } => write!(out, "."),
        StreamEvent::PassageComplete { .. } => {
            let view = state.passage_view().unwrap_or_default();
            let mut text = format!("\n\n== {} ==\n\n", view.title);
            if view.sections.is_empty() {
                text.push_str(&view.content);
                text.push('\n');
            } else {
                for section in &view.sections {
                    if let Some(heading) = &section.heading {
                        text.push_str(&format!("-- {heading} --\n"));
                    }
                    text.push_str(&section.content);
                    text.push_str("\n\n");
                }
            }
            write!(out, "{text}\nWriting questions")
        }
        StreamEvent::Complete { .. } => writeln!(out, " {} questions ready.\n", state.questions.len()),
        _ => Ok(()),
    };
    let _ = out.flush();
}

fn quiz(state: &mut ReadingState, ielts: bool) -> io::Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    for idx in 0..state.questions.len() {
        let question = state.questions[idx].clone();
        println!("{}. {}", idx + 1, question.text);
        if let Some(context) = &question.context {
            println!("   ({context})");
        }
        for (n, option) in question.options.iter().enumerate() {
            println!("   {}) {}", n + 1, option);
        }

        loop {
            print!("Answer [1-{}]: ", question.options.len());
            io::stdout().flush()?;
            let Some(line) = lines.next().transpose()? else {
                return Ok(());
            };
            let chosen = line.trim().parse::<usize>().ok().and_then(|n| n.checked_sub(1));
            if chosen.is_some_and(|c| state.select_answer(idx, c)) {
                break;
            }
            println!("Please pick a number between 1 and {}.", question.options.len());
        }
        println!("   progress {:.0}%\n", state.progress());
    }

    let score = state.score();
    println!("Score: {}/{} ({:.0}%)", score.correct, score.total, score.percent());
    if ielts {
        println!("Estimated IELTS band: {:.1}", ielts_band(score.percent()));
    }
    for (idx, question) in state.questions.iter().enumerate() {
        if let Some(explanation) = &question.explanation {
            println!("{}. {}", idx + 1, explanation);
        }
    }
    Ok(())
}

async fn print_levels(client: &ContentClient, exam_type: &str) -> Result<(), Box<dyn std::error::Error>> {
    let levels = client.levels(exam_type).await?;
    for level in &levels.levels {
        let marker = if level.id == levels.default_level { "*" } else { " " };
        let status = if level.is_implemented { "" } else { "  (not yet available)" };
        println!("{marker} {:<10} {:<10} {}{status}", level.id, level.name, level.description);
    }
    Ok(())
}
