//! Terminal story narrator.
//!
//! Reads a tagged story file and runs the full interactive session over
//! stdin/stdout, saving the interaction log next to the story file:
//!
//! ```bash
//! cargo run -p ella -- story.txt --max-depth 3 --response-length short
//! ```

use std::io::Write;
use std::path::PathBuf;

use ella_core::{transcript_path, ChildIo, ResponseLength, SessionConfig, StorySession};

struct Args {
    story_path: PathBuf,
    max_depth: u32,
    response_length: ResponseLength,
    test_mode: bool,
}

#[tokio::main]
async fn main() {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return;
    }

    let args = match parse_args(&args) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("Error: {message}");
            print_help();
            std::process::exit(1);
        }
    };

    let oracle = match openai::OpenAi::from_env() {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("Set OPENAI_API_KEY in the environment or a .env file.");
            std::process::exit(1);
        }
    };

    let config = SessionConfig::new()
        .with_max_depth(args.max_depth)
        .with_response_length(args.response_length)
        .with_test_mode(args.test_mode);

    let mut session = match StorySession::load(&args.story_path, config).await {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Failed to start session: {e}");
            std::process::exit(1);
        }
    };

    println!("\n=== Starting interactive story session... ===\n");

    let mut io = StdChildIo;
    if let Err(e) = session.run(&oracle, &mut io).await {
        eprintln!("Session failed: {e}");
        std::process::exit(1);
    }

    let log_path = transcript_path(&args.story_path);
    match session.save_transcript(&log_path).await {
        Ok(()) => println!("\nInteraction log saved to {}", log_path.display()),
        Err(e) => eprintln!("Could not save interaction log: {e}"),
    }

    println!("\n=== Interactive story session completed. ===");
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut story_path = None;
    let mut max_depth = 3;
    let mut response_length = ResponseLength::Short;
    let mut test_mode = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--max-depth" => {
                let value = args.get(i + 1).ok_or("--max-depth needs a value")?;
                max_depth = value
                    .parse()
                    .map_err(|_| format!("invalid --max-depth value '{value}'"))?;
                i += 2;
            }
            "--response-length" => {
                let value = args.get(i + 1).ok_or("--response-length needs a value")?;
                response_length = ResponseLength::from_str(value)
                    .ok_or(format!("invalid --response-length value '{value}'"))?;
                i += 2;
            }
            "--test-mode" => {
                test_mode = true;
                i += 1;
            }
            other if story_path.is_none() && !other.starts_with("--") => {
                story_path = Some(PathBuf::from(other));
                i += 1;
            }
            other => return Err(format!("unrecognized argument '{other}'")),
        }
    }

    Ok(Args {
        story_path: story_path.ok_or("missing story file path")?,
        max_depth,
        response_length,
        test_mode,
    })
}

fn print_help() {
    println!("ella - interactive story narrator with adaptive scaffolding");
    println!();
    println!("USAGE:");
    println!("  ella <story-file> [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("  -h, --help                     Show this help message");
    println!("  --max-depth <N>                Follow-up depth per interaction (default: 3)");
    println!("  --response-length <MODE>       short | standard (default: short)");
    println!("  --test-mode                    Skip to the last interaction");
    println!();
    println!("The OPENAI_API_KEY environment variable must be set (a .env file works).");
}

/// Stdin/stdout child channel.
struct StdChildIo;

#[async_trait::async_trait]
impl ChildIo for StdChildIo {
    async fn narrate(&mut self, text: &str) -> std::io::Result<()> {
        println!("Robot: {text}");
        Ok(())
    }

    async fn listen(&mut self, label: &str) -> std::io::Result<String> {
        print!("{label}: ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        std::io::stdin().read_line(&mut line)?;
        Ok(line.trim_end().to_string())
    }
}
