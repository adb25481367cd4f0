use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use clap::Parser;
use pdf_rag::config::{ChatArgs, LogArgs, OpenAiArgs, PineconeArgs};
use pdf_rag::{telemetry, Answerer, Conversation, Retriever};

#[derive(Parser, Debug)]
#[command(
    name = "pdf-rag-chat",
    about = "Ask questions about the indexed documents in a terminal chat"
)]
struct ChatCli {
    /// Ask a single question, print the answer and exit
    #[arg(long)]
    question: Option<String>,

    /// Print the retrieved context before each answer
    #[arg(long, default_value_t = false)]
    show_context: bool,

    #[command(flatten)]
    openai: OpenAiArgs,

    #[command(flatten)]
    chat: ChatArgs,

    #[command(flatten)]
    pinecone: PineconeArgs,

    #[command(flatten)]
    log: LogArgs,
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = ChatCli::parse();
    telemetry::init(cli.log.verbose);

    let store = cli
        .pinecone
        .store()
        .context("failed to configure the Pinecone client")?;
    let retriever = Retriever::new(cli.openai.embedder()?, store, cli.chat.retriever_config())?;
    let answerer = Answerer::new(
        cli.chat.chat(&cli.openai)?,
        retriever,
        cli.chat.answer_config(),
    );
    let mut conversation = Conversation::new().with_history_limit(cli.chat.max_history_turns);
    let mut show_context = cli.show_context;

    if let Some(question) = &cli.question {
        let result = conversation.ask(&answerer, question)?;
        if show_context && result.used_context {
            println!("--- Retrieved Context ---\n{}\n", result.context);
        }
        println!("{}", result.text);
        return Ok(());
    }

    println!("Ask a question about the documents. Commands: /reset, /context, /exit");
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush().context("failed to flush prompt")?;
        let Some(line) = lines.next() else {
            break;
        };
        let line = line.context("failed to read from stdin")?;
        let input = line.trim();
        match input {
            "" => continue,
            "/exit" | "/quit" => break,
            "/reset" => {
                conversation.clear();
                println!("(conversation cleared)");
                continue;
            }
            "/context" => {
                show_context = !show_context;
                println!(
                    "(context display {})",
                    if show_context { "on" } else { "off" }
                );
                continue;
            }
            _ => {}
        }

        let result = conversation.ask(&answerer, input)?;
        if show_context && result.used_context {
            println!("--- Retrieved Context ---\n{}\n", result.context);
        }
        println!("{}\n", result.text);
    }
    Ok(())
}
