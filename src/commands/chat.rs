//! Chat command - send chat completion requests.

use anyhow::Result;
use clap::Args;
use futures::StreamExt;
use gateway_core::{ChatMessage, ChatRequest, ChatResponse, ChatStream, DEFAULT_TEMPERATURE};
use std::io::{self, BufRead, Write};

use crate::cli::Context;
use crate::output::{self, Busy, Envelope, Level, OutputFormat, StreamPrinter};

/// Turns of conversation kept as context in interactive mode
const HISTORY_WINDOW: usize = 10;

/// Arguments for the chat command.
#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Message to send (if not provided, reads from stdin)
    #[arg(short, long)]
    pub message: Option<String>,

    /// Model to use (defaults to DEFAULT_CHAT_MODEL)
    #[arg(short = 'M', long, default_value = "")]
    pub model: String,

    /// System prompt
    #[arg(short, long)]
    pub system: Option<String>,

    /// Enable streaming output
    #[arg(long)]
    pub stream: bool,

    /// Temperature (0.0 to 1.0)
    #[arg(short, long, default_value_t = DEFAULT_TEMPERATURE)]
    pub temperature: f32,

    /// Maximum tokens to generate (provider default when omitted)
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Interactive chat mode
    #[arg(short, long)]
    pub interactive: bool,

    /// Show token usage
    #[arg(long)]
    pub show_usage: bool,
}

impl ChatArgs {
    fn request(&self, messages: Vec<ChatMessage>) -> ChatRequest {
        let mut request = ChatRequest::new(messages)
            .with_model(&self.model)
            .with_temperature(self.temperature)
            .with_stream(self.stream);
        if let Some(max) = self.max_tokens {
            request = request.with_max_tokens(max);
        }
        if let Some(system) = &self.system {
            request = request.with_system_prompt(system);
        }
        request
    }
}

/// Execute the chat command.
pub async fn execute(args: ChatArgs, ctx: &Context) -> Result<()> {
    if args.interactive {
        run_interactive_mode(&args, ctx).await
    } else {
        run_single_message(&args, ctx).await
    }
}

/// Run a single message chat.
async fn run_single_message(args: &ChatArgs, ctx: &Context) -> Result<()> {
    let message = if let Some(ref msg) = args.message {
        msg.clone()
    } else {
        let mut input = String::new();
        io::stdin().lock().read_line(&mut input)?;
        input.trim().to_string()
    };

    let request = args.request(vec![ChatMessage::user(message)]);
    let response = send(request, ctx.format, ctx).await?;

    if ctx.format.is_json() {
        if !args.stream {
            Envelope::ok(&response).print()?;
        }
    } else if args.show_usage {
        print_usage(&response);
    }

    Ok(())
}

/// Send one request and render it as it arrives.
async fn send(request: ChatRequest, format: OutputFormat, ctx: &Context) -> Result<ChatResponse> {
    if !request.stream {
        let busy = Busy::start(format, "Generating response...");
        let result = ctx.gateway.complete(request).await;
        drop(busy);

        let response = match result {
            Ok(response) => response,
            Err(e) => return output::report_failure(e, format),
        };
        if !format.is_json() {
            println!("{}", response.content);
        }
        return Ok(response);
    }

    match ctx.gateway.stream(request).await {
        Ok(stream) => print_stream(stream, format).await,
        Err(e) => output::report_failure(e, format),
    }
}

/// Print fragments as they arrive and return the assembled response.
pub(crate) async fn print_stream(
    mut stream: ChatStream,
    format: OutputFormat,
) -> Result<ChatResponse> {
    let mut printer = StreamPrinter::default();
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(chunk) if format.is_json() => output::emit_json(&chunk, false)?,
            Ok(chunk) => printer.push(&chunk.content),
            Err(e) => {
                printer.finish();
                return output::report_failure(e, format);
            }
        }
    }
    printer.finish();

    Ok(stream.collect_response().await?)
}

/// Run an interactive session, keeping a bounded window of prior turns.
async fn run_interactive_mode(args: &ChatArgs, ctx: &Context) -> Result<()> {
    output::heading("Interactive chat (empty line or 'exit' to quit)");
    let mut history: Vec<ChatMessage> = Vec::new();
    let stdin = io::stdin();

    loop {
        print!("\n> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() || line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }

        history.push(ChatMessage::user(line));
        let start = history.len().saturating_sub(HISTORY_WINDOW);
        let request = args.request(history[start..].to_vec());

        match send(request, OutputFormat::Text, ctx).await {
            Ok(response) => {
                if args.show_usage {
                    print_usage(&response);
                }
                history.push(ChatMessage::assistant(response.content));
            }
            Err(e) => {
                output::notice(Level::Warn, &format!("{e:#}"));
                history.pop();
            }
        }
    }

    Ok(())
}

pub(crate) fn print_usage(response: &ChatResponse) {
    output::heading("Response");
    output::field("Model", &response.model);
    output::field("Finish Reason", response.finish_reason);
    if let Some(usage) = &response.usage {
        output::field("Prompt Tokens", usage.prompt_tokens);
        output::field("Completion Tokens", usage.completion_tokens);
        output::field("Total Tokens", usage.total_tokens);
    }
}
