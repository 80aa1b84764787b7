//! Generate command - raw prompt completion without chat roles.

use anyhow::Result;
use clap::Args;
use gateway_core::{CompletionRequest, DEFAULT_TEMPERATURE};
use std::io::{self, Read};

use crate::cli::Context;
use crate::commands::chat;
use crate::output::{self, Busy, Envelope};

/// Arguments for the generate command.
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Prompt text (reads all of stdin when omitted)
    pub prompt: Option<String>,

    /// Model to use (defaults to DEFAULT_CHAT_MODEL)
    #[arg(short = 'M', long, default_value = "")]
    pub model: String,

    /// Stream the completion as it is generated
    #[arg(long)]
    pub stream: bool,

    /// Temperature (0.0 to 1.0)
    #[arg(short, long, default_value_t = DEFAULT_TEMPERATURE)]
    pub temperature: f32,

    /// Maximum tokens to generate (provider default when omitted)
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Show token usage
    #[arg(long)]
    pub show_usage: bool,
}

impl GenerateArgs {
    fn request(&self, prompt: String) -> CompletionRequest {
        let mut request = CompletionRequest::new(prompt)
            .with_model(&self.model)
            .with_temperature(self.temperature)
            .with_stream(self.stream);
        if let Some(max) = self.max_tokens {
            request = request.with_max_tokens(max);
        }
        request
    }
}

/// Execute the generate command.
pub async fn execute(args: GenerateArgs, ctx: &Context) -> Result<()> {
    let prompt = match &args.prompt {
        Some(prompt) => prompt.clone(),
        None => {
            let mut input = String::new();
            io::stdin().read_to_string(&mut input)?;
            input.trim().to_string()
        }
    };
    let request = args.request(prompt);

    let response = if args.stream {
        match ctx.gateway.completion_stream(request).await {
            Ok(stream) => chat::print_stream(stream, ctx.format).await?,
            Err(e) => return output::report_failure(e, ctx.format),
        }
    } else {
        let busy = Busy::start(ctx.format, "Generating...");
        let result = ctx.gateway.complete_prompt(request).await;
        drop(busy);

        match result {
            Ok(response) => {
                if !ctx.format.is_json() {
                    println!("{}", response.content);
                }
                response
            }
            Err(e) => return output::report_failure(e, ctx.format),
        }
    };

    if ctx.format.is_json() {
        if !args.stream {
            Envelope::ok(&response).print()?;
        }
    } else if args.show_usage {
        chat::print_usage(&response);
    }

    Ok(())
}
