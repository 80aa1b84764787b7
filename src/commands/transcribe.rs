//! Transcribe command - speech-to-text for an audio file.

use anyhow::{Context as _, Result};
use clap::Args;
use gateway_core::{TranscriptionRequest, DEFAULT_SAMPLE_RATE};
use std::path::PathBuf;

use crate::cli::Context;
use crate::output::{self, Busy, Envelope};

/// Arguments for the transcribe command.
#[derive(Args, Debug)]
pub struct TranscribeArgs {
    /// Audio file to transcribe
    pub file: PathBuf,

    /// Sample rate of the audio in Hz; the audio is never resampled
    #[arg(short = 'r', long, default_value_t = DEFAULT_SAMPLE_RATE)]
    pub sample_rate: u32,

    /// Language code hint (e.g. "en")
    #[arg(short, long)]
    pub language: Option<String>,
}

/// Execute the transcribe command.
pub async fn execute(args: TranscribeArgs, ctx: &Context) -> Result<()> {
    let audio = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    let mut request = TranscriptionRequest::new(audio, args.sample_rate);
    if let Some(language) = args.language {
        request = request.with_language(language);
    }

    let busy = Busy::start(
        ctx.format,
        &format!(
            "Transcribing {} ({})...",
            args.file.display(),
            output::human_size(request.audio.len() as u64)
        ),
    );
    let result = ctx.gateway.transcribe(request).await;
    drop(busy);

    let transcription = match result {
        Ok(transcription) => transcription,
        Err(e) => return output::report_failure(e, ctx.format),
    };

    if ctx.format.is_json() {
        Envelope::ok(&transcription).print()?;
    } else {
        println!("{}", transcription.text);
    }

    Ok(())
}
