//! Embed command - compute embedding vectors.

use anyhow::Result;
use clap::Args;
use gateway_core::{EmbeddingRequest, EmbeddingVector};
use serde::Serialize;

use crate::cli::Context;
use crate::output::{self, Envelope};

/// Arguments for the embed command.
#[derive(Args, Debug)]
pub struct EmbedArgs {
    /// Texts to embed
    #[arg(required = true)]
    pub texts: Vec<String>,

    /// Embedding model (defaults to DEFAULT_EMBEDDING_MODEL)
    #[arg(short = 'M', long, default_value = "")]
    pub model: String,

    /// Print the full vectors instead of a preview
    #[arg(long)]
    pub full: bool,
}

/// Embedding output.
#[derive(Debug, Serialize)]
pub struct EmbedOutput {
    pub model: String,
    pub dimensions: usize,
    pub embeddings: Vec<EmbeddingVector>,
}

/// Execute the embed command.
pub async fn execute(args: EmbedArgs, ctx: &Context) -> Result<()> {
    let result = if let [text] = args.texts.as_slice() {
        ctx.gateway
            .embeddings(EmbeddingRequest::new(text).with_model(&args.model))
            .await
            .map(|vector| vec![vector])
    } else {
        ctx.gateway.embeddings_batch(&args.texts, &args.model).await
    };

    let embeddings = match result {
        Ok(embeddings) => embeddings,
        Err(e) => return output::report_failure(e, ctx.format),
    };

    let model = if args.model.is_empty() {
        ctx.gateway.defaults().embedding.clone()
    } else {
        args.model
    };
    let out = EmbedOutput {
        model,
        dimensions: embeddings.first().map_or(0, Vec::len),
        embeddings,
    };

    if ctx.format.is_json() {
        return Envelope::ok(&out).print();
    }

    output::field("Model", &out.model);
    output::field("Dimensions", out.dimensions);
    for (text, vector) in args.texts.iter().zip(&out.embeddings) {
        output::heading(text);
        println!("  {}", preview(vector, args.full));
    }

    Ok(())
}

fn preview(vector: &[f32], full: bool) -> String {
    const PREVIEW_LEN: usize = 6;

    if full || vector.len() <= PREVIEW_LEN {
        return format!("{vector:?}");
    }
    let head: Vec<String> = vector[..PREVIEW_LEN].iter().map(|v| format!("{v:.4}")).collect();
    format!("[{}, ... {} more]", head.join(", "), vector.len() - PREVIEW_LEN)
}
