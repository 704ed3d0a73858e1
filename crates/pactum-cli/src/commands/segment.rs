//! Segment command implementation.

use crate::cli::SegmentArgs;
use crate::config::Config;
use crate::error::{CliError, Result};
use crate::input::{load_elements, require_content};
use crate::output::Formatter;
use pactum_extractor::{Chunk, Segmenter};
use tracing::info;

/// Execute the segment command.
pub async fn execute_segment(args: SegmentArgs, config: &Config, formatter: &Formatter) -> Result<()> {
    let chunks = segment_file(&args, config)?;
    println!("{}", formatter.format_chunks(&chunks)?);
    Ok(())
}

/// Split the input file with the configured (or overridden) budgets.
pub fn segment_file(args: &SegmentArgs, config: &Config) -> Result<Vec<Chunk>> {
    let mut extractor = config.extractor.clone();
    if let Some(tokens) = args.max_chunk_tokens {
        extractor.max_chunk_tokens = tokens;
    }
    if let Some(tokens) = args.max_table_chunk_tokens {
        extractor.max_table_chunk_tokens = tokens;
    }
    extractor.validate().map_err(CliError::InvalidInput)?;

    let elements = load_elements(&args.input)?;
    require_content(&elements, &args.input)?;

    let chunks = Segmenter::new(
        extractor.max_chunk_size(),
        extractor.max_table_chunk_size(),
        extractor.overlap_chars,
    )
    .segment(&elements);

    info!(
        "Split {} into {} chunks",
        args.input.display(),
        chunks.len()
    );
    Ok(chunks)
}
