//! Extract command implementation.

use crate::cli::ExtractArgs;
use crate::config::{Config, OutputFormat};
use crate::error::{CliError, Result};
use crate::input::{load_elements, require_content};
use crate::output::Formatter;
use pactum_domain::ReasoningService;
use pactum_extractor::{Extractor, RunMetrics};
use pactum_llm::{MockService, OllamaService};
use std::fs;
use std::sync::Arc;
use tracing::info;

/// Execute the extract command.
pub async fn execute_extract(
    args: ExtractArgs,
    config: &Config,
    format: OutputFormat,
    formatter: &Formatter,
) -> Result<()> {
    let elements = load_elements(&args.input)?;
    require_content(&elements, &args.input)?;

    let service = build_service(&args, config)?;
    info!("Using reasoning service '{}'", service.name());

    let mut extractor_config = config.extractor.clone();
    if let Some(limit) = args.concurrency {
        extractor_config.concurrency_limit = limit;
    }

    let mut extractor = Extractor::new(service, extractor_config)?;
    if format == OutputFormat::Table {
        extractor = extractor.with_progress(Arc::new(|done: usize, total: usize| {
            eprint!("\rProcessed {}/{} chunks", done, total);
            if done == total {
                eprintln!();
            }
        }));
    }

    let metrics = if args.line_items {
        let outcome = extractor.extract_line_items(&elements).await?;
        println!("{}", formatter.format_line_items(&outcome)?);
        outcome.metrics
    } else {
        let outcome = extractor.extract_record(&elements).await?;
        println!("{}", formatter.format_record(&outcome)?);
        outcome.metrics
    };

    print_stats(&args, &metrics);
    Ok(())
}

/// Pick the mock or the configured Ollama backend.
pub fn build_service(args: &ExtractArgs, config: &Config) -> Result<Arc<dyn ReasoningService>> {
    if let Some(path) = &args.mock_response {
        let response = fs::read_to_string(path)?;
        if response.trim().is_empty() {
            return Err(CliError::InvalidInput(format!(
                "{} is empty",
                path.display()
            )));
        }
        return Ok(Arc::new(MockService::new(response)));
    }

    let mut service_config = config.service.clone();
    if let Some(model) = &args.model {
        service_config.model = model.clone();
    }
    Ok(Arc::new(OllamaService::new(service_config)?))
}

fn print_stats(args: &ExtractArgs, metrics: &RunMetrics) {
    if args.stats {
        eprintln!("{}", metrics.summary());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn args(input: PathBuf, mock: Option<PathBuf>) -> ExtractArgs {
        ExtractArgs {
            input,
            line_items: false,
            model: Some("llama3.1:8b".to_string()),
            concurrency: None,
            mock_response: mock,
            stats: false,
        }
    }

    #[test]
    fn test_mock_service_selected() {
        let dir = TempDir::new().unwrap();
        let mock = dir.path().join("answer.json");
        fs::write(&mock, r#"{"inn": "7707083893"}"#).unwrap();

        let service = build_service(&args(dir.path().join("doc.txt"), Some(mock)), &Config::default()).unwrap();
        assert_eq!(service.name(), "mock");
    }

    #[test]
    fn test_model_override() {
        let dir = TempDir::new().unwrap();
        let service = build_service(&args(dir.path().join("doc.txt"), None), &Config::default()).unwrap();
        assert_eq!(service.name(), "llama3.1:8b");
    }

    #[test]
    fn test_empty_mock_rejected() {
        let dir = TempDir::new().unwrap();
        let mock = dir.path().join("answer.json");
        fs::write(&mock, "  ").unwrap();
        let result = build_service(&args(dir.path().join("doc.txt"), Some(mock)), &Config::default());
        assert!(matches!(result, Err(CliError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_extract_with_mock_answer() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("doc.txt");
        fs::write(&input, "Договор № 15/24. ИНН 7707083893.").unwrap();
        let mock = dir.path().join("answer.json");
        fs::write(&mock, r#"{"inn": "7707083893", "contract_number": "15/24"}"#).unwrap();

        let formatter = Formatter::new(OutputFormat::Quiet, false);
        let result = execute_extract(
            args(input, Some(mock)),
            &Config::default(),
            OutputFormat::Quiet,
            &formatter,
        )
        .await;
        assert!(result.is_ok());
    }
}
