use std::error::Error;

use agent_recipes::{
    cli,
    loader::{Document, TextLoader, WebPageLoader},
    splitter::RecursiveCharacterTextSplitter,
    summarize::{SummaryStrategy, Summarizer},
};

// Reads a URL, or a path to a local text file, from stdin.
// SUMMARY_STRATEGY picks stuff (default), map_reduce or refine.
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    cli::init();
    let config = cli::require(&[]);

    let strategy = config.summary_strategy;

    let source = cli::read_line("Enter the URL to load documents from: ")?;
    let documents: Vec<Document> = if source.starts_with("http://") || source.starts_with("https://") {
        WebPageLoader::new(source.as_str())?.load().await?
    } else {
        TextLoader::new(&source).load().await?
    };

    let documents = match strategy {
        SummaryStrategy::Stuff => documents,
        _ => RecursiveCharacterTextSplitter::new(1000, 200)?.split_documents(&documents),
    };

    let summarizer = Summarizer::new(cli::chat_model(&config)?)?;
    let output = summarizer.summarize(strategy, &documents).await?;

    for (step, text) in output.intermediate_steps.iter().enumerate() {
        println!("--- step {}\n{text}\n", step + 1);
    }
    println!("{}", output.output_text);

    Ok(())
}
