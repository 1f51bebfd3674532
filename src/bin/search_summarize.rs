use std::error::Error;

use agent_recipes::{
    cli,
    config::ApiKey,
    loader::Document,
    search::{SearchClient, TavilyClient},
    splitter::RecursiveCharacterTextSplitter,
    summarize::Summarizer,
};

// Searches the web, splits the hits into chunks and summarizes them with map-reduce.
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    cli::init();
    let config = cli::require(&[ApiKey::Tavily]);

    let search = TavilyClient::new(config.api_key(ApiKey::Tavily)?)?;
    let term = cli::read_line("Enter the search term: ")?;
    let response = search.search(term).await?;

    let combined = response
        .results
        .iter()
        .map(|result| result.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let chunks = RecursiveCharacterTextSplitter::new(1000, 200)?
        .split_documents(&[Document::new(combined)]);

    let summarizer = Summarizer::new(cli::chat_model(&config)?)?;
    let output = summarizer.map_reduce(&chunks).await?;
    println!("{}", output.output_text);

    Ok(())
}
