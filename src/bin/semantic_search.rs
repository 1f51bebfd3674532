use std::error::Error;

use agent_recipes::{
    cli,
    config::ApiKey,
    embeddings::SemanticIndex,
    llm_provider::embedding_model,
    tokens::TokenCounter,
};

const EMBEDDING_MODEL: &str = "text-embedding-3-small";

const DOCUMENTS: [&str; 5] = [
    "Artificial intelligence is transforming industries.",
    "Machine learning is a subset of artificial intelligence.",
    "The weather is nice today.",
    "Deep learning techniques are improving AI applications.",
    "Stock market trends are influenced by economic policies.",
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    cli::init();
    let config = cli::require(&[ApiKey::OpenAI]);
    let embedder = embedding_model(&config, EMBEDDING_MODEL)?;

    let counter = TokenCounter::for_model(EMBEDDING_MODEL)?;
    let (tokens, cost) = counter.estimate_embedding_cost(&DOCUMENTS);
    println!("Embedding {tokens} tokens, estimated cost ${cost:.6}");

    let documents = DOCUMENTS.iter().map(|doc| (*doc).to_owned()).collect();
    let index = SemanticIndex::build(embedder.as_ref(), documents).await?;

    let query = cli::read_line("Enter your search query: ")?;
    let (tokens, cost) = counter.estimate_embedding_cost(&[query.as_str()]);
    println!("Query embedding: {tokens} tokens, estimated cost ${cost:.6}");
    if let Some(best) = index.best_match(embedder.as_ref(), &query).await? {
        println!("\nBest matching document:");
        println!("\"{}\" (Score: {:.4})", best.text, best.score);
    }

    Ok(())
}
