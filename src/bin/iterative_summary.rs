use std::{error::Error, sync::Arc};

use agent_recipes::{
    cli,
    config::ApiKey,
    search::TavilyClient,
    tokens::TokenCounter,
    workflow::ReviewWorkflow,
};
use tracing::info;

// Searches the news on a topic, then lets a summarizer and a reviewer iterate on a summary
// until the reviewer approves it or MAX_ITERATIONS rounds have run.
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    cli::init();
    let config = cli::require(&[ApiKey::Tavily]);

    let model = cli::chat_model(&config)?;
    let search = TavilyClient::new(config.api_key(ApiKey::Tavily)?)?;
    let workflow = ReviewWorkflow::new(Arc::clone(&model), config.max_iterations)?;

    let topic = cli::read_line("Enter search criteria: ")?;
    let outcome = workflow.search_and_run(&search, &topic).await?;
    info!(
        iterations = outcome.iterations,
        approved = outcome.approved,
        fingerprint = outcome.conversation.fingerprint(),
        "workflow finished"
    );

    println!("{}", outcome.final_summary().unwrap_or_default());

    let counter = TokenCounter::for_model(&config.model)?;
    let num_tokens = counter.count(&outcome.conversation.joined_content());
    println!("Our prompt has {num_tokens} tokens");

    Ok(())
}
