use std::{error::Error, sync::Arc};

use agent_recipes::{
    cli,
    config::ApiKey,
    search::TavilyClient,
    tools::{StockPrice, Toolbox, WebSearch, WikipediaSearch, WikipediaSearcher},
    workflow::ReactAgent,
};

const INSTRUCTIONS: &str = "You are an intelligent assistant capable of performing web searches, retrieving stock market data, and searching Wikipedia. \
When a user query is received, determine the most appropriate tool to use based on the nature of the query. \
If a tool fails to provide the necessary information, respond with an appropriate message indicating the limitation. \
Always provide accurate and helpful responses to user queries by utilizing the available tools when necessary.";

const DEFAULT_QUESTION: &str =
    "Tell me some historical facts about Paris including latest news and current weather conditions.";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    cli::init();
    let config = cli::require(&[ApiKey::Tavily]);

    let model = cli::chat_model(&config)?;
    let search = Arc::new(TavilyClient::new(config.api_key(ApiKey::Tavily)?)?.max_results(5));
    let toolbox = Toolbox::new()
        .with(WebSearch::new(search))
        .with(WikipediaSearch::new(WikipediaSearcher::new(1)?))
        .with(StockPrice::new()?);

    let agent = ReactAgent::new(model, toolbox)
        .instructions(INSTRUCTIONS)
        .max_steps(config.max_steps);

    let question = cli::read_line("Ask a question (empty for the default): ")?;
    let question = if question.is_empty() {
        DEFAULT_QUESTION.to_owned()
    } else {
        question
    };

    let outcome = agent.run(&question).await?;
    for message in outcome.conversation.history() {
        println!("[{}] {}\n", message.role, message.content.as_str());
    }
    println!("{}", outcome.answer);

    Ok(())
}
