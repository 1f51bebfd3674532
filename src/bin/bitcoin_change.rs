use std::{error::Error, sync::Arc};

use agent_recipes::{
    cli,
    config::ApiKey,
    search::TavilyClient,
    tools::{PercentageChange, Toolbox, WebSearch},
    workflow::ReactAgent,
};

const QUESTION: &str = "Find yesterday's and today's Bitcoin prices in USD. \
Calculate whether the price has increased or decreased and by what percentage.";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    cli::init();
    let config = cli::require(&[ApiKey::Tavily]);

    let model = cli::chat_model(&config)?;
    let search = TavilyClient::new(config.api_key(ApiKey::Tavily)?)?
        .max_results(5)
        .include_answer()
        .include_raw_content();
    let toolbox = Toolbox::new()
        .with(WebSearch::new(Arc::new(search)))
        .with(PercentageChange);

    let agent = ReactAgent::new(model, toolbox)
        .instructions(
            "You are a financial assistant that retrieves Bitcoin prices and calculates percentage changes.",
        )
        .max_steps(config.max_steps);
    let outcome = agent.run(QUESTION).await?;

    for call in &outcome.invocations {
        println!("> {}({})\n{}\n", call.tool, call.arguments, call.observation);
    }
    println!("{}", outcome.answer);

    Ok(())
}
