use std::{error::Error, sync::Arc};

use agent_recipes::{
    cli,
    config::ApiKey,
    search::{SearchClient, TavilyClient},
    tools::{ExchangeRate, LatestNews, Toolbox, TranslatePhrases, WeatherForecast, WebSearch},
    workflow::ReactAgent,
};

fn instructions(city: &str) -> String {
    format!(
        "You are a travel planner. I am traveling to {city} and need a comprehensive travel report.\n\
         Gather and summarize:\n\
         1. Local information: the official language and the local currency of {city}.\n\
         2. A detailed 5-day weather forecast for {city}, with a short summary for each day.\n\
         3. The current exchange rate from USD to the local currency.\n\
         4. The most recent and relevant news about {city}.\n\
         5. Translations of essential travel phrases into the local language.\n\
         Present the information as a well-structured travel report. Make it engaging, concise and informative. \
         Do not mention the tools used in the final report."
    )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    cli::init();
    let config = cli::require(&[ApiKey::Tavily, ApiKey::OpenWeatherMap]);

    let model = cli::chat_model(&config)?;
    let search: Arc<dyn SearchClient> = Arc::new(
        TavilyClient::new(config.api_key(ApiKey::Tavily)?)?
            .max_results(5)
            .include_answer()
            .include_raw_content(),
    );
    let toolbox = Toolbox::new()
        .with(WebSearch::new(Arc::clone(&search)))
        .with(WeatherForecast::new(config.api_key(ApiKey::OpenWeatherMap)?)?)
        .with(ExchangeRate::new()?)
        .with(LatestNews::new(Arc::clone(&search)))
        .with(TranslatePhrases::new()?);

    let city = cli::read_line("Where are you planning to travel to? ")?;
    let agent = ReactAgent::new(model, toolbox)
        .instructions(instructions(&city))
        .max_steps(config.max_steps);

    let outcome = agent
        .run(&format!("Write my travel report for {city}."))
        .await?;
    println!("{}", outcome.answer);

    Ok(())
}
