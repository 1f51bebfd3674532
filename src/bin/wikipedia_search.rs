use std::error::Error;

use agent_recipes::{cli, tools::WikipediaSearcher};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    cli::init();

    let query = cli::read_line("What do you want to search for on Wikipedia? ")?;
    let response = WikipediaSearcher::new(3)?.get_summaries(&query).await?;

    println!("Query: {}", response.query);
    println!("Response Time: {:.2} seconds", response.response_time);
    for (i, result) in response.results.iter().enumerate() {
        println!(
            "Result {}:\nTitle: {}\nContent: {}\n",
            i + 1,
            result.title,
            result.content
        );
    }

    Ok(())
}
