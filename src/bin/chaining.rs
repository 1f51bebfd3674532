use std::{error::Error, sync::Arc};

use agent_recipes::{
    chain::{LlmChain, SequentialChain},
    cli,
    prompt::PromptTemplate,
    vars,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    cli::init();
    let config = cli::require(&[]);
    let model = cli::chat_model(&config)?;

    let idea = LlmChain::new(
        PromptTemplate::from_template("Generate a unique project idea related to {topic}.")?,
        Arc::clone(&model),
    );
    let code = LlmChain::new(
        PromptTemplate::from_template("Write Rust code for this project: {idea}.")?,
        Arc::clone(&model),
    );

    let outputs = SequentialChain::new()
        .step("idea", idea)
        .step("code", code)
        .invoke(vars! {"topic" => "machine learning"})
        .await?;

    println!("Generated Idea: {}", outputs["idea"]);
    println!("\nGenerated Code:\n{}", outputs["code"]);

    Ok(())
}
