use std::{error::Error, sync::Arc};

use agent_recipes::{
    chain::LlmChain,
    cli,
    model::ChatRequest,
    output_parser::{
        JsonOutputParser, OutputFixingParser, OutputParser, StrOutputParser,
        StructuredOutputParser,
    },
    prompt::PromptTemplate,
    vars,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct Joke {
    /// The setup or question part of the joke
    setup: String,
    /// The punchline or answer part of the joke
    punchline: String,
}

// String, JSON (with one repair attempt) and schema-typed parsing of model output.
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    cli::init();
    let config = cli::require(&[]);
    let model = cli::chat_model(&config)?;

    let translation = model
        .chat(ChatRequest::new(
            "Translate the following text from English to Spanish.",
            "If you need my help, please let me know.",
        ))
        .await?;
    println!("{}\n", StrOutputParser.parse(&translation)?);

    let explain = LlmChain::new(
        PromptTemplate::from_template(
            "Explain the concept of {topic} in the context of artificial intelligence. \
             Format the response as a JSON object with 'definition', 'applications', and 'challenges' keys.",
        )?,
        Arc::clone(&model),
    );
    let raw = explain.invoke(&vars! {"topic" => "neural networks"}).await?;
    let fixing = OutputFixingParser::new(JsonOutputParser, Arc::clone(&model));
    let value = fixing.parse(&raw).await?;
    println!("{}\n", serde_json::to_string_pretty(&value)?);

    let parser = StructuredOutputParser::<Joke>::new();
    let template = PromptTemplate::from_template(
        "Tell me a joke about {topic}. Respond with a JSON object that follows this schema:\n{format_instructions}",
    )?
    .partial(
        "format_instructions",
        parser.format_instructions().unwrap_or_default(),
    );
    let response = LlmChain::new(template, model)
        .invoke(&vars! {"topic" => "programming"})
        .await?;
    let joke = parser.parse(&response)?;
    println!("{joke:#?}");

    Ok(())
}
