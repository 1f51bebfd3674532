use std::collections::{BTreeSet, HashMap};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PromptError {
    #[error("Missing value for prompt variable `{0}`")]
    MissingVariable(String),
    #[error("Unclosed `{{` at byte {0}")]
    Unclosed(usize),
    #[error("Unmatched `}}` at byte {0}")]
    Unmatched(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
}

/// A prompt with `{name}` placeholders. `{{` and `}}` produce literal braces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    segments: Vec<Segment>,
    partials: HashMap<String, String>,
}

impl PromptTemplate {
    pub fn from_template(template: &str) -> Result<Self, PromptError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.char_indices().peekable();

        while let Some((pos, ch)) = chars.next() {
            match ch {
                '{' if chars.peek().map(|(_, c)| *c) == Some('{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek().map(|(_, c)| *c) == Some('}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some((_, '}')) => break,
                            Some((_, c)) => name.push(c),
                            None => return Err(PromptError::Unclosed(pos)),
                        }
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Variable(name.trim().to_owned()));
                }
                '}' => return Err(PromptError::Unmatched(pos)),
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            segments,
            partials: HashMap::new(),
        })
    }

    /// Names of the variables still to be supplied, sorted.
    pub fn input_variables(&self) -> Vec<String> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Variable(name) if !self.partials.contains_key(name) => Some(name.clone()),
                _ => None,
            })
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Fix a variable now; it no longer needs to be passed to [PromptTemplate::format].
    pub fn partial(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.partials.insert(name.into(), value.into());
        self
    }

    pub fn format(&self, vars: &HashMap<String, String>) -> Result<String, PromptError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Variable(name) => {
                    let value = vars
                        .get(name)
                        .or_else(|| self.partials.get(name))
                        .ok_or_else(|| PromptError::MissingVariable(name.clone()))?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

/// Build a variable map from `name => value` pairs.
#[macro_export]
macro_rules! vars {
    ($($name:expr => $value:expr),* $(,)?) => {{
        let mut map = ::std::collections::HashMap::<String, String>::new();
        $( map.insert(::std::string::String::from($name), ::std::string::ToString::to_string(&$value)); )*
        map
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_variables() {
        let template =
            PromptTemplate::from_template("Generate a unique project idea related to {topic}.")
                .unwrap();
        assert_eq!(template.input_variables(), vec!["topic".to_owned()]);
        assert_eq!(
            template.format(&vars! {"topic" => "machine learning"}).unwrap(),
            "Generate a unique project idea related to machine learning."
        );
    }

    #[test]
    fn escaped_braces_are_literal() {
        let template = PromptTemplate::from_template(
            "Respond as JSON like {{\"definition\": ...}} about {topic}",
        )
        .unwrap();
        assert_eq!(
            template.format(&vars! {"topic" => "neural networks"}).unwrap(),
            "Respond as JSON like {\"definition\": ...} about neural networks"
        );
    }

    #[test]
    fn missing_variable_is_an_error() {
        let template = PromptTemplate::from_template("{a} and {b}").unwrap();
        assert_eq!(
            template.format(&vars! {"a" => 1}),
            Err(PromptError::MissingVariable("b".to_owned()))
        );
    }

    #[test]
    fn partials_fill_in() {
        let template = PromptTemplate::from_template("{joke} about {topic}")
            .unwrap()
            .partial("joke", "Tell me a joke");
        assert_eq!(template.input_variables(), vec!["topic".to_owned()]);
        assert_eq!(
            template.format(&vars! {"topic" => "programming"}).unwrap(),
            "Tell me a joke about programming"
        );
    }

    #[test]
    fn malformed_templates() {
        assert_eq!(
            PromptTemplate::from_template("oops {open"),
            Err(PromptError::Unclosed(5))
        );
        assert_eq!(
            PromptTemplate::from_template("close } here"),
            Err(PromptError::Unmatched(6))
        );
    }
}
