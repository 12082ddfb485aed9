use serde_json::{Map, Value, json};

/// Shape of a structured response, expressed in the backend's schema dialect.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaDescriptor {
    String,
    Array(Box<SchemaDescriptor>),
    /// Properties in declaration order; all of them are required.
    Object(Vec<(&'static str, SchemaDescriptor)>),
}

impl SchemaDescriptor {
    pub fn array_of(item: SchemaDescriptor) -> Self {
        SchemaDescriptor::Array(Box::new(item))
    }

    pub fn to_json(&self) -> Value {
        match self {
            SchemaDescriptor::String => json!({ "type": "STRING" }),
            SchemaDescriptor::Array(item) => json!({
                "type": "ARRAY",
                "items": item.to_json(),
            }),
            SchemaDescriptor::Object(props) => {
                let mut properties = Map::new();
                for (name, schema) in props {
                    properties.insert((*name).to_string(), schema.to_json());
                }
                let required: Vec<&str> = props.iter().map(|(name, _)| *name).collect();
                json!({
                    "type": "OBJECT",
                    "properties": properties,
                    "required": required,
                })
            }
        }
    }

    pub fn required_fields(&self) -> Vec<&'static str> {
        match self {
            SchemaDescriptor::Object(props) => props.iter().map(|(name, _)| *name).collect(),
            _ => Vec::new(),
        }
    }
}

/// Schema for the study-guide fields produced by the structured stage
pub fn study_guide_schema() -> SchemaDescriptor {
    use SchemaDescriptor as S;

    S::Object(vec![
        ("summary", S::String),
        ("keySections", S::array_of(S::String)),
        ("formulas", S::array_of(S::String)),
        (
            "glossary",
            S::array_of(S::Object(vec![
                ("term", S::String),
                ("definition", S::String),
            ])),
        ),
        ("examQuestions", S::array_of(S::String)),
    ])
}
