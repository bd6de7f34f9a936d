use serde_json::{Map, Value};

/// JSON type tags accepted by tool input schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    Null,
}

impl SchemaType {
    fn name(&self) -> &'static str {
        match self {
            SchemaType::String => "string",
            SchemaType::Number => "number",
            SchemaType::Integer => "integer",
            SchemaType::Boolean => "boolean",
            SchemaType::Array => "array",
            SchemaType::Object => "object",
            SchemaType::Null => "null",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            SchemaType::String => value.is_string(),
            // Integer deliberately accepts any JSON number.
            SchemaType::Number | SchemaType::Integer => value.is_number(),
            SchemaType::Boolean => value.is_boolean(),
            SchemaType::Array => value.is_array(),
            SchemaType::Object => value.is_object(),
            SchemaType::Null => value.is_null(),
        }
    }
}

/// One property of a tool's input object.
#[derive(Debug, Clone)]
pub struct SchemaField {
    name: String,
    types: Vec<SchemaType>,
    description: Option<String>,
    required: bool,
    max_length: Option<usize>,
    properties: Vec<SchemaField>,
}

impl SchemaField {
    pub fn new(name: impl Into<String>, types: impl IntoIterator<Item = SchemaType>) -> Self {
        Self {
            name: name.into(),
            types: types.into_iter().collect(),
            description: None,
            required: false,
            max_length: None,
            properties: Vec::new(),
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, [SchemaType::String])
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, [SchemaType::Number])
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, [SchemaType::Integer])
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, [SchemaType::Boolean])
    }

    pub fn array(name: impl Into<String>) -> Self {
        Self::new(name, [SchemaType::Array])
    }

    pub fn object(name: impl Into<String>, properties: impl IntoIterator<Item = SchemaField>) -> Self {
        Self {
            properties: properties.into_iter().collect(),
            ..Self::new(name, [SchemaType::Object])
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    fn type_names(&self) -> String {
        self.types
            .iter()
            .map(|t| t.name())
            .collect::<Vec<_>>()
            .join(" | ")
    }

    fn validate(&self, value: &Value) -> Result<(), String> {
        if !self.types.iter().any(|t| t.matches(value)) {
            return Err(format!(
                "field '{}' expects {}, got {}",
                self.name,
                self.type_names(),
                type_of(value)
            ));
        }

        if let (Some(max), Some(s)) = (self.max_length, value.as_str()) {
            if s.chars().count() > max {
                return Err(format!(
                    "field '{}' exceeds maximum length of {max} characters",
                    self.name
                ));
            }
        }

        if let Some(obj) = value.as_object() {
            validate_properties(&self.properties, obj)
                .map_err(|e| format!("field '{}': {e}", self.name))?;
        }

        Ok(())
    }

    /// JSON-schema rendering, used when enumerating the tool catalog for
    /// the planner prompt.
    pub fn to_value(&self) -> Value {
        let mut fields = Map::new();
        if self.types.len() == 1 {
            fields.insert("type".into(), self.types[0].name().into());
        } else {
            fields.insert(
                "type".into(),
                Value::Array(self.types.iter().map(|t| t.name().into()).collect()),
            );
        }
        if let Some(description) = &self.description {
            fields.insert("description".into(), description.as_str().into());
        }
        if let Some(max_length) = self.max_length {
            fields.insert("maxLength".into(), max_length.into());
        }
        if !self.properties.is_empty() {
            fields.insert(
                "properties".into(),
                Map::from_iter(
                    self.properties
                        .iter()
                        .map(|p| (p.name.clone(), p.to_value())),
                )
                .into(),
            );
            fields.insert(
                "required".into(),
                self.properties
                    .iter()
                    .filter(|p| p.required)
                    .map(|p| p.name.as_str())
                    .collect::<Vec<_>>()
                    .into(),
            );
        }
        Value::Object(fields)
    }

    fn to_plain_description(&self) -> String {
        let type_info = if self.required {
            self.type_names()
        } else {
            format!("{}, optional", self.type_names())
        };

        match &self.description {
            Some(description) => format!("{} ({}): {}", self.name, type_info, description),
            None => format!("{} ({})", self.name, type_info),
        }
    }
}

/// The object schema a tool declares for its input. Validation covers
/// declared types (a list allows alternatives), required fields,
/// `maxLength` on strings, and nested properties.
#[derive(Debug, Clone, Default)]
pub struct InputSchema {
    properties: Vec<SchemaField>,
}

impl InputSchema {
    pub fn new(properties: impl IntoIterator<Item = SchemaField>) -> Self {
        Self {
            properties: properties.into_iter().collect(),
        }
    }

    /// The schema most tools want when nothing else is declared: a
    /// single required string input.
    pub fn default_input() -> Self {
        Self::new([SchemaField::string("input")
            .description("The input for the tool")
            .required()])
    }

    pub fn validate(&self, input: &Value) -> Result<(), String> {
        let Some(obj) = input.as_object() else {
            return Err(format!("input must be an object, got {}", type_of(input)));
        };
        validate_properties(&self.properties, obj)
    }

    pub fn to_value(&self) -> Value {
        let mut fields = Map::new();
        fields.insert("type".into(), "object".into());
        fields.insert(
            "properties".into(),
            Map::from_iter(
                self.properties
                    .iter()
                    .map(|p| (p.name.clone(), p.to_value())),
            )
            .into(),
        );
        fields.insert(
            "required".into(),
            self.properties
                .iter()
                .filter(|p| p.required)
                .map(|p| p.name.as_str())
                .collect::<Vec<_>>()
                .into(),
        );
        Value::Object(fields)
    }

    pub fn properties_description(&self) -> String {
        if self.properties.is_empty() {
            return "{}".into();
        }

        let properties = self
            .properties
            .iter()
            .map(|p| format!("    {}", p.to_plain_description()))
            .collect::<Vec<_>>()
            .join(",\n");

        format!("{{\n{}\n}}", properties)
    }
}

fn validate_properties(properties: &[SchemaField], obj: &Map<String, Value>) -> Result<(), String> {
    for field in properties {
        match obj.get(&field.name) {
            Some(value) => field.validate(value)?,
            None if field.required => {
                return Err(format!("missing required field '{}'", field.name))
            }
            None => {}
        }
    }
    Ok(())
}

fn type_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
