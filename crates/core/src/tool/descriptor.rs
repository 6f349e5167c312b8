use std::fmt::{self, Display};

use itinera_model::ModelTool;
use serde_json::{Map, Value, json};

use super::Error;

/// The JSON type a parameter accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParameterType {
    /// A JSON string.
    String,
    /// Any JSON number.
    Number,
    /// A JSON number without a fractional part.
    Integer,
    /// `true` or `false`.
    Boolean,
    /// A JSON array.
    Array,
    /// A JSON object.
    Object,
    /// Anything; used when the schema does not pin down a single type.
    Any,
}

impl ParameterType {
    fn from_schema_name(name: &str) -> Option<Self> {
        Some(match name {
            "string" => ParameterType::String,
            "number" => ParameterType::Number,
            "integer" => ParameterType::Integer,
            "boolean" => ParameterType::Boolean,
            "array" => ParameterType::Array,
            "object" => ParameterType::Object,
            _ => return None,
        })
    }

    /// Returns the JSON schema name of this type, or `None` for `Any`.
    pub fn schema_name(&self) -> Option<&'static str> {
        Some(match self {
            ParameterType::String => "string",
            ParameterType::Number => "number",
            ParameterType::Integer => "integer",
            ParameterType::Boolean => "boolean",
            ParameterType::Array => "array",
            ParameterType::Object => "object",
            ParameterType::Any => return None,
        })
    }

    /// Checks whether `value` (never `null`) is of this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParameterType::String => value.is_string(),
            ParameterType::Number => value.is_number(),
            ParameterType::Integer => {
                value.is_i64()
                    || value.is_u64()
                    || value.as_f64().is_some_and(|f| f.fract() == 0.0)
            }
            ParameterType::Boolean => value.is_boolean(),
            ParameterType::Array => value.is_array(),
            ParameterType::Object => value.is_object(),
            ParameterType::Any => true,
        }
    }
}

impl Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.schema_name().unwrap_or("any"))
    }
}

/// One declared argument of a tool.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ParameterSpec {
    /// Argument name.
    pub name: String,
    /// Accepted type.
    pub ty: ParameterType,
    /// Whether the argument must be present.
    pub required: bool,
    /// Whether an explicit `null` is accepted.
    pub nullable: bool,
    /// Human-readable explanation shown to the planner.
    pub description: Option<String>,
}

impl ParameterSpec {
    /// A parameter that must be present and non-null.
    pub fn required<S: Into<String>>(name: S, ty: ParameterType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: true,
            nullable: false,
            description: None,
        }
    }

    /// A parameter that may be omitted or `null`.
    pub fn optional<S: Into<String>>(name: S, ty: ParameterType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: false,
            nullable: true,
            description: None,
        }
    }

    /// Attaches a description.
    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    fn to_schema(&self) -> Value {
        let mut schema = Map::new();
        if let Some(name) = self.ty.schema_name() {
            let ty = if self.nullable {
                json!([name, "null"])
            } else {
                json!(name)
            };
            schema.insert("type".to_owned(), ty);
        }
        if let Some(description) = &self.description {
            schema.insert("description".to_owned(), json!(description));
        }
        Value::Object(schema)
    }

    fn from_schema(
        name: &str,
        schema: &Value,
        required: bool,
    ) -> Result<Self, String> {
        let Some(schema) = schema.as_object() else {
            return Err(format!("property `{name}` is not a schema object"));
        };
        let (ty, nullable) = match schema.get("type") {
            None => (ParameterType::Any, true),
            Some(Value::String(ty)) => (parse_type(name, ty)?, false),
            Some(Value::Array(types)) => {
                let mut nullable = false;
                let mut concrete = vec![];
                for ty in types {
                    match ty.as_str() {
                        Some("null") => nullable = true,
                        Some(ty) => concrete.push(parse_type(name, ty)?),
                        None => {
                            return Err(format!(
                                "property `{name}` has a non-string type"
                            ));
                        }
                    }
                }
                let ty = match concrete.as_slice() {
                    [ty] => *ty,
                    _ => ParameterType::Any,
                };
                (ty, nullable)
            }
            Some(_) => {
                return Err(format!("property `{name}` has an invalid type"));
            }
        };
        Ok(Self {
            name: name.to_owned(),
            ty,
            required,
            nullable,
            description: schema
                .get("description")
                .and_then(Value::as_str)
                .map(ToOwned::to_owned),
        })
    }
}

fn parse_type(name: &str, ty: &str) -> Result<ParameterType, String> {
    ParameterType::from_schema_name(ty)
        .ok_or_else(|| format!("property `{name}` has unknown type `{ty}`"))
}

/// Name, description and parameter schema of a registered tool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolDescriptor {
    name: String,
    description: String,
    parameters: Vec<ParameterSpec>,
    schema: Value,
}

impl ToolDescriptor {
    /// Creates a descriptor from an ordered parameter list. The JSON schema
    /// sent to the planner is generated from it.
    pub fn new<N, D>(
        name: N,
        description: D,
        parameters: Vec<ParameterSpec>,
    ) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        let properties: Map<String, Value> = parameters
            .iter()
            .map(|param| (param.name.clone(), param.to_schema()))
            .collect();
        let required: Vec<&str> = parameters
            .iter()
            .filter(|param| param.required)
            .map(|param| param.name.as_str())
            .collect();
        let schema = json!({
            "type": "object",
            "properties": properties,
            "required": required,
        });
        Self {
            name: name.into(),
            description: description.into().trim().to_owned(),
            parameters,
            schema,
        }
    }

    /// Creates a descriptor from an object JSON schema, such as the one
    /// `schemars` generates for a parameter struct.
    ///
    /// `null` stands for a tool without parameters. Parameters are listed in
    /// the order the schema's `properties` map yields them.
    pub fn from_json_schema<N, D>(
        name: N,
        description: D,
        schema: &Value,
    ) -> Result<Self, String>
    where
        N: Into<String>,
        D: Into<String>,
    {
        let name = name.into();
        let description = description.into().trim().to_owned();
        let object = match schema {
            Value::Null => {
                return Ok(Self::new(name, description, vec![]));
            }
            Value::Object(object) => object,
            _ => return Err("schema is not an object".to_owned()),
        };
        match object.get("type") {
            None => {}
            Some(Value::String(ty)) if ty == "object" => {}
            Some(_) => return Err("schema type must be `object`".to_owned()),
        }

        let required = match object.get("required") {
            None => vec![],
            Some(Value::Array(names)) => names
                .iter()
                .map(|name| {
                    name.as_str().ok_or_else(|| {
                        "`required` must only contain strings".to_owned()
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => return Err("`required` must be an array".to_owned()),
        };

        let no_properties = Map::new();
        let properties = match object.get("properties") {
            None => &no_properties,
            Some(Value::Object(properties)) => properties,
            Some(_) => return Err("`properties` must be an object".to_owned()),
        };
        if let Some(unknown) =
            required.iter().find(|name| !properties.contains_key(**name))
        {
            return Err(format!("required property `{unknown}` is not declared"));
        }

        let parameters = properties
            .iter()
            .map(|(param, schema)| {
                ParameterSpec::from_schema(
                    param,
                    schema,
                    required.contains(&param.as_str()),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name,
            description,
            parameters,
            schema: schema.clone(),
        })
    }

    /// Returns the tool name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description shown to the planner.
    #[inline]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the declared parameters.
    #[inline]
    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    /// Returns the JSON schema of the parameters.
    #[inline]
    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Renders this descriptor as a model tool definition.
    pub fn to_model_tool(&self) -> ModelTool {
        ModelTool {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.schema.clone(),
        }
    }

    /// Checks `arguments` against the declared parameters and returns them
    /// as a JSON object. `null` counts as an empty argument list.
    pub fn validate_arguments(&self, arguments: Value) -> Result<Value, Error> {
        let arguments = match arguments {
            Value::Null => Map::new(),
            Value::Object(arguments) => arguments,
            other => {
                return Err(Error::invalid_input().with_reason(format!(
                    "arguments must be a JSON object, got {}",
                    json_type_name(&other)
                )));
            }
        };

        for param in &self.parameters {
            match arguments.get(&param.name) {
                None if param.required => {
                    return Err(Error::invalid_input().with_reason(format!(
                        "missing required argument `{}`",
                        param.name
                    )));
                }
                None => {}
                Some(Value::Null) if param.nullable || !param.required => {}
                Some(Value::Null) => {
                    return Err(Error::invalid_input().with_reason(format!(
                        "argument `{}` must not be null",
                        param.name
                    )));
                }
                Some(value) if !param.ty.accepts(value) => {
                    return Err(Error::invalid_input().with_reason(format!(
                        "argument `{}` must be {}, got {}",
                        param.name,
                        param.ty,
                        json_type_name(value)
                    )));
                }
                Some(_) => {}
            }
        }

        if let Some(unexpected) = arguments
            .keys()
            .find(|key| self.parameters.iter().all(|param| &param.name != *key))
        {
            return Err(Error::invalid_input().with_reason(format!(
                "unexpected argument `{unexpected}`"
            )));
        }

        Ok(Value::Object(arguments))
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::ErrorKind;

    fn flight_status() -> ToolDescriptor {
        ToolDescriptor::new(
            "get_flight_status",
            "Looks up the status of a flight.",
            vec![
                ParameterSpec::required("flight_number", ParameterType::String)
                    .with_description("Carrier code and number, e.g. AA100"),
                ParameterSpec::optional("date", ParameterType::String),
            ],
        )
    }

    #[test]
    fn test_generated_schema() {
        let descriptor = flight_status();
        assert_eq!(
            descriptor.schema(),
            &json!({
                "type": "object",
                "properties": {
                    "flight_number": {
                        "type": "string",
                        "description": "Carrier code and number, e.g. AA100"
                    },
                    "date": { "type": ["string", "null"] }
                },
                "required": ["flight_number"]
            })
        );
        let model_tool = descriptor.to_model_tool();
        assert_eq!(model_tool.name, "get_flight_status");
        assert_eq!(&model_tool.parameters, descriptor.schema());
    }

    #[test]
    fn test_from_json_schema() {
        let schema = json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "title": "HotelParameters",
            "type": "object",
            "properties": {
                "location": { "type": "string" },
                "nights": { "type": "integer", "description": "Stay length" },
                "budget": { "type": ["number", "null"] },
                "filters": { "$ref": "#/$defs/Filters" }
            },
            "required": ["location", "nights"]
        });
        let descriptor =
            ToolDescriptor::from_json_schema("hotels", "\nFinds hotels.\n", &schema)
                .unwrap();
        assert_eq!(descriptor.description(), "Finds hotels.");

        let find = |name: &str| {
            descriptor
                .parameters()
                .iter()
                .find(|param| param.name == name)
                .unwrap()
                .clone()
        };
        assert_eq!(
            find("location"),
            ParameterSpec::required("location", ParameterType::String)
        );
        assert_eq!(
            find("nights"),
            ParameterSpec::required("nights", ParameterType::Integer)
                .with_description("Stay length")
        );
        assert_eq!(
            find("budget"),
            ParameterSpec::optional("budget", ParameterType::Number)
        );
        assert_eq!(find("filters").ty, ParameterType::Any);
        assert_eq!(descriptor.schema(), &schema);
    }

    #[test]
    fn test_invalid_json_schema() {
        let cases = [
            json!("string"),
            json!({ "type": "array" }),
            json!({ "type": "object", "properties": [] }),
            json!({ "type": "object", "required": "location" }),
            json!({
                "type": "object",
                "properties": { "location": { "type": "string" } },
                "required": ["date"]
            }),
            json!({
                "type": "object",
                "properties": { "location": { "type": "text" } }
            }),
        ];
        for schema in cases {
            assert!(
                ToolDescriptor::from_json_schema("t", "", &schema).is_err(),
                "accepted {schema}"
            );
        }

        let empty = ToolDescriptor::from_json_schema("t", "", &Value::Null)
            .unwrap();
        assert!(empty.parameters().is_empty());
    }

    #[test]
    fn test_validate_arguments() {
        let descriptor = flight_status();

        let args = descriptor
            .validate_arguments(json!({ "flight_number": "AA100" }))
            .unwrap();
        assert_eq!(args, json!({ "flight_number": "AA100" }));
        assert!(
            descriptor
                .validate_arguments(
                    json!({ "flight_number": "AA100", "date": null })
                )
                .is_ok()
        );

        let reject = |args: Value| {
            let err = descriptor.validate_arguments(args).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput);
            err.reason().into_owned()
        };
        assert_eq!(
            reject(json!({})),
            "missing required argument `flight_number`"
        );
        assert_eq!(reject(Value::Null), "missing required argument `flight_number`");
        assert_eq!(
            reject(json!({ "flight_number": 100 })),
            "argument `flight_number` must be string, got number"
        );
        assert_eq!(
            reject(json!({ "flight_number": null })),
            "argument `flight_number` must not be null"
        );
        assert_eq!(
            reject(json!({ "flight_number": "AA100", "seat": "12A" })),
            "unexpected argument `seat`"
        );
        assert_eq!(
            reject(json!("{\"flight_number\":")),
            "arguments must be a JSON object, got string"
        );
    }

    #[test]
    fn test_integer_accepts_whole_floats() {
        assert!(ParameterType::Integer.accepts(&json!(3)));
        assert!(ParameterType::Integer.accepts(&json!(3.0)));
        assert!(!ParameterType::Integer.accepts(&json!(3.5)));
        assert!(ParameterType::Number.accepts(&json!(3.5)));
        assert!(!ParameterType::Boolean.accepts(&json!("true")));
    }
}
