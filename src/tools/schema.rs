//! Declarative parameter lists and argument validation.

use serde_json::{Map, Number, Value, json};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }

    /// Converts `value` to this type, accepting the lossless spellings a
    /// client is likely to send (`"5"` for an integer, `5.0` for `5`).
    fn coerce(&self, value: Value) -> Option<Value> {
        match (self, value) {
            (Self::String, v @ Value::String(_)) => Some(v),
            (Self::Boolean, v @ Value::Bool(_)) => Some(v),
            (Self::Boolean, Value::String(s)) => match s.trim() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            (Self::Integer, Value::Number(n)) => integral(&n).map(Value::from),
            (Self::Integer, Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::from),
            (Self::Number, v @ Value::Number(_)) => Some(v),
            (Self::Number, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number),
            _ => None,
        }
    }
}

fn integral(n: &Number) -> Option<i64> {
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    let f = n.as_f64()?;
    (f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64).then_some(f as i64)
}

#[derive(Clone, Debug, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub ty: ParamType,
    pub required: bool,
    pub default: Option<Value>,
    pub description: String,
}

impl ParamSpec {
    pub fn required(name: impl Into<String>, ty: ParamType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty,
            required: true,
            default: None,
            description: description.into(),
        }
    }

    pub fn optional(name: impl Into<String>, ty: ParamType, description: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(name, ty, description)
        }
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    fn json_schema(&self) -> Value {
        let mut schema = json!({
            "type": self.ty.as_str(),
            "description": self.description,
        });
        if let Some(default) = &self.default {
            schema["default"] = default.clone();
        }
        schema
    }
}

/// Builds the `inputSchema` object advertised in `tools/list`.
pub fn input_schema(params: &[ParamSpec]) -> Value {
    let properties: Map<String, Value> = params
        .iter()
        .map(|p| (p.name.clone(), p.json_schema()))
        .collect();
    let required: Vec<&str> = params
        .iter()
        .filter(|p| p.required)
        .map(|p| p.name.as_str())
        .collect();

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

/// Checks `args` against `params`.
///
/// Collects every problem instead of stopping at the first one. A `null`
/// value counts as absent.
pub fn validate(params: &[ParamSpec], mut args: Map<String, Value>) -> Result<ToolArguments, Vec<String>> {
    let mut problems = Vec::new();
    let mut values = Map::new();

    for param in params {
        match args.remove(&param.name) {
            None | Some(Value::Null) => {
                if let Some(default) = &param.default {
                    values.insert(param.name.clone(), default.clone());
                } else if param.required {
                    problems.push(format!("missing required parameter '{}'", param.name));
                }
            }
            Some(raw) => {
                let shown = raw.to_string();
                match param.ty.coerce(raw) {
                    Some(value) => {
                        values.insert(param.name.clone(), value);
                    }
                    None => problems.push(format!(
                        "parameter '{}' must be {} (got {})",
                        param.name,
                        param.ty.as_str(),
                        shown
                    )),
                }
            }
        }
    }

    let mut unknown: Vec<String> = args.into_iter().map(|(k, _)| k).collect();
    unknown.sort();
    for name in unknown {
        problems.push(format!("unknown parameter '{}'", name));
    }

    if problems.is_empty() {
        Ok(ToolArguments { values })
    } else {
        Err(problems)
    }
}

/// Validated arguments handed to a tool handler.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ToolArguments {
    values: Map<String, Value>,
}

impl ToolArguments {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(Value::as_str)
    }

    pub fn i64(&self, name: &str) -> Option<i64> {
        self.values.get(name).and_then(Value::as_i64)
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.values.get(name).and_then(Value::as_bool)
    }

    /// Splits a comma-separated list, dropping blanks.
    pub fn csv(&self, name: &str) -> Vec<String> {
        self.str(name)
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|f| !f.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.values
    }
}
