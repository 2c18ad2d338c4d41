//! Temperature conversion tools for the HTTP demo server.

use crate::service::{require_f64, McpService, ToolError, ToolHandler};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

const ABSOLUTE_ZERO_CELSIUS: f64 = -273.15;
const ABSOLUTE_ZERO_FAHRENHEIT: f64 = -459.67;
const ABSOLUTE_ZERO_KELVIN: f64 = 0.0;

/// One scale-to-scale conversion exposed as a tool.
struct Conversion {
    name: &'static str,
    description: &'static str,
    /// Argument name, which doubles as the input scale.
    param: &'static str,
    /// Output scale name.
    unit: &'static str,
    /// Physical lower bound for the input scale.
    floor: f64,
    formula: &'static str,
    convert: fn(f64) -> f64,
}

#[async_trait]
impl ToolHandler for Conversion {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                self.param: {
                    "type": "number",
                    "description": format!("Temperature in {}", self.param),
                },
            },
            "required": [self.param],
        })
    }

    async fn call(&self, arguments: Value) -> Result<Value, ToolError> {
        let input = require_f64(&arguments, self.param)?;
        if input < self.floor {
            return Err(ToolError::failed(format!(
                "{input} {} is below absolute zero ({})",
                self.param, self.floor
            )));
        }
        let converted = (self.convert)(input);
        Ok(json!({
            "value": converted,
            "original_value": input,
            "original_scale": self.param,
            "converted_value": converted,
            "converted_scale": self.unit,
            "formula": self.formula,
        }))
    }
}

/// The demo temperature service with all six pairwise conversions.
pub fn temperature_service() -> McpService {
    McpService::new("temperature_converter", env!("CARGO_PKG_VERSION"))
        .with_tool(Arc::new(Conversion {
            name: "celsius_to_fahrenheit",
            description: "Convert a temperature from Celsius to Fahrenheit",
            param: "celsius",
            unit: "fahrenheit",
            floor: ABSOLUTE_ZERO_CELSIUS,
            formula: "F = C * 9/5 + 32",
            convert: |c| c * 9.0 / 5.0 + 32.0,
        }))
        .with_tool(Arc::new(Conversion {
            name: "fahrenheit_to_celsius",
            description: "Convert a temperature from Fahrenheit to Celsius",
            param: "fahrenheit",
            unit: "celsius",
            floor: ABSOLUTE_ZERO_FAHRENHEIT,
            formula: "C = (F - 32) * 5/9",
            convert: |f| (f - 32.0) * 5.0 / 9.0,
        }))
        .with_tool(Arc::new(Conversion {
            name: "celsius_to_kelvin",
            description: "Convert a temperature from Celsius to Kelvin",
            param: "celsius",
            unit: "kelvin",
            floor: ABSOLUTE_ZERO_CELSIUS,
            formula: "K = C + 273.15",
            convert: |c| c + 273.15,
        }))
        .with_tool(Arc::new(Conversion {
            name: "kelvin_to_celsius",
            description: "Convert a temperature from Kelvin to Celsius",
            param: "kelvin",
            unit: "celsius",
            floor: ABSOLUTE_ZERO_KELVIN,
            formula: "C = K - 273.15",
            convert: |k| k - 273.15,
        }))
        .with_tool(Arc::new(Conversion {
            name: "fahrenheit_to_kelvin",
            description: "Convert a temperature from Fahrenheit to Kelvin",
            param: "fahrenheit",
            unit: "kelvin",
            floor: ABSOLUTE_ZERO_FAHRENHEIT,
            formula: "K = (F - 32) * 5/9 + 273.15",
            convert: |f| (f - 32.0) * 5.0 / 9.0 + 273.15,
        }))
        .with_tool(Arc::new(Conversion {
            name: "kelvin_to_fahrenheit",
            description: "Convert a temperature from Kelvin to Fahrenheit",
            param: "kelvin",
            unit: "fahrenheit",
            floor: ABSOLUTE_ZERO_KELVIN,
            formula: "F = (K - 273.15) * 9/5 + 32",
            convert: |k| (k - 273.15) * 9.0 / 5.0 + 32.0,
        }))
}
