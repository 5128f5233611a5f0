use serde_json::{json, Map, Value};

use crate::cli::OutputFormat;

/// `{"success": true, "message": ...}` with any object fields of `data` merged in
fn success_body(message: &str, data: Option<Value>) -> Value {
    let mut body = match data {
        Some(Value::Object(fields)) => fields,
        _ => Map::new(),
    };
    body.insert("success".into(), Value::Bool(true));
    body.insert("message".into(), Value::from(message));
    Value::Object(body)
}

fn error_body(message: &str) -> Value {
    json!({ "success": false, "error": message })
}

pub fn output_success(output_format: &OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&success_body(message, data))?),
        OutputFormat::Text => println!("{}", message),
    }
    Ok(())
}

pub fn output_error(output_format: &OutputFormat, message: &str) {
    match output_format {
        OutputFormat::Json => println!("{}", error_body(message)),
        OutputFormat::Text => eprintln!("error: {}", message),
    }
}
